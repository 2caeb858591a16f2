// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use crate::domain::event::Pubkey;

/// Authorization policy for inbound job requests. Loaded once at startup,
/// read-only afterwards.
#[derive(Debug, Clone)]
pub enum WhitelistPolicy {
    /// No restriction; every requester is authorized.
    Open,
    /// Only the listed identities may submit jobs.
    Restricted(HashSet<Pubkey>),
}

impl WhitelistPolicy {
    /// Build the policy from an optional configured list. An absent list
    /// means open access.
    pub fn from_config(allowed: Option<&[String]>) -> Self {
        match allowed {
            None => Self::Open,
            Some(keys) => Self::Restricted(
                keys.iter().map(|key| Pubkey::new(key.clone())).collect(),
            ),
        }
    }

    pub fn allows(&self, pubkey: &Pubkey) -> bool {
        match self {
            Self::Open => true,
            Self::Restricted(allowed) => allowed.contains(pubkey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_policy_allows_everyone() {
        let policy = WhitelistPolicy::from_config(None);
        assert!(policy.allows(&Pubkey::new("anyone")));
    }

    #[test]
    fn test_restricted_policy_checks_membership() {
        let allowed = vec!["alice".to_string()];
        let policy = WhitelistPolicy::from_config(Some(&allowed));
        assert!(policy.allows(&Pubkey::new("alice")));
        assert!(!policy.allows(&Pubkey::new("bob")));
    }

    #[test]
    fn test_empty_list_is_restricted_not_open() {
        let policy = WhitelistPolicy::from_config(Some(&[]));
        assert!(!policy.allows(&Pubkey::new("anyone")));
    }
}
