// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Concrete event signer.
//
// The event id is the sha-256 digest of the canonical serialization
// `[0, pubkey, created_at, kind, tags, content]`; the signature is an
// ed25519 signature over the digest bytes. Both travel hex encoded.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::domain::error::BridgeError;
use crate::domain::event::{EventId, EventSigner, EventTemplate, Pubkey, RelayEvent};

pub struct KeyManager {
    signing_key: SigningKey,
    public_key: Pubkey,
}

impl KeyManager {
    /// Build from a 32-byte hex seed (the configured private key).
    pub fn from_hex(seed: &str) -> Result<Self, BridgeError> {
        let bytes = hex::decode(seed)
            .map_err(|e| BridgeError::Signing(format!("invalid private key hex: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| BridgeError::Signing("private key must be 32 bytes".to_string()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes)))
    }

    /// Fresh random identity. Used by tests and one-off tooling.
    pub fn generate() -> Self {
        let mut csprng = rand_core::OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = Pubkey::new(hex::encode(signing_key.verifying_key().as_bytes()));
        Self {
            signing_key,
            public_key,
        }
    }

    fn digest(&self, template: &EventTemplate) -> Result<[u8; 32], BridgeError> {
        let canonical = serde_json::json!([
            0,
            self.public_key.as_str(),
            template.created_at,
            template.kind,
            template.tags,
            template.content,
        ]);
        let serialized = serde_json::to_vec(&canonical)
            .map_err(|e| BridgeError::Signing(format!("failed to canonicalize event: {e}")))?;
        Ok(Sha256::digest(&serialized).into())
    }

    /// Check an event's signature against its embedded pubkey and id.
    pub fn verify(event: &RelayEvent) -> Result<(), BridgeError> {
        let key_bytes: [u8; 32] = hex::decode(event.pubkey.as_str())
            .map_err(|e| BridgeError::Signing(format!("invalid pubkey hex: {e}")))?
            .try_into()
            .map_err(|_| BridgeError::Signing("pubkey must be 32 bytes".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| BridgeError::Signing(format!("invalid pubkey: {e}")))?;

        let id_bytes = hex::decode(event.id.as_str())
            .map_err(|e| BridgeError::Signing(format!("invalid event id hex: {e}")))?;
        let sig_bytes: [u8; 64] = hex::decode(&event.sig)
            .map_err(|e| BridgeError::Signing(format!("invalid signature hex: {e}")))?
            .try_into()
            .map_err(|_| BridgeError::Signing("signature must be 64 bytes".to_string()))?;

        verifying_key
            .verify(&id_bytes, &Signature::from_bytes(&sig_bytes))
            .map_err(|e| BridgeError::Signing(format!("signature verification failed: {e}")))
    }
}

impl EventSigner for KeyManager {
    fn sign(&self, template: EventTemplate) -> Result<RelayEvent, BridgeError> {
        let digest = self.digest(&template)?;
        let signature = self.signing_key.sign(&digest);
        Ok(RelayEvent {
            id: EventId::new(hex::encode(digest)),
            pubkey: self.public_key.clone(),
            created_at: template.created_at,
            kind: template.kind,
            tags: template.tags,
            content: template.content,
            sig: hex::encode(signature.to_bytes()),
        })
    }

    fn public_key(&self) -> Pubkey {
        self.public_key.clone()
    }
}
