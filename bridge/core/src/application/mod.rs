// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod announcer;
pub mod bridge;
pub mod gateway;

pub use announcer::Announcer;
pub use bridge::Bridge;
pub use gateway::RequestGateway;
