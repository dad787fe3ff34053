// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! The RAFDP node: engine wiring and the loopback control plane.

mod engine;
mod rpc;

pub use engine::{Engine, NodeConfig};
