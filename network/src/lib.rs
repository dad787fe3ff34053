// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! The RAFDP wire protocol and its datagram transport.
//!
//! The transport owns a single UDP socket and performs no retries,
//! deduplication or ordering; every inbound datagram is handed to the
//! [`handler::ProtocolHandler`], which parses it, enforces integrity of
//! received payloads against their claimed identifiers, updates the shared
//! store and peer table, and returns the reply datagrams to send back.

pub mod handler;
pub mod peer;
pub mod reassembly;
pub mod transport;
pub mod wire;

pub use handler::ProtocolHandler;
pub use peer::PeerTable;
pub use transport::Transport;
