// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! The sync loop.
//!
//! Given the set of pinned roots, the driver keeps asking peers for
//! whatever the store reports missing until every referenced node is
//! locally resolved: unvalidated peers are pinged on a slow cadence,
//! validated peers are asked for each missing identifier on a fast one,
//! and every pinned root is periodically announced to the trackers to pull
//! in fresh peers. The protocol is eventually-convergent as long as one
//! honest peer holds each missing node.

mod driver;

pub use driver::{SyncDriver, ANNOUNCE_INTERVAL, PING_RETRY_INTERVAL, REQUEST_RETRY_INTERVAL};
