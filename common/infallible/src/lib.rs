// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Concurrency primitives whose lock operations cannot fail.
//!
//! Lock poisoning is not a recoverable condition for this codebase: a panic
//! while holding a lock means shared state may be arbitrarily corrupt, so
//! every caller would have to treat `PoisonError` as fatal anyway. These
//! wrappers centralize that decision.

mod mutex;
mod rwlock;

pub use mutex::Mutex;
pub use rwlock::RwLock;
