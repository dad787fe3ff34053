// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Mutex as StdMutex, MutexGuard};

/// A simple wrapper around [`std::sync::Mutex`] that panics instead of
/// returning a `PoisonError`.
#[derive(Debug, Default)]
pub struct Mutex<T>(StdMutex<T>);

impl<T> Mutex<T> {
    /// Creates a new mutex in an unlocked state.
    pub fn new(t: T) -> Self {
        Self(StdMutex::new(t))
    }

    /// Acquires the mutex, blocking the current thread until it can do so.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0
            .lock()
            .expect("rafdp cannot currently handle a poisoned lock")
    }
}
