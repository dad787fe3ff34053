// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::{RwLock as StdRwLock, RwLockReadGuard, RwLockWriteGuard};

/// A simple wrapper around [`std::sync::RwLock`] that panics instead of
/// returning a `PoisonError`.
#[derive(Debug, Default)]
pub struct RwLock<T>(StdRwLock<T>);

impl<T> RwLock<T> {
    /// Creates a new rwlock in an unlocked state.
    pub fn new(t: T) -> Self {
        Self(StdRwLock::new(t))
    }

    /// Acquires shared read access, blocking the current thread until it can
    /// do so.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0
            .read()
            .expect("rafdp cannot currently handle a poisoned lock")
    }

    /// Acquires exclusive write access, blocking the current thread until it
    /// can do so.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0
            .write()
            .expect("rafdp cannot currently handle a poisoned lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_rafdp_rwlock() {
        let a = 7u64;
        let rwlock = Arc::new(RwLock::new(a));
        let rwlock2 = rwlock.clone();

        let thread1 = thread::spawn(move || {
            let mut b = rwlock2.write();
            *b = 8;
        });
        thread1.join().unwrap();

        assert_eq!(*rwlock.read(), 8);
    }
}
