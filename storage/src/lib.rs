// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! The in-memory hash tree store, the tree builder that populates it from
//! local files, and the random-access reader that serves byte ranges out of
//! a (possibly still resolving) tree.

pub mod builder;
pub mod reader;
pub mod store;

pub use builder::{build_from_file, BuildError, CHUNK_SIZE};
pub use reader::{Reader, Side};
pub use store::{HashTreeStore, StoreError};
