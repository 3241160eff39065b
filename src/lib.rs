// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Ferrotree - a single-writer, multi-reader, on-disk B+-Tree key-value
//! store with write-ahead logging.
//!
//! Keys and values are fixed-size byte strings (configured at creation time);
//! larger values spill into an overflow page chain transparently. A single
//! process opens a file at a time: one writer at a time, any number of
//! concurrent readers, coordinated by an in-process `RwLock` (see
//! [`transaction`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use ferrotree::Tree;
//!
//! let tree = Tree::open("/tmp/example.ftree", 4096, 64, 32, 256, 1024)?;
//! tree.insert(b"hello", b"world", false)?;
//! assert_eq!(tree.get(b"hello")?, Some(b"world".to_vec()));
//! # Ok::<(), ferrotree::TreeError>(())
//! ```
//!
//! ## Modules
//!
//! - [`tree`]: the public `Tree` API: insert, get, remove, range scans, batch load.
//! - [`node`]: the four node shapes and their byte layout.
//! - [`entry`]: `Record`/`Reference` entry encoding.
//! - [`overflow`]: overflow page chains for oversized values.
//! - [`wal`]: the write-ahead log.
//! - [`file_memory`]: page cache, free list, metadata page, checkpointing.
//! - [`transaction`]: RAII read/write transaction guards.
//! - [`iter`]: range-scan iteration.
//! - [`serializer`]: optional typed key codecs layered on top of raw bytes.
//! - [`config`]: the persisted tree configuration.
//! - [`error`]: the crate's error type.

pub mod config;
pub mod entry;
pub mod error;
pub mod file_memory;
pub mod iter;
pub mod node;
pub mod overflow;
pub mod serializer;
pub mod transaction;
pub mod tree;
pub mod wal;

pub use config::TreeConf;
pub use error::{TreeError, TreeResult};
pub use iter::RangeIter;
pub use serializer::Serializer;
#[cfg(feature = "uuid-key")]
pub use serializer::UuidSerializer;
pub use serializer::{StrSerializer, TimestampSerializer, UIntSerializer};
pub use tree::Tree;
