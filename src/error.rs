// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for Ferrotree operations.

use std::fmt;

/// Standard Result type for all Ferrotree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Error types surfaced by the tree, its storage layer, and its WAL.
#[derive(Debug)]
pub enum TreeError {
    /// Insert without `replace` found the key already present.
    DuplicateKey { key: String },

    /// Lookup, removal, or update targeted a key that is not present.
    KeyNotFound { key: String },

    /// `batch_insert` received a key not strictly greater than the
    /// previously inserted key (or the leaf's current biggest key).
    OutOfOrder { key: String },

    /// `range_scan` was asked for reverse order or a step, neither of
    /// which this store supports.
    UnsupportedRange { reason: String },

    /// A key or value exceeded its configured fixed size.
    ValueTooLarge { which: &'static str, len: usize, max: usize },

    /// `TreeConf` failed validation (e.g. order too small, zero page size).
    InvalidConfig { reason: String },

    /// A page failed to decode: unknown node type tag, `used_length` over
    /// `page_size`, or a WAL/metadata header that doesn't parse.
    CorruptPage { page: u32, reason: String },

    /// A read ran past the end of the data or WAL file.
    ReachedEndOfFile { operation: String },

    /// The parent directory of the data file does not exist.
    NoSuchDirectory { path: String },

    /// Any other I/O failure (short write, fsync failure, permission
    /// denied, ...).
    Io { operation: String, reason: String },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key } => write!(f, "key '{key}' already exists"),
            Self::KeyNotFound { key } => write!(f, "key '{key}' not found"),
            Self::OutOfOrder { key } => {
                write!(f, "batch_insert received out-of-order key '{key}'")
            }
            Self::UnsupportedRange { reason } => write!(f, "unsupported range scan: {reason}"),
            Self::ValueTooLarge { which, len, max } => {
                write!(f, "{which} of {len} bytes exceeds configured max of {max} bytes")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid tree configuration: {reason}"),
            Self::CorruptPage { page, reason } => {
                write!(f, "corrupt page {page}: {reason}")
            }
            Self::ReachedEndOfFile { operation } => {
                write!(f, "reached end of file during '{operation}'")
            }
            Self::NoSuchDirectory { path } => {
                write!(f, "parent directory does not exist: {path}")
            }
            Self::Io { operation, reason } => write!(f, "I/O error during '{operation}': {reason}"),
        }
    }
}

impl std::error::Error for TreeError {}

impl From<std::io::Error> for TreeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return TreeError::ReachedEndOfFile {
                operation: "read".to_string(),
            };
        }
        TreeError::Io {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}
