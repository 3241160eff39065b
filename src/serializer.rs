// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable key codecs (spec.md §4.1).
//!
//! A `Serializer` turns a logical key of type `K` into the fixed-size byte
//! slice a `Record`/`Reference` stores, and back. The tree compares keys by
//! their encoded bytes, so implementations must be order-faithful to the
//! logical ordering they're paired with; none of the four reference
//! serializers below reorders relative to their natural type ordering.

use crate::error::{TreeError, TreeResult};

/// Encode/decode a logical key of type `Key` to/from fixed-size bytes.
pub trait Serializer {
    type Key;

    /// Encode `key` into at most `max_len` bytes.
    fn serialize(&self, key: &Self::Key, max_len: u32) -> TreeResult<Vec<u8>>;

    /// Decode a key from its stored bytes.
    fn deserialize(&self, bytes: &[u8]) -> TreeResult<Self::Key>;
}

/// Fixed-width unsigned integer, little-endian, width in {1, 2, 4, 8}.
pub struct UIntSerializer {
    pub width: u8,
}

impl UIntSerializer {
    pub fn new(width: u8) -> Self {
        assert!(matches!(width, 1 | 2 | 4 | 8), "unsupported integer width");
        Self { width }
    }
}

impl Serializer for UIntSerializer {
    type Key = u64;

    fn serialize(&self, key: &u64, max_len: u32) -> TreeResult<Vec<u8>> {
        if self.width as u32 > max_len {
            return Err(TreeError::ValueTooLarge {
                which: "key",
                len: self.width as usize,
                max: max_len as usize,
            });
        }
        let full = key.to_le_bytes();
        Ok(full[0..self.width as usize].to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> TreeResult<u64> {
        let mut buf = [0u8; 8];
        buf[0..bytes.len().min(8)].copy_from_slice(&bytes[0..bytes.len().min(8)]);
        Ok(u64::from_le_bytes(buf))
    }
}

/// UTF-8 string, zero-padded by the node layer up to `key_size`. Truncation
/// is forbidden: an over-length key is rejected, never silently cut.
pub struct StrSerializer;

impl Serializer for StrSerializer {
    type Key = String;

    fn serialize(&self, key: &String, max_len: u32) -> TreeResult<Vec<u8>> {
        let bytes = key.as_bytes();
        if bytes.len() as u32 > max_len {
            return Err(TreeError::ValueTooLarge {
                which: "key",
                len: bytes.len(),
                max: max_len as usize,
            });
        }
        Ok(bytes.to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> TreeResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| TreeError::CorruptPage {
            page: 0,
            reason: format!("key bytes are not valid UTF-8: {e}"),
        })
    }
}

/// 16-byte identifier keys (e.g. UUIDs).
#[cfg(feature = "uuid-key")]
pub struct UuidSerializer;

#[cfg(feature = "uuid-key")]
impl Serializer for UuidSerializer {
    type Key = uuid::Uuid;

    fn serialize(&self, key: &uuid::Uuid, max_len: u32) -> TreeResult<Vec<u8>> {
        if max_len < 16 {
            return Err(TreeError::ValueTooLarge {
                which: "key",
                len: 16,
                max: max_len as usize,
            });
        }
        Ok(key.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> TreeResult<uuid::Uuid> {
        uuid::Uuid::from_slice(bytes).map_err(|e| TreeError::CorruptPage {
            page: 0,
            reason: format!("key bytes are not a valid UUID: {e}"),
        })
    }
}

/// UTC timestamp, encoded as milliseconds since the Unix epoch, 8-byte
/// little-endian signed integer (supports instants before 1970).
pub struct TimestampSerializer;

impl Serializer for TimestampSerializer {
    type Key = i64;

    fn serialize(&self, key: &i64, max_len: u32) -> TreeResult<Vec<u8>> {
        if max_len < 8 {
            return Err(TreeError::ValueTooLarge {
                which: "key",
                len: 8,
                max: max_len as usize,
            });
        }
        Ok(key.to_le_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> TreeResult<i64> {
        let mut buf = [0u8; 8];
        buf[0..bytes.len().min(8)].copy_from_slice(&bytes[0..bytes.len().min(8)]);
        Ok(i64::from_le_bytes(buf))
    }
}

#[cfg(test)]
#[path = "serializer_test.rs"]
mod serializer_test;
