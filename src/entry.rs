// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Byte-level encoding of a single in-node entry.
//!
//! Two shapes exist: `Record` (leaf entries: key + inline value or overflow
//! pointer) and `Reference` (internal entries: a fence key plus the two
//! child pages it separates). Ordering and equality of both are defined
//! solely on `key` (spec.md §4.2), which is what lets `Vec<Record>` and
//! `Vec<Reference>` be kept sorted with plain binary search.

use crate::error::{TreeError, TreeResult};

/// Fixed length in bytes of a `Record` entry for the given key/value sizes.
pub fn record_len(key_size: u32, value_size: u32) -> u32 {
    2 + key_size + 2 + value_size + 4
}

/// Fixed length in bytes of a `Reference` entry for the given key size.
pub fn reference_len(key_size: u32) -> u32 {
    4 + 2 + key_size + 4
}

/// Where a record's value actually lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueLocation {
    /// The value is stored inline, within the record itself.
    Inline(Vec<u8>),
    /// The value lives in an overflow chain starting at this page.
    Overflow(u32),
}

/// A leaf entry: a key paired with its value or an overflow pointer.
///
/// Exactly one of `Inline`/`Overflow` applies at a time, matching spec.md
/// §3's "exactly one of (value, overflow_page) is non-empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: ValueLocation,
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Record {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl Record {
    pub fn new_inline(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value: ValueLocation::Inline(value),
        }
    }

    pub fn new_overflow(key: Vec<u8>, overflow_page: u32) -> Self {
        Self {
            key,
            value: ValueLocation::Overflow(overflow_page),
        }
    }

    /// Encode into a fixed-size buffer of `record_len(key_size, value_size)`
    /// bytes, per spec.md §3's Record layout.
    pub fn dump(&self, key_size: u32, value_size: u32) -> TreeResult<Vec<u8>> {
        if self.key.len() as u32 > key_size {
            return Err(TreeError::ValueTooLarge {
                which: "key",
                len: self.key.len(),
                max: key_size as usize,
            });
        }
        let (used_value_len, value_bytes, overflow_page): (u16, &[u8], u32) = match &self.value {
            ValueLocation::Inline(v) => {
                if v.len() as u32 > value_size {
                    return Err(TreeError::ValueTooLarge {
                        which: "value",
                        len: v.len(),
                        max: value_size as usize,
                    });
                }
                (v.len() as u16, v.as_slice(), 0)
            }
            ValueLocation::Overflow(page) => (0, &[], *page),
        };

        let mut buf = Vec::with_capacity(record_len(key_size, value_size) as usize);
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.resize(buf.len() + (key_size - self.key.len() as u32) as usize, 0);
        buf.extend_from_slice(&used_value_len.to_le_bytes());
        buf.extend_from_slice(value_bytes);
        buf.resize(buf.len() + (value_size - value_bytes.len() as u32) as usize, 0);
        buf.extend_from_slice(&overflow_page.to_le_bytes());
        Ok(buf)
    }

    /// Decode a single record from the front of `bytes`. `bytes` must be at
    /// least `record_len(key_size, value_size)` long.
    pub fn load(bytes: &[u8], key_size: u32, value_size: u32) -> TreeResult<Self> {
        let need = record_len(key_size, value_size) as usize;
        if bytes.len() < need {
            return Err(TreeError::ReachedEndOfFile {
                operation: "Record::load".to_string(),
            });
        }
        let used_key_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        let key_start = 2;
        let key = bytes[key_start..key_start + used_key_len].to_vec();
        let value_len_off = 2 + key_size as usize;
        let used_value_len =
            u16::from_le_bytes([bytes[value_len_off], bytes[value_len_off + 1]]) as usize;
        let value_start = value_len_off + 2;
        let value_bytes = &bytes[value_start..value_start + used_value_len];
        let overflow_off = value_start + value_size as usize;
        let overflow_page = u32::from_le_bytes(bytes[overflow_off..overflow_off + 4].try_into().unwrap());

        let value = if overflow_page != 0 {
            ValueLocation::Overflow(overflow_page)
        } else {
            ValueLocation::Inline(value_bytes.to_vec())
        };
        Ok(Self { key, value })
    }
}

/// An internal entry: a fence key plus the pages it separates.
///
/// `before` holds every key strictly less than `key`; `after` holds every
/// key greater than or equal to `key`, until the next fence (spec.md §3's
/// fence invariant: adjacent entries share a page, `E_i.after == E_{i+1}.before`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub before: u32,
    pub key: Vec<u8>,
    pub after: u32,
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Reference {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl Reference {
    pub fn new(before: u32, key: Vec<u8>, after: u32) -> Self {
        Self { before, key, after }
    }

    pub fn dump(&self, key_size: u32) -> TreeResult<Vec<u8>> {
        if self.key.len() as u32 > key_size {
            return Err(TreeError::ValueTooLarge {
                which: "key",
                len: self.key.len(),
                max: key_size as usize,
            });
        }
        let mut buf = Vec::with_capacity(reference_len(key_size) as usize);
        buf.extend_from_slice(&self.before.to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.resize(buf.len() + (key_size - self.key.len() as u32) as usize, 0);
        buf.extend_from_slice(&self.after.to_le_bytes());
        Ok(buf)
    }

    pub fn load(bytes: &[u8], key_size: u32) -> TreeResult<Self> {
        let need = reference_len(key_size) as usize;
        if bytes.len() < need {
            return Err(TreeError::ReachedEndOfFile {
                operation: "Reference::load".to_string(),
            });
        }
        let before = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let used_key_len = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        let key = bytes[6..6 + used_key_len].to_vec();
        let after_off = 6 + key_size as usize;
        let after = u32::from_le_bytes(bytes[after_off..after_off + 4].try_into().unwrap());
        Ok(Self { before, key, after })
    }
}

#[cfg(test)]
#[path = "entry_test.rs"]
mod entry_test;
