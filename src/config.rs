// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tree configuration, persisted verbatim on page 0.
//!
//! `TreeConf` is immutable for the lifetime of an open tree. On reopen the
//! stored configuration on page 0 always wins over whatever the caller
//! passes to `Tree::open` (spec.md §9: "the durable-contract choice is to
//! trust the stored configuration").

use crate::error::{TreeError, TreeResult};

/// Metadata page is always page 0.
pub const METADATA_PAGE: u32 = 0;

/// Byte layout of the metadata page (spec.md §6): six little-endian u32
/// fields followed by zero padding to `page_size`.
pub const METADATA_HEADER_LEN: usize = 24;

/// Immutable per-open tree configuration.
///
/// `cache_size` is a local runtime knob, not part of the durable format: it
/// is never written to the metadata page and two processes opening the same
/// file may choose different cache sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConf {
    /// Size in bytes of every page in the data file, including page 0.
    pub page_size: u32,
    /// Branching factor: max children of an internal node.
    pub order: u32,
    /// Maximum encoded length of a key, in bytes.
    pub key_size: u32,
    /// Maximum inline length of a value, in bytes, before overflow is used.
    pub value_size: u32,
    /// Pages held in the node cache; 0 disables caching.
    pub cache_size: u32,
}

impl TreeConf {
    /// Validate a configuration before it is used to create a fresh file.
    ///
    /// Order must be at least 3 (a `Root` node needs room for 2 children
    /// minimum, per spec.md §3); page size must be large enough to hold a
    /// page header plus at least two entries of the given key/value size.
    pub fn validate(&self) -> TreeResult<()> {
        if self.order < 3 {
            return Err(TreeError::InvalidConfig {
                reason: format!("order must be >= 3, got {}", self.order),
            });
        }
        if self.page_size < 64 {
            return Err(TreeError::InvalidConfig {
                reason: format!("page_size must be >= 64, got {}", self.page_size),
            });
        }
        let record_len = crate::entry::record_len(self.key_size, self.value_size);
        let reference_len = crate::entry::reference_len(self.key_size);
        let header_len = crate::node::NODE_HEADER_LEN as u32;
        if header_len + record_len.max(reference_len) > self.page_size {
            return Err(TreeError::InvalidConfig {
                reason: format!(
                    "page_size {} too small to hold a single entry (key_size={}, value_size={})",
                    self.page_size, self.key_size, self.value_size
                ),
            });
        }
        Ok(())
    }

    /// Serialize to the fixed metadata page layout (spec.md §6).
    pub fn to_metadata_bytes(&self, root_page: u32, freelist_head: u32, page_size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; page_size];
        buf[0..4].copy_from_slice(&root_page.to_le_bytes());
        buf[4..8].copy_from_slice(&self.page_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.order.to_le_bytes());
        buf[12..16].copy_from_slice(&self.key_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.value_size.to_le_bytes());
        buf[20..24].copy_from_slice(&freelist_head.to_le_bytes());
        buf
    }

    /// Parse the metadata page. Returns `(conf, root_page, freelist_head)`.
    /// `cache_size` is not a durable field; the caller's requested value is
    /// filled in directly since it has no bearing on what is stored.
    pub fn from_metadata_bytes(bytes: &[u8], cache_size: u32) -> TreeResult<(Self, u32, u32)> {
        if bytes.len() < METADATA_HEADER_LEN {
            return Err(TreeError::CorruptPage {
                page: METADATA_PAGE,
                reason: "metadata page shorter than header".to_string(),
            });
        }
        let root_page = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let page_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let order = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let key_size = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let value_size = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let freelist_head = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
        let conf = TreeConf {
            page_size,
            order,
            key_size,
            value_size,
            cache_size,
        };
        Ok((conf, root_page, freelist_head))
    }
}
