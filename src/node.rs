// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! B+-Tree node variants and their byte layout.
//!
//! Four node shapes share one page format (spec.md §3): `LonelyRoot` (the
//! root when the tree has a single node), `Root` (internal root), `Internal`
//! (non-root internal), and `Leaf`. `LonelyRoot`/`Leaf` hold `Record`
//! entries directly; `Root`/`Internal` hold `Reference` entries that fence
//! child pages. Splitting a `LonelyRoot` relabels it to `Leaf` in place
//! (same page number); splitting the `Root` relabels it to `Internal` in
//! place. Both are a tag rewrite, not a data migration (spec.md §9).

use crate::config::TreeConf;
use crate::entry::{reference_len, Record, Reference};
use crate::error::{TreeError, TreeResult};

/// `type(1) + used_length(3) + next_page(4)` bytes before the entry list.
pub const NODE_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeTag {
    LonelyRoot = 1,
    Root = 2,
    Internal = 3,
    Leaf = 4,
}

/// A single in-memory B+-Tree node, decoded from (or destined for) one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Root when the tree has exactly one node; holds `Record`s directly.
    LonelyRoot { page: u32, records: Vec<Record> },
    /// Internal root; holds `Reference`s.
    Root { page: u32, refs: Vec<Reference> },
    /// Non-root internal node; holds `Reference`s.
    Internal { page: u32, refs: Vec<Reference> },
    /// Leaf node; holds `Record`s and the next-leaf pointer (0 = none).
    Leaf {
        page: u32,
        records: Vec<Record>,
        next_page: u32,
    },
}

impl Node {
    pub fn empty_lonely_root(page: u32) -> Self {
        Node::LonelyRoot {
            page,
            records: Vec::new(),
        }
    }

    pub fn empty_leaf(page: u32) -> Self {
        Node::Leaf {
            page,
            records: Vec::new(),
            next_page: 0,
        }
    }

    pub fn empty_root(page: u32) -> Self {
        Node::Root {
            page,
            refs: Vec::new(),
        }
    }

    pub fn empty_internal(page: u32) -> Self {
        Node::Internal {
            page,
            refs: Vec::new(),
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Node::LonelyRoot { page, .. }
            | Node::Root { page, .. }
            | Node::Internal { page, .. }
            | Node::Leaf { page, .. } => *page,
        }
    }

    pub fn tag(&self) -> NodeTag {
        match self {
            Node::LonelyRoot { .. } => NodeTag::LonelyRoot,
            Node::Root { .. } => NodeTag::Root,
            Node::Internal { .. } => NodeTag::Internal,
            Node::Leaf { .. } => NodeTag::Leaf,
        }
    }

    pub fn is_record_node(&self) -> bool {
        matches!(self, Node::LonelyRoot { .. } | Node::Leaf { .. })
    }

    pub fn is_reference_node(&self) -> bool {
        !self.is_record_node()
    }

    /// Number of child pages the node logically has: entry count for
    /// record-bearing nodes, entry count + 1 for reference-bearing nodes.
    pub fn num_children(&self) -> usize {
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => records.len(),
            Node::Root { refs, .. } | Node::Internal { refs, .. } => refs.len() + 1,
        }
    }

    fn min_children(&self, order: u32) -> usize {
        match self {
            Node::LonelyRoot { .. } => 0,
            Node::Root { .. } => 2,
            Node::Internal { .. } => order.div_ceil(2) as usize,
            Node::Leaf { .. } => (order.div_ceil(2) as usize).saturating_sub(1),
        }
    }

    fn max_children(&self, order: u32) -> usize {
        match self {
            Node::LonelyRoot { .. } => (order - 1) as usize,
            Node::Root { .. } | Node::Internal { .. } => order as usize,
            Node::Leaf { .. } => (order - 1) as usize,
        }
    }

    pub fn can_add_entry(&self, order: u32) -> bool {
        self.num_children() < self.max_children(order)
    }

    pub fn can_delete_entry(&self, order: u32) -> bool {
        self.num_children() > self.min_children(order)
    }

    pub fn is_underflow(&self, order: u32) -> bool {
        self.num_children() < self.min_children(order)
    }

    pub fn is_overflow(&self, order: u32) -> bool {
        self.num_children() > self.max_children(order)
    }

    pub fn min_entries(&self, order: u32) -> usize {
        self.min_children(order)
    }

    /// Check sibling ordering and min/max occupancy after a split or merge.
    /// A `LonelyRoot`/`Root` is exempt from the occupancy floor (the tree
    /// root never "underflows" in the usual sense). No-op in release
    /// builds.
    pub fn debug_check_invariants(&self, order: u32) {
        debug_assert!(
            self.records().windows(2).all(|w| w[0].key < w[1].key),
            "page {}: records out of order",
            self.page()
        );
        debug_assert!(
            self.refs().windows(2).all(|w| w[0].key < w[1].key),
            "page {}: references out of order",
            self.page()
        );
        if !matches!(self, Node::LonelyRoot { .. } | Node::Root { .. }) {
            debug_assert!(
                self.num_children() >= self.min_children(order),
                "page {}: underflow ({} children < {} minimum)",
                self.page(),
                self.num_children(),
                self.min_children(order)
            );
        }
        debug_assert!(
            self.num_children() <= self.max_children(order),
            "page {}: overflow ({} children > {} maximum)",
            self.page(),
            self.num_children(),
            self.max_children(order)
        );
    }

    /// Sorted insertion of a `Record`, for `LonelyRoot`/`Leaf` nodes.
    pub fn insert_record(&mut self, record: Record) -> TreeResult<()> {
        let records = match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => records,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "insert_record called on a reference node".to_string(),
                })
            }
        };
        match records.binary_search(&record) {
            Ok(idx) => records[idx] = record,
            Err(idx) => records.insert(idx, record),
        }
        Ok(())
    }

    /// Unchecked append, for sorted bulk load (spec.md §4.6).
    pub fn insert_record_at_end(&mut self, record: Record) -> TreeResult<()> {
        let records = match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => records,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "insert_record_at_end called on a reference node".to_string(),
                })
            }
        };
        records.push(record);
        Ok(())
    }

    pub fn get_record(&self, key: &[u8]) -> TreeResult<&Record> {
        let records = match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => records,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "get_record called on a reference node".to_string(),
                })
            }
        };
        match records.binary_search_by(|r| r.key.as_slice().cmp(key)) {
            Ok(idx) => Ok(&records[idx]),
            Err(_) => Err(TreeError::KeyNotFound {
                key: String::from_utf8_lossy(key).to_string(),
            }),
        }
    }

    pub fn remove_record(&mut self, key: &[u8]) -> TreeResult<Record> {
        let records = match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => records,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "remove_record called on a reference node".to_string(),
                })
            }
        };
        match records.binary_search_by(|r| r.key.as_slice().cmp(key)) {
            Ok(idx) => Ok(records.remove(idx)),
            Err(_) => Err(TreeError::KeyNotFound {
                key: String::from_utf8_lossy(key).to_string(),
            }),
        }
    }

    pub fn smallest_key(&self) -> Option<&[u8]> {
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => {
                records.first().map(|r| r.key.as_slice())
            }
            Node::Root { refs, .. } | Node::Internal { refs, .. } => {
                refs.first().map(|r| r.key.as_slice())
            }
        }
    }

    pub fn biggest_key(&self) -> Option<&[u8]> {
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => {
                records.last().map(|r| r.key.as_slice())
            }
            Node::Root { refs, .. } | Node::Internal { refs, .. } => {
                refs.last().map(|r| r.key.as_slice())
            }
        }
    }

    pub fn pop_smallest_record(&mut self) -> Option<Record> {
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => {
                if records.is_empty() {
                    None
                } else {
                    Some(records.remove(0))
                }
            }
            _ => None,
        }
    }

    /// Insert a `Reference`, then repair the fence invariant with its
    /// neighbours: the preceding entry's `after` and the following entry's
    /// `before` are rewritten to match the new entry's `before`/`after`
    /// (spec.md §4.3).
    pub fn insert_reference(&mut self, reference: Reference) -> TreeResult<()> {
        let refs = match self {
            Node::Root { refs, .. } | Node::Internal { refs, .. } => refs,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "insert_reference called on a record node".to_string(),
                })
            }
        };
        let idx = match refs.binary_search(&reference) {
            Ok(idx) | Err(idx) => idx,
        };
        if idx > 0 {
            refs[idx - 1].after = reference.before;
        }
        if idx < refs.len() {
            refs[idx].before = reference.after;
        }
        refs.insert(idx, reference);
        Ok(())
    }

    pub fn insert_reference_at_end(&mut self, reference: Reference) -> TreeResult<()> {
        let refs = match self {
            Node::Root { refs, .. } | Node::Internal { refs, .. } => refs,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "insert_reference_at_end called on a record node".to_string(),
                })
            }
        };
        refs.push(reference);
        Ok(())
    }

    /// Apply the fence rule of spec.md §3 to find which child page a search
    /// for `key` should descend into.
    pub fn find_next_node_page(&self, key: &[u8]) -> TreeResult<u32> {
        let refs = match self {
            Node::Root { refs, .. } | Node::Internal { refs, .. } => refs,
            _ => {
                return Err(TreeError::CorruptPage {
                    page: self.page(),
                    reason: "find_next_node_page called on a record node".to_string(),
                })
            }
        };
        if refs.is_empty() {
            return Err(TreeError::CorruptPage {
                page: self.page(),
                reason: "reference node has no entries".to_string(),
            });
        }
        if key < refs[0].key.as_slice() {
            return Ok(refs[0].before);
        }
        let last = refs.len() - 1;
        if key >= refs[last].key.as_slice() {
            return Ok(refs[last].after);
        }
        for i in 0..refs.len() - 1 {
            if refs[i].key.as_slice() <= key && key < refs[i + 1].key.as_slice() {
                return Ok(refs[i].after);
            }
        }
        unreachable!("fence invariant guarantees a match between the first and last entry");
    }

    /// Split off the upper half of entries into a freshly-tagged node at
    /// `new_page`, keeping the lower half in `self`. Returns the new node
    /// plus the key that should be promoted to the parent.
    pub fn split_entries(&mut self, new_page: u32) -> (Node, Vec<u8>) {
        match self {
            Node::LonelyRoot { records, .. } => {
                let mid = records.len() / 2;
                let upper = records.split_off(mid);
                let promoted = upper[0].key.clone();
                (
                    Node::Leaf {
                        page: new_page,
                        records: upper,
                        next_page: 0,
                    },
                    promoted,
                )
            }
            Node::Leaf {
                records, next_page, ..
            } => {
                let mid = records.len() / 2;
                let upper = records.split_off(mid);
                let promoted = upper[0].key.clone();
                let new_next = *next_page;
                (
                    Node::Leaf {
                        page: new_page,
                        records: upper,
                        next_page: new_next,
                    },
                    promoted,
                )
            }
            Node::Root { refs, .. } | Node::Internal { refs, .. } => {
                let mid = refs.len() / 2;
                let mut upper = refs.split_off(mid);
                // The separator at the split point is promoted to the
                // parent, not duplicated in either child (B+Tree style for
                // internal levels, per spec.md §4.5).
                let promoted_entry = upper.remove(0);
                let promoted = promoted_entry.key;
                // promoted_entry.after becomes the new node's leftmost
                // implicit child; upper[0].before already equals it by the
                // fence invariant, so no further wiring is needed here.
                let new_internal = Node::Internal {
                    page: new_page,
                    refs: upper,
                };
                (new_internal, promoted)
            }
        }
    }

    /// Relabel `LonelyRoot` to `Leaf` in place (same page number, same
    /// entries): used when the root splits for the first time.
    pub fn into_leaf(self) -> Node {
        match self {
            Node::LonelyRoot { page, records } => Node::Leaf {
                page,
                records,
                next_page: 0,
            },
            other => other,
        }
    }

    /// Relabel `Root` to `Internal` in place: used when the internal root
    /// splits and a fresh `Root` takes its place.
    pub fn into_internal(self) -> Node {
        match self {
            Node::Root { page, refs } => Node::Internal { page, refs },
            other => other,
        }
    }

    pub fn set_next_page(&mut self, next: u32) {
        if let Node::Leaf { next_page, .. } = self {
            *next_page = next;
        }
    }

    pub fn next_page(&self) -> u32 {
        match self {
            Node::Leaf { next_page, .. } => *next_page,
            _ => 0,
        }
    }

    pub fn records(&self) -> &[Record] {
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => records,
            _ => &[],
        }
    }

    pub fn refs(&self) -> &[Reference] {
        match self {
            Node::Root { refs, .. } | Node::Internal { refs, .. } => refs,
            _ => &[],
        }
    }

    /// Direct mutable access to the record vector, for deletion's
    /// borrow/merge logic. `None` for reference-bearing nodes.
    pub fn records_mut(&mut self) -> Option<&mut Vec<Record>> {
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => Some(records),
            _ => None,
        }
    }

    /// Direct mutable access to the reference vector, for deletion's
    /// borrow/merge logic. `None` for record-bearing nodes.
    pub fn refs_mut(&mut self) -> Option<&mut Vec<Reference>> {
        match self {
            Node::Root { refs, .. } | Node::Internal { refs, .. } => Some(refs),
            _ => None,
        }
    }

    /// Encode header + entries, zero-padded to `conf.page_size`.
    pub fn dump(&self, conf: &TreeConf) -> TreeResult<Vec<u8>> {
        let page_size = conf.page_size as usize;
        let mut body = Vec::with_capacity(page_size);
        match self {
            Node::LonelyRoot { records, .. } | Node::Leaf { records, .. } => {
                for r in records {
                    body.extend_from_slice(&r.dump(conf.key_size, conf.value_size)?);
                }
            }
            Node::Root { refs, .. } | Node::Internal { refs, .. } => {
                for r in refs {
                    body.extend_from_slice(&r.dump(conf.key_size)?);
                }
            }
        }
        let used_length = NODE_HEADER_LEN + body.len();
        if used_length > page_size {
            return Err(TreeError::CorruptPage {
                page: self.page(),
                reason: format!("used_length {used_length} exceeds page_size {page_size}"),
            });
        }
        let mut buf = vec![0u8; page_size];
        buf[0] = self.tag() as u8;
        let len_bytes = (used_length as u32).to_le_bytes();
        buf[1..4].copy_from_slice(&len_bytes[0..3]);
        buf[4..8].copy_from_slice(&self.next_page().to_le_bytes());
        buf[NODE_HEADER_LEN..used_length].copy_from_slice(&body);
        Ok(buf)
    }

    /// Decode a node from one page's raw bytes. `bytes.len()` must equal
    /// `conf.page_size`.
    pub fn from_page_data(conf: &TreeConf, bytes: &[u8], page: u32) -> TreeResult<Self> {
        if bytes.len() != conf.page_size as usize {
            return Err(TreeError::CorruptPage {
                page,
                reason: format!(
                    "page buffer length {} does not match configured page_size {}",
                    bytes.len(),
                    conf.page_size
                ),
            });
        }
        let tag = bytes[0];
        let used_length = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]) as usize;
        let next_page = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if used_length > bytes.len() || used_length < NODE_HEADER_LEN {
            return Err(TreeError::CorruptPage {
                page,
                reason: format!("used_length {used_length} out of bounds"),
            });
        }
        let body = &bytes[NODE_HEADER_LEN..used_length];

        let record_entry_len = crate::entry::record_len(conf.key_size, conf.value_size) as usize;
        let reference_entry_len = reference_len(conf.key_size) as usize;

        match tag {
            1 => {
                let records = decode_records(body, record_entry_len, conf.key_size, conf.value_size, page)?;
                Ok(Node::LonelyRoot { page, records })
            }
            4 => {
                let records = decode_records(body, record_entry_len, conf.key_size, conf.value_size, page)?;
                Ok(Node::Leaf {
                    page,
                    records,
                    next_page,
                })
            }
            2 => {
                let refs = decode_refs(body, reference_entry_len, conf.key_size, page)?;
                Ok(Node::Root { page, refs })
            }
            3 => {
                let refs = decode_refs(body, reference_entry_len, conf.key_size, page)?;
                Ok(Node::Internal { page, refs })
            }
            other => Err(TreeError::CorruptPage {
                page,
                reason: format!("unknown node type tag {other}"),
            }),
        }
    }
}

fn decode_records(
    body: &[u8],
    entry_len: usize,
    key_size: u32,
    value_size: u32,
    page: u32,
) -> TreeResult<Vec<Record>> {
    if entry_len == 0 || body.len() % entry_len != 0 {
        return Err(TreeError::CorruptPage {
            page,
            reason: "record body length is not a multiple of the entry size".to_string(),
        });
    }
    body.chunks_exact(entry_len)
        .map(|chunk| Record::load(chunk, key_size, value_size))
        .collect()
}

fn decode_refs(body: &[u8], entry_len: usize, key_size: u32, page: u32) -> TreeResult<Vec<Reference>> {
    if entry_len == 0 || body.len() % entry_len != 0 {
        return Err(TreeError::CorruptPage {
            page,
            reason: "reference body length is not a multiple of the entry size".to_string(),
        });
    }
    body.chunks_exact(entry_len)
        .map(|chunk| Reference::load(chunk, key_size))
        .collect()
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
