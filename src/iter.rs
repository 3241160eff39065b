// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Range-scan iteration over leaves (spec.md §4.7), grounded on the
//! teacher's `RangeScanIterator`: a lazy walk of the leaf linked list that
//! holds its transaction for as long as the caller keeps iterating.

use crate::entry::{Record, ValueLocation};
use crate::error::TreeResult;
use crate::node::Node;
use crate::overflow;
use crate::transaction::ReadTransaction;

/// Lazily yields `(key, value)` pairs in `[start, stop)` order, following
/// `next_page` across leaf boundaries. Holds the reader lock for its whole
/// lifetime (spec.md §5: a reader observes a stable snapshot for its scope).
pub struct RangeIter<'a> {
    tx: ReadTransaction<'a>,
    stop: Option<Vec<u8>>,
    leaf: Option<Node>,
    idx: usize,
}

impl<'a> RangeIter<'a> {
    pub(crate) fn new(tx: ReadTransaction<'a>, leaf: Node, start: Option<&[u8]>, stop: Option<Vec<u8>>) -> Self {
        let idx = match start {
            Some(start) => match leaf.records().binary_search_by(|r| r.key.as_slice().cmp(start)) {
                Ok(i) => i,
                Err(i) => i,
            },
            None => 0,
        };
        RangeIter {
            tx,
            stop,
            leaf: Some(leaf),
            idx,
        }
    }

    fn resolve_value(&self, record: &Record) -> TreeResult<Vec<u8>> {
        match &record.value {
            ValueLocation::Inline(v) => Ok(v.clone()),
            ValueLocation::Overflow(head) => read_overflow_chain(&self.tx, *head),
        }
    }
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = TreeResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;
            if self.idx >= leaf.records().len() {
                let next_page = leaf.next_page();
                if next_page == 0 {
                    self.leaf = None;
                    return None;
                }
                match self.tx.get_node(next_page) {
                    Ok(node) => {
                        self.leaf = Some(node);
                        self.idx = 0;
                        continue;
                    }
                    Err(e) => {
                        self.leaf = None;
                        return Some(Err(e));
                    }
                }
            }
            let record = leaf.records()[self.idx].clone();
            if let Some(stop) = &self.stop {
                if record.key.as_slice() >= stop.as_slice() {
                    self.leaf = None;
                    return None;
                }
            }
            self.idx += 1;
            return Some(self.resolve_value(&record).map(|v| (record.key, v)));
        }
    }
}

pub(crate) fn read_overflow_chain(tx: &ReadTransaction<'_>, head: u32) -> TreeResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut page = head;
    while page != 0 {
        let bytes = tx.get_raw_page(page)?;
        let (next, payload) = overflow::load_overflow_page(&bytes, page)?;
        out.extend_from_slice(&payload);
        page = next;
    }
    Ok(out)
}
