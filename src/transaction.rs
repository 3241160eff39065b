// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Scope-bounded read/write transactions over a shared `FileMemory`
//! (spec.md §5). Both guards are acquired in a constructor and released on
//! `Drop`, the same shape as the teacher's `TableLock`.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::TreeConf;
use crate::error::TreeResult;
use crate::file_memory::FileMemory;
use crate::node::Node;

fn read_lock(lock: &RwLock<FileMemory>) -> RwLockReadGuard<'_, FileMemory> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock(lock: &RwLock<FileMemory>) -> RwLockWriteGuard<'_, FileMemory> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A read-only view, holding the shared (reader) lock for its lifetime.
/// Never writes to the WAL; node lookups only peek the cache (spec.md §9).
pub struct ReadTransaction<'a> {
    guard: RwLockReadGuard<'a, FileMemory>,
}

impl<'a> ReadTransaction<'a> {
    pub fn begin(lock: &'a RwLock<FileMemory>) -> Self {
        ReadTransaction {
            guard: read_lock(lock),
        }
    }

    pub fn conf(&self) -> &TreeConf {
        self.guard.conf()
    }

    pub fn root_page(&self) -> u32 {
        self.guard.root_page()
    }

    pub fn get_node(&self, page: u32) -> TreeResult<Node> {
        self.guard.get_node_shared(page)
    }

    pub fn get_raw_page(&self, page: u32) -> TreeResult<Vec<u8>> {
        self.guard.get_raw_page(page)
    }
}

/// An exclusive write scope. Commits the WAL on `commit()`; any other exit
/// path (an early return via `?`, a panic, simply dropping the guard) rolls
/// back and invalidates the cache, per spec.md §5.
pub struct WriteTransaction<'a> {
    guard: RwLockWriteGuard<'a, FileMemory>,
    committed: bool,
}

impl<'a> WriteTransaction<'a> {
    pub fn begin(lock: &'a RwLock<FileMemory>) -> Self {
        WriteTransaction {
            guard: write_lock(lock),
            committed: false,
        }
    }

    pub fn conf(&self) -> &TreeConf {
        self.guard.conf()
    }

    pub fn root_page(&self) -> u32 {
        self.guard.root_page()
    }

    pub fn get_node(&mut self, page: u32) -> TreeResult<Node> {
        self.guard.get_node(page)
    }

    pub fn set_node(&mut self, node: &Node) -> TreeResult<()> {
        self.guard.set_node(node)
    }

    pub fn next_available_page(&mut self) -> TreeResult<u32> {
        self.guard.next_available_page()
    }

    pub fn free_page(&mut self, page: u32) -> TreeResult<()> {
        self.guard.free_page(page)
    }

    pub fn get_raw_page(&self, page: u32) -> TreeResult<Vec<u8>> {
        self.guard.get_raw_page(page)
    }

    pub fn set_raw_page(&mut self, page: u32, bytes: &[u8]) -> TreeResult<()> {
        self.guard.set_raw_page(page, bytes)
    }

    pub fn set_metadata(&mut self, root_page: u32) -> TreeResult<()> {
        self.guard.set_metadata(root_page)
    }

    pub fn get_metadata(&self) -> TreeResult<(TreeConf, u32, u32)> {
        self.guard.get_metadata()
    }

    /// Commit the transaction's WAL frames. Consumes `self` so a committed
    /// transaction cannot be mistakenly rolled back afterwards.
    pub fn commit(mut self) -> TreeResult<()> {
        self.committed = true;
        self.guard.commit()
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.guard.rollback();
        }
    }
}

#[cfg(test)]
#[path = "transaction_test.rs"]
mod transaction_test;
