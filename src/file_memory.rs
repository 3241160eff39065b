// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Page I/O, the node cache, the free list, the metadata page, and the WAL
//! lifetime all live here (spec.md §4.9). `Tree` never touches the file or
//! the WAL directly; it only calls through `FileMemory`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

use crate::config::{TreeConf, METADATA_PAGE};
use crate::error::{TreeError, TreeResult};
use crate::node::Node;
use crate::wal::{fsync_parent_dir, Wal};

/// Page that terminates the free list (spec.md §9: "an empty head is
/// represented by page 0").
const FREE_LIST_END: u32 = 0;

pub struct FileMemory {
    path: PathBuf,
    file: File,
    conf: TreeConf,
    cache: Option<LruCache<u32, Node>>,
    wal: Option<Wal>,
    last_page: u32,
    freelist_head: u32,
    root_page: u32,
    /// Set whenever `freelist_head` changes and cleared once that value has
    /// been written to the on-disk metadata page; `commit`/`close` check
    /// this so a free-list change is never left stale across a reopen
    /// (spec.md §3, §9: "metadata must be rewritten on head change").
    metadata_dirty: bool,
}

impl FileMemory {
    /// Open (or create) the data file at `path`, bringing the WAL to a
    /// consistent state. Returns `(FileMemory, root_page)`.
    pub fn open(path: &Path, requested: TreeConf) -> TreeResult<(Self, u32)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                return Err(TreeError::NoSuchDirectory {
                    path: parent.display().to_string(),
                });
            }
        }

        let is_fresh = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let (conf, root_page, freelist_head, last_page) = if is_fresh {
            requested.validate()?;
            let root_page = 1u32;
            let metadata = requested.to_metadata_bytes(root_page, FREE_LIST_END, requested.page_size as usize);
            file.write_all(&metadata)?;
            let root = Node::empty_lonely_root(root_page);
            file.write_all(&root.dump(&requested)?)?;
            file.sync_all()?;
            fsync_parent_dir(path)?;
            (requested, root_page, FREE_LIST_END, root_page)
        } else {
            let mut header = vec![0u8; requested.page_size as usize];
            file.seek(SeekFrom::Start(0))?;
            // First read with the caller's page_size guess to find the real
            // one; metadata's own page_size field is authoritative.
            let read = file.read(&mut header)?;
            header.truncate(read);
            if header.len() < crate::config::METADATA_HEADER_LEN {
                return Err(TreeError::CorruptPage {
                    page: METADATA_PAGE,
                    reason: "metadata page shorter than header".to_string(),
                });
            }
            let (mut conf, root_page, freelist_head) =
                TreeConf::from_metadata_bytes(&header, requested.cache_size)?;
            if conf.page_size != requested.page_size && conf.page_size as usize > header.len() {
                // The caller's guessed page_size was too small; re-read the
                // full metadata page now that the real size is known.
                let mut full = vec![0u8; conf.page_size as usize];
                file.seek(SeekFrom::Start(0))?;
                file.read_exact(&mut full)?;
                let (reparsed, rp, fh) = TreeConf::from_metadata_bytes(&full, requested.cache_size)?;
                conf = reparsed;
                let last_page = (file.metadata()?.len() / conf.page_size as u64) as u32 - 1;
                return Self::finish_open(path, file, conf, rp, fh, last_page);
            }
            let last_page = (file.metadata()?.len() / conf.page_size as u64).saturating_sub(1) as u32;
            (conf, root_page, freelist_head, last_page)
        };

        Self::finish_open(path, file, conf, root_page, freelist_head, last_page)
    }

    fn finish_open(
        path: &Path,
        file: File,
        conf: TreeConf,
        root_page: u32,
        freelist_head: u32,
        last_page: u32,
    ) -> TreeResult<(Self, u32)> {
        let wal_path = wal_path_for(path);
        let wal = Wal::open(&wal_path, conf.page_size)?;
        let needs_recovery = wal.needs_recovery;

        let cache = NonZeroUsize::new(conf.cache_size as usize).map(LruCache::new);

        let mut fm = FileMemory {
            path: path.to_path_buf(),
            file,
            conf,
            cache,
            wal: Some(wal),
            last_page,
            freelist_head,
            root_page,
            metadata_dirty: false,
        };

        if needs_recovery {
            fm.perform_checkpoint(true)?;
        }

        Ok((fm, root_page))
    }

    pub fn conf(&self) -> &TreeConf {
        &self.conf
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    fn wal(&self) -> &Wal {
        self.wal.as_ref().expect("wal is only absent mid-checkpoint")
    }

    fn wal_mut(&mut self) -> &mut Wal {
        self.wal.as_mut().expect("wal is only absent mid-checkpoint")
    }

    /// Read a node, preferring the cache, then the WAL, then the file.
    /// Used on the write path, where `&mut self` is exclusive so populating
    /// the cache on a miss is safe.
    pub fn get_node(&mut self, page: u32) -> TreeResult<Node> {
        if let Some(cache) = &mut self.cache {
            if let Some(node) = cache.get(&page) {
                return Ok(node.clone());
            }
        }
        let bytes = match self.wal().get_page(page)? {
            Some(bytes) => bytes,
            None => self.read_page_direct(page)?,
        };
        let node = Node::from_page_data(&self.conf, &bytes, page)?;
        if let Some(cache) = &mut self.cache {
            cache.put(page, node.clone());
        }
        Ok(node)
    }

    /// Read-only counterpart of `get_node` for the read-transaction path.
    /// Per spec.md §9's resolution to the concurrent-cache-access open
    /// question, cache *mutation* is restricted to the writer path: this
    /// only peeks the cache (no recency update, no insertion on miss) so
    /// concurrent readers never race on cache mutation.
    pub fn get_node_shared(&self, page: u32) -> TreeResult<Node> {
        if let Some(cache) = &self.cache {
            if let Some(node) = cache.peek(&page) {
                return Ok(node.clone());
            }
        }
        let bytes = match self.wal().get_page(page)? {
            Some(bytes) => bytes,
            None => self.read_page_direct(page)?,
        };
        Node::from_page_data(&self.conf, &bytes, page)
    }

    /// Write a node through the WAL and refresh the cache. Must only be
    /// called while the caller holds the write lock (spec.md §5, §9).
    pub fn set_node(&mut self, node: &Node) -> TreeResult<()> {
        let bytes = node.dump(&self.conf)?;
        self.wal_mut().set_page(node.page(), &bytes)?;
        if let Some(cache) = &mut self.cache {
            cache.put(node.page(), node.clone());
        }
        Ok(())
    }

    /// Drop every cached node. Called on write-transaction rollback because
    /// the in-memory Node objects may have drifted past what the WAL can
    /// undo (spec.md §5).
    pub fn invalidate_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    pub fn commit(&mut self) -> TreeResult<()> {
        self.wal_mut().commit()?;
        if self.metadata_dirty {
            self.write_metadata_page()?;
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> TreeResult<()> {
        self.wal_mut().rollback()?;
        self.invalidate_cache();
        Ok(())
    }

    /// Allocate a page number: prefer the free list, else grow the file.
    pub fn next_available_page(&mut self) -> TreeResult<u32> {
        if self.freelist_head != FREE_LIST_END {
            let page = self.freelist_head;
            let bytes = match self.wal().get_page(page)? {
                Some(bytes) => bytes,
                None => self.read_page_direct(page)?,
            };
            let next = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
            self.freelist_head = next;
            self.metadata_dirty = true;
            return Ok(page);
        }
        self.last_page += 1;
        Ok(self.last_page)
    }

    /// Read a page's raw bytes (overflow pages, free-list nodes) without
    /// attempting to decode it as a `Node`. Usable from either transaction
    /// kind since it only needs `&self`.
    pub fn get_raw_page(&self, page: u32) -> TreeResult<Vec<u8>> {
        match self.wal().get_page(page)? {
            Some(bytes) => Ok(bytes),
            None => self.read_page_direct(page),
        }
    }

    /// Write a page's raw bytes (overflow pages) through the WAL, bypassing
    /// the node cache.
    pub fn set_raw_page(&mut self, page: u32, bytes: &[u8]) -> TreeResult<()> {
        self.wal_mut().set_page(page, bytes)
    }

    /// Retire a page to the head of the free list.
    pub fn free_page(&mut self, page: u32) -> TreeResult<()> {
        let mut bytes = vec![0u8; self.conf.page_size as usize];
        bytes[0..4].copy_from_slice(&self.freelist_head.to_le_bytes());
        self.wal_mut().set_page(page, &bytes)?;
        self.freelist_head = page;
        self.metadata_dirty = true;
        Ok(())
    }

    /// Read a page directly from the data file, bypassing the cache and the
    /// WAL. Opens its own file handle so it only needs `&self`, which is
    /// what lets concurrent readers share a `FileMemory` behind a `RwLock`.
    fn read_page_direct(&self, page: u32) -> TreeResult<Vec<u8>> {
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(page as u64 * self.conf.page_size as u64))?;
        let mut buf = vec![0u8; self.conf.page_size as usize];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read page 0 directly, bypassing the WAL.
    pub fn get_metadata(&self) -> TreeResult<(TreeConf, u32, u32)> {
        let bytes = self.read_page_direct(METADATA_PAGE)?;
        TreeConf::from_metadata_bytes(&bytes, self.conf.cache_size)
    }

    /// Write page 0 directly, bypassing the WAL, always fsyncing, recording
    /// `root_page` as the tree's new root.
    pub fn set_metadata(&mut self, root_page: u32) -> TreeResult<()> {
        self.root_page = root_page;
        self.write_metadata_page()
    }

    /// Write the metadata page with the current `root_page`/`freelist_head`,
    /// bypassing the WAL, always fsyncing.
    fn write_metadata_page(&mut self) -> TreeResult<()> {
        let bytes =
            self.conf
                .to_metadata_bytes(self.root_page, self.freelist_head, self.conf.page_size as usize);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        fsync_parent_dir(&self.path)?;
        self.metadata_dirty = false;
        Ok(())
    }

    /// Drain committed WAL frames into the main file, fsync, and optionally
    /// reopen a fresh WAL (spec.md §4.9).
    pub fn perform_checkpoint(&mut self, reopen_wal: bool) -> TreeResult<()> {
        let pages = self.wal().checkpoint_pages()?;
        for (page, bytes) in &pages {
            self.file
                .seek(SeekFrom::Start(*page as u64 * self.conf.page_size as u64))?;
            self.file.write_all(bytes)?;
        }
        self.file.sync_all()?;
        fsync_parent_dir(&self.path)?;

        // Take the WAL out and unlink its file before anything reopens the
        // same path, so a fresh Wal::open never replays frames we already
        // folded into the main file.
        let old_wal = self.wal.take().expect("wal is only absent mid-checkpoint");
        old_wal.remove()?;

        if reopen_wal {
            let wal_path = wal_path_for(&self.path);
            self.wal = Some(Wal::open(&wal_path, self.conf.page_size)?);
        }
        Ok(())
    }

    /// Checkpoint and release file descriptors.
    pub fn close(mut self) -> TreeResult<()> {
        if self.metadata_dirty {
            self.write_metadata_page()?;
        }
        self.perform_checkpoint(false)
    }
}

fn wal_path_for(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_os_string();
    os.push("-wal");
    PathBuf::from(os)
}

#[cfg(test)]
#[path = "file_memory_test.rs"]
mod file_memory_test;
