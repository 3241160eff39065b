// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Write-ahead log: append-only frame file providing atomic commit/rollback
//! and crash recovery (spec.md §4.10).
//!
//! File layout: a 4-byte `page_size` header followed by variable-length
//! frames. A frame is `[frame_type:1][page:4]`; PAGE frames carry exactly
//! `page_size` payload bytes after the header, COMMIT/ROLLBACK carry none
//! and their `page` field is zero.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{TreeError, TreeResult};

const WAL_HEADER_LEN: u64 = 4;
const FRAME_HEADER_LEN: u64 = 5;

const FRAME_PAGE: u8 = 1;
const FRAME_COMMIT: u8 = 2;
const FRAME_ROLLBACK: u8 = 3;

/// Append-only WAL file plus the in-memory index of its committed and
/// in-flight frames.
pub struct Wal {
    path: PathBuf,
    file: File,
    page_size: u32,
    /// page -> file offset of its payload (uncommitted frames).
    not_committed_pages: HashMap<u32, u64>,
    /// page -> file offset of its payload (committed frames).
    committed_pages: HashMap<u32, u64>,
    /// Insertion order of committed pages, for `checkpoint`'s iteration order.
    committed_order: Vec<u32>,
    /// Set when recovery found trailing uncommitted frames that were
    /// discarded; the caller should checkpoint immediately.
    pub needs_recovery: bool,
}

impl Wal {
    /// Open (creating if absent) the WAL file at `path`, replaying any
    /// existing frames to rebuild the committed/uncommitted index.
    pub fn open(path: &Path, page_size: u32) -> TreeResult<Self> {
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut wal = Wal {
            path: path.to_path_buf(),
            file: File::open(path)?,
            page_size,
            not_committed_pages: HashMap::new(),
            committed_pages: HashMap::new(),
            committed_order: Vec::new(),
            needs_recovery: false,
        };

        if !existed {
            let mut header = Vec::with_capacity(WAL_HEADER_LEN as usize);
            header.extend_from_slice(&page_size.to_le_bytes());
            file.write_all(&header)?;
            file.sync_all()?;
        } else {
            wal.replay()?;
        }
        wal.file = OpenOptions::new().read(true).append(true).open(path)?;
        Ok(wal)
    }

    fn replay(&mut self) -> TreeResult<()> {
        let mut reader = File::open(&self.path)?;
        let len = reader.metadata()?.len();
        if len < WAL_HEADER_LEN {
            return Err(TreeError::CorruptPage {
                page: 0,
                reason: "WAL file shorter than its header".to_string(),
            });
        }
        reader.seek(SeekFrom::Start(WAL_HEADER_LEN))?;
        let mut offset = WAL_HEADER_LEN;
        let mut pending: HashMap<u32, u64> = HashMap::new();
        let mut pending_order: Vec<u32> = Vec::new();

        while offset + FRAME_HEADER_LEN <= len {
            let mut header = [0u8; FRAME_HEADER_LEN as usize];
            reader.read_exact(&mut header)?;
            let frame_type = header[0];
            let page = u32::from_le_bytes(header[1..5].try_into().unwrap());
            let payload_offset = offset + FRAME_HEADER_LEN;

            match frame_type {
                FRAME_PAGE => {
                    if payload_offset + self.page_size as u64 > len {
                        // Truncated trailing frame: stop here, discard it.
                        self.needs_recovery = true;
                        break;
                    }
                    if !pending.contains_key(&page) {
                        pending_order.push(page);
                    }
                    pending.insert(page, payload_offset);
                    reader.seek(SeekFrom::Current(self.page_size as i64))?;
                    offset = payload_offset + self.page_size as u64;
                }
                FRAME_COMMIT => {
                    for page in pending_order.drain(..) {
                        if let Some(off) = pending.remove(&page) {
                            if !self.committed_pages.contains_key(&page) {
                                self.committed_order.push(page);
                            }
                            self.committed_pages.insert(page, off);
                        }
                    }
                    offset = payload_offset;
                }
                FRAME_ROLLBACK => {
                    pending.clear();
                    pending_order.clear();
                    offset = payload_offset;
                }
                other => {
                    return Err(TreeError::CorruptPage {
                        page,
                        reason: format!("unknown WAL frame type {other}"),
                    });
                }
            }
        }

        if !pending.is_empty() {
            self.needs_recovery = true;
        }
        Ok(())
    }

    /// Append a PAGE frame. Not fsynced.
    pub fn set_page(&mut self, page: u32, data: &[u8]) -> TreeResult<()> {
        if data.len() as u32 != self.page_size {
            return Err(TreeError::CorruptPage {
                page,
                reason: "page payload does not match configured page_size".to_string(),
            });
        }
        let offset = self.file.seek(SeekFrom::End(0))?;
        let mut header = [0u8; FRAME_HEADER_LEN as usize];
        header[0] = FRAME_PAGE;
        header[1..5].copy_from_slice(&page.to_le_bytes());
        self.file.write_all(&header)?;
        self.file.write_all(data)?;
        let payload_offset = offset + FRAME_HEADER_LEN;
        self.not_committed_pages.insert(page, payload_offset);
        Ok(())
    }

    /// Append a COMMIT frame and fold uncommitted pages into committed
    /// (last-write-wins), fsyncing the WAL file and its directory.
    pub fn commit(&mut self) -> TreeResult<()> {
        if self.not_committed_pages.is_empty() {
            return Ok(());
        }
        let mut header = [0u8; FRAME_HEADER_LEN as usize];
        header[0] = FRAME_COMMIT;
        self.file.write_all(&header)?;
        self.file.sync_all()?;
        fsync_parent_dir(&self.path)?;

        for (page, offset) in self.not_committed_pages.drain() {
            if !self.committed_pages.contains_key(&page) {
                self.committed_order.push(page);
            }
            self.committed_pages.insert(page, offset);
        }
        Ok(())
    }

    /// Append a ROLLBACK frame and drop uncommitted pages.
    pub fn rollback(&mut self) -> TreeResult<()> {
        if self.not_committed_pages.is_empty() {
            return Ok(());
        }
        let mut header = [0u8; FRAME_HEADER_LEN as usize];
        header[0] = FRAME_ROLLBACK;
        self.file.write_all(&header)?;
        self.file.sync_all()?;
        fsync_parent_dir(&self.path)?;
        self.not_committed_pages.clear();
        Ok(())
    }

    /// Look up a page's payload: uncommitted takes priority over committed.
    pub fn get_page(&self, page: u32) -> TreeResult<Option<Vec<u8>>> {
        let offset = self
            .not_committed_pages
            .get(&page)
            .or_else(|| self.committed_pages.get(&page));
        let Some(&offset) = offset else {
            return Ok(None);
        };
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.page_size as usize];
        file.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    /// Drain every committed page in insertion order, for the caller to
    /// fold into the main data file. Does not touch uncommitted pages;
    /// callers only invoke this when the WAL holds no open transaction.
    pub fn checkpoint_pages(&self) -> TreeResult<Vec<(u32, Vec<u8>)>> {
        let mut out = Vec::with_capacity(self.committed_order.len());
        for &page in &self.committed_order {
            if let Some(bytes) = self.get_page(page)? {
                out.push((page, bytes));
            }
        }
        Ok(out)
    }

    /// Close and unlink the WAL file, fsyncing its directory.
    pub fn remove(self) -> TreeResult<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(&path)?;
        fsync_parent_dir(&path)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.committed_pages.is_empty() && self.not_committed_pages.is_empty()
    }
}

#[cfg(unix)]
pub(crate) fn fsync_parent_dir(path: &Path) -> TreeResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let dir = File::open(parent)?;
        dir.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn fsync_parent_dir(_path: &Path) -> TreeResult<()> {
    // Directory fsync is not available on this platform (spec.md §6).
    Ok(())
}

#[cfg(test)]
#[path = "wal_test.rs"]
mod wal_test;
