// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Overflow page chains for values too large to fit inline in a `Record`
//! (spec.md §4.8).
//!
//! Layout per page: `[next_overflow_page:4][payload_length:3][payload]`,
//! zero-padded to `page_size`. A value is chunked into
//! `page_size - 4 - 3`-byte pieces and written as a singly linked list;
//! `next_overflow_page == 0` terminates the chain.

use crate::error::{TreeError, TreeResult};

const OVERFLOW_HEADER_LEN: usize = 7;

pub fn chunk_capacity(page_size: u32) -> usize {
    page_size as usize - OVERFLOW_HEADER_LEN
}

/// Encode one overflow page's worth of payload.
pub fn dump_overflow_page(next_overflow_page: u32, payload: &[u8], page_size: usize) -> TreeResult<Vec<u8>> {
    if payload.len() > chunk_capacity(page_size as u32) {
        return Err(TreeError::CorruptPage {
            page: 0,
            reason: "overflow payload chunk exceeds page capacity".to_string(),
        });
    }
    let mut buf = vec![0u8; page_size];
    buf[0..4].copy_from_slice(&next_overflow_page.to_le_bytes());
    let len_bytes = (payload.len() as u32).to_le_bytes();
    buf[4..7].copy_from_slice(&len_bytes[0..3]);
    buf[OVERFLOW_HEADER_LEN..OVERFLOW_HEADER_LEN + payload.len()].copy_from_slice(payload);
    Ok(buf)
}

/// Decode one overflow page. Returns `(next_overflow_page, payload)`.
pub fn load_overflow_page(bytes: &[u8], page: u32) -> TreeResult<(u32, Vec<u8>)> {
    if bytes.len() < OVERFLOW_HEADER_LEN {
        return Err(TreeError::CorruptPage {
            page,
            reason: "overflow page shorter than header".to_string(),
        });
    }
    let next = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let payload_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], 0]) as usize;
    if OVERFLOW_HEADER_LEN + payload_len > bytes.len() {
        return Err(TreeError::CorruptPage {
            page,
            reason: "overflow payload_length exceeds page bounds".to_string(),
        });
    }
    let payload = bytes[OVERFLOW_HEADER_LEN..OVERFLOW_HEADER_LEN + payload_len].to_vec();
    Ok((next, payload))
}

/// Split a value into the chunks that will occupy a chain of overflow pages.
pub fn chunk_value(value: &[u8], page_size: u32) -> Vec<&[u8]> {
    value.chunks(chunk_capacity(page_size)).collect()
}

#[cfg(test)]
#[path = "overflow_test.rs"]
mod overflow_test;
