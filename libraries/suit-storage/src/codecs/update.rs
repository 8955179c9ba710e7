// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Update candidate information.
//!
//! The record tells the update orchestrator where a pending update was
//! staged. It is transient and re-validated before installation, so it is
//! stored as a single plain copy:
//!
//! ```plain
//!  0        4        8                                   UPDATE_CANDIDATE_LEN
//! +--------+--------+-----------------+-----+-----------------+
//! | magic  | count  | address | size  | ... | address | size  |
//! +--------+--------+-----------------+-----+-----------------+
//! ```

use alloc::vec::Vec;

use crate::codecs::{le_u32, read_region};
use crate::error_codes::ErrorCode;
use crate::flash_controller::{self, FlashController};
use crate::layout::Region;

/// Length of the record.
pub const UPDATE_CANDIDATE_LEN: usize = 64;

/// Marks a written record.
pub const UPDATE_MAGIC: u32 = 0x5AA5_C0DE;

const HEADER_LEN: usize = 8;
const REGION_LEN: usize = 8;

/// Largest number of regions a record can describe.
pub const MAX_UPDATE_REGIONS: usize = (UPDATE_CANDIDATE_LEN - HEADER_LEN) / REGION_LEN;

/// A memory range holding part of the update candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Start address.
    pub address: u32,
    /// Length in bytes.
    pub size: u32,
}

/// Read the record stored in `slot`.
///
/// Returns `ErrorCode::NotFound` if no candidate is recorded and
/// `ErrorCode::InvalidArgument` if the record is malformed.
pub fn load<C: FlashController>(flash: &C, slot: Region) -> Result<Vec<MemoryRegion>, ErrorCode> {
    if slot.size < UPDATE_CANDIDATE_LEN {
        return Err(ErrorCode::InvalidArgument);
    }

    let buf = read_region(flash, Region::new(slot.offset, UPDATE_CANDIDATE_LEN))?;

    if le_u32(&buf, 0) != UPDATE_MAGIC {
        return Err(ErrorCode::NotFound);
    }

    let count = le_u32(&buf, 4) as usize;
    if count == 0 || count > MAX_UPDATE_REGIONS {
        log::warn!("Update candidate with {} regions", count);
        return Err(ErrorCode::InvalidArgument);
    }

    Ok((0..count)
        .map(|i| {
            let offset = HEADER_LEN + i * REGION_LEN;
            MemoryRegion {
                address: le_u32(&buf, offset),
                size: le_u32(&buf, offset + 4),
            }
        })
        .collect())
}

/// Replace the record stored in `slot`. An empty list clears it.
pub fn store<C: FlashController>(
    flash: &C,
    slot: Region,
    regions: &[MemoryRegion],
) -> Result<(), ErrorCode> {
    if slot.size < UPDATE_CANDIDATE_LEN || regions.len() > MAX_UPDATE_REGIONS {
        return Err(ErrorCode::InvalidArgument);
    }
    if regions.iter().any(|r| r.size == 0) {
        return Err(ErrorCode::InvalidArgument);
    }
    if !flash.is_ready() {
        return Err(ErrorCode::HwNotReady);
    }

    if regions.is_empty() {
        return flash.erase(slot.offset, slot.size);
    }

    let mut buf = [0xFF; UPDATE_CANDIDATE_LEN];
    buf[0..4].copy_from_slice(&UPDATE_MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&(regions.len() as u32).to_le_bytes());
    for (chunk, region) in buf[HEADER_LEN..]
        .chunks_exact_mut(REGION_LEN)
        .zip(regions.iter())
    {
        chunk[0..4].copy_from_slice(&region.address.to_le_bytes());
        chunk[4..8].copy_from_slice(&region.size.to_le_bytes());
    }

    flash_controller::program(flash, slot.offset, &buf)
}
