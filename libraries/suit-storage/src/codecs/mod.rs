// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Byte-level encodings of the stored records.
//!
//! The codecs only know how a record is laid out. Which copy of a redundant
//! record they operate on, and whether it is valid, is decided by
//! [`redundant`](crate::redundant) before they are called.

pub mod envelope;
pub mod mpi;
pub mod nvv;
pub mod report;
pub mod update;

use alloc::vec;
use alloc::vec::Vec;

use crate::error_codes::ErrorCode;
use crate::flash_controller::FlashController;
use crate::layout::Region;

/// Read the whole of `region` into RAM.
pub(crate) fn read_region<C: FlashController>(
    flash: &C,
    region: Region,
) -> Result<Vec<u8>, ErrorCode> {
    let mut buf = vec![0; region.size];
    flash.read(region.offset, &mut buf)?;
    Ok(buf)
}

/// Read a little endian `u32` at `offset` of `buf`.
pub(crate) fn le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
