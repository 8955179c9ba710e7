// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Update report slots: a little endian `u32` length followed by the
//! report bytes.

use alloc::vec::Vec;

use crate::codecs::{le_u32, read_region};
use crate::error_codes::ErrorCode;
use crate::flash_controller::{self, FlashController};
use crate::layout::Region;

const LEN_FIELD: usize = 4;

/// Largest report that fits in `slot`.
pub const fn capacity(slot: Region) -> usize {
    slot.size.saturating_sub(LEN_FIELD)
}

/// Read the report stored in `slot`.
pub fn load<C: FlashController>(flash: &C, slot: Region) -> Result<Vec<u8>, ErrorCode> {
    let buf = read_region(flash, slot)?;
    if buf.len() < LEN_FIELD {
        return Err(ErrorCode::InvalidArgument);
    }

    let len = le_u32(&buf, 0);
    if len == u32::MAX || len == 0 {
        return Err(ErrorCode::NotFound);
    }
    let len = len as usize;
    if len > capacity(slot) {
        return Err(ErrorCode::InvalidArgument);
    }

    Ok(buf[LEN_FIELD..LEN_FIELD + len].to_vec())
}

/// Replace the report stored in `slot`.
pub fn store<C: FlashController>(flash: &C, slot: Region, report: &[u8]) -> Result<(), ErrorCode> {
    if report.is_empty() || report.len() > capacity(slot) {
        return Err(ErrorCode::InvalidArgument);
    }

    let mut buf = Vec::with_capacity(LEN_FIELD + report.len());
    buf.extend_from_slice(&(report.len() as u32).to_le_bytes());
    buf.extend_from_slice(report);

    flash_controller::program(flash, slot.offset, &buf)
}

/// Erase the report stored in `slot`.
pub fn clear<C: FlashController>(flash: &C, slot: Region) -> Result<(), ErrorCode> {
    if !flash.is_ready() {
        return Err(ErrorCode::HwNotReady);
    }
    flash.erase(slot.offset, slot.size)
}
