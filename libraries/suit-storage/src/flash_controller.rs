// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The Flash Controller interface with hardware

use crate::error_codes::ErrorCode;
use alloc::vec;

/// Implementation required for the flash controller hardware. This
/// should read, write and erase the NVM device shared by all execution
/// domains.
///
/// All `address`es are byte offsets from the start of the device. If the
/// storage partitions do not start at the beginning of the device the
/// layout must carry the absolute offsets.
///
/// The device is NOR flash: erasing sets every byte of a block to `0xFF`
/// and programming can only clear bits. Callers in this crate always erase
/// a range before programming it again.
///
/// The boiler plate for an implementation will look something like this
///
/// ```rust,ignore
/// use suit_storage::error_codes::ErrorCode;
/// use suit_storage::flash_controller::FlashController;
///
/// struct FlashCtrl {}
///
/// impl FlashController for FlashCtrl {
///     fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), ErrorCode> {
///         unimplemented!()
///     }
///
///     fn erase(&self, address: usize, len: usize) -> Result<(), ErrorCode> {
///         unimplemented!()
///     }
///
///     fn write(&self, address: usize, buf: &[u8]) -> Result<(), ErrorCode> {
///         unimplemented!()
///     }
///
///     fn erase_block_size(&self) -> usize {
///         16
///     }
/// }
/// ```
pub trait FlashController {
    /// This function must read `buf.len()` bytes starting at `address`
    /// into `buf`.
    ///
    /// On success it should return nothing, on failure it should return
    /// `ErrorCode::Io`.
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), ErrorCode>;

    /// This function must erase `len` bytes starting at `address`. Both are
    /// multiples of `erase_block_size()`.
    ///
    /// On success it should return nothing. If the device is not available
    /// it should return `ErrorCode::HwNotReady`, on any other failure
    /// `ErrorCode::Io`.
    fn erase(&self, address: usize, len: usize) -> Result<(), ErrorCode>;

    /// This function must program `buf` at `address`. The range has been
    /// erased beforehand.
    ///
    /// On success it should return nothing, on failure it should return
    /// `ErrorCode::Io`.
    fn write(&self, address: usize, buf: &[u8]) -> Result<(), ErrorCode>;

    /// The smallest number of bytes that can be erased in a single operation.
    fn erase_block_size(&self) -> usize;

    /// Whether the device can accept erase and program operations.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Round `len` up to a whole number of erase blocks.
///
/// `erase_block_size` must be a power of two.
pub const fn align_up(len: usize, erase_block_size: usize) -> usize {
    (len + erase_block_size - 1) & !(erase_block_size - 1)
}

/// Whether `value` is a multiple of `erase_block_size`.
pub const fn is_aligned(value: usize, erase_block_size: usize) -> bool {
    value & (erase_block_size - 1) == 0
}

/// Erase the erase blocks covering `[address, address + bytes.len())` and
/// program `bytes` at `address`.
///
/// `address` must be aligned to an erase block. Bytes past the end of
/// `bytes` inside the last erase block are left erased.
pub fn program<C: FlashController>(
    flash: &C,
    address: usize,
    bytes: &[u8],
) -> Result<(), ErrorCode> {
    let block = flash.erase_block_size();

    if bytes.is_empty() || !is_aligned(address, block) {
        return Err(ErrorCode::InvalidArgument);
    }
    if !flash.is_ready() {
        return Err(ErrorCode::HwNotReady);
    }

    flash.erase(address, align_up(bytes.len(), block))?;
    flash.write(address, bytes)
}

/// Override the destination area with the source area contents.
///
/// The source is read into RAM first, so the two ranges may live in
/// different partitions. `len` does not need to be a whole number of erase
/// blocks, but `dst` must start on one.
///
/// Returns `ErrorCode::HwNotReady` if the flash controller device is not
/// available and `ErrorCode::Io` if the destination could not be modified.
pub fn copy<C: FlashController>(
    flash: &C,
    dst: usize,
    src: usize,
    len: usize,
) -> Result<(), ErrorCode> {
    if len == 0 {
        return Err(ErrorCode::InvalidArgument);
    }
    if !flash.is_ready() {
        return Err(ErrorCode::HwNotReady);
    }

    let mut buf = vec![0; len];
    flash.read(src, &mut buf)?;

    program(flash, dst, &buf)
}
