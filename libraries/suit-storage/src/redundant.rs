// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Digest-protected records stored as a primary and a backup copy.
//!
//! NOR flash cannot update a range atomically, so every protected record is
//! kept twice. Each copy is `payload || digest` and is valid if the digest
//! matches the payload. At most one copy is modified at a time:
//!
//! 1. The payload of the primary is changed in place.
//! 2. [`AreaManager::commit()`] writes the new digest of the primary.
//! 3. [`AreaManager::validate_and_repair()`] copies the primary over the
//!    backup.
//!
//! If power is lost before step 2 completes the primary is invalid and the
//! next repair restores it from the backup, rolling the record back to the
//! last committed value. If it is lost during step 3 the backup is either
//! invalid or still holds the previous value, and the next repair finishes
//! the copy from the primary.
//!
//! Readers use [`AreaManager::validate_or_select()`], which never writes to
//! flash, and get the primary if it is valid or the backup otherwise.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::CONFIG;
use crate::digest::{self, Digest, DigestCheck, HashEngine, DIGEST_LEN};
use crate::error_codes::ErrorCode;
use crate::flash_controller::{self, is_aligned, FlashController};
use crate::layout::DigestArea;
use crate::success_codes::{AreaCopy, RepairOutcome};

/// One copy of a protected record, held in RAM as two owned buffers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordImage {
    /// The record payload.
    pub payload: Vec<u8>,
    /// The digest trailer as stored, whether or not it matches.
    pub digest: Digest,
}

impl RecordImage {
    /// Read the copy starting at `address`.
    pub fn load<C: FlashController>(
        flash: &C,
        address: usize,
        payload_size: usize,
    ) -> Result<Self, ErrorCode> {
        let mut bytes = vec![0; payload_size + DIGEST_LEN];
        flash.read(address, &mut bytes)?;
        Self::from_bytes(&bytes, payload_size)
    }

    /// Split the on-media bytes of a copy. Anything after the digest is
    /// padding and is ignored.
    pub fn from_bytes(bytes: &[u8], payload_size: usize) -> Result<Self, ErrorCode> {
        if bytes.len() < payload_size + DIGEST_LEN {
            return Err(ErrorCode::InvalidArgument);
        }

        let mut digest = [0; DIGEST_LEN];
        digest.copy_from_slice(&bytes[payload_size..payload_size + DIGEST_LEN]);

        Ok(Self {
            payload: bytes[..payload_size].to_vec(),
            digest,
        })
    }

    /// The on-media bytes of the copy, with the digest trailer padded to a
    /// whole erase block.
    pub fn to_bytes(&self, erase_block_size: usize) -> Vec<u8> {
        let trailer = flash_controller::align_up(DIGEST_LEN, erase_block_size);
        let mut bytes = Vec::with_capacity(self.payload.len() + trailer);

        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&self.digest);
        bytes.resize(self.payload.len() + trailer, 0xFF);

        bytes
    }
}

/// Validates, repairs and updates the redundant areas of one NVM device.
pub struct AreaManager<'a, C: FlashController, H: HashEngine> {
    flash: &'a C,
    engine: &'a H,
    erase_block_size: usize,
}

impl<'a, C: FlashController, H: HashEngine> AreaManager<'a, C, H> {
    /// Create a manager for areas laid out with `erase_block_size`.
    ///
    /// Every operation fails with `ErrorCode::InvalidArgument` unless
    /// `erase_block_size` is the erase block size of `flash`.
    pub fn new(flash: &'a C, engine: &'a H, erase_block_size: usize) -> Self {
        Self {
            flash,
            engine,
            erase_block_size,
        }
    }

    fn check_area(&self, area: &DigestArea) -> Result<(), ErrorCode> {
        let eb = self.erase_block_size;

        if self.flash.erase_block_size() != eb {
            log::error!(
                "Erase block {:#x} does not match the device ({:#x})",
                eb,
                self.flash.erase_block_size()
            );
            return Err(ErrorCode::InvalidArgument);
        }

        if area.payload_size == 0
            || !is_aligned(area.payload_size, eb)
            || !is_aligned(area.primary, eb)
            || !is_aligned(area.backup, eb)
        {
            log::error!("Invalid argument");
            return Err(ErrorCode::InvalidArgument);
        }

        Ok(())
    }

    fn read_digest(&self, base: usize, area: &DigestArea) -> Result<Digest, ErrorCode> {
        let mut digest = [0; DIGEST_LEN];
        self.flash.read(area.digest_offset(base), &mut digest)?;
        Ok(digest)
    }

    fn check_copy(&self, base: usize, area: &DigestArea) -> Result<DigestCheck, ErrorCode> {
        let expected = self.read_digest(base, area)?;
        digest::check(self.flash, self.engine, base, area.payload_size, &expected)
    }

    /// Find the copy of `area` that readers should use.
    ///
    /// Returns the primary if it is valid, the backup if only the backup is
    /// valid and `None` if neither is. Never modifies flash. Failures of the
    /// digest engine or of flash reads are returned as errors instead of
    /// being treated as invalid copies.
    pub fn validate_or_select(&self, area: &DigestArea) -> Result<Option<AreaCopy>, ErrorCode> {
        self.check_area(area)?;

        if self.check_copy(area.primary, area)? == DigestCheck::Valid {
            return Ok(Some(AreaCopy::Primary));
        }
        if self.check_copy(area.backup, area)? == DigestCheck::Valid {
            return Ok(Some(AreaCopy::Backup));
        }

        Ok(None)
    }

    /// Offset of the selected copy.
    pub fn copy_offset(area: &DigestArea, copy: AreaCopy) -> usize {
        match copy {
            AreaCopy::Primary => area.primary,
            AreaCopy::Backup => area.backup,
        }
    }

    /// Read the payload of the copy readers should use.
    ///
    /// Returns `ErrorCode::Authentication` if neither copy is valid.
    pub fn read_valid(&self, area: &DigestArea) -> Result<(AreaCopy, Vec<u8>), ErrorCode> {
        let copy = self
            .validate_or_select(area)?
            .ok_or(ErrorCode::Authentication)?;
        let image = RecordImage::load(
            self.flash,
            Self::copy_offset(area, copy),
            area.payload_size,
        )?;

        Ok((copy, image.payload))
    }

    /// Make both copies of `area` valid and identical.
    ///
    /// A valid primary always wins over the backup. If only the backup is
    /// valid the primary is restored from it. If neither copy is valid
    /// `ErrorCode::Authentication` is returned and nothing is written.
    ///
    /// Calling this again without modifying the area returns
    /// `RepairOutcome::InSync`.
    pub fn validate_and_repair(&self, area: &DigestArea) -> Result<RepairOutcome, ErrorCode> {
        self.check_area(area)?;

        let footprint = area.footprint(self.erase_block_size);
        let primary = self.check_copy(area.primary, area)?;
        let backup = self.check_copy(area.backup, area)?;

        match (primary, backup) {
            (DigestCheck::Valid, DigestCheck::Valid) => {
                if self.read_digest(area.primary, area)? == self.read_digest(area.backup, area)? {
                    return Ok(RepairOutcome::InSync);
                }

                if CONFIG.strict_divergence {
                    log::error!(
                        "Areas 0x{:x} and 0x{:x} are valid but differ",
                        area.primary,
                        area.backup
                    );
                    return Err(ErrorCode::Authentication);
                }

                log::warn!(
                    "Backup area 0x{:x} -> 0x{:x} (discarding valid backup)",
                    area.primary,
                    area.backup
                );
                flash_controller::copy(self.flash, area.backup, area.primary, footprint)?;
                Ok(RepairOutcome::BackupOverwritten)
            }
            (DigestCheck::Valid, DigestCheck::Mismatch) => {
                log::info!("Backup area 0x{:x} -> 0x{:x}", area.primary, area.backup);
                flash_controller::copy(self.flash, area.backup, area.primary, footprint)?;
                Ok(RepairOutcome::BackupRefreshed)
            }
            (DigestCheck::Mismatch, DigestCheck::Valid) => {
                log::info!("Use backup 0x{:x} -> 0x{:x}", area.backup, area.primary);
                flash_controller::copy(self.flash, area.primary, area.backup, footprint)?;
                Ok(RepairOutcome::PrimaryRestored)
            }
            (DigestCheck::Mismatch, DigestCheck::Mismatch) => Err(ErrorCode::Authentication),
        }
    }

    /// Seal the payload currently stored in the primary copy of `area`.
    ///
    /// Writes the digest of the primary payload into its trailer and then
    /// propagates the primary to the backup. If the digest cannot be
    /// calculated flash is not modified. If writing the trailer fails the
    /// primary is left invalid and the next repair rolls it back.
    ///
    /// Returns `ErrorCode::EngineFailure` if the freshly written primary
    /// does not verify.
    pub fn commit(&self, area: &DigestArea) -> Result<RepairOutcome, ErrorCode> {
        self.check_area(area)?;

        if !self.flash.is_ready() {
            return Err(ErrorCode::HwNotReady);
        }

        let digest = digest::compute(self.flash, self.engine, area.primary, area.payload_size)?;

        flash_controller::program(self.flash, area.digest_offset(area.primary), &digest)?;

        self.validate_and_repair(area).map_err(|e| match e {
            ErrorCode::Authentication => ErrorCode::EngineFailure,
            e => e,
        })
    }

    /// Replace the payload of the primary copy of `area` and commit it.
    ///
    /// `payload` must be exactly `area.payload_size` bytes long.
    pub fn store_payload(
        &self,
        area: &DigestArea,
        payload: &[u8],
    ) -> Result<RepairOutcome, ErrorCode> {
        self.check_area(area)?;

        if payload.len() != area.payload_size {
            return Err(ErrorCode::InvalidArgument);
        }

        flash_controller::program(self.flash, area.primary, payload)?;
        self.commit(area)
    }
}
