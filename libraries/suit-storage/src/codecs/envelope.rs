// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Installed envelope slots.
//!
//! Envelope slots are not digest-protected areas: the authenticity of an
//! installed envelope is established by an [`EnvelopeCodec`] each time it is
//! looked up. Platforms with a full SUIT envelope parser implement the trait
//! themselves. [`StoredEnvelopeCodec`] is a self-contained codec that stores
//! the blob behind a header binding it to its class id and digest:
//!
//! ```plain
//!  0        4        8               24                      56
//! +--------+--------+---------------+-----------------------+------------+
//! | "SUIT" | length |   class ID    |  SHA-256 of envelope  |  envelope  |
//! +--------+--------+---------------+-----------------------+------------+
//! ```

use alloc::vec::Vec;

use uuid::Uuid;

use crate::codecs::{le_u32, read_region};
use crate::digest::{self, DigestCheck, HashEngine, DIGEST_LEN};
use crate::error_codes::ErrorCode;
use crate::flash_controller::{self, FlashController};
use crate::layout::Region;

/// Parses, authenticates and writes installed envelopes.
pub trait EnvelopeCodec {
    /// Write `envelope` into `slot`, replacing its contents.
    ///
    /// Returns `ErrorCode::InvalidArgument` if the envelope does not fit.
    fn install<C: FlashController, H: HashEngine>(
        &self,
        flash: &C,
        engine: &H,
        slot: Region,
        class_id: &Uuid,
        envelope: &[u8],
    ) -> Result<(), ErrorCode>;

    /// Locate the envelope of `class_id` stored in `slot`.
    ///
    /// Returns `ErrorCode::NotFound` if the slot holds no envelope and
    /// `ErrorCode::Authentication` if the stored envelope does not belong to
    /// `class_id` or fails its integrity check.
    fn get<C: FlashController, H: HashEngine>(
        &self,
        flash: &C,
        engine: &H,
        slot: Region,
        class_id: &Uuid,
    ) -> Result<Region, ErrorCode>;
}

/// Envelope codec storing a header in front of the raw envelope bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoredEnvelopeCodec;

const MAGIC: [u8; 4] = *b"SUIT";
const LEN_OFFSET: usize = 4;
const CLASS_ID_OFFSET: usize = 8;
const DIGEST_OFFSET: usize = 24;

/// Length of the header in front of the envelope.
pub const HEADER_LEN: usize = DIGEST_OFFSET + DIGEST_LEN;

impl StoredEnvelopeCodec {
    /// Largest envelope that fits in `slot`.
    pub const fn capacity(slot: Region) -> usize {
        slot.size.saturating_sub(HEADER_LEN)
    }
}

impl EnvelopeCodec for StoredEnvelopeCodec {
    fn install<C: FlashController, H: HashEngine>(
        &self,
        flash: &C,
        engine: &H,
        slot: Region,
        class_id: &Uuid,
        envelope: &[u8],
    ) -> Result<(), ErrorCode> {
        if envelope.is_empty() || envelope.len() > Self::capacity(slot) {
            log::error!(
                "Envelope of {} bytes does not fit slot {:#x}",
                envelope.len(),
                slot.offset
            );
            return Err(ErrorCode::InvalidArgument);
        }

        let digest = digest::compute_buf(engine, envelope)?;

        let mut buf = Vec::with_capacity(HEADER_LEN + envelope.len());
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&(envelope.len() as u32).to_le_bytes());
        buf.extend_from_slice(class_id.as_bytes());
        buf.extend_from_slice(&digest);
        buf.extend_from_slice(envelope);

        flash_controller::program(flash, slot.offset, &buf)
    }

    fn get<C: FlashController, H: HashEngine>(
        &self,
        flash: &C,
        engine: &H,
        slot: Region,
        class_id: &Uuid,
    ) -> Result<Region, ErrorCode> {
        if slot.size <= HEADER_LEN {
            return Err(ErrorCode::InvalidArgument);
        }

        let header = read_region(flash, Region::new(slot.offset, HEADER_LEN))?;
        if header[..LEN_OFFSET] != MAGIC {
            return Err(ErrorCode::NotFound);
        }

        let len = le_u32(&header, LEN_OFFSET) as usize;
        if len == 0 || len > Self::capacity(slot) {
            log::warn!("Corrupted envelope header at {:#x}", slot.offset);
            return Err(ErrorCode::Authentication);
        }

        if &header[CLASS_ID_OFFSET..DIGEST_OFFSET] != class_id.as_bytes() {
            log::warn!("Envelope at {:#x} belongs to another class", slot.offset);
            return Err(ErrorCode::Authentication);
        }

        let mut expected = [0; DIGEST_LEN];
        expected.copy_from_slice(&header[DIGEST_OFFSET..HEADER_LEN]);

        let envelope = Region::new(slot.offset + HEADER_LEN, len);
        match digest::check(flash, engine, envelope.offset, envelope.size, &expected)? {
            DigestCheck::Valid => Ok(envelope),
            DigestCheck::Mismatch => {
                log::warn!("Envelope at {:#x} failed integrity check", slot.offset);
                Err(ErrorCode::Authentication)
            }
        }
    }
}
