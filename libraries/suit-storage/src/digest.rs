// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interface for computing and verifying digests over flash contents.
//!
//! The hash engine itself is supplied by the platform through the
//! [`HashEngine`] trait. [`Sha256Engine`] is a software implementation based
//! on the `sha2` crate.
//!
//! [`check()`] and [`compute()`] stream a byte range of flash through the
//! engine and turn the result into a three-valued outcome: the digest
//! matches, the digest does not match, or the engine failed
//! (`ErrorCode::EngineFailure`). A mismatch is a statement about the data,
//! an engine failure is not.

use core::cell::RefCell;

use sha2::{Digest as _, Sha256};

use crate::config::CONFIG;
use crate::error_codes::ErrorCode;
use crate::flash_controller::FlashController;

/// Length of the digest protecting an area, in bytes.
pub const DIGEST_LEN: usize = 32;

/// Output of the hash engine.
pub type Digest = [u8; DIGEST_LEN];

/// Number of bytes read from flash per engine update.
const CHUNK_LEN: usize = 64;

/// Result of comparing a computed digest with the expected one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestCheck {
    /// The digest matches the data.
    Valid,
    /// The digest was computed but does not match the data.
    Mismatch,
}

/// A streaming hash engine with a fixed 32 byte output.
///
/// Only one operation can be in flight at a time: `setup()` starts it,
/// `update()` adds data and `finish()` or `verify()` ends it. Calling
/// `update()`, `finish()` or `verify()` without a preceding `setup()` must
/// return `ErrorCode::EngineFailure`.
pub trait HashEngine {
    /// Start a new digest computation, discarding any operation in flight.
    fn setup(&self) -> Result<(), ErrorCode>;

    /// Add `data` to the digest input.
    fn update(&self, data: &[u8]) -> Result<(), ErrorCode>;

    /// Finish the computation and store the digest in `digest`.
    fn finish(&self, digest: &mut Digest) -> Result<(), ErrorCode>;

    /// Finish the computation and compare the digest with `expected`.
    ///
    /// Returns `Ok(true)` if they match. The comparison visits every byte.
    fn verify(&self, expected: &Digest) -> Result<bool, ErrorCode> {
        let mut digest = [0; DIGEST_LEN];
        self.finish(&mut digest)?;

        let diff = digest
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));

        Ok(diff == 0)
    }
}

/// Software SHA-256 engine.
pub struct Sha256Engine {
    state: RefCell<Option<Sha256>>,
}

impl Sha256Engine {
    /// Create a new engine with no operation in flight.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(None),
        }
    }
}

impl Default for Sha256Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl HashEngine for Sha256Engine {
    fn setup(&self) -> Result<(), ErrorCode> {
        self.state.replace(Some(Sha256::new()));
        Ok(())
    }

    fn update(&self, data: &[u8]) -> Result<(), ErrorCode> {
        match self.state.borrow_mut().as_mut() {
            Some(hasher) => {
                hasher.update(data);
                Ok(())
            }
            None => Err(ErrorCode::EngineFailure),
        }
    }

    fn finish(&self, digest: &mut Digest) -> Result<(), ErrorCode> {
        let hasher = self.state.take().ok_or(ErrorCode::EngineFailure)?;
        digest.copy_from_slice(&hasher.finalize());
        Ok(())
    }
}

/// Feed `[address, address + size)` from flash into a fresh engine operation.
fn hash_range<C: FlashController, H: HashEngine>(
    flash: &C,
    engine: &H,
    address: usize,
    size: usize,
) -> Result<(), ErrorCode> {
    if size == 0 {
        log::error!("Invalid argument");
        return Err(ErrorCode::InvalidArgument);
    }

    engine.setup().map_err(|e| {
        log::error!("Failed to setup hash algorithm: {:?}", e);
        ErrorCode::EngineFailure
    })?;

    let mut chunk = [0u8; CHUNK_LEN];
    let mut offset = 0;

    while offset < size {
        let n = core::cmp::min(CHUNK_LEN, size - offset);
        flash.read(address + offset, &mut chunk[..n])?;
        engine.update(&chunk[..n]).map_err(|e| {
            log::error!("Failed to calculate hash value: {:?}", e);
            ErrorCode::EngineFailure
        })?;
        offset += n;
    }

    Ok(())
}

/// Verify the digest of the area `[address, address + size)`.
///
/// Returns `ErrorCode::InvalidArgument` for an empty area,
/// `ErrorCode::EngineFailure` if the digest could not be calculated and
/// `ErrorCode::Io` if the area could not be read.
pub fn check<C: FlashController, H: HashEngine>(
    flash: &C,
    engine: &H,
    address: usize,
    size: usize,
    expected: &Digest,
) -> Result<DigestCheck, ErrorCode> {
    hash_range(flash, engine, address, size)?;

    let matches = engine.verify(expected).map_err(|e| {
        log::error!("Hash verify error: {:?}", e);
        ErrorCode::EngineFailure
    })?;
    let outcome = if matches {
        DigestCheck::Valid
    } else {
        DigestCheck::Mismatch
    };

    if CONFIG.trace_digests {
        log::debug!("Digest of {:#x}+{:#x}: {:?}", address, size, outcome);
    }

    Ok(outcome)
}

/// Calculate the digest of the area `[address, address + size)`.
///
/// Fails the same way as [`check()`].
pub fn compute<C: FlashController, H: HashEngine>(
    flash: &C,
    engine: &H,
    address: usize,
    size: usize,
) -> Result<Digest, ErrorCode> {
    hash_range(flash, engine, address, size)?;

    let mut digest = [0; DIGEST_LEN];
    engine.finish(&mut digest).map_err(|e| {
        log::error!("Hash finish error: {:?}", e);
        ErrorCode::EngineFailure
    })?;

    Ok(digest)
}

/// Calculate the digest of a buffer held in RAM.
pub fn compute_buf<H: HashEngine>(engine: &H, data: &[u8]) -> Result<Digest, ErrorCode> {
    if data.is_empty() {
        return Err(ErrorCode::InvalidArgument);
    }

    let mut digest = [0; DIGEST_LEN];
    engine
        .setup()
        .and_then(|()| engine.update(data))
        .and_then(|()| engine.finish(&mut digest))
        .map_err(|_| ErrorCode::EngineFailure)?;

    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256("abc"), FIPS 180-2 appendix B.1.
    const ABC_DIGEST: Digest = [
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
        0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
        0xf2, 0x00, 0x15, 0xad,
    ];

    #[test]
    fn sha256_known_answer() {
        let engine = Sha256Engine::new();
        assert_eq!(compute_buf(&engine, b"abc"), Ok(ABC_DIGEST));
    }

    #[test]
    fn streaming_matches_one_shot() {
        let engine = Sha256Engine::new();
        engine.setup().unwrap();
        engine.update(b"a").unwrap();
        engine.update(b"bc").unwrap();
        assert_eq!(engine.verify(&ABC_DIGEST), Ok(true));
    }

    #[test]
    fn verify_reports_mismatch() {
        let engine = Sha256Engine::new();
        let mut wrong = ABC_DIGEST;
        wrong[31] ^= 1;

        engine.setup().unwrap();
        engine.update(b"abc").unwrap();
        assert_eq!(engine.verify(&wrong), Ok(false));
    }

    #[test]
    fn update_without_setup_is_engine_failure() {
        let engine = Sha256Engine::new();
        assert_eq!(engine.update(b"abc"), Err(ErrorCode::EngineFailure));

        let mut digest = [0; DIGEST_LEN];
        assert_eq!(engine.finish(&mut digest), Err(ErrorCode::EngineFailure));
    }

    #[test]
    fn empty_buffer_is_invalid() {
        let engine = Sha256Engine::new();
        assert_eq!(compute_buf(&engine, &[]), Err(ErrorCode::InvalidArgument));
    }
}
