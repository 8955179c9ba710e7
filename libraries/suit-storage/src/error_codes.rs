// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The standard error codes used by SUIT storage.

/// Standard error codes.
///
/// Every fallible operation in this crate returns one of these, there are no
/// other error types. The integer values returned by [`ErrorCode::as_raw()`]
/// are stable and can be passed across execution domain boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    /// One of the arguments is not correct, for example a zero length or an
    /// unaligned area.
    #[error("invalid argument")]
    InvalidArgument,
    /// The flash controller device is not available.
    #[error("flash controller not ready")]
    HwNotReady,
    /// A flash read, erase or program operation failed.
    #[error("flash operation failed")]
    Io,
    /// The digest engine malfunctioned. This is a platform fault and says
    /// nothing about the integrity of the data.
    #[error("digest engine failure")]
    EngineFailure,
    /// The digest of the data does not match. Returned when the copy that was
    /// actually used, or both copies of a redundant record, are corrupted.
    #[error("digest mismatch")]
    Authentication,
    /// The requested entry does not exist: an unknown class ID, an
    /// unprovisioned slot or an empty record.
    #[error("not found")]
    NotFound,
    /// The role or index is not declared by the storage layout.
    #[error("out of bounds")]
    OutOfBounds,
    /// The storage layout does not fit in the physical partitions.
    #[error("storage layout exceeds partition")]
    OutOfMemory,
}

impl ErrorCode {
    /// Stable status code for this error, as reported to other execution
    /// domains. `0` is reserved for success.
    pub fn as_raw(self) -> i32 {
        match self {
            ErrorCode::EngineFailure => -1,
            ErrorCode::HwNotReady => -2,
            ErrorCode::InvalidArgument => -3,
            ErrorCode::Io => -4,
            ErrorCode::Authentication => -5,
            ErrorCode::NotFound => -6,
            ErrorCode::OutOfBounds => -7,
            ErrorCode::OutOfMemory => -8,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(original: ErrorCode) -> i32 {
        original.as_raw()
    }
}

/// Turn the outcome of an operation into the raw status reported to other
/// execution domains.
pub fn status_of<T>(result: &Result<T, ErrorCode>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.as_raw(),
    }
}
