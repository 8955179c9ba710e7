// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Manifest runtime non-volatile variables (NVV).
//!
//! The NVV payload is an array of `NVV_COUNT` little endian `u32` values,
//! zero padded up to the payload size of the area.

use alloc::vec;
use alloc::vec::Vec;

use crate::codecs::le_u32;
use crate::error_codes::ErrorCode;

/// Number of variables.
pub const NVV_COUNT: usize = 32;

/// Bytes used by the variables inside the payload.
pub const NVV_PAYLOAD_LEN: usize = NVV_COUNT * 4;

/// The decoded set of variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableBlock {
    values: [u32; NVV_COUNT],
}

impl Default for VariableBlock {
    /// Every variable set to zero, the value after the first boot.
    fn default() -> Self {
        Self {
            values: [0; NVV_COUNT],
        }
    }
}

impl VariableBlock {
    /// Parse a payload. The payload must hold at least `NVV_PAYLOAD_LEN`
    /// bytes; the padding is ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, ErrorCode> {
        if payload.len() < NVV_PAYLOAD_LEN {
            return Err(ErrorCode::InvalidArgument);
        }

        let mut values = [0; NVV_COUNT];
        for (index, value) in values.iter_mut().enumerate() {
            *value = le_u32(payload, index * 4);
        }

        Ok(Self { values })
    }

    /// Serialize into a payload of `payload_size` bytes.
    pub fn encode(&self, payload_size: usize) -> Result<Vec<u8>, ErrorCode> {
        if payload_size < NVV_PAYLOAD_LEN {
            return Err(ErrorCode::InvalidArgument);
        }

        let mut payload = vec![0; payload_size];
        for (chunk, value) in payload.chunks_exact_mut(4).zip(self.values.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }

        Ok(payload)
    }

    /// The value of variable `index`.
    pub fn get(&self, index: usize) -> Result<u32, ErrorCode> {
        self.values.get(index).copied().ok_or(ErrorCode::OutOfBounds)
    }

    /// Change the value of variable `index`.
    pub fn set(&mut self, index: usize, value: u32) -> Result<(), ErrorCode> {
        let slot = self.values.get_mut(index).ok_or(ErrorCode::OutOfBounds)?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_and_zero_padded() {
        let mut block = VariableBlock::default();
        block.set(1, 0x0403_0201).unwrap();
        block.set(NVV_COUNT - 1, u32::MAX).unwrap();

        let payload = block.encode(NVV_PAYLOAD_LEN + 16).unwrap();
        assert_eq!(&payload[4..8], &[1, 2, 3, 4]);
        assert_eq!(&payload[124..128], &[0xFF; 4]);
        assert!(payload[NVV_PAYLOAD_LEN..].iter().all(|b| *b == 0));
        assert_eq!(VariableBlock::decode(&payload), Ok(block));
    }

    #[test]
    fn index_past_the_end() {
        let mut block = VariableBlock::default();
        assert_eq!(block.get(NVV_COUNT), Err(ErrorCode::OutOfBounds));
        assert_eq!(block.set(NVV_COUNT, 1), Err(ErrorCode::OutOfBounds));
    }

    #[test]
    fn short_payload_is_rejected() {
        assert_eq!(
            VariableBlock::decode(&[0; NVV_PAYLOAD_LEN - 4]),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            VariableBlock::default().encode(NVV_PAYLOAD_LEN - 4),
            Err(ErrorCode::InvalidArgument)
        );
    }
}
