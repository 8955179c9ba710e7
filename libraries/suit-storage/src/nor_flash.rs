// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! [`FlashController`] implementation for `embedded-storage` NOR flash
//! drivers.

use alloc::vec;
use core::cell::RefCell;

use embedded_storage::nor_flash::{NorFlash, NorFlashError};

use crate::error_codes::ErrorCode;
use crate::flash_controller::FlashController;

/// Wraps a blocking [`NorFlash`] driver.
///
/// `NorFlash` takes `&mut self`, while SUIT storage is single threaded and
/// shares the device between its components by reference, so the driver is
/// kept in a `RefCell`.
pub struct NorFlashController<F: NorFlash> {
    inner: RefCell<F>,
}

impl<F: NorFlash> NorFlashController<F> {
    /// Take ownership of `flash`.
    pub fn new(flash: F) -> Self {
        Self {
            inner: RefCell::new(flash),
        }
    }

    /// Give back the driver.
    pub fn into_inner(self) -> F {
        self.inner.into_inner()
    }
}

fn offset(address: usize) -> Result<u32, ErrorCode> {
    u32::try_from(address).map_err(|_| ErrorCode::InvalidArgument)
}

fn io_error<E: NorFlashError>(e: E) -> ErrorCode {
    log::error!("Flash driver error: {:?}", e.kind());
    ErrorCode::Io
}

impl<F: NorFlash> FlashController for NorFlashController<F> {
    /// Reads not aligned to `F::READ_SIZE` go through a bounce buffer
    /// covering the enclosing aligned range.
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), ErrorCode> {
        let start = address - address % F::READ_SIZE;
        let end = address + buf.len();
        let end = end + (F::READ_SIZE - end % F::READ_SIZE) % F::READ_SIZE;
        let mut flash = self.inner.borrow_mut();

        if start == address && end == address + buf.len() {
            return flash.read(offset(address)?, buf).map_err(io_error);
        }

        let mut bounce = vec![0; end - start];
        flash.read(offset(start)?, &mut bounce).map_err(io_error)?;
        let skip = address - start;
        buf.copy_from_slice(&bounce[skip..skip + buf.len()]);

        Ok(())
    }

    fn erase(&self, address: usize, len: usize) -> Result<(), ErrorCode> {
        let from = offset(address)?;
        let to = offset(address + len)?;

        self.inner.borrow_mut().erase(from, to).map_err(io_error)
    }

    /// A tail shorter than `F::WRITE_SIZE` is padded with `0xFF`, which
    /// leaves the erased bytes after it untouched.
    fn write(&self, address: usize, buf: &[u8]) -> Result<(), ErrorCode> {
        if address % F::WRITE_SIZE != 0 {
            return Err(ErrorCode::InvalidArgument);
        }

        let aligned = buf.len() - buf.len() % F::WRITE_SIZE;
        let mut flash = self.inner.borrow_mut();

        if aligned > 0 {
            flash
                .write(offset(address)?, &buf[..aligned])
                .map_err(io_error)?;
        }
        if aligned < buf.len() {
            let mut tail = vec![0xFF; F::WRITE_SIZE];
            tail[..buf.len() - aligned].copy_from_slice(&buf[aligned..]);
            flash
                .write(offset(address + aligned)?, &tail)
                .map_err(io_error)?;
        }

        Ok(())
    }

    fn erase_block_size(&self) -> usize {
        F::ERASE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    struct MockFlash {
        data: [u8; 256],
        broken: bool,
    }

    impl ErrorType for MockFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 64;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if self.broken {
                return Err(NorFlashErrorKind::Other);
            }
            self.data[from as usize..to as usize].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.broken {
                return Err(NorFlashErrorKind::Other);
            }
            let start = offset as usize;
            for (d, s) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
                *d &= *s;
            }
            Ok(())
        }
    }

    /// A flash that can only be read in whole words.
    struct WordFlash {
        data: [u8; 128],
    }

    impl ErrorType for WordFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for WordFlash {
        const READ_SIZE: usize = 4;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            if offset % 4 != 0 || bytes.len() % 4 != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            let start = offset as usize;
            bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for WordFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 64;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.data[from as usize..to as usize].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn unaligned_read_is_bounced() {
        let mut data = [0; 128];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        let flash = NorFlashController::new(WordFlash { data });

        let mut buf = [0; 5];
        flash.read(6, &mut buf).unwrap();
        assert_eq!(buf, [6, 7, 8, 9, 10]);

        let mut word = [0; 8];
        flash.read(8, &mut word).unwrap();
        assert_eq!(word, [8, 9, 10, 11, 12, 13, 14, 15]);

        let mut empty = [0; 0];
        assert_eq!(flash.read(3, &mut empty), Ok(()));
    }

    #[test]
    fn program_through_adapter() {
        let flash = NorFlashController::new(MockFlash {
            data: [0; 256],
            broken: false,
        });

        assert_eq!(flash.erase_block_size(), 64);
        crate::flash_controller::program(&flash, 64, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0; 8];
        flash.read(64, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(flash.into_inner().data[128..].iter().all(|b| *b == 0));
    }

    #[test]
    fn driver_errors_are_io() {
        let flash = NorFlashController::new(MockFlash {
            data: [0xFF; 256],
            broken: true,
        });

        assert_eq!(flash.erase(0, 64), Err(ErrorCode::Io));
        assert_eq!(flash.write(0, &[0; 4]), Err(ErrorCode::Io));
    }

    #[test]
    fn unaligned_address_is_rejected() {
        let flash = NorFlashController::new(MockFlash {
            data: [0xFF; 256],
            broken: false,
        });

        assert_eq!(flash.write(2, &[0; 4]), Err(ErrorCode::InvalidArgument));
    }

    #[test]
    fn short_tail_is_padded() {
        let flash = NorFlashController::new(MockFlash {
            data: [0xFF; 256],
            broken: false,
        });

        flash.write(0, &[0x11; 6]).unwrap();

        let mut buf = [0; 8];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0xFF, 0xFF]);
    }
}
