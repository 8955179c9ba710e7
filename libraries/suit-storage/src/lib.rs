// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! # SUIT storage
//!
//! Integrity-protected metadata storage for a SUIT firmware-update subsystem
//! running on a chip with several isolated execution domains (secure, radio
//! and application) sharing one NOR flash device.
//!
//! The crate persists:
//!
//!  * Manifest provisioning tables, one per execution domain, which bind
//!    manifest class identifiers to manifest roles.
//!  * A block of non-volatile variables (NVV) owned by the application domain.
//!  * The update candidate record, pointing at a pending update.
//!  * Installed manifest envelopes, one slot per manifest role.
//!  * Update reports.
//!
//! ## Digest-protected areas
//!
//! The manifest tables and the NVV block are stored as digest-protected areas.
//! Each one exists twice on the media, as a primary and a backup copy, and
//! each copy is laid out as:
//!
//! ```plain
//! +------------------------+------------------------------+
//! | payload[payload_size]  | SHA-256(payload), 32 bytes   |
//! +------------------------+------------------------------+
//! ```
//!
//! The digest trailer is padded to a whole erase block, so it can be erased
//! and programmed on its own. A copy is valid iff its digest matches its
//! payload. NOR flash has no transactional writes, so consistency is kept by
//! three rules:
//!
//!  * Readers only ever use a copy picked by `validate_or_select()`, which
//!    returns the primary if valid and the backup otherwise.
//!  * Writers modify the primary in place, rewrite its digest and then call
//!    `validate_and_repair()`, which copies the primary over the backup.
//!  * `validate_and_repair()` runs on every boot, so an update interrupted by
//!    power loss rolls the record back to the last committed value held by the
//!    backup.
//!
//! If both copies of a record are invalid the record is lost. That is fatal
//! for the essential records (the application manifest table) and degrades
//! availability for optional ones (the radio manifest table). The NVV block is
//! reset to its defaults.
//!
//! ## Using the crate
//!
//! Implement [`FlashController`] for the NVM device (or wrap an
//! `embedded-storage` driver in [`nor_flash::NorFlashController`]), build a
//! [`StorageLayout`] and hand both to [`SuitStorage`]:
//!
//! The layout must use the erase block size of the device.
//!
//! ```rust,ignore
//! let layout = StorageLayout::reference(partitions, flash.erase_block_size())?;
//! let engine = Sha256Engine::new();
//! let storage = SuitStorage::new(&flash, &engine, &layout, StoredEnvelopeCodec);
//! storage.init()?;
//!
//! storage.var_set(3, 42)?;
//! assert_eq!(storage.var_get(3)?, 42);
//! ```
//!
//! All operations are synchronous. The crate does no locking, callers in
//! one execution domain must serialize access to a `SuitStorage`.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod codecs;
mod config;
pub mod digest;
pub mod error_codes;
pub mod flash_controller;
pub mod layout;
pub mod nor_flash;
pub mod redundant;
pub mod resolver;
pub mod storage;
pub mod success_codes;

// Use this to generate nicer docs
#[doc(inline)]
pub use crate::codecs::envelope::{EnvelopeCodec, StoredEnvelopeCodec};
#[doc(inline)]
pub use crate::digest::{HashEngine, Sha256Engine};
#[doc(inline)]
pub use crate::error_codes::ErrorCode;
#[doc(inline)]
pub use crate::flash_controller::FlashController;
#[doc(inline)]
pub use crate::layout::StorageLayout;
#[doc(inline)]
pub use crate::storage::SuitStorage;
