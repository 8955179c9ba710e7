// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The success codes returned when validating redundant areas.

/// What `validate_and_repair()` had to do to leave both copies valid and
/// identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Both copies were valid and identical. No changes have been made to
    /// flash.
    InSync,
    /// The primary was valid and the backup was not. The backup has been
    /// rewritten from the primary.
    BackupRefreshed,
    /// Both copies were valid but held different data. The primary won and
    /// the backup has been overwritten, discarding what it held.
    BackupOverwritten,
    /// The primary was invalid and has been restored from the backup. Any
    /// uncommitted change to the primary has been rolled back.
    PrimaryRestored,
}

impl RepairOutcome {
    /// Whether flash has been modified.
    pub fn wrote_flash(self) -> bool {
        self != RepairOutcome::InSync
    }
}

/// The copy of a redundant area picked by `validate_or_select()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AreaCopy {
    /// The primary copy is valid.
    Primary,
    /// The primary copy is invalid, the backup is valid.
    Backup,
}
