// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Maps manifest roles and class IDs to flash regions.
//!
//! Envelope and report slots are looked up directly in the
//! [`StorageLayout`]. Manifest provisioning entries either come from the
//! layout's builtin list or from the domain's manifest table, which is a
//! redundant area: the resolver reads whichever copy
//! [`AreaManager::validate_or_select()`] picks and never repairs it.
//!
//! Tables that failed to validate during the bootstrap are marked as
//! skipped, and every role they hold resolves to `ErrorCode::NotFound` until
//! the next bootstrap.

use core::cell::Cell;

use alloc::vec::Vec;
use uuid::Uuid;

use crate::codecs::mpi::{self, ManifestProvisioningInfo};
use crate::digest::HashEngine;
use crate::error_codes::ErrorCode;
use crate::flash_controller::FlashController;
use crate::layout::{ExecutionDomain, ManifestRole, ManifestTableLayout, Region, StorageLayout};
use crate::redundant::AreaManager;

/// Resolves roles, class IDs and indexes against one storage layout.
pub struct Resolver<'a, C: FlashController, H: HashEngine> {
    layout: &'a StorageLayout,
    areas: AreaManager<'a, C, H>,
    /// Bit `n` is set if `layout.manifest_tables[n]` was skipped.
    skipped: Cell<u32>,
}

impl<'a, C: FlashController, H: HashEngine> Resolver<'a, C, H> {
    /// Create a resolver with no table skipped.
    pub fn new(layout: &'a StorageLayout, flash: &'a C, engine: &'a H) -> Self {
        Self {
            layout,
            areas: AreaManager::new(flash, engine, layout.erase_block_size),
            skipped: Cell::new(0),
        }
    }

    /// The layout regions are resolved against.
    pub fn layout(&self) -> &'a StorageLayout {
        self.layout
    }

    /// The redundant area manager working on the same device.
    pub fn areas(&self) -> &AreaManager<'a, C, H> {
        &self.areas
    }

    fn table_index(&self, domain: ExecutionDomain) -> Option<usize> {
        self.layout
            .manifest_tables
            .iter()
            .position(|t| t.domain == domain)
    }

    /// Stop resolving the roles held by the manifest table of `domain`.
    pub fn skip_table(&self, domain: ExecutionDomain) {
        if let Some(index) = self.table_index(domain) {
            self.skipped.set(self.skipped.get() | 1 << index);
        }
    }

    /// Resolve every table again.
    pub fn clear_skipped(&self) {
        self.skipped.set(0);
    }

    /// Whether the manifest table of `domain` was skipped.
    pub fn is_skipped(&self, domain: ExecutionDomain) -> bool {
        self.table_index(domain)
            .is_some_and(|index| self.skipped.get() & (1 << index) != 0)
    }

    /// The installed envelope slot of `role`.
    pub fn envelope_slot(&self, role: ManifestRole) -> Result<Region, ErrorCode> {
        self.layout
            .envelopes
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, region)| *region)
            .ok_or(ErrorCode::OutOfBounds)
    }

    /// The report slot at `index`.
    pub fn report_slot(&self, index: usize) -> Result<Region, ErrorCode> {
        self.layout
            .reports
            .get(index)
            .copied()
            .ok_or(ErrorCode::OutOfBounds)
    }

    /// The payload of the valid copy of `table`.
    ///
    /// Returns `ErrorCode::NotFound` if the table was skipped or neither
    /// copy is valid.
    pub fn table_payload(&self, table: &ManifestTableLayout) -> Result<Vec<u8>, ErrorCode> {
        if self.is_skipped(table.domain) {
            return Err(ErrorCode::NotFound);
        }

        match self.areas.read_valid(&table.area) {
            Ok((_, payload)) => Ok(payload),
            Err(ErrorCode::Authentication) => Err(ErrorCode::NotFound),
            Err(e) => Err(e),
        }
    }

    /// The provisioning entry of `role`.
    ///
    /// Returns `ErrorCode::OutOfBounds` if the layout does not declare the
    /// role and `ErrorCode::NotFound` if it is not provisioned.
    pub fn manifest_entry(
        &self,
        role: ManifestRole,
    ) -> Result<ManifestProvisioningInfo, ErrorCode> {
        if let Some((_, entry)) = self
            .layout
            .builtin_manifests
            .iter()
            .find(|(r, _)| *r == role)
        {
            return Ok(*entry);
        }

        let table = self
            .layout
            .manifest_table(role.domain())
            .ok_or(ErrorCode::OutOfBounds)?;
        let slot = table
            .roles
            .iter()
            .position(|r| *r == role)
            .ok_or(ErrorCode::OutOfBounds)?;

        let payload = self.table_payload(table)?;
        mpi::decode_slot(&payload, slot)
    }

    /// The role provisioned for `class_id`.
    ///
    /// Builtin entries are searched first, then every table that was not
    /// skipped, in layout order. Returns `ErrorCode::NotFound` if no entry
    /// matches.
    pub fn role_for_class_id(&self, class_id: &Uuid) -> Result<ManifestRole, ErrorCode> {
        if let Some((role, _)) = self
            .layout
            .builtin_manifests
            .iter()
            .find(|(_, entry)| entry.class_id == *class_id)
        {
            return Ok(*role);
        }

        for table in self.layout.manifest_tables.iter() {
            let payload = match self.table_payload(table) {
                Ok(payload) => payload,
                Err(ErrorCode::NotFound) => continue,
                Err(e) => return Err(e),
            };

            for (slot, role) in table.roles.iter().enumerate() {
                match mpi::decode_slot(&payload, slot) {
                    Ok(entry) if entry.class_id == *class_id => return Ok(*role),
                    _ => continue,
                }
            }
        }

        Err(ErrorCode::NotFound)
    }
}
