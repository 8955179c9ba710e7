// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The SUIT storage interface used by the update orchestrator.

use alloc::vec::Vec;

use uuid::Uuid;

use crate::codecs::envelope::{EnvelopeCodec, StoredEnvelopeCodec};
use crate::codecs::mpi::{self, ManifestProvisioningInfo};
use crate::codecs::nvv::VariableBlock;
use crate::codecs::report;
use crate::codecs::update::{self, MemoryRegion};
use crate::digest::HashEngine;
use crate::error_codes::ErrorCode;
use crate::flash_controller::FlashController;
use crate::layout::{ExecutionDomain, ManifestRole, Region, StorageLayout};
use crate::resolver::Resolver;
use crate::success_codes::{AreaCopy, RepairOutcome};

/// Persistent storage of the SUIT update subsystem.
///
/// [`SuitStorage::init()`] must succeed before any other function is used.
/// It can be run again at any time, for example after an interrupted
/// operation, and always leaves every redundant record it accepts repaired.
pub struct SuitStorage<
    'a,
    C: FlashController,
    H: HashEngine,
    E: EnvelopeCodec = StoredEnvelopeCodec,
> {
    flash: &'a C,
    engine: &'a H,
    resolver: Resolver<'a, C, H>,
    envelope: E,
}

impl<'a, C: FlashController, H: HashEngine, E: EnvelopeCodec> SuitStorage<'a, C, H, E> {
    /// Create the storage for `layout` on `flash`.
    ///
    /// Nothing is read or written until [`SuitStorage::init()`] is called.
    pub fn new(flash: &'a C, engine: &'a H, layout: &'a StorageLayout, envelope: E) -> Self {
        Self {
            flash,
            engine,
            resolver: Resolver::new(layout, flash, engine),
            envelope,
        }
    }

    fn layout(&self) -> &'a StorageLayout {
        self.resolver.layout()
    }

    /// Validate the layout and bring every redundant record into a usable
    /// state.
    ///
    /// The variables are reset to their defaults if neither copy is valid.
    /// An essential manifest table that cannot be validated, or an
    /// unprovisioned essential role, fails the whole initialization. A
    /// non-essential table that cannot be validated is skipped and its roles
    /// are reported as not found until the next `init()`.
    pub fn init(&self) -> Result<(), ErrorCode> {
        self.resolver.clear_skipped();

        if !self.flash.is_ready() {
            return Err(ErrorCode::HwNotReady);
        }

        if self.flash.erase_block_size() != self.layout().erase_block_size {
            log::error!(
                "Storage layout erase block {:#x} does not match the device ({:#x})",
                self.layout().erase_block_size,
                self.flash.erase_block_size()
            );
            return Err(ErrorCode::InvalidArgument);
        }

        self.layout().validate().map_err(|e| {
            log::error!("Storage layout does not match partitions: {:?}", e);
            e
        })?;

        self.init_nvv().map_err(|e| {
            log::error!("Failed to initialize NVV with default values: {:?}", e);
            e
        })?;

        let mut class_ids = Vec::new();

        let builtin: Vec<ManifestRole> = self
            .layout()
            .builtin_manifests
            .iter()
            .map(|(role, _)| *role)
            .collect();
        self.configure_roles(&builtin, &builtin, &mut class_ids)
            .map_err(|e| {
                log::error!("Failed to initialize builtin MPIs: {:?}", e);
                e
            })?;

        for table in self.layout().manifest_tables.iter() {
            match self.resolver.areas().validate_and_repair(&table.area) {
                Ok(outcome) if outcome.wrote_flash() => {
                    log::info!("Repaired {:?} MPI: {:?}", table.domain, outcome);
                }
                Ok(_) => {}
                Err(e) if table.essential => {
                    log::error!("Failed to verify {:?} MPI: {:?}", table.domain, e);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("Failed to verify {:?} MPI: {:?}", table.domain, e);
                    self.resolver.skip_table(table.domain);
                    continue;
                }
            }

            self.configure_roles(&table.roles, &table.essential_roles, &mut class_ids)
                .map_err(|e| {
                    log::error!("Failed to initialize {:?} MPIs: {:?}", table.domain, e);
                    e
                })?;
        }

        Ok(())
    }

    /// Repair the variables, loading the defaults if neither copy is valid.
    fn init_nvv(&self) -> Result<RepairOutcome, ErrorCode> {
        let nvv = &self.layout().nvv;

        match self.resolver.areas().validate_and_repair(nvv) {
            Err(ErrorCode::Authentication) => {
                log::warn!("Failed to verify NVV, load default values");
                let payload = VariableBlock::default().encode(nvv.payload_size)?;
                self.resolver.areas().store_payload(nvv, &payload)
            }
            other => other,
        }
    }

    /// Check the provisioning entry of every role in `roles`.
    ///
    /// Unprovisioned roles are skipped unless listed in `essential`. Class
    /// IDs must be unique across everything configured so far.
    fn configure_roles(
        &self,
        roles: &[ManifestRole],
        essential: &[ManifestRole],
        class_ids: &mut Vec<Uuid>,
    ) -> Result<(), ErrorCode> {
        for role in roles.iter().copied() {
            match self.resolver.manifest_entry(role) {
                Ok(entry) => {
                    if class_ids.contains(&entry.class_id) {
                        log::warn!("Duplicate class ID for role 0x{:x}", u8::from(role));
                        return Err(ErrorCode::InvalidArgument);
                    }
                    class_ids.push(entry.class_id);
                }
                Err(ErrorCode::NotFound) if !essential.contains(&role) => {
                    log::info!(
                        "Skip MPI area for role 0x{:x}. Area load failed.",
                        u8::from(role)
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Failed to load MPI configuration for role 0x{:x}: {:?}",
                        u8::from(role),
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Read the manifest runtime variable at `index`.
    pub fn var_get(&self, index: usize) -> Result<u32, ErrorCode> {
        let (_, payload) = self.resolver.areas().read_valid(&self.layout().nvv)?;
        VariableBlock::decode(&payload)?.get(index)
    }

    /// Change the manifest runtime variable at `index`.
    ///
    /// Returns `ErrorCode::Io` if the primary copy is not valid: a degraded
    /// record is not modified until `init()` has repaired it.
    pub fn var_set(&self, index: usize, value: u32) -> Result<(), ErrorCode> {
        let nvv = &self.layout().nvv;
        let (copy, payload) = self.resolver.areas().read_valid(nvv)?;

        if copy == AreaCopy::Backup {
            log::warn!("Refusing to update NVV with an invalid primary copy");
            return Err(ErrorCode::Io);
        }

        let mut block = VariableBlock::decode(&payload)?;
        block.set(index, value).map_err(|e| {
            log::info!("Failed to update NVV at index {}", index);
            e
        })?;

        self.resolver
            .areas()
            .store_payload(nvv, &block.encode(nvv.payload_size)?)
            .map(|_| ())
    }

    /// The memory regions of the pending update candidate.
    pub fn update_cand_get(&self) -> Result<Vec<MemoryRegion>, ErrorCode> {
        update::load(self.flash, self.layout().update_candidate)
    }

    /// Record the pending update candidate. An empty list clears it.
    pub fn update_cand_set(&self, regions: &[MemoryRegion]) -> Result<(), ErrorCode> {
        update::store(self.flash, self.layout().update_candidate, regions)
    }

    /// The role provisioned for `class_id`.
    pub fn manifest_role(&self, class_id: &Uuid) -> Result<ManifestRole, ErrorCode> {
        self.resolver.role_for_class_id(class_id)
    }

    /// The provisioning entry of `role`.
    pub fn manifest_info(&self, role: ManifestRole) -> Result<ManifestProvisioningInfo, ErrorCode> {
        self.resolver.manifest_entry(role)
    }

    /// Locate the installed envelope of `class_id`.
    pub fn installed_envelope_get(&self, class_id: &Uuid) -> Result<Region, ErrorCode> {
        let role = self.resolver.role_for_class_id(class_id).map_err(|e| {
            log::info!("Unable to find role for given class ID.");
            e
        })?;
        let slot = self.resolver.envelope_slot(role)?;

        log::debug!(
            "Decode envelope with role: 0x{:x} address: 0x{:x}",
            u8::from(role),
            slot.offset
        );

        self.envelope
            .get(self.flash, self.engine, slot, class_id)
            .map_err(|e| {
                log::warn!("Unable to parse envelope with role 0x{:x}", u8::from(role));
                e
            })
    }

    /// Install `envelope` into the slot of the role provisioned for
    /// `class_id`.
    pub fn install_envelope(&self, class_id: &Uuid, envelope: &[u8]) -> Result<(), ErrorCode> {
        let role = self.resolver.role_for_class_id(class_id).map_err(|e| {
            log::info!("Unable to find role for given class ID.");
            e
        })?;

        if envelope.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }

        let slot = self.resolver.envelope_slot(role)?;
        self.envelope
            .install(self.flash, self.engine, slot, class_id, envelope)?;

        log::info!("Envelope with role 0x{:x} saved.", u8::from(role));
        Ok(())
    }

    /// Erase the report at `index`.
    pub fn report_clear(&self, index: usize) -> Result<(), ErrorCode> {
        report::clear(self.flash, self.resolver.report_slot(index)?)
    }

    /// Store `buf` as the report at `index`.
    pub fn report_save(&self, index: usize, buf: &[u8]) -> Result<(), ErrorCode> {
        report::store(self.flash, self.resolver.report_slot(index)?, buf)
    }

    /// Read the report at `index`.
    pub fn report_read(&self, index: usize) -> Result<Vec<u8>, ErrorCode> {
        report::load(self.flash, self.resolver.report_slot(index)?)
    }

    /// Write the manifest provisioning table of `domain`.
    ///
    /// `entries` are given in the slot order of the table layout; `None`
    /// leaves a slot unprovisioned. Both copies are written. The new table
    /// is used after the next `init()`.
    pub fn provision_manifest_table(
        &self,
        domain: ExecutionDomain,
        entries: &[Option<ManifestProvisioningInfo>],
    ) -> Result<(), ErrorCode> {
        let table = self
            .layout()
            .manifest_table(domain)
            .ok_or(ErrorCode::OutOfBounds)?;

        if entries.len() > table.roles.len() {
            return Err(ErrorCode::InvalidArgument);
        }

        let payload = mpi::encode_table(entries, table.area.payload_size)?;
        self.resolver
            .areas()
            .store_payload(&table.area, &payload)
            .map(|_| ())
    }
}
