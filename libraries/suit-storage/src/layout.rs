// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Description of where every record lives in flash.
//!
//! The layout is an explicit value built once at startup and passed by
//! reference to everything that touches flash. Nothing in the crate casts
//! flash addresses to structures; records are reached through the byte
//! ranges described here.
//!
//! Each execution domain owns one erase-block aligned partition:
//!
//! ```plain
//!  Secure partition            Radio partition           Application partition
//! +------------------------+  +----------------------+  +------------------------+
//! | radio table (backup)   |  | radio table          |  | app table              |
//! | app table (backup)     |  | (reserved)           |  | (reserved)             |
//! | report 0               |  | envelope: recovery   |  | update candidate       |
//! | (reserved)             |  | envelope: local 1    |  | NVV                    |
//! | envelope: top          |  | envelope: local 2    |  | NVV (backup)           |
//! | envelope: sdfw         |  +----------------------+  | envelope: root         |
//! | envelope: sysctrl      |                            | envelope: recovery     |
//! +------------------------+                            | envelope: local 1..3   |
//!                                                       +------------------------+
//! ```
//!
//! The backups of the manifest tables live in the secure partition, so the
//! loss of the radio or application partition does not lose the table.

use alloc::vec::Vec;

use crate::codecs::mpi::{self, ManifestProvisioningInfo};
use crate::codecs::nvv::NVV_PAYLOAD_LEN;
use crate::codecs::update::UPDATE_CANDIDATE_LEN;
use crate::digest::DIGEST_LEN;
use crate::error_codes::ErrorCode;
use crate::flash_controller::{align_up, is_aligned};

/// Largest number of manifest tables a layout can declare.
pub const MAX_MANIFEST_TABLES: usize = 32;

/// An isolated processing context with its own flash partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionDomain {
    /// The secure domain, running the update orchestrator.
    Secure,
    /// The radio core.
    Radio,
    /// The application core.
    Application,
}

/// The logical slot a manifest occupies.
///
/// The discriminants are the raw role codes used in update reports and
/// across domain boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ManifestRole {
    /// Secure domain: top-level manifest.
    SecTop = 0x10,
    /// Secure domain: secure domain firmware.
    SecSdfw = 0x11,
    /// Secure domain: system controller firmware.
    SecSysCtrl = 0x12,
    /// Application domain: root manifest.
    AppRoot = 0x20,
    /// Application domain: recovery manifest.
    AppRecovery = 0x21,
    /// Application domain: first local manifest.
    AppLocal1 = 0x22,
    /// Application domain: second local manifest.
    AppLocal2 = 0x23,
    /// Application domain: spare local manifest.
    AppLocal3 = 0x24,
    /// Radio domain: recovery manifest.
    RadRecovery = 0x30,
    /// Radio domain: first local manifest.
    RadLocal1 = 0x31,
    /// Radio domain: second local manifest.
    RadLocal2 = 0x32,
}

impl ManifestRole {
    /// Every role known to the build.
    pub const ALL: [ManifestRole; 11] = [
        ManifestRole::SecTop,
        ManifestRole::SecSdfw,
        ManifestRole::SecSysCtrl,
        ManifestRole::AppRoot,
        ManifestRole::AppRecovery,
        ManifestRole::AppLocal1,
        ManifestRole::AppLocal2,
        ManifestRole::AppLocal3,
        ManifestRole::RadRecovery,
        ManifestRole::RadLocal1,
        ManifestRole::RadLocal2,
    ];

    /// The execution domain the manifest belongs to.
    pub fn domain(self) -> ExecutionDomain {
        match self {
            ManifestRole::SecTop | ManifestRole::SecSdfw | ManifestRole::SecSysCtrl => {
                ExecutionDomain::Secure
            }
            ManifestRole::RadRecovery | ManifestRole::RadLocal1 | ManifestRole::RadLocal2 => {
                ExecutionDomain::Radio
            }
            _ => ExecutionDomain::Application,
        }
    }
}

impl From<ManifestRole> for u8 {
    fn from(role: ManifestRole) -> u8 {
        role as u8
    }
}

impl TryFrom<u8> for ManifestRole {
    type Error = ErrorCode;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        ManifestRole::ALL
            .iter()
            .copied()
            .find(|role| *role as u8 == raw)
            .ok_or(ErrorCode::OutOfBounds)
    }
}

/// A contiguous byte range of the NVM device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// Offset of the first byte from the start of the device.
    pub offset: usize,
    /// Length in bytes.
    pub size: usize,
}

impl Region {
    /// Create a region.
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// Offset one past the last byte.
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Whether `other` lies entirely inside this region.
    pub fn contains(&self, other: &Region) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    /// Whether the two regions share at least one byte.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// A digest-protected record held as a primary and a backup copy.
///
/// Both copies use the same on-media layout: `payload_size` bytes of payload
/// immediately followed by the digest trailer, which is padded to a whole
/// erase block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DigestArea {
    /// Offset of the primary copy.
    pub primary: usize,
    /// Offset of the backup copy.
    pub backup: usize,
    /// Length of the payload, a multiple of the erase block size.
    pub payload_size: usize,
}

impl DigestArea {
    /// Offset of the digest trailer of the copy starting at `base`.
    pub const fn digest_offset(&self, base: usize) -> usize {
        base + self.payload_size
    }

    /// Space taken by one copy including the padded digest trailer.
    pub const fn footprint(&self, erase_block_size: usize) -> usize {
        self.payload_size + align_up(DIGEST_LEN, erase_block_size)
    }

    /// Flash range of the primary copy.
    pub const fn primary_region(&self, erase_block_size: usize) -> Region {
        Region::new(self.primary, self.footprint(erase_block_size))
    }

    /// Flash range of the backup copy.
    pub const fn backup_region(&self, erase_block_size: usize) -> Region {
        Region::new(self.backup, self.footprint(erase_block_size))
    }
}

/// Where a domain's manifest provisioning table lives and how it is used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestTableLayout {
    /// The domain the table describes.
    pub domain: ExecutionDomain,
    /// The redundant storage of the table.
    pub area: DigestArea,
    /// The role of each table slot, in slot order.
    pub roles: Vec<ManifestRole>,
    /// If set, failing to validate the table fails the whole bootstrap.
    /// Otherwise the table is skipped and its roles are not found.
    pub essential: bool,
    /// Roles that must be provisioned for the bootstrap to succeed.
    pub essential_roles: Vec<ManifestRole>,
}

/// The physical storage partition of every execution domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partitions {
    /// Partition of the secure domain.
    pub secure: Region,
    /// Partition of the radio domain.
    pub radio: Region,
    /// Partition of the application domain.
    pub application: Region,
}

impl Partitions {
    /// The partition of `domain`.
    pub fn get(&self, domain: ExecutionDomain) -> Region {
        match domain {
            ExecutionDomain::Secure => self.secure,
            ExecutionDomain::Radio => self.radio,
            ExecutionDomain::Application => self.application,
        }
    }

    fn iter(&self) -> impl Iterator<Item = Region> {
        [self.secure, self.radio, self.application].into_iter()
    }
}

/// The complete storage layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLayout {
    /// Erase block size of the NVM device, a power of two.
    pub erase_block_size: usize,
    /// Storage partitions of the execution domains.
    pub partitions: Partitions,
    /// Manifest runtime non-volatile variables.
    pub nvv: DigestArea,
    /// Update candidate information.
    pub update_candidate: Region,
    /// Update report slots, by index.
    pub reports: Vec<Region>,
    /// Installed envelope slot of each role.
    pub envelopes: Vec<(ManifestRole, Region)>,
    /// Manifest provisioning tables stored in flash, validated in this order
    /// during the bootstrap.
    pub manifest_tables: Vec<ManifestTableLayout>,
    /// Provisioning entries that are part of the firmware image instead of
    /// flash.
    pub builtin_manifests: Vec<(ManifestRole, ManifestProvisioningInfo)>,
}

impl StorageLayout {
    /// Build the reference layout inside `partitions`.
    ///
    /// Record sizes and ordering follow the nRF54H20 storage structures.
    /// Returns `ErrorCode::OutOfMemory` if a partition is too small and
    /// `ErrorCode::InvalidArgument` if a partition is not aligned.
    pub fn reference(partitions: Partitions, erase_block_size: usize) -> Result<Self, ErrorCode> {
        if erase_block_size == 0 || !erase_block_size.is_power_of_two() {
            return Err(ErrorCode::InvalidArgument);
        }

        let mut secure = DomainAllocator::new(partitions.secure, erase_block_size)?;
        let mut radio = DomainAllocator::new(partitions.radio, erase_block_size)?;
        let mut app = DomainAllocator::new(partitions.application, erase_block_size)?;

        let rad_roles = alloc::vec![
            ManifestRole::RadRecovery,
            ManifestRole::RadLocal1,
            ManifestRole::RadLocal2,
        ];
        let app_roles = alloc::vec![
            ManifestRole::AppRoot,
            ManifestRole::AppRecovery,
            ManifestRole::AppLocal1,
            ManifestRole::AppLocal2,
            ManifestRole::AppLocal3,
        ];
        let rad_payload = align_up(mpi::table_len(rad_roles.len()), erase_block_size);
        let app_payload = align_up(mpi::table_len(app_roles.len()), erase_block_size);

        // Secure partition.
        let rad_table_backup = secure.take_area(rad_payload)?;
        let app_table_backup = secure.take_area(app_payload)?;
        let report_0 = secure.take(160)?;
        secure.skip(160)?;
        let sec_top = secure.take(1280)?;
        let sec_sdfw = secure.take(1024)?;
        let sec_sysctrl = secure.take(1024)?;

        // Radio partition.
        let rad_table = radio.take_area(rad_payload)?;
        radio.skip(848)?;
        let rad_recovery = radio.take(1024)?;
        let rad_local_1 = radio.take(1024)?;
        let rad_local_2 = radio.take(1024)?;

        // Application partition.
        let app_table = app.take_area(app_payload)?;
        app.skip(560)?;
        let update_candidate = app.take(UPDATE_CANDIDATE_LEN)?;
        let nvv_payload = align_up(NVV_PAYLOAD_LEN, erase_block_size);
        let nvv = app.take_area(nvv_payload)?;
        let nvv_backup = app.take_area(nvv_payload)?;
        let app_root = app.take(2048)?;
        let app_recovery = app.take(2048)?;
        let app_local_1 = app.take(1024)?;
        let app_local_2 = app.take(1024)?;
        let app_local_3 = app.take(1024)?;

        Ok(Self {
            erase_block_size,
            partitions,
            nvv: DigestArea {
                primary: nvv,
                backup: nvv_backup,
                payload_size: nvv_payload,
            },
            update_candidate,
            reports: alloc::vec![report_0],
            envelopes: alloc::vec![
                (ManifestRole::SecTop, sec_top),
                (ManifestRole::SecSdfw, sec_sdfw),
                (ManifestRole::SecSysCtrl, sec_sysctrl),
                (ManifestRole::RadRecovery, rad_recovery),
                (ManifestRole::RadLocal1, rad_local_1),
                (ManifestRole::RadLocal2, rad_local_2),
                (ManifestRole::AppRoot, app_root),
                (ManifestRole::AppRecovery, app_recovery),
                (ManifestRole::AppLocal1, app_local_1),
                (ManifestRole::AppLocal2, app_local_2),
                (ManifestRole::AppLocal3, app_local_3),
            ],
            manifest_tables: alloc::vec![
                ManifestTableLayout {
                    domain: ExecutionDomain::Radio,
                    area: DigestArea {
                        primary: rad_table,
                        backup: rad_table_backup,
                        payload_size: rad_payload,
                    },
                    roles: rad_roles,
                    essential: false,
                    essential_roles: Vec::new(),
                },
                ManifestTableLayout {
                    domain: ExecutionDomain::Application,
                    area: DigestArea {
                        primary: app_table,
                        backup: app_table_backup,
                        payload_size: app_payload,
                    },
                    roles: app_roles,
                    essential: true,
                    essential_roles: alloc::vec![ManifestRole::AppRoot],
                },
            ],
            builtin_manifests: alloc::vec![
                (ManifestRole::SecTop, mpi::NORDIC_TOP),
                (ManifestRole::SecSdfw, mpi::NORDIC_SDFW),
                (ManifestRole::SecSysCtrl, mpi::NORDIC_SYSCTRL),
            ],
        })
    }

    /// The manifest table of `domain`, if it is stored in flash.
    pub fn manifest_table(&self, domain: ExecutionDomain) -> Option<&ManifestTableLayout> {
        self.manifest_tables.iter().find(|t| t.domain == domain)
    }

    /// Every flash range the layout uses, primary and backup copies
    /// included.
    pub fn regions(&self) -> Vec<Region> {
        let eb = self.erase_block_size;
        let mut regions = Vec::new();

        regions.push(self.nvv.primary_region(eb));
        regions.push(self.nvv.backup_region(eb));
        regions.push(self.update_candidate);
        regions.extend(self.reports.iter().copied());
        regions.extend(self.envelopes.iter().map(|(_, r)| *r));
        for table in self.manifest_tables.iter() {
            regions.push(table.area.primary_region(eb));
            regions.push(table.area.backup_region(eb));
        }

        regions
    }

    /// Check the layout against the physical partitions.
    ///
    /// Returns `ErrorCode::InvalidArgument` if the erase block size is not a
    /// power of two, a partition, area or slot is not erase-block aligned,
    /// a payload is empty, a table does not fit its slots or two ranges
    /// overlap, and `ErrorCode::OutOfMemory` if a range does not fit inside
    /// the partition of its domain.
    ///
    /// Envelope slots and table primaries belong to the partition of their
    /// domain, the variables and the update candidate to the application
    /// partition. A table backup must be kept in another domain's partition.
    pub fn validate(&self) -> Result<(), ErrorCode> {
        let eb = self.erase_block_size;

        if eb == 0 || !eb.is_power_of_two() {
            return Err(ErrorCode::InvalidArgument);
        }

        for partition in self.partitions.iter() {
            if !is_aligned(partition.offset, eb) || !is_aligned(partition.size, eb) {
                log::error!("Partition {:#x} not aligned to {:#x}", partition.offset, eb);
                return Err(ErrorCode::InvalidArgument);
            }
        }

        if self.manifest_tables.len() > MAX_MANIFEST_TABLES {
            return Err(ErrorCode::InvalidArgument);
        }

        let mut areas = alloc::vec![self.nvv];
        for table in self.manifest_tables.iter() {
            if mpi::table_len(table.roles.len()) > table.area.payload_size {
                return Err(ErrorCode::InvalidArgument);
            }
            areas.push(table.area);
        }
        for area in areas.iter() {
            if area.payload_size == 0 || !is_aligned(area.payload_size, eb) {
                return Err(ErrorCode::InvalidArgument);
            }
        }

        let mut regions = self.regions();

        for region in regions.iter() {
            if region.size == 0 || !is_aligned(region.offset, eb) {
                return Err(ErrorCode::InvalidArgument);
            }
        }

        let app = self.partitions.application;
        let mut placed = alloc::vec![
            (self.nvv.primary_region(eb), app),
            (self.nvv.backup_region(eb), app),
            (self.update_candidate, app),
        ];
        placed.extend(
            self.envelopes
                .iter()
                .map(|(role, r)| (*r, self.partitions.get(role.domain()))),
        );
        for table in self.manifest_tables.iter() {
            placed.push((
                table.area.primary_region(eb),
                self.partitions.get(table.domain),
            ));
        }

        for (region, partition) in placed.iter() {
            if !partition.contains(region) {
                log::error!(
                    "Area {:#x}+{:#x} outside of partition {:#x}",
                    region.offset,
                    region.size,
                    partition.offset
                );
                return Err(ErrorCode::OutOfMemory);
            }
        }

        for table in self.manifest_tables.iter() {
            let own = self.partitions.get(table.domain);
            let backup = table.area.backup_region(eb);
            if !self
                .partitions
                .iter()
                .any(|p| p != own && p.contains(&backup))
            {
                log::error!("Backup of {:?} MPI outside of storage partitions", table.domain);
                return Err(ErrorCode::OutOfMemory);
            }
        }

        for report in self.reports.iter() {
            if !self.partitions.iter().any(|p| p.contains(report)) {
                log::error!("Report {:#x} outside of storage partitions", report.offset);
                return Err(ErrorCode::OutOfMemory);
            }
        }

        regions.sort_unstable_by_key(|r| r.offset);
        for pair in regions.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                log::error!(
                    "Areas {:#x} and {:#x} overlap",
                    pair[0].offset,
                    pair[1].offset
                );
                return Err(ErrorCode::InvalidArgument);
            }
        }

        Ok(())
    }
}

/// Hands out consecutive erase-block aligned ranges of one partition.
pub struct DomainAllocator {
    partition: Region,
    erase_block_size: usize,
    cursor: usize,
}

impl DomainAllocator {
    /// Start allocating at the beginning of `partition`.
    pub fn new(partition: Region, erase_block_size: usize) -> Result<Self, ErrorCode> {
        if !is_aligned(partition.offset, erase_block_size)
            || !is_aligned(partition.size, erase_block_size)
        {
            return Err(ErrorCode::InvalidArgument);
        }

        Ok(Self {
            partition,
            erase_block_size,
            cursor: partition.offset,
        })
    }

    /// Allocate `len` bytes, rounded up to whole erase blocks.
    pub fn take(&mut self, len: usize) -> Result<Region, ErrorCode> {
        let size = align_up(len, self.erase_block_size);

        if self.cursor + size > self.partition.end() {
            return Err(ErrorCode::OutOfMemory);
        }

        let region = Region::new(self.cursor, size);
        self.cursor += size;
        Ok(region)
    }

    /// Allocate one copy of a digest-protected area and return its offset.
    pub fn take_area(&mut self, payload_size: usize) -> Result<usize, ErrorCode> {
        let size = payload_size + align_up(DIGEST_LEN, self.erase_block_size);
        self.take(size).map(|r| r.offset)
    }

    /// Leave `len` bytes unused.
    pub fn skip(&mut self, len: usize) -> Result<(), ErrorCode> {
        self.take(len).map(|_| ())
    }
}
