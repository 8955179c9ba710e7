// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Manifest provisioning information (MPI).
//!
//! A manifest provisioning table is an ordered array of fixed size entries.
//! The position of an entry in the table selects the manifest role it
//! provisions, the order comes from the
//! [`ManifestTableLayout`](crate::layout::ManifestTableLayout). An erased
//! entry (all `0xFF`) is an unprovisioned role.
//!
//! Entry layout:
//!
//! ```plain
//!  0       1         2             3          4          16          32         48
//! +-------+---------+-------------+----------+----------+-----------+----------+
//! | ver.  |downgrade|independent  |signature | reserved | vendor ID | class ID |
//! |       |policy   |update policy|policy    |  (0xFF)  |  (UUID)   |  (UUID)  |
//! +-------+---------+-------------+----------+----------+-----------+----------+
//! ```

use alloc::vec;
use alloc::vec::Vec;

use uuid::Uuid;

use crate::error_codes::ErrorCode;

/// Length of one table entry.
pub const ENTRY_LEN: usize = 48;

/// The supported entry version.
pub const MPI_VERSION: u8 = 1;

const VERSION_OFFSET: usize = 0;
const DOWNGRADE_OFFSET: usize = 1;
const INDEPENDENT_OFFSET: usize = 2;
const SIGNATURE_OFFSET: usize = 3;
const RESERVED_OFFSET: usize = 4;
const VENDOR_ID_OFFSET: usize = 16;
const CLASS_ID_OFFSET: usize = 32;

/// Payload length needed by a table of `slots` entries.
pub const fn table_len(slots: usize) -> usize {
    slots * ENTRY_LEN
}

/// Whether an update may install a manifest with a lower sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DowngradePrevention {
    /// Downgrades are allowed.
    Disabled = 0x01,
    /// Downgrades are rejected.
    Enabled = 0x02,
}

/// Whether the manifest may be updated on its own, outside of an update of
/// its parent manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IndependentUpdateability {
    /// Only updatable through the parent.
    Denied = 0x01,
    /// Updatable on its own.
    Allowed = 0x02,
}

/// When the manifest signature must be checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SignatureVerification {
    /// Never.
    Disabled = 0x01,
    /// When installing an update.
    OnUpdate = 0x02,
    /// When installing an update and on every boot.
    OnUpdateAndBoot = 0x03,
}

impl TryFrom<u8> for DowngradePrevention {
    type Error = ErrorCode;

    fn try_from(raw: u8) -> Result<Self, ErrorCode> {
        match raw {
            0x01 => Ok(DowngradePrevention::Disabled),
            0x02 => Ok(DowngradePrevention::Enabled),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }
}

impl TryFrom<u8> for IndependentUpdateability {
    type Error = ErrorCode;

    fn try_from(raw: u8) -> Result<Self, ErrorCode> {
        match raw {
            0x01 => Ok(IndependentUpdateability::Denied),
            0x02 => Ok(IndependentUpdateability::Allowed),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }
}

impl TryFrom<u8> for SignatureVerification {
    type Error = ErrorCode;

    fn try_from(raw: u8) -> Result<Self, ErrorCode> {
        match raw {
            0x01 => Ok(SignatureVerification::Disabled),
            0x02 => Ok(SignatureVerification::OnUpdate),
            0x03 => Ok(SignatureVerification::OnUpdateAndBoot),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }
}

/// One provisioned manifest: its identity and the policies applied to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManifestProvisioningInfo {
    /// Downgrade prevention policy.
    pub downgrade_prevention: DowngradePrevention,
    /// Independent updateability policy.
    pub independent_updateability: IndependentUpdateability,
    /// Signature verification policy.
    pub signature_verification: SignatureVerification,
    /// Vendor of the manifest.
    pub vendor_id: Uuid,
    /// Class of the manifest. Unique across all tables.
    pub class_id: Uuid,
}

impl ManifestProvisioningInfo {
    /// Serialize the entry.
    pub fn encode(&self) -> [u8; ENTRY_LEN] {
        let mut buf = [0xFF; ENTRY_LEN];

        buf[VERSION_OFFSET] = MPI_VERSION;
        buf[DOWNGRADE_OFFSET] = self.downgrade_prevention as u8;
        buf[INDEPENDENT_OFFSET] = self.independent_updateability as u8;
        buf[SIGNATURE_OFFSET] = self.signature_verification as u8;
        buf[VENDOR_ID_OFFSET..CLASS_ID_OFFSET].copy_from_slice(self.vendor_id.as_bytes());
        buf[CLASS_ID_OFFSET..ENTRY_LEN].copy_from_slice(self.class_id.as_bytes());

        buf
    }

    /// Parse an entry.
    ///
    /// Returns `ErrorCode::NotFound` if the entry is erased and
    /// `ErrorCode::InvalidArgument` if the version or a policy is unknown.
    pub fn decode(buf: &[u8]) -> Result<Self, ErrorCode> {
        if buf.len() < ENTRY_LEN {
            return Err(ErrorCode::InvalidArgument);
        }
        let buf = &buf[..ENTRY_LEN];

        if buf.iter().all(|b| *b == 0xFF) {
            return Err(ErrorCode::NotFound);
        }
        if buf[VERSION_OFFSET] != MPI_VERSION {
            log::warn!("Unsupported MPI version: {}", buf[VERSION_OFFSET]);
            return Err(ErrorCode::InvalidArgument);
        }

        Ok(Self {
            downgrade_prevention: buf[DOWNGRADE_OFFSET].try_into()?,
            independent_updateability: buf[INDEPENDENT_OFFSET].try_into()?,
            signature_verification: buf[SIGNATURE_OFFSET].try_into()?,
            vendor_id: uuid_at(buf, VENDOR_ID_OFFSET),
            class_id: uuid_at(buf, CLASS_ID_OFFSET),
        })
    }
}

fn uuid_at(buf: &[u8], offset: usize) -> Uuid {
    let mut bytes = [0; 16];
    bytes.copy_from_slice(&buf[offset..offset + 16]);
    Uuid::from_bytes(bytes)
}

/// Parse the entry in `slot` of a table payload.
pub fn decode_slot(payload: &[u8], slot: usize) -> Result<ManifestProvisioningInfo, ErrorCode> {
    let start = slot * ENTRY_LEN;

    payload
        .get(start..start + ENTRY_LEN)
        .ok_or(ErrorCode::OutOfBounds)
        .and_then(ManifestProvisioningInfo::decode)
}

/// Serialize a table into a payload of `payload_size` bytes. `None` entries
/// and the tail of the payload are left erased.
pub fn encode_table(
    entries: &[Option<ManifestProvisioningInfo>],
    payload_size: usize,
) -> Result<Vec<u8>, ErrorCode> {
    if table_len(entries.len()) > payload_size {
        return Err(ErrorCode::InvalidArgument);
    }

    let mut payload = vec![0xFF; payload_size];
    for (slot, entry) in entries.iter().enumerate() {
        if let Some(entry) = entry {
            let start = slot * ENTRY_LEN;
            payload[start..start + ENTRY_LEN].copy_from_slice(&entry.encode());
        }
    }

    Ok(payload)
}

/// RFC4122 uuid5(uuid.NAMESPACE_DNS, 'nordicsemi.com')
pub const NORDIC_VENDOR_ID: Uuid = Uuid::from_bytes([
    0x76, 0x17, 0xda, 0xa5, 0x71, 0xfd, 0x5a, 0x85, 0x8f, 0x94, 0xe2, 0x8d, 0x73, 0x5c, 0xe9, 0xf4,
]);

/// Nordic top-level manifest, uuid5(nordic_vid, 'nRF54H20_nordic_top').
pub const NORDIC_TOP: ManifestProvisioningInfo = ManifestProvisioningInfo {
    downgrade_prevention: DowngradePrevention::Enabled,
    independent_updateability: IndependentUpdateability::Allowed,
    signature_verification: SignatureVerification::OnUpdateAndBoot,
    vendor_id: NORDIC_VENDOR_ID,
    class_id: Uuid::from_bytes([
        0xf0, 0x3d, 0x38, 0x5e, 0xa7, 0x31, 0x56, 0x05, 0xb1, 0x5d, 0x03, 0x7f, 0x6d, 0xa6, 0x09,
        0x7f,
    ]),
};

/// Secure domain firmware, uuid5(nordic_vid, 'nRF54H20_sec').
pub const NORDIC_SDFW: ManifestProvisioningInfo = ManifestProvisioningInfo {
    downgrade_prevention: DowngradePrevention::Enabled,
    independent_updateability: IndependentUpdateability::Denied,
    signature_verification: SignatureVerification::OnUpdateAndBoot,
    vendor_id: NORDIC_VENDOR_ID,
    class_id: Uuid::from_bytes([
        0xd9, 0x6b, 0x40, 0xb7, 0x09, 0x2b, 0x5c, 0xd1, 0xa5, 0x9f, 0x9a, 0xf8, 0x0c, 0x33, 0x7e,
        0xba,
    ]),
};

/// System controller firmware, uuid5(nordic_vid, 'nRF54H20_sys').
pub const NORDIC_SYSCTRL: ManifestProvisioningInfo = ManifestProvisioningInfo {
    downgrade_prevention: DowngradePrevention::Enabled,
    independent_updateability: IndependentUpdateability::Denied,
    signature_verification: SignatureVerification::OnUpdateAndBoot,
    vendor_id: NORDIC_VENDOR_ID,
    class_id: Uuid::from_bytes([
        0xc0, 0x8a, 0x25, 0xd7, 0x35, 0xe6, 0x59, 0x2c, 0xb7, 0xad, 0x43, 0xac, 0xc8, 0xd1, 0xd1,
        0xc8,
    ]),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nordic_ids_are_name_based() {
        let vendor = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"nordicsemi.com");
        assert_eq!(vendor, NORDIC_VENDOR_ID);
        assert_eq!(
            Uuid::new_v5(&vendor, b"nRF54H20_nordic_top"),
            NORDIC_TOP.class_id
        );
        assert_eq!(Uuid::new_v5(&vendor, b"nRF54H20_sec"), NORDIC_SDFW.class_id);
        assert_eq!(Uuid::new_v5(&vendor, b"nRF54H20_sys"), NORDIC_SYSCTRL.class_id);
    }

    #[test]
    fn entry_layout() {
        let buf = NORDIC_TOP.encode();

        assert_eq!(buf[0], MPI_VERSION);
        assert_eq!(buf[1], 0x02);
        assert_eq!(buf[2], 0x02);
        assert_eq!(buf[3], 0x03);
        assert!(buf[4..16].iter().all(|b| *b == 0xFF));
        assert_eq!(&buf[16..32], NORDIC_VENDOR_ID.as_bytes());
        assert_eq!(&buf[32..48], NORDIC_TOP.class_id.as_bytes());
        assert_eq!(ManifestProvisioningInfo::decode(&buf), Ok(NORDIC_TOP));
    }

    #[test]
    fn erased_entry_is_not_found() {
        assert_eq!(
            ManifestProvisioningInfo::decode(&[0xFF; ENTRY_LEN]),
            Err(ErrorCode::NotFound)
        );
    }

    #[test]
    fn unknown_version_or_policy_is_rejected() {
        let mut buf = NORDIC_SDFW.encode();
        buf[0] = 2;
        assert_eq!(
            ManifestProvisioningInfo::decode(&buf),
            Err(ErrorCode::InvalidArgument)
        );

        let mut buf = NORDIC_SDFW.encode();
        buf[3] = 0x07;
        assert_eq!(
            ManifestProvisioningInfo::decode(&buf),
            Err(ErrorCode::InvalidArgument)
        );
    }

    #[test]
    fn table_keeps_slot_positions() {
        let payload = encode_table(&[None, Some(NORDIC_SDFW)], 112).unwrap();

        assert_eq!(payload.len(), 112);
        assert_eq!(decode_slot(&payload, 0), Err(ErrorCode::NotFound));
        assert_eq!(decode_slot(&payload, 1), Ok(NORDIC_SDFW));
        assert_eq!(decode_slot(&payload, 2), Err(ErrorCode::OutOfBounds));
    }

    #[test]
    fn table_must_fit_payload() {
        assert_eq!(
            encode_table(&[Some(NORDIC_TOP), Some(NORDIC_SDFW)], 64),
            Err(ErrorCode::InvalidArgument)
        );
    }
}
