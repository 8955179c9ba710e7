// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Data structure for storing compile-time configuration options.
//!
//! As in the kernel, configuration is a typed `const` object instead of
//! `#[cfg(feature = ..)]` scattered through the code. All code paths are
//! type-checked even when an option is disabled, and the compiler folds the
//! constants away in the final binary.
//!
//! The run-time configuration (where the records live) is the
//! [`StorageLayout`](crate::layout::StorageLayout), which is built by the
//! board and passed in.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching Cargo feature of this
/// crate. The `CONFIG` constant at the end of this file is the only place
/// where features are read.
pub(crate) struct Config {
    /// Whether every digest verification should be traced to the log.
    ///
    /// If enabled, the address, size and outcome of each digest check is
    /// logged at debug level. This is useful to follow the area selection
    /// during boot, but very verbose.
    pub(crate) trace_digests: bool,

    /// Whether two valid but different copies of a redundant area should be
    /// treated as an error.
    ///
    /// By default the primary copy is authoritative and the backup is
    /// overwritten. The current write paths always update the primary first,
    /// so a valid backup that differs from a valid primary is never newer.
    /// A write path that updates the backup first would silently lose data
    /// with that rule, so it can be turned into an `Authentication` error
    /// that leaves both copies untouched. Note that power loss between a
    /// commit and the backup refresh also leaves two valid, different copies,
    /// and with this option enabled that record is then unusable.
    pub(crate) strict_divergence: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub(crate) const CONFIG: Config = Config {
    trace_digests: cfg!(feature = "trace_digests"),
    strict_divergence: cfg!(feature = "strict_divergence"),
};
