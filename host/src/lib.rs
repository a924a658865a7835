// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side QiProg driver: device discovery, the `Device` object, and the
//! bulk-transfer fan-out that runs on top of whatever [`HostTransport`]
//! a caller supplies.
//!
//! This crate owns an allocator and a `std::error::Error` taxonomy, unlike
//! [`qiprog_protocol`] and [`qiprog_transport`]: it is the side of the
//! wire that actually has an operating system under it.

mod bulk;
mod context;
mod cursor;
mod device;
mod error;

#[cfg(test)]
mod testing;

pub use context::{Context, DeviceInfo};
pub use device::Device;
pub use error::{Error, Result};

pub use qiprog_protocol::{
    commands, wire, AddressRange, Bus, Capabilities, ChipIdEntry, CommandStep, EraseCmd,
    EraseSize, EraseSubcmd, ErrorKind, Request, WriteCmd, WriteSubcmd, CHIP_ID_ENTRIES,
    PID_VULTUREPROG, VID_OPENMOKO,
};
pub use qiprog_transport::HostTransport;
