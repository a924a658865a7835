// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-level types and codec shared by the QiProg host driver and device
//! translator.
//!
//! This crate has no allocator and no transport opinions: it only knows how
//! to turn protocol primitives into little-endian bytes and back, and how to
//! name the request codes and error taxonomy that both sides agree on.

#![no_std]

pub mod bus;
pub mod commands;
pub mod error;
pub mod request;
pub mod wire;

pub use bus::Bus;
pub use commands::{CommandStep, EraseCmd, EraseSize, EraseSubcmd, WriteCmd, WriteSubcmd};
pub use error::ErrorKind;
pub use request::Request;
pub use wire::{AddressRange, Capabilities, ChipIdEntry, CHIP_ID_ENTRIES};

/// Reference vendor identifier for the OpenMoko VultureProg family of
/// QiProg devices. Other identifiers can be added by a caller without any
/// change to this crate.
pub const VID_OPENMOKO: u16 = 0x1d50;
/// Reference product identifier, paired with [`VID_OPENMOKO`].
pub const PID_VULTUREPROG: u16 = 0x6076;

/// Maximum number of `{type, size}` or `{addr, data}` entries accepted by
/// the erase/write command-setup requests. Argument lists longer than this
/// are rejected with [`ErrorKind::Arg`] before any transfer is issued.
pub const MAX_COMMAND_STEPS: usize = 12;

/// Maximum number of simultaneously in-flight asynchronous bulk transfers
/// a host driver may keep outstanding for one `read_bulk`/`write_bulk`
/// call.
pub const MAX_CONCURRENT_TRANSFERS: usize = 32;

/// Size of the scratch buffer used on both sides of the wire for framing
/// control-transfer payloads. All structured payloads defined by this
/// protocol fit in 64 bytes.
pub const SCRATCH_BUF_LEN: usize = 64;

/// Reference bulk endpoint addresses: EP1 IN carries chip reads, EP1 OUT
/// carries chip writes. The high bit of a USB endpoint address marks the
/// IN direction.
pub const EP_BULK_IN: u8 = 0x81;
pub const EP_BULK_OUT: u8 = 0x01;

/// Reference timeout (in milliseconds) applied to every control and bulk
/// operation.
pub const DEFAULT_TIMEOUT_MS: u32 = 3_000;
