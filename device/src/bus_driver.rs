// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The capability a concrete chip-bus backend (SPI, LPC, FWH, ...) exposes
//! to the translator.
//!
//! The reference implementation dispatches through a struct of function
//! pointers plus an opaque `void *priv`. A closed enum over backend variants
//! would need to name every bus this crate will ever support, which is as
//! out of scope here as the flash-command opcode catalog is for
//! `qiprog_protocol::commands`; instead the translator holds a borrowed
//! `&mut dyn BusDriver`, the no_std, no-alloc equivalent of the vtable:
//! one owned slot, swapped by reference instead of by pointer assignment.

use qiprog_protocol::{Capabilities, ChipIdEntry, CommandStep, EraseCmd, EraseSize, EraseSubcmd, ErrorKind, WriteCmd, WriteSubcmd, CHIP_ID_ENTRIES};

pub type Result<T> = core::result::Result<T, ErrorKind>;

/// One concrete chip-bus backend. Implementors own whatever hardware state
/// (GPIO, SPI controller registers, timing state) their bus needs; the
/// translator only ever sees this trait.
pub trait BusDriver {
    /// Called by [`crate::translator::Translator::change_device`] when this
    /// driver becomes the active one.
    fn open(&mut self);
    /// Called when this driver is displaced by a different one.
    fn close(&mut self);

    fn get_capabilities(&self) -> Capabilities;
    fn set_clock(&mut self, clock_khz: u32) -> Result<()>;
    fn read_chip_id(&mut self) -> [ChipIdEntry; CHIP_ID_ENTRIES];
    fn set_chip_size(&mut self, chip_idx: u8, size: u32) -> Result<()>;

    /// Bypasses this trait's other operations: per the protocol's carve-out,
    /// `SET_ADDRESS` is handled by the translator calling this directly
    /// rather than going through a generic "core" dispatch.
    fn set_address(&mut self, start: u32, end: u32) -> Result<()>;

    fn set_erase_size(&mut self, chip_idx: u8, sizes: &[EraseSize]) -> Result<()>;
    fn set_erase_command(&mut self, chip_idx: u8, cmd: EraseCmd, subcmd: EraseSubcmd, flags: u16) -> Result<()>;
    fn set_custom_erase_command(&mut self, chip_idx: u8, steps: &[CommandStep]) -> Result<()>;
    fn set_write_command(&mut self, chip_idx: u8, cmd: WriteCmd, subcmd: WriteSubcmd) -> Result<()>;
    fn set_custom_write_command(&mut self, chip_idx: u8, steps: &[CommandStep]) -> Result<()>;
    fn set_spi_timing(&mut self, tpu_read_us: u16, tces_ns: u32) -> Result<()>;
    fn set_vdd(&mut self, millivolts: u16) -> Result<()>;

    fn read8(&mut self, addr: u32) -> Result<u8>;
    fn read16(&mut self, addr: u32) -> Result<u16>;
    fn read32(&mut self, addr: u32) -> Result<u32>;
    fn write8(&mut self, addr: u32, val: u8) -> Result<()>;
    fn write16(&mut self, addr: u32, val: u16) -> Result<()>;
    fn write32(&mut self, addr: u32, val: u32) -> Result<()>;

    /// Fill `dst` with chip contents starting at `addr`, for the bulk-read
    /// path. Always fills the whole buffer; a short chip is the backend's
    /// problem to define (e.g. by wrapping or repeating), not this trait's.
    fn read_stream(&mut self, addr: u32, dst: &mut [u8]);
    /// Consume `src` as a write starting at `addr`, for the bulk-write path.
    fn write_stream(&mut self, addr: u32, src: &[u8]) -> Result<()>;
}
