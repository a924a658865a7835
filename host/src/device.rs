// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The host-side `Device` object: every QiProg operation, implemented by
//! serializing it through a [`HostTransport`].

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use qiprog_protocol::{
    commands, wire, AddressRange, Bus, Capabilities, ChipIdEntry, CommandStep, EraseCmd,
    EraseSize, EraseSubcmd, ErrorKind, Request, WriteCmd, WriteSubcmd, CHIP_ID_ENTRIES,
    DEFAULT_TIMEOUT_MS, EP_BULK_IN, EP_BULK_OUT, MAX_COMMAND_STEPS,
};
use qiprog_transport::HostTransport;

use crate::cursor::{AddressCursor, Residual};
use crate::error::{Error, Result};

/// A programmer device opened through a [`crate::Context`].
///
/// Owns the address cursor and residual buffer described in the data
/// model; these are private to one `Device` and never shared.
pub struct Device<T: HostTransport> {
    pub(crate) transport: Rc<RefCell<T>>,
    pub(crate) handle: Option<T::Handle>,
    pub(crate) cursor: AddressCursor,
    pub(crate) residual: Residual,
    pub(crate) ep_in: u16,
    pub(crate) ep_out: u16,
    pub(crate) next_token: u32,
}

impl<T: HostTransport> Device<T> {
    pub(crate) fn new(transport: Rc<RefCell<T>>, handle: T::Handle, ep_in: u16, ep_out: u16) -> Self {
        Device {
            transport,
            handle: Some(handle),
            cursor: AddressCursor::default(),
            residual: Residual::default(),
            ep_in,
            ep_out,
            next_token: 0,
        }
    }

    fn handle_mut(&mut self) -> Result<&mut T::Handle> {
        self.handle.as_mut().ok_or_else(|| Error::new(ErrorKind::Arg))
    }

    /// Mint a fresh [`qiprog_transport::BulkToken`], unique for the
    /// lifetime of this `Device`, for one asynchronous bulk submission.
    pub(crate) fn next_token(&mut self) -> qiprog_transport::BulkToken {
        let token = qiprog_transport::BulkToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        token
    }

    /// `ep_in`, the bulk-in endpoint's packet size, as used by the bulk
    /// read algorithm.
    pub(crate) fn ep_in_size(&self) -> usize {
        self.ep_in as usize
    }

    pub(crate) fn ep_out_size(&self) -> usize {
        self.ep_out as usize
    }

    fn control_in(&mut self, req: Request, w_value: u16, w_index: u16, buf: &mut [u8]) -> Result<usize> {
        let handle = self.handle_mut()?;
        self.transport
            .borrow_mut()
            .control_in(handle, req as u8, w_value, w_index, buf, DEFAULT_TIMEOUT_MS)
            .map_err(Error::new)
    }

    fn control_out(&mut self, req: Request, w_value: u16, w_index: u16, buf: &[u8]) -> Result<()> {
        let handle = self.handle_mut()?;
        self.transport
            .borrow_mut()
            .control_out(handle, req as u8, w_value, w_index, buf, DEFAULT_TIMEOUT_MS)
            .map_err(Error::new)
    }

    /// Close this device's transport handle. Idempotent: calling it more
    /// than once (or letting [`Drop`] call it after an explicit `close`)
    /// is a no-op.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("closing device handle");
            self.transport.borrow_mut().close(handle);
        }
    }

    pub fn get_capabilities(&mut self) -> Result<Capabilities> {
        let mut buf = [0u8; wire::CAPABILITIES_WIRE_LEN];
        self.control_in(Request::GetCapabilities, 0, 0, &mut buf)?;
        Ok(wire::unpack_capabilities(&buf))
    }

    pub fn set_bus(&mut self, bus: Bus) -> Result<()> {
        if bus.is_empty() {
            return Err(Error::new(ErrorKind::Arg));
        }
        let mask = bus.bits();
        self.control_out(Request::SetBus, (mask >> 16) as u16, (mask & 0xFFFF) as u16, &[])
    }

    pub fn set_clock(&mut self, clock_khz: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        wire::put_u32(clock_khz, &mut buf);
        self.control_out(Request::SetClock, 0, 0, &buf)
    }

    pub fn read_chip_id(&mut self) -> Result<[ChipIdEntry; CHIP_ID_ENTRIES]> {
        let mut buf = [0u8; wire::CHIP_IDS_WIRE_LEN];
        self.control_in(Request::ReadDeviceId, 0, 0, &mut buf)?;
        Ok(wire::unpack_chip_ids(&buf))
    }

    pub fn set_chip_size(&mut self, chip_idx: u8, size: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        wire::put_u32(size, &mut buf);
        self.control_out(Request::SetChipSize, 0, chip_idx as u16, &buf)
    }

    /// Establishes the address window for subsequent `read8/16/32`,
    /// `write8/16/32`, `read_bulk`, and `write_bulk` calls. Resets the
    /// cursor and discards any residual.
    pub fn set_address(&mut self, start: u32, end: u32) -> Result<()> {
        let mut buf = [0u8; wire::ADDRESS_RANGE_WIRE_LEN];
        wire::encode_address(start, end, &mut buf);
        self.control_out(Request::SetAddress, 0, 0, &buf)?;
        debug!("set_address({start:#x}, {end:#x}): cursor reset, residual discarded");
        self.cursor.reset(start, end);
        self.residual.clear();
        Ok(())
    }

    /// Current address window, if one has been established.
    pub fn address_range(&self) -> Option<AddressRange> {
        self.cursor
            .addressed
            .then_some(AddressRange { start: self.cursor.start, end: self.cursor.end })
    }

    pub fn set_erase_size(&mut self, chip_idx: u8, sizes: &[EraseSize]) -> Result<()> {
        if sizes.is_empty() || sizes.len() > MAX_COMMAND_STEPS {
            return Err(Error::new(ErrorKind::Arg));
        }
        let mut buf = [0u8; MAX_COMMAND_STEPS * commands::ERASE_SIZE_ENTRY_LEN];
        let len = sizes.len() * commands::ERASE_SIZE_ENTRY_LEN;
        commands::pack_erase_sizes(sizes, &mut buf[..len]);
        self.control_out(Request::SetEraseSize, 0, chip_idx as u16, &buf[..len])
    }

    pub fn set_erase_command(
        &mut self,
        chip_idx: u8,
        cmd: EraseCmd,
        subcmd: EraseSubcmd,
        flags: u16,
    ) -> Result<()> {
        let mut buf = [0u8; commands::FIXED_COMMAND_LEN];
        buf[0] = cmd.0;
        buf[1] = subcmd.0;
        wire::put_u16(flags, &mut buf[2..4]);
        self.control_out(Request::SetEraseCommand, 0, chip_idx as u16, &buf)
    }

    pub fn set_custom_erase_command(&mut self, chip_idx: u8, steps: &[CommandStep]) -> Result<()> {
        if steps.is_empty() || steps.len() > MAX_COMMAND_STEPS {
            return Err(Error::new(ErrorKind::Arg));
        }
        let len = commands::CUSTOM_COMMAND_HEADER_LEN + steps.len() * commands::COMMAND_STEP_LEN;
        let mut buf = [0u8; commands::CUSTOM_COMMAND_HEADER_LEN
            + MAX_COMMAND_STEPS * commands::COMMAND_STEP_LEN];
        commands::pack_command_steps(steps, &mut buf[..len]);
        self.control_out(Request::SetEraseCommand, 0, chip_idx as u16, &buf[..len])
    }

    pub fn set_write_command(&mut self, chip_idx: u8, cmd: WriteCmd, subcmd: WriteSubcmd) -> Result<()> {
        let mut buf = [0u8; commands::FIXED_COMMAND_LEN];
        buf[0] = cmd.0;
        buf[1] = subcmd.0;
        self.control_out(Request::SetWriteCommand, 0, chip_idx as u16, &buf)
    }

    pub fn set_custom_write_command(&mut self, chip_idx: u8, steps: &[CommandStep]) -> Result<()> {
        if steps.is_empty() || steps.len() > MAX_COMMAND_STEPS {
            return Err(Error::new(ErrorKind::Arg));
        }
        let len = commands::CUSTOM_COMMAND_HEADER_LEN + steps.len() * commands::COMMAND_STEP_LEN;
        let mut buf = [0u8; commands::CUSTOM_COMMAND_HEADER_LEN
            + MAX_COMMAND_STEPS * commands::COMMAND_STEP_LEN];
        commands::pack_command_steps(steps, &mut buf[..len]);
        self.control_out(Request::SetWriteCommand, 0, chip_idx as u16, &buf[..len])
    }

    pub fn set_spi_timing(&mut self, tpu_read_us: u16, tces_ns: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        wire::put_u32(tces_ns, &mut buf);
        self.control_out(Request::SetSpiTiming, tpu_read_us, 0, &buf)
    }

    pub fn read8(&mut self, addr: u32) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.control_in(Request::Read8, (addr >> 16) as u16, (addr & 0xFFFF) as u16, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read16(&mut self, addr: u32) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.control_in(Request::Read16, (addr >> 16) as u16, (addr & 0xFFFF) as u16, &mut buf)?;
        Ok(wire::get_u16(&buf))
    }

    pub fn read32(&mut self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.control_in(Request::Read32, (addr >> 16) as u16, (addr & 0xFFFF) as u16, &mut buf)?;
        Ok(wire::get_u32(&buf))
    }

    pub fn write8(&mut self, addr: u32, val: u8) -> Result<()> {
        self.control_out(Request::Write8, (addr >> 16) as u16, (addr & 0xFFFF) as u16, &[val])
    }

    pub fn write16(&mut self, addr: u32, val: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        wire::put_u16(val, &mut buf);
        self.control_out(Request::Write16, (addr >> 16) as u16, (addr & 0xFFFF) as u16, &buf)
    }

    pub fn write32(&mut self, addr: u32, val: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        wire::put_u32(val, &mut buf);
        self.control_out(Request::Write32, (addr >> 16) as u16, (addr & 0xFFFF) as u16, &buf)
    }

    pub fn set_vdd(&mut self, millivolts: u16) -> Result<()> {
        self.control_out(Request::SetVdd, 0, millivolts, &[])
    }

    pub(crate) fn ep_bulk_in(&self) -> u8 {
        EP_BULK_IN
    }

    pub(crate) fn ep_bulk_out(&self) -> u8 {
        EP_BULK_OUT
    }
}

impl<T: HostTransport> Drop for Device<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockTransport;

    fn open_device() -> Device<MockTransport> {
        let transport = Rc::new(RefCell::new(MockTransport::new(64, 64)));
        let handle = transport.borrow_mut().open_first().unwrap();
        Device::new(transport, handle, 64, 64)
    }

    #[test]
    fn set_bus_rejects_empty_mask() {
        let mut dev = open_device();
        assert_eq!(dev.set_bus(Bus::empty()).unwrap_err().kind(), ErrorKind::Arg);
    }

    #[test]
    fn set_address_resets_cursor_to_start() {
        let mut dev = open_device();
        dev.set_address(0xFFE00000, 0xFFFFFFFF).unwrap();
        assert_eq!(dev.cursor.pread, 0xFFE00000);
        assert_eq!(dev.cursor.pwrite, 0xFFE00000);
        assert_eq!(dev.cursor.start, 0xFFE00000);
        assert_eq!(dev.cursor.end, 0xFFFFFFFF);
    }

    #[test]
    fn set_erase_size_rejects_oversize_list() {
        let mut dev = open_device();
        let sizes = [EraseSize { erase_type: 0, size: 0x1000 }; 13];
        assert_eq!(
            dev.set_erase_size(0, &sizes).unwrap_err().kind(),
            ErrorKind::Arg
        );
        let sizes0: [EraseSize; 0] = [];
        assert_eq!(
            dev.set_erase_size(0, &sizes0).unwrap_err().kind(),
            ErrorKind::Arg
        );
    }

    #[test]
    fn write8_sends_control_frame() {
        let mut dev = open_device();
        dev.write8(0xFFFFFFF0, 0xdb).unwrap();
    }
}
