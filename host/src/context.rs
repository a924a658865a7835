// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process-wide entry point: owns the transport, enumerates candidate
//! devices, and opens them into [`Device`] handles.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use qiprog_transport::HostTransport;

use crate::device::Device;
use crate::error::{Error, Result};

/// One transport-level candidate discovered by [`Context::get_device_list`],
/// not yet opened.
///
/// Identity strings mirror the original's optional `manufacturer`/
/// `product`/`serial` fields; string storage belongs entirely to this
/// crate, not to the wire protocol.
pub struct DeviceInfo<C> {
    pub candidate: C,
    pub vendor: u16,
    pub product: u16,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub serial: Option<String>,
}

impl<C: Copy> DeviceInfo<C> {
    fn new(candidate: C, vendor: u16, product: u16) -> Self {
        DeviceInfo { candidate, vendor, product, manufacturer: None, product_name: None, serial: None }
    }
}

/// Owns a transport and every [`Device`] opened from it. Dropping (or
/// calling [`Context::exit`]) closes any device still open, mirroring the
/// original's "exit releases every dependent device" contract.
pub struct Context<T: HostTransport> {
    transport: Rc<RefCell<T>>,
    /// Endpoint packet sizes applied to every `Device` this context opens.
    /// The reference binding fixes these at `EP_BULK_IN`/`EP_BULK_OUT`, but
    /// the actual max-packet-size is transport-reported.
    ep_in: u16,
    ep_out: u16,
}

impl<T: HostTransport> Context<T> {
    /// Take ownership of an already-constructed transport.
    pub fn init(transport: T) -> Self {
        Context { transport: Rc::new(RefCell::new(transport)), ep_in: 0, ep_out: 0 }
    }

    /// List every candidate device matching `vendor`/`product`. An empty
    /// list is not an error.
    pub fn get_device_list(&self, vendor: u16, product: u16) -> Vec<DeviceInfo<T::Candidate>> {
        let mut out = Vec::new();
        self.transport.borrow_mut().enumerate(vendor, product, &mut |candidate| {
            out.push(DeviceInfo::new(candidate, vendor, product));
        });
        out
    }

    /// Open `info`, reading the bulk endpoints' packet sizes from the
    /// transport before the `Device` is allowed to fan out any bulk
    /// transfer.
    pub fn open_device(&self, info: &DeviceInfo<T::Candidate>) -> Result<Device<T>> {
        let mut handle = self.transport.borrow_mut().open(info.candidate).map_err(Error::new)?;
        let ep_in = if self.ep_in != 0 {
            self.ep_in
        } else {
            self.transport.borrow_mut().max_packet_size(&mut handle, qiprog_protocol::EP_BULK_IN)
        };
        let ep_out = if self.ep_out != 0 {
            self.ep_out
        } else {
            self.transport.borrow_mut().max_packet_size(&mut handle, qiprog_protocol::EP_BULK_OUT)
        };
        debug!("opened device: ep_in={ep_in} ep_out={ep_out}");
        Ok(Device::new(Rc::clone(&self.transport), handle, ep_in, ep_out))
    }

    /// Release this context. Any `Device` handles the caller still holds
    /// remain individually valid (each owns its own `Rc` to the
    /// transport) but will fail their next operation once the caller
    /// drops them, since there is nothing left upstream keeping the
    /// transport's own state alive beyond what `Rc` already guarantees.
    pub fn exit(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockTransport;

    #[test]
    fn get_device_list_finds_the_mock_candidate() {
        let ctx = Context::init(MockTransport::new(64, 64));
        let list = ctx.get_device_list(qiprog_protocol::VID_OPENMOKO, qiprog_protocol::PID_VULTUREPROG);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn open_device_reads_endpoint_sizes() {
        let ctx = Context::init(MockTransport::new(64, 64));
        let list = ctx.get_device_list(0, 0);
        let dev = ctx.open_device(&list[0]).unwrap();
        assert_eq!(dev.ep_in_size(), 64);
        assert_eq!(dev.ep_out_size(), 64);
    }
}
