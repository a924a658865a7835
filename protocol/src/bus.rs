// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus bitmask shared between `get_capabilities`'s `bus_master` field and
//! `set_bus`'s argument.

use bitflags::bitflags;

bitflags! {
    /// Electrical buses a programmer (or a single internal driver) can
    /// speak to a chip over. Multiple bits may be set in `bus_master`; a
    /// `set_bus` call selects exactly one.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Bus: u32 {
        const ISA = 1 << 0;
        const LPC = 1 << 1;
        const FWH = 1 << 2;
        const SPI = 1 << 3;
        const BDM17 = 1 << 4;
        const BDM35 = 1 << 5;
        const AUD = 1 << 6;
    }
}
