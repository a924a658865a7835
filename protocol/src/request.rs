// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `bRequest` codes carried by QiProg control transfers.

/// The numeric `bRequest` values of the QiProg wire protocol. Unknown codes
/// must be treated by a device translator as a protocol error (the host
/// sees a STALL).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Request {
    GetCapabilities = 0x00,
    SetBus = 0x01,
    SetClock = 0x02,
    ReadDeviceId = 0x03,
    SetAddress = 0x04,
    SetEraseSize = 0x05,
    SetEraseCommand = 0x06,
    SetWriteCommand = 0x07,
    SetChipSize = 0x08,
    SetSpiTiming = 0x20,
    Read8 = 0x30,
    Read16 = 0x31,
    Read32 = 0x32,
    Write8 = 0x33,
    Write16 = 0x34,
    Write32 = 0x35,
    SetVdd = 0xF0,
}

impl Request {
    /// Recover a [`Request`] from its wire `bRequest` byte, if it names one.
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::GetCapabilities,
            0x01 => Self::SetBus,
            0x02 => Self::SetClock,
            0x03 => Self::ReadDeviceId,
            0x04 => Self::SetAddress,
            0x05 => Self::SetEraseSize,
            0x06 => Self::SetEraseCommand,
            0x07 => Self::SetWriteCommand,
            0x08 => Self::SetChipSize,
            0x20 => Self::SetSpiTiming,
            0x30 => Self::Read8,
            0x31 => Self::Read16,
            0x32 => Self::Read32,
            0x33 => Self::Write8,
            0x34 => Self::Write16,
            0x35 => Self::Write32,
            0xF0 => Self::SetVdd,
            _ => return None,
        })
    }
}

/// `bmRequestType` direction bit values used by the reference binding.
pub const REQTYPE_IN: u8 = 0xC0;
pub const REQTYPE_OUT: u8 = 0x40;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_code() {
        let all = [
            Request::GetCapabilities,
            Request::SetBus,
            Request::SetClock,
            Request::ReadDeviceId,
            Request::SetAddress,
            Request::SetEraseSize,
            Request::SetEraseCommand,
            Request::SetWriteCommand,
            Request::SetChipSize,
            Request::SetSpiTiming,
            Request::Read8,
            Request::Read16,
            Request::Read32,
            Request::Write8,
            Request::Write16,
            Request::Write32,
            Request::SetVdd,
        ];
        for req in all {
            assert_eq!(Request::from_u8(req as u8), Some(req));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(Request::from_u8(0x09), None);
        assert_eq!(Request::from_u8(0xFF), None);
    }
}
