// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endian-safe pack/unpack of QiProg wire primitives.
//!
//! Every payload defined here fits in the 64-byte scratch buffer shared by
//! both sides of the protocol; nothing in this module allocates. Misuse
//! (wrong slice length) is a programming bug and is asserted against rather
//! than reported as a runtime error, matching the "no dynamic allocation,
//! no recoverable errors" contract of the reference wire codec.

/// Read a little-endian `u16` from the first two bytes of `src`.
pub fn get_u16(src: &[u8]) -> u16 {
    u16::from_le_bytes([src[0], src[1]])
}

/// Read a little-endian `u32` from the first four bytes of `src`.
pub fn get_u32(src: &[u8]) -> u32 {
    u32::from_le_bytes([src[0], src[1], src[2], src[3]])
}

/// Write `val` into the first two bytes of `dst` as little-endian.
pub fn put_u16(val: u16, dst: &mut [u8]) {
    dst[..2].copy_from_slice(&val.to_le_bytes());
}

/// Write `val` into the first four bytes of `dst` as little-endian.
pub fn put_u32(val: u32, dst: &mut [u8]) {
    dst[..4].copy_from_slice(&val.to_le_bytes());
}

/// Wire size of a packed [`Capabilities`] struct. The struct's own fields
/// occupy 30 bytes (`u16 + u32 + u32 + 10×u16`); the remaining 2 bytes are
/// reserved and always zero.
pub const CAPABILITIES_WIRE_LEN: usize = 32;

const CAPS_VOLTAGES_OFFSET: usize = 10;
const CAPS_FIELDS_LEN: usize = 30;

/// Device capability set reported by `GET_CAPABILITIES`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Capabilities {
    /// Bitwise OR of supported instruction-set bits. The instruction-set
    /// catalog itself is out of scope for this crate.
    pub instruction_set: u16,
    /// Bitwise OR of [`crate::Bus`] bits the device can master.
    pub bus_master: u32,
    /// Largest single control-transfer payload the device can absorb
    /// directly (as opposed to through the bulk pipe).
    pub max_direct_data: u32,
    /// Supported chip voltages in millivolts, zero-terminated (or fully
    /// populated with 10 non-zero entries).
    pub voltages: [u16; 10],
}

/// Pack `caps` into `dst[0..32]` in wire order: `instruction_set`,
/// `bus_master`, `max_direct_data`, `voltages[0..10]`, then two zero
/// reserved bytes.
pub fn pack_capabilities(caps: &Capabilities, dst: &mut [u8]) {
    assert!(dst.len() >= CAPABILITIES_WIRE_LEN);
    put_u16(caps.instruction_set, &mut dst[0..2]);
    put_u32(caps.bus_master, &mut dst[2..6]);
    put_u32(caps.max_direct_data, &mut dst[6..10]);
    for (i, v) in caps.voltages.iter().enumerate() {
        let off = CAPS_VOLTAGES_OFFSET + i * 2;
        put_u16(*v, &mut dst[off..off + 2]);
    }
    dst[CAPS_FIELDS_LEN..CAPABILITIES_WIRE_LEN].fill(0);
}

/// Unpack `src[0..32]` into a [`Capabilities`]. The two reserved trailing
/// bytes are ignored on unpack.
pub fn unpack_capabilities(src: &[u8]) -> Capabilities {
    assert!(src.len() >= CAPABILITIES_WIRE_LEN);
    let mut voltages = [0u16; 10];
    for (i, v) in voltages.iter_mut().enumerate() {
        let off = CAPS_VOLTAGES_OFFSET + i * 2;
        *v = get_u16(&src[off..off + 2]);
    }
    Capabilities {
        instruction_set: get_u16(&src[0..2]),
        bus_master: get_u32(&src[2..6]),
        max_direct_data: get_u32(&src[6..10]),
        voltages,
    }
}

/// Number of chip-identity slots carried by `READ_DEVICE_ID`.
pub const CHIP_ID_ENTRIES: usize = 9;
/// Wire size of a single [`ChipIdEntry`]: `u8 || u16 || u32`.
pub const CHIP_ID_ENTRY_LEN: usize = 7;
/// Wire size of the full `READ_DEVICE_ID` reply.
pub const CHIP_IDS_WIRE_LEN: usize = CHIP_ID_ENTRIES * CHIP_ID_ENTRY_LEN;

/// One entry of the `READ_DEVICE_ID` reply. `id_method == 0` is the
/// sentinel that terminates the meaningful prefix of the array.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct ChipIdEntry {
    pub id_method: u8,
    pub vendor_id: u16,
    pub device_id: u32,
}

impl ChipIdEntry {
    /// The sentinel entry that terminates a chip-identity array.
    pub const NONE: ChipIdEntry = ChipIdEntry {
        id_method: 0,
        vendor_id: 0,
        device_id: 0,
    };
}

/// Pack `ids` into `dst[0..63]`, seven bytes per entry.
pub fn pack_chip_ids(ids: &[ChipIdEntry; CHIP_ID_ENTRIES], dst: &mut [u8]) {
    assert!(dst.len() >= CHIP_IDS_WIRE_LEN);
    for (i, id) in ids.iter().enumerate() {
        let off = i * CHIP_ID_ENTRY_LEN;
        dst[off] = id.id_method;
        put_u16(id.vendor_id, &mut dst[off + 1..off + 3]);
        put_u32(id.device_id, &mut dst[off + 3..off + 7]);
    }
}

/// Unpack `src[0..63]` into an array of nine [`ChipIdEntry`].
pub fn unpack_chip_ids(src: &[u8]) -> [ChipIdEntry; CHIP_ID_ENTRIES] {
    assert!(src.len() >= CHIP_IDS_WIRE_LEN);
    core::array::from_fn(|i| {
        let off = i * CHIP_ID_ENTRY_LEN;
        ChipIdEntry {
            id_method: src[off],
            vendor_id: get_u16(&src[off + 1..off + 3]),
            device_id: get_u32(&src[off + 3..off + 7]),
        }
    })
}

/// An inclusive 32-bit address window, as established by `SET_ADDRESS`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AddressRange {
    pub start: u32,
    pub end: u32,
}

/// Wire size of a [`AddressRange`]: two little-endian `u32`s.
pub const ADDRESS_RANGE_WIRE_LEN: usize = 8;

/// Encode `{start, end}` into `dst[0..8]`.
pub fn encode_address(start: u32, end: u32, dst: &mut [u8]) {
    assert!(dst.len() >= ADDRESS_RANGE_WIRE_LEN);
    put_u32(start, &mut dst[0..4]);
    put_u32(end, &mut dst[4..8]);
}

/// Decode `src[0..8]` into `{start, end}`.
pub fn decode_address(src: &[u8]) -> AddressRange {
    assert!(src.len() >= ADDRESS_RANGE_WIRE_LEN);
    AddressRange {
        start: get_u32(&src[0..4]),
        end: get_u32(&src[4..8]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn endian_example() {
        let mut buf = [0u8; 4];
        put_u32(0xDEADBEEF, &mut buf);
        assert_eq!(buf, [0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn capability_round_trip_example() {
        // scenario 1 from the testable-properties list: instruction_set=1,
        // bus_master=0x0F, max_direct_data=0x40, voltages=[1280, 800, 0...]
        let mut bytes = [0u8; CAPABILITIES_WIRE_LEN];
        bytes[0..2].copy_from_slice(&[0x01, 0x00]);
        bytes[2..6].copy_from_slice(&[0x0F, 0x00, 0x00, 0x00]);
        bytes[6..10].copy_from_slice(&[0x40, 0x00, 0x00, 0x00]);
        bytes[10..12].copy_from_slice(&[0x00, 0x05]);
        bytes[12..14].copy_from_slice(&[0x20, 0x03]);
        // voltages[2..10] and the two reserved trailing bytes are zero.

        let caps = unpack_capabilities(&bytes);
        assert_eq!(caps.instruction_set, 1);
        assert_eq!(caps.bus_master, 0x0F);
        assert_eq!(caps.max_direct_data, 0x40);
        assert_eq!(caps.voltages[0], 1280);
        assert_eq!(caps.voltages[1], 800);
        assert_eq!(caps.voltages[2], 0);

        let mut repacked = [0u8; CAPABILITIES_WIRE_LEN];
        pack_capabilities(&caps, &mut repacked);
        assert_eq!(repacked, bytes);
    }

    #[test]
    fn chip_id_sentinel_terminates() {
        let ids = [ChipIdEntry::NONE; CHIP_ID_ENTRIES];
        let mut buf = [0u8; CHIP_IDS_WIRE_LEN];
        pack_chip_ids(&ids, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn u16_round_trips(v: u16) {
            let mut buf = [0u8; 2];
            put_u16(v, &mut buf);
            prop_assert_eq!(get_u16(&buf), v);
        }

        #[test]
        fn u32_round_trips(v: u32) {
            let mut buf = [0u8; 4];
            put_u32(v, &mut buf);
            prop_assert_eq!(get_u32(&buf), v);
        }

        #[test]
        fn capabilities_round_trip(
            instruction_set: u16,
            bus_master: u32,
            max_direct_data: u32,
            voltages in proptest::array::uniform10(any::<u16>()),
        ) {
            let caps = Capabilities { instruction_set, bus_master, max_direct_data, voltages };
            let mut buf = [0u8; CAPABILITIES_WIRE_LEN];
            pack_capabilities(&caps, &mut buf);
            prop_assert_eq!(unpack_capabilities(&buf), caps);
        }

        #[test]
        fn address_round_trip(start: u32, end: u32) {
            let mut buf = [0u8; ADDRESS_RANGE_WIRE_LEN];
            encode_address(start, end, &mut buf);
            let decoded = decode_address(&buf);
            prop_assert_eq!(decoded, AddressRange { start, end });
        }
    }
}
