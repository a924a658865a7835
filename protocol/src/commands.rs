// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed replacements for the reference implementation's variadic
//! erase/write driver entries.
//!
//! The opcode space itself (which byte erases a sector on a given chip) is
//! a property of the flash-chip-model catalog, which is out of scope here;
//! these are open `u8` newtypes rather than closed enums so a caller can
//! name vendor-specific opcodes without this crate knowing about them.

/// An erase-command opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EraseCmd(pub u8);

/// An erase-command sub-opcode (e.g. a second byte some chips require).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EraseSubcmd(pub u8);

/// A write/program-command opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WriteCmd(pub u8);

/// A write/program-command sub-opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WriteSubcmd(pub u8);

/// One entry of a chip's erase-granularity table: a block of `size` bytes
/// erasable by the erase command tagged `erase_type`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EraseSize {
    pub erase_type: u8,
    pub size: u32,
}

/// One step of a custom erase/write command sequence: write `data` to
/// `addr` on the chip's bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandStep {
    pub addr: u32,
    pub data: u8,
}

/// Wire size of one [`EraseSize`] entry: `u8 || u32`.
pub const ERASE_SIZE_ENTRY_LEN: usize = 5;
/// Wire size of one [`CommandStep`] entry: `u32 || u8`.
pub const COMMAND_STEP_LEN: usize = 5;
/// Wire size of the fixed-form `set_erase_command`/`set_write_command`
/// payload: `{cmd, sub, flags}` or `{cmd, sub}` padded to 4 bytes.
pub const FIXED_COMMAND_LEN: usize = 4;
/// Wire size of the header prefixed to a custom command-step sequence:
/// one count byte plus three reserved zero bytes.
pub const CUSTOM_COMMAND_HEADER_LEN: usize = 4;

use crate::wire::{get_u32, put_u32};

/// Pack `sizes` into `dst`, five bytes per entry. `sizes.len()` must be in
/// `1..=12`, checked by the caller before this is reached.
pub fn pack_erase_sizes(sizes: &[EraseSize], dst: &mut [u8]) {
    assert!(dst.len() >= sizes.len() * ERASE_SIZE_ENTRY_LEN);
    for (i, s) in sizes.iter().enumerate() {
        let off = i * ERASE_SIZE_ENTRY_LEN;
        dst[off] = s.erase_type;
        put_u32(s.size, &mut dst[off + 1..off + 5]);
    }
}

/// Unpack a `set_erase_size` payload packed by [`pack_erase_sizes`] into
/// `dst`, five bytes per entry. Returns the number of entries read, which
/// is `min(src.len() / ERASE_SIZE_ENTRY_LEN, dst.len())`.
pub fn unpack_erase_sizes(src: &[u8], dst: &mut [EraseSize]) -> usize {
    let count = (src.len() / ERASE_SIZE_ENTRY_LEN).min(dst.len());
    for (i, slot) in dst.iter_mut().take(count).enumerate() {
        let off = i * ERASE_SIZE_ENTRY_LEN;
        *slot = EraseSize {
            erase_type: src[off],
            size: get_u32(&src[off + 1..off + 5]),
        };
    }
    count
}

/// Pack `steps` into `dst` as a custom command sequence: a 4-byte header
/// (`steps.len()` as `u8`, three reserved zero bytes) followed by five
/// bytes per step.
pub fn pack_command_steps(steps: &[CommandStep], dst: &mut [u8]) {
    assert!(dst.len() >= CUSTOM_COMMAND_HEADER_LEN + steps.len() * COMMAND_STEP_LEN);
    dst[0] = steps.len() as u8;
    dst[1..CUSTOM_COMMAND_HEADER_LEN].fill(0);
    for (i, step) in steps.iter().enumerate() {
        let off = CUSTOM_COMMAND_HEADER_LEN + i * COMMAND_STEP_LEN;
        put_u32(step.addr, &mut dst[off..off + 4]);
        dst[off + 4] = step.data;
    }
}

/// Unpack a custom command-step sequence packed by [`pack_command_steps`].
/// `dst` receives up to `dst.len()` steps; returns the number of steps the
/// header claims (which the caller should cross-check against the actual
/// payload length it received).
pub fn unpack_command_steps(src: &[u8], dst: &mut [CommandStep]) -> usize {
    let count = (src[0] as usize).min(dst.len());
    for (i, slot) in dst.iter_mut().take(count).enumerate() {
        let off = CUSTOM_COMMAND_HEADER_LEN + i * COMMAND_STEP_LEN;
        *slot = CommandStep {
            addr: get_u32(&src[off..off + 4]),
            data: src[off + 4],
        };
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_erase_sizes_round_trips() {
        let sizes = [
            EraseSize { erase_type: 1, size: 0x1000 },
            EraseSize { erase_type: 2, size: 0x10000 },
        ];
        let mut buf = [0u8; 2 * ERASE_SIZE_ENTRY_LEN];
        pack_erase_sizes(&sizes, &mut buf);

        let mut out = [EraseSize { erase_type: 0, size: 0 }; 2];
        let count = unpack_erase_sizes(&buf, &mut out);
        assert_eq!(count, 2);
        assert_eq!(out, sizes);
    }

    #[test]
    fn pack_command_steps_round_trips() {
        let steps = [
            CommandStep { addr: 0x1000, data: 0xAA },
            CommandStep { addr: 0x2000, data: 0x55 },
        ];
        let mut buf = [0u8; CUSTOM_COMMAND_HEADER_LEN + 2 * COMMAND_STEP_LEN];
        pack_command_steps(&steps, &mut buf);
        assert_eq!(buf[0], 2);

        let mut out = [CommandStep { addr: 0, data: 0 }; 2];
        let count = unpack_command_steps(&buf, &mut out);
        assert_eq!(count, 2);
        assert_eq!(out, steps);
    }
}
