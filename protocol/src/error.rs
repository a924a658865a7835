// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The QiProg error taxonomy, shared verbatim by the host and the device.

/// Outcome of a QiProg operation. Every public operation on either side of
/// the protocol returns one of these instead of using exceptions or panics.
///
/// The numeric values match the reference wire/ABI values exactly; they are
/// part of the protocol, not an implementation detail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum ErrorKind {
    /// Generic failure with no more specific cause.
    Generic = -1,
    /// Allocation failed. The `no_std` side of this protocol never
    /// allocates, so this is produced only by the host crate's transport
    /// glue (e.g. a failed `Vec` growth).
    Malloc = -2,
    /// A null handle, an invalid enum value, or an oversized variadic
    /// argument list (erase/write command steps beyond
    /// [`crate::MAX_COMMAND_STEPS`]).
    Arg = -3,
    /// The transport did not complete the operation within its timeout.
    Timeout = -4,
    /// The target chip did not respond within its expected window.
    ChipTimeout = -20,
    /// The target chip never responded.
    NoResponse = -21,
}

impl ErrorKind {
    /// Recover an [`ErrorKind`] from its wire value, if it names one.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            -1 => Some(Self::Generic),
            -2 => Some(Self::Malloc),
            -3 => Some(Self::Arg),
            -4 => Some(Self::Timeout),
            -20 => Some(Self::ChipTimeout),
            -21 => Some(Self::NoResponse),
            _ => None,
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Generic => "generic QiProg error",
            Self::Malloc => "allocation failed",
            Self::Arg => "invalid argument",
            Self::Timeout => "transport timeout",
            Self::ChipTimeout => "chip did not respond in time",
            Self::NoResponse => "chip never responded",
        };
        f.write_str(s)
    }
}

/// `SUCCESS` is represented as `Ok(())`/`Ok(value)` everywhere in this
/// workspace rather than as a variant of [`ErrorKind`], which is the
/// idiomatic Rust rendering of the reference `QIPROG_SUCCESS == 0` /
/// negative-error convention.
pub type Result<T> = core::result::Result<T, ErrorKind>;
