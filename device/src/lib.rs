// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The programmer-side endpoint of QiProg: the control-request translator,
//! its outbound task ring, and the trait a concrete chip-bus backend
//! implements.
//!
//! `no_std` and allocation-free outside of `#[cfg(test)]`, matching the
//! fixed-buffer, no-retry contract of the wire codec it sits on top of.

#![cfg_attr(not(test), no_std)]

pub mod bus_driver;
pub mod diag;
pub mod task_ring;
pub mod translator;

pub use bus_driver::BusDriver;
pub use diag::{Event as DiagEvent, RingBuf};
pub use task_ring::TaskRing;
pub use translator::Translator;
