//! Slot store backends.

pub mod filesystem;
