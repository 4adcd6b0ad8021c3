//! Port-level IDE channel and device models for exercising `pei-atapi` without hardware.
//!
//! An [`IoPortBus`] dispatches port accesses to [`IdeChannel`]s, which host ATAPI drives
//! ([`AtapiDrive`]) and fixed disks ([`AtaDisk`]). Delays go through a [`VirtualClock`] so reset
//! and retry timing costs nothing in wall time.

mod atapi;
mod channel;
mod clock;
mod controller;
mod disk;
mod io;

pub use atapi::{block_pattern, expected_blocks, AtapiDrive, DriveKind, PacketResult, Sense};
pub use channel::{
    register_ide_channel, IdeChannel, IdeChannelPort, IdeDevice, SharedIdeChannel, RESET_BUSY_NS,
};
pub use clock::VirtualClock;
pub use controller::SimAtaController;
pub use disk::AtaDisk;
pub use io::{AccessCounter, IoPortBus, PortIoDevice};
