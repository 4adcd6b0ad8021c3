use std::time::Duration;

/// Interval between two status samples in the poll primitives.
pub const POLL_INTERVAL_US: u64 = 250;
/// Delay after each packet word written to the Data register.
pub const PACKET_WORD_DELAY_US: u64 = 10;
/// Delay between writing and reading back the SectorCount pattern.
pub const SECTOR_COUNT_ECHO_DELAY_US: u64 = 10_000;
/// Width of the SRST pulse of a hard reset.
pub const SRST_PULSE_US: u64 = 10;

/// Busy-wait delay primitive.
pub trait Stall {
    fn stall(&mut self, us: u64);
}

impl<T: Stall + ?Sized> Stall for &mut T {
    fn stall(&mut self, us: u64) {
        (**self).stall(us)
    }
}

/// [`Stall`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadStall;

impl Stall for ThreadStall {
    fn stall(&mut self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }
}
