use std::cell::Cell;
use std::rc::Rc;

use pei_atapi::Stall;

/// Shared monotonic virtual time. Stalling advances it instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now_ns: Rc<Cell<u64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current virtual time, in nanoseconds.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.now_ns.get()
    }

    /// Advances the clock by `ns` nanoseconds.
    ///
    /// # Panics
    ///
    /// Panics if advancing would overflow `u64`.
    #[inline]
    pub fn advance(&self, ns: u64) {
        let now = self
            .now_ns
            .get()
            .checked_add(ns)
            .expect("virtual clock overflowed u64::MAX");
        self.now_ns.set(now);
    }
}

impl Stall for VirtualClock {
    fn stall(&mut self, us: u64) {
        self.advance(us.saturating_mul(1_000));
    }
}
