//! Bounded busy-wait helpers over the Status / AltStatus registers.

use crate::regs::{AtaErrorReg, AtaStatus, ChannelRegisters};
use crate::time::POLL_INTERVAL_US;
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

/// Number of status samples taken for a `timeout_ms` wait. Never zero.
pub const fn poll_budget(timeout_ms: u64) -> u64 {
    timeout_ms.saturating_mul(1_000 / POLL_INTERVAL_US).saturating_add(1)
}

#[derive(Debug, Clone, Copy)]
enum StatusSource {
    Status,
    AltStatus,
}

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    fn poll_status(
        &mut self,
        regs: &ChannelRegisters,
        source: StatusSource,
        timeout_ms: u64,
        check_abort: bool,
        done: impl Fn(AtaStatus) -> bool,
    ) -> Result<()> {
        let port = match source {
            StatusSource::Status => regs.status_command,
            StatusSource::AltStatus => regs.alt_status_device_control,
        };
        for _ in 0..poll_budget(timeout_ms) {
            let status = AtaStatus::from_bits_retain(self.read_reg(port));
            if done(status) {
                return Ok(());
            }
            if check_abort && status & (AtaStatus::BSY | AtaStatus::ERR) == AtaStatus::ERR {
                let error = AtaErrorReg::from_bits_retain(self.read_reg(regs.error_features));
                if error.contains(AtaErrorReg::ABRT) {
                    return Err(AtapiError::Aborted);
                }
            }
            self.stall_us(POLL_INTERVAL_US);
        }
        Err(AtapiError::Timeout)
    }

    /// Wait for BSY to clear. No abort check.
    pub fn wait_for_bsy_clear(&mut self, regs: &ChannelRegisters, timeout_ms: u64) -> Result<()> {
        self.poll_status(regs, StatusSource::Status, timeout_ms, false, |s| {
            !s.contains(AtaStatus::BSY)
        })
    }

    pub fn drdy_ready(&mut self, regs: &ChannelRegisters, timeout_ms: u64) -> Result<()> {
        self.poll_status(regs, StatusSource::Status, timeout_ms, true, |s| {
            s & (AtaStatus::BSY | AtaStatus::DRDY) == AtaStatus::DRDY
        })
    }

    pub fn drq_ready(&mut self, regs: &ChannelRegisters, timeout_ms: u64) -> Result<()> {
        self.poll_status(regs, StatusSource::Status, timeout_ms, true, drq_set)
    }

    /// Like [`Self::drq_ready`] but samples AltStatus, leaving a pending interrupt untouched.
    pub fn drq_ready2(&mut self, regs: &ChannelRegisters, timeout_ms: u64) -> Result<()> {
        self.poll_status(regs, StatusSource::AltStatus, timeout_ms, true, drq_set)
    }

    pub fn drq_clear(&mut self, regs: &ChannelRegisters, timeout_ms: u64) -> Result<()> {
        self.poll_status(regs, StatusSource::Status, timeout_ms, true, drq_released)
    }

    pub fn drq_clear2(&mut self, regs: &ChannelRegisters, timeout_ms: u64) -> Result<()> {
        self.poll_status(regs, StatusSource::AltStatus, timeout_ms, true, drq_released)
    }
}

fn drq_set(status: AtaStatus) -> bool {
    status & (AtaStatus::BSY | AtaStatus::DRQ) == AtaStatus::DRQ
}

fn drq_released(status: AtaStatus) -> bool {
    !status.intersects(AtaStatus::BSY | AtaStatus::DRQ)
}
