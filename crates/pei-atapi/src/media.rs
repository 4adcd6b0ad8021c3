//! Media presence and capacity detection.

use tracing::{debug, warn};

use crate::block_io::{BlockDeviceType, DeviceInfo};
use crate::packet::{
    CapacityDescriptor, FormatCapacityData, PacketCommand, ReadCapacityData,
    FORMAT_CAPACITY_DATA_LEN, READ_CAPACITY_DATA_LEN,
};
use crate::regs::DevicePosition;
use crate::sense::{
    drive_readiness, is_device_state_unclear, is_media_error, is_no_media, DriveReadiness,
};
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

/// CD-ROM user data block.
pub const CD_ROM_BLOCK_SIZE: u32 = 0x800;
/// LS-120 / direct-access block.
pub const LS120_BLOCK_SIZE: u32 = 0x200;

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    pub fn test_unit_ready(&mut self, position: DevicePosition) -> Result<()> {
        let timeout = self.config.atapi_timeout_ms;
        self.packet_command_in(position, &PacketCommand::TestUnitReady, None, timeout)
    }

    /// Query the capacity and record it in `device`.
    ///
    /// An LS-120 reporting a "no media" descriptor is not an error: the device is marked empty.
    pub fn read_capacity(&mut self, device: &mut DeviceInfo) -> Result<()> {
        let position = device.position();
        let timeout = self.config.atapi_timeout_ms;

        match device.media().device_type {
            BlockDeviceType::IdeCdRom => {
                let mut raw = [0u8; READ_CAPACITY_DATA_LEN];
                let packet = PacketCommand::ReadCapacity;
                self.packet_command_in(position, &packet, Some(&mut raw), timeout)?;
                let cap = ReadCapacityData::parse(&raw).ok_or(AtapiError::DeviceError)?;
                debug!(
                    %position,
                    last_lba = cap.last_lba,
                    block_length = cap.block_length,
                    "capacity"
                );
                device.set_media_present(u64::from(cap.last_lba), CD_ROM_BLOCK_SIZE, true);
            }
            BlockDeviceType::IdeLs120 => {
                let mut raw = [0u8; FORMAT_CAPACITY_DATA_LEN];
                let packet = PacketCommand::ReadFormatCapacities {
                    allocation_length: FORMAT_CAPACITY_DATA_LEN as u16,
                };
                self.packet_command_in(position, &packet, Some(&mut raw), timeout)?;
                let cap = FormatCapacityData::parse(&raw).ok_or(AtapiError::DeviceError)?;
                debug!(
                    %position,
                    blocks = cap.block_count,
                    descriptor = ?cap.descriptor,
                    "format capacity"
                );

                let last_block = cap.block_count.checked_sub(1);
                match (cap.descriptor, last_block) {
                    (CapacityDescriptor::NoMedia, _) | (_, None) => device.set_no_media(),
                    (_, Some(last)) => {
                        device.set_media_present(u64::from(last), LS120_BLOCK_SIZE, false)
                    }
                }
            }
        }
        Ok(())
    }

    /// Refresh presence, last block and block size of `device`.
    ///
    /// Wakes the drive with TEST UNIT READY (resetting a device that does not answer), drains
    /// sense data until the device state settles, then reads the capacity with a bounded retry
    /// budget. An empty drive is not an error.
    pub fn detect_media(&mut self, device: &mut DeviceInfo) -> Result<()> {
        let position = device.position();

        for attempt in 0..self.config.test_unit_ready_attempts {
            match self.test_unit_ready(position) {
                Ok(()) => break,
                Err(err) => {
                    debug!(%position, attempt, ?err, "test unit ready failed");
                    let _ = self.reset_escalating(position);
                }
            }
        }

        // Each unclear or empty round is followed by a fresh TEST UNIT READY so the next
        // REQUEST SENSE reports the current state rather than the sense it already cleared.
        let rounds = self.config.request_sense_attempts;
        let mut last_senses = None;
        for round in 1..=rounds {
            match self.request_sense(position) {
                Ok(senses) => {
                    if is_media_error(&senses) {
                        warn!(%position, "media error");
                        return Err(AtapiError::DeviceError);
                    }
                    let settled = !is_device_state_unclear(&senses) && !is_no_media(&senses);
                    last_senses = Some(senses);
                    if settled {
                        break;
                    }
                }
                Err(err) => debug!(%position, round, ?err, "request sense failed"),
            }
            if round < rounds {
                if let Err(err) = self.test_unit_ready(position) {
                    debug!(%position, round, ?err, "test unit ready between sense rounds failed");
                }
            }
        }
        if last_senses.as_deref().is_some_and(is_no_media) {
            debug!(%position, "no media");
            device.set_no_media();
            return Ok(());
        }

        let max_attempts = self.config.read_capacity_max_attempts;
        let mut budget = 1u32.min(max_attempts);
        let mut attempt = 0u32;
        while attempt < budget {
            attempt += 1;
            let result = self.read_capacity(device);
            self.stall_us(self.config.retry_interval_us);
            if result.is_ok() {
                return Ok(());
            }

            match self.request_sense(position) {
                Ok(senses) => {
                    if is_no_media(&senses) {
                        device.set_no_media();
                        return Ok(());
                    }
                    if is_media_error(&senses) {
                        warn!(%position, "media error while reading capacity");
                        return Err(AtapiError::DeviceError);
                    }
                    if let DriveReadiness::NotReady { need_retry: false } = drive_readiness(&senses)
                    {
                        warn!(%position, "drive not ready");
                        return Err(AtapiError::DeviceError);
                    }
                }
                Err(err) => {
                    debug!(%position, ?err, "sense unavailable; resetting");
                    let _ = self.reset_escalating(position);
                }
            }
            budget = (budget + 1).min(max_attempts);
        }

        warn!(%position, attempts = attempt, "capacity never became available");
        Err(AtapiError::DeviceError)
    }
}
