//! ATA taskfile commands: identification, controller detection, resets and error checks.

use tracing::{debug, warn};

use crate::packet::PacketCommand;
use crate::regs::{AtaErrorReg, AtaStatus, DeviceControl, DevicePosition, HEAD_SELECT_ATA};
use crate::time::{SECTOR_COUNT_ECHO_DELAY_US, SRST_PULSE_US};
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

pub const ATA_CMD_DEVICE_RESET: u8 = 0x08;
pub const ATA_CMD_PACKET: u8 = 0xA0;
pub const ATA_CMD_IDENTIFY_PACKET_DEVICE: u8 = 0xA1;
pub const ATA_CMD_CHECK_POWER_MODE: u8 = 0xE5;
pub const ATA_CMD_IDENTIFY_DEVICE: u8 = 0xEC;

/// SectorCount pattern written back during controller detection.
const SECTOR_COUNT_PATTERN: u8 = 0x55;

/// The 256-word IDENTIFY (PACKET) DEVICE reply.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentifyData {
    words: [u16; IdentifyData::WORDS],
}

impl IdentifyData {
    pub const WORDS: usize = 256;

    pub fn from_words(words: [u16; Self::WORDS]) -> Self {
        Self { words }
    }

    pub fn general_configuration(&self) -> u16 {
        self.words[0]
    }

    /// Word 0 bits 15..14 == 10b mark a packet device.
    pub fn is_atapi(&self) -> bool {
        self.general_configuration() & 0xC000 == 0x8000
    }

    pub fn model_number(&self) -> String {
        ata_string(&self.words[27..47])
    }
}

impl std::fmt::Debug for IdentifyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyData")
            .field("general_configuration", &format_args!("{:#06x}", self.general_configuration()))
            .field("model", &self.model_number())
            .finish()
    }
}

/// ATA strings store two characters per word, first character in the high byte.
fn ata_string(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    String::from_utf8_lossy(&bytes)
        .trim_end_matches([' ', '\0'])
        .trim_start()
        .to_string()
}

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    /// Issue IDENTIFY DEVICE or IDENTIFY PACKET DEVICE and collect the 256-word reply.
    pub fn identify(&mut self, position: DevicePosition, command: u8) -> Result<IdentifyData> {
        let regs = self.registers(position)?;
        let timeout = self.config.ata_timeout_ms;

        self.write_reg(regs.head, position.head_select(HEAD_SELECT_ATA));
        self.wait_for_bsy_clear(&regs, timeout)
            .map_err(AtapiError::into_device_error)?;
        self.drq_clear2(&regs, timeout)
            .map_err(AtapiError::into_device_error)?;

        self.write_reg(regs.error_features, 0);
        self.write_reg(regs.sector_count, 0);
        self.write_reg(regs.sector_number, 0);
        self.write_reg(regs.cylinder_lsb, 0);
        self.write_reg(regs.cylinder_msb, 0);
        self.write_reg(regs.status_command, command);

        let mut words = [0u16; IdentifyData::WORDS];
        let mut filled = 0;
        while filled < words.len() {
            if let Err(err) = self.drq_ready2(&regs, timeout) {
                debug!(%position, command, ?err, "identify data phase did not start");
                return Err(AtapiError::DeviceError);
            }
            self.check_error_status(position)?;

            let burst = &mut words[filled..];
            for word in burst.iter_mut() {
                *word = self.read_data(regs.data);
            }
            filled += burst.len();
        }

        if self.drq_clear(&regs, timeout).is_err() {
            self.check_error_status(position)?;
        }
        Ok(IdentifyData::from_words(words))
    }

    /// IDENTIFY PACKET DEVICE. A reply that does not describe a packet device is a
    /// `DeviceError`.
    pub fn atapi_identify(&mut self, position: DevicePosition) -> Result<IdentifyData> {
        let identify = self.identify(position, ATA_CMD_IDENTIFY_PACKET_DEVICE)?;
        if !identify.is_atapi() {
            debug!(%position, ?identify, "not a packet device");
            return Err(AtapiError::DeviceError);
        }
        Ok(identify)
    }

    /// Fail with `DeviceError` when the Status register reports ERR.
    pub fn check_error_status(&mut self, position: DevicePosition) -> Result<()> {
        let regs = self.registers(position)?;
        let status = AtaStatus::from_bits_retain(self.read_reg(regs.status_command));

        if status.contains(AtaStatus::DWF) {
            debug!(%position, ?status, "device write fault");
        }
        if status.contains(AtaStatus::CORR) {
            debug!(%position, ?status, "corrected data");
        }
        if status.contains(AtaStatus::ERR) {
            let error = AtaErrorReg::from_bits_retain(self.read_reg(regs.error_features));
            debug!(%position, ?status, ?error, sense_key = error.sense_key(), "device error");
            return Err(AtapiError::DeviceError);
        }
        Ok(())
    }

    /// CHECK POWER MODE, used as a presence check.
    ///
    /// `Ok` when the device answered with DRDY or echoed a SectorCount write-back,
    /// `Aborted` when it rejected the command, `DeviceError` otherwise.
    pub fn check_power_mode(&mut self, position: DevicePosition) -> Result<()> {
        let regs = self.registers(position)?;
        let head = position.head_select(HEAD_SELECT_ATA);

        self.write_reg(regs.head, head);
        self.write_reg(regs.status_command, ATA_CMD_CHECK_POWER_MODE);
        self.wait_for_bsy_clear(&regs, self.config.detect_timeout_ms)
            .map_err(AtapiError::into_device_error)?;

        let status = AtaStatus::from_bits_retain(self.read_reg(regs.status_command));
        if status.contains(AtaStatus::DRDY) {
            return Ok(());
        }
        if status.contains(AtaStatus::ERR) {
            let error = AtaErrorReg::from_bits_retain(self.read_reg(regs.error_features));
            return if error.contains(AtaErrorReg::ABRT) {
                Err(AtapiError::Aborted)
            } else {
                Err(AtapiError::DeviceError)
            };
        }

        // Some packet devices never raise DRDY. A register that holds what was written to it
        // still proves something is listening.
        let sector_count = self.read_reg(regs.sector_count);
        if matches!(sector_count, 0x00 | 0x80 | 0xFF) {
            self.write_reg(regs.head, head);
            self.write_reg(regs.sector_count, SECTOR_COUNT_PATTERN);
            self.stall_us(SECTOR_COUNT_ECHO_DELAY_US);
            if self.read_reg(regs.sector_count) == SECTOR_COUNT_PATTERN {
                // Slow drives only spin up once they see a packet command.
                let timeout = self.config.atapi_timeout_ms;
                let packet = PacketCommand::TestUnitReady;
                if let Err(err) = self.packet_command_in(position, &packet, None, timeout) {
                    debug!(%position, ?err, "wake-up test unit ready failed");
                }
                return Ok(());
            }
        }
        Err(AtapiError::DeviceError)
    }

    /// Whether anything answers at `position`.
    pub fn detect_controller(&mut self, position: DevicePosition) -> bool {
        match self.check_power_mode(position) {
            Ok(()) | Err(AtapiError::Aborted) => true,
            Err(err) => {
                debug!(%position, ?err, "no device");
                false
            }
        }
    }

    /// Soft reset (ATAPI DEVICE RESET) or, with `extensive`, a hard SRST pulse on the channel.
    pub fn reset_device(&mut self, position: DevicePosition, extensive: bool) -> Result<()> {
        let regs = self.registers(position)?;
        let timeout = self.config.reset_timeout_ms;

        if extensive {
            self.write_reg(
                regs.alt_status_device_control,
                (DeviceControl::SRST | DeviceControl::NIEN).bits(),
            );
            self.stall_us(SRST_PULSE_US);
            self.write_reg(regs.alt_status_device_control, DeviceControl::NIEN.bits());
            return self
                .wait_for_bsy_clear(&regs, timeout)
                .map_err(AtapiError::into_device_error);
        }

        self.write_reg(regs.head, position.head_select(HEAD_SELECT_ATA));
        self.write_reg(regs.status_command, ATA_CMD_DEVICE_RESET);
        self.wait_for_bsy_clear(&regs, timeout)
            .map_err(AtapiError::into_device_error)?;
        self.stall_us(self.config.reset_settle_us);
        Ok(())
    }

    /// Soft reset, falling back to a hard reset when the device does not come back.
    pub(crate) fn reset_escalating(&mut self, position: DevicePosition) -> Result<()> {
        if let Err(err) = self.reset_device(position, false) {
            warn!(%position, ?err, "soft reset failed; resetting channel");
            return self.reset_device(position, true);
        }
        Ok(())
    }
}
