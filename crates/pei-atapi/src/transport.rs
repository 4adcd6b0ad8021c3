//! ATAPI PACKET command with PIO data-in.

use tracing::debug;

use crate::ata::ATA_CMD_PACKET;
use crate::packet::PacketCommand;
use crate::regs::{AtaStatus, DeviceControl, DevicePosition, HEAD_SELECT_PACKET};
use crate::time::PACKET_WORD_DELAY_US;
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

/// Largest byte count the host offers per DRQ burst.
const MAX_BYTE_COUNT: u16 = 0xFFFE;

/// Words of the fixed sense header that precede the additional sense bytes.
const SENSE_HEADER_WORDS: usize = 4;

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    /// Send `packet` to the device at `position` and read its reply into `buffer`.
    ///
    /// The device picks the size of each DRQ burst; the host stops storing once `buffer` is
    /// full. Poll failures surface as [`AtapiError::DeviceError`].
    pub fn packet_command_in(
        &mut self,
        position: DevicePosition,
        packet: &PacketCommand,
        buffer: Option<&mut [u8]>,
        timeout_ms: u64,
    ) -> Result<()> {
        self.packet_command_in_inner(position, packet, buffer, timeout_ms)
            .map_err(|err| {
                debug!(%position, opcode = packet.opcode(), ?err, "packet command failed");
                err.into_device_error()
            })
    }

    fn packet_command_in_inner(
        &mut self,
        position: DevicePosition,
        packet: &PacketCommand,
        buffer: Option<&mut [u8]>,
        timeout_ms: u64,
    ) -> Result<()> {
        let regs = self.registers(position)?;

        self.drq_clear2(&regs, timeout_ms)?;

        self.write_reg(regs.head, position.head_select(HEAD_SELECT_PACKET));
        self.write_reg(regs.error_features, 0);
        let [lsb, msb] = MAX_BYTE_COUNT.to_le_bytes();
        self.write_reg(regs.cylinder_lsb, lsb);
        self.write_reg(regs.cylinder_msb, msb);
        self.write_reg(
            regs.alt_status_device_control,
            (DeviceControl::HD15 | DeviceControl::NIEN).bits(),
        );
        self.write_reg(regs.status_command, ATA_CMD_PACKET);

        self.drq_ready(&regs, timeout_ms)?;
        for word in packet.to_words() {
            self.write_data(regs.data, word);
            self.stall_us(PACKET_WORD_DELAY_US);
        }

        let status = AtaStatus::from_bits_retain(self.read_reg(regs.status_command));
        if status.contains(AtaStatus::ERR) {
            self.stall_us(self.config.error_recovery_us);
            return Err(AtapiError::DeviceError);
        }

        let Some(buffer) = buffer else {
            return Ok(());
        };
        if buffer.is_empty() {
            return Ok(());
        }

        let is_request_sense = matches!(packet, PacketCommand::RequestSense { .. });
        let mut required = buffer.len().div_ceil(2);
        let mut received = 0usize;

        while received < required {
            self.drq_ready2(&regs, timeout_ms)?;

            // Reading Status acknowledges the device's interrupt for this burst.
            let _ = self.read_reg(regs.status_command);

            let lsb = self.read_reg(regs.cylinder_lsb);
            let msb = self.read_reg(regs.cylinder_msb);
            let burst_words = usize::from(u16::from_le_bytes([lsb, msb]) / 2);
            if burst_words == 0 {
                debug!(%position, "device requested an empty data burst");
                return Err(AtapiError::DeviceError);
            }

            let take = burst_words.min(required - received);
            for _ in 0..take {
                let word = self.read_data(regs.data).to_le_bytes();
                store_word(buffer, received, word);
                received += 1;
            }

            if is_request_sense && received >= SENSE_HEADER_WORDS {
                let additional = usize::from(buffer.get(7).copied().unwrap_or(0));
                required = required.min(SENSE_HEADER_WORDS + additional / 2);
            }
        }

        self.drq_clear2(&regs, timeout_ms)?;
        self.check_error_status(position)
    }
}

fn store_word(buffer: &mut [u8], word_index: usize, word: [u8; 2]) {
    let offset = word_index * 2;
    match buffer.get_mut(offset..offset + 2) {
        Some(dst) => dst.copy_from_slice(&word),
        None => {
            if let Some(last) = buffer.get_mut(offset) {
                *last = word[0];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::IdeRegsBaseAddr;
    use crate::test_util::{CountingStall, ScriptedIo};
    use crate::AtapiConfig;

    fn bus(io: ScriptedIo) -> IdeBus<ScriptedIo, CountingStall> {
        let mut bus = IdeBus::new(io, CountingStall::default(), AtapiConfig::default());
        bus.attach_channel(
            0,
            IdeRegsBaseAddr {
                command_block_base: 0x1F0,
                control_block_base: 0x3F6,
            },
        )
        .unwrap();
        bus
    }

    fn master() -> DevicePosition {
        DevicePosition::from_parts(0, 0).unwrap()
    }

    #[test]
    fn test_unit_ready_programs_taskfile_and_sends_six_words() {
        let mut io = ScriptedIo::default();
        io.set(0x3F6, 0x00);
        io.queue(0x1F7, &[0x58]);
        io.set(0x1F7, 0x50);
        let mut bus = bus(io);

        bus.packet_command_in(master(), &PacketCommand::TestUnitReady, None, 100)
            .unwrap();

        assert_eq!(bus.io.writes_to(0x1F6), vec![0xA0]);
        assert_eq!(bus.io.writes_to(0x1F1), vec![0x00]);
        assert_eq!(bus.io.writes_to(0x1F4), vec![0xFE]);
        assert_eq!(bus.io.writes_to(0x1F5), vec![0xFF]);
        assert_eq!(bus.io.writes_to(0x3F6), vec![0x0A]);
        assert_eq!(bus.io.writes_to(0x1F7), vec![0xA0]);
        assert_eq!(bus.io.word_writes.len(), 6);
        assert_eq!(bus.stall.total_us, 6 * PACKET_WORD_DELAY_US);
    }

    #[test]
    fn error_after_packet_waits_for_recovery() {
        let mut io = ScriptedIo::default();
        io.set(0x3F6, 0x00);
        io.queue(0x1F7, &[0x58]);
        io.set(0x1F7, 0x51);
        io.set(0x1F1, 0x20);
        let mut bus = bus(io);

        assert_eq!(
            bus.packet_command_in(master(), &PacketCommand::TestUnitReady, None, 100),
            Err(AtapiError::DeviceError)
        );
        assert_eq!(bus.stall.total_us, 6 * PACKET_WORD_DELAY_US + 3_000_000);
    }

    #[test]
    fn aborted_packet_is_device_error() {
        let mut io = ScriptedIo::default();
        io.set(0x3F6, 0x00);
        io.set(0x1F7, 0x41);
        io.set(0x1F1, 0x04);
        let mut bus = bus(io);

        assert_eq!(
            bus.packet_command_in(master(), &PacketCommand::ReadCapacity, None, 100),
            Err(AtapiError::DeviceError)
        );
        assert!(bus.io.word_writes.is_empty());
    }

    #[test]
    fn zero_byte_count_burst_is_rejected() {
        let mut io = ScriptedIo::default();
        io.queue(0x3F6, &[0x00]);
        io.set(0x3F6, 0x58);
        io.queue(0x1F7, &[0x58, 0x58]);
        io.set(0x1F7, 0x58);
        io.set(0x1F4, 0x00);
        io.set(0x1F5, 0x00);
        let mut bus = bus(io);

        let mut buf = [0u8; 8];
        assert_eq!(
            bus.packet_command_in(master(), &PacketCommand::ReadCapacity, Some(&mut buf), 100),
            Err(AtapiError::DeviceError)
        );
    }

    #[test]
    fn short_sense_reply_ends_transfer_early() {
        let mut io = ScriptedIo::default();
        // DRQ clear before the command, DRQ set for the data burst, released afterwards.
        io.queue(0x3F6, &[0x00, 0x58]);
        io.set(0x3F6, 0x50);
        // DRQ for the packet, status after packet, interrupt ack, final error check.
        io.queue(0x1F7, &[0x58, 0x58, 0x58]);
        io.set(0x1F7, 0x50);
        io.set(0x1F4, 14);
        io.set(0x1F5, 0);
        // 14-byte sense: key NOT READY, additional length 6, ASC 0x3A.
        io.queue_words(&[0x0070, 0x0002, 0x0000, 0x0600, 0x0000, 0x0000, 0x003A]);
        let mut bus = bus(io);

        let mut buf = [0u8; 18];
        bus.packet_command_in(
            master(),
            &PacketCommand::RequestSense {
                allocation_length: 18,
            },
            Some(&mut buf),
            100,
        )
        .unwrap();

        assert_eq!(bus.io.reads_of(0x1F0), 7);
        assert_eq!(buf[2], 0x02);
        assert_eq!(buf[7], 6);
        assert_eq!(buf[12], 0x3A);
    }

    #[test]
    fn store_word_keeps_low_byte_for_odd_tail() {
        let mut buf = [0u8; 3];
        store_word(&mut buf, 0, [1, 2]);
        store_word(&mut buf, 1, [3, 4]);
        assert_eq!(buf, [1, 2, 3]);
    }
}
