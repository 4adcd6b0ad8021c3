//! Packet-device model: removable CD-ROM and LS-120 drives with scriptable faults.

use pei_atapi::{
    CD_ROM_BLOCK_SIZE, LS120_BLOCK_SIZE, PERIPHERAL_CD_ROM, PERIPHERAL_DIRECT_ACCESS,
    SCSI_INQUIRY, SCSI_READ_10, SCSI_READ_CAPACITY, SCSI_READ_FORMAT_CAPACITIES,
    SCSI_REQUEST_SENSE, SCSI_TEST_UNIT_READY,
};

const SENSE_NO_SENSE: u8 = 0x00;
const SENSE_NOT_READY: u8 = 0x02;
const SENSE_MEDIUM_ERROR: u8 = 0x03;
const SENSE_ILLEGAL_REQUEST: u8 = 0x05;
const SENSE_UNIT_ATTENTION: u8 = 0x06;

const ASC_UNRECOVERED_READ: u8 = 0x11;
const ASC_INVALID_COMMAND: u8 = 0x20;
const ASC_LBA_OUT_OF_RANGE: u8 = 0x21;
const ASC_MEDIUM_CHANGED: u8 = 0x28;
const ASC_MEDIUM_NOT_PRESENT: u8 = 0x3A;

/// Capacity an LS-120 drive advertises for an empty slot.
const LS120_MAX_BLOCKS: u32 = 0x3_C300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    CdRom,
    Ls120,
    /// Any other peripheral device type.
    Other(u8),
}

impl DriveKind {
    pub fn peripheral_type(self) -> u8 {
        match self {
            DriveKind::CdRom => PERIPHERAL_CD_ROM,
            DriveKind::Ls120 => PERIPHERAL_DIRECT_ACCESS,
            DriveKind::Other(t) => t & 0x1F,
        }
    }

    pub fn block_size(self) -> u32 {
        match self {
            DriveKind::CdRom => CD_ROM_BLOCK_SIZE,
            DriveKind::Ls120 | DriveKind::Other(_) => LS120_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sense {
    pub key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl Sense {
    pub const fn new(key: u8, asc: u8, ascq: u8) -> Self {
        Self { key, asc, ascq }
    }

    fn ok() -> Self {
        Self::new(SENSE_NO_SENSE, 0, 0)
    }
}

#[derive(Debug)]
pub enum PacketResult {
    NoDataSuccess,
    DataIn(Vec<u8>),
    Error { sense_key: u8, asc: u8, ascq: u8 },
}

impl PacketResult {
    fn check_condition(sense: Sense) -> Self {
        PacketResult::Error {
            sense_key: sense.key,
            asc: sense.asc,
            ascq: sense.ascq,
        }
    }
}

/// Deterministic content of byte `offset` within block `lba`.
pub fn block_pattern(lba: u32, offset: usize) -> u8 {
    (lba.wrapping_mul(0x9E37) as u8) ^ (offset as u8) ^ ((offset >> 8) as u8)
}

/// Expected contents of `blocks` blocks starting at `lba`.
pub fn expected_blocks(lba: u32, blocks: u32, block_size: u32) -> Vec<u8> {
    let block_size = block_size as usize;
    let mut out = vec![0u8; blocks as usize * block_size];
    for (i, block) in out.chunks_mut(block_size).enumerate() {
        for (offset, b) in block.iter_mut().enumerate() {
            *b = block_pattern(lba + i as u32, offset);
        }
    }
    out
}

pub struct AtapiDrive {
    kind: DriveKind,
    /// Number of blocks on the inserted medium.
    media_blocks: Option<u32>,
    media_changed: bool,
    sense: Sense,
    fault: Option<(Sense, u32)>,
    short_sense: bool,
    silent_no_media: bool,
    silent_power_mode: bool,
    fail_reads_from: Option<u32>,
    packets: Vec<[u8; 12]>,
    resets: u32,
}

impl AtapiDrive {
    pub fn new(kind: DriveKind, media_blocks: Option<u32>) -> Self {
        Self {
            kind,
            media_blocks,
            media_changed: media_blocks.is_some(),
            sense: Sense::ok(),
            fault: None,
            short_sense: false,
            silent_no_media: false,
            silent_power_mode: false,
            fail_reads_from: None,
            packets: Vec::new(),
            resets: 0,
        }
    }

    pub fn cdrom(media_blocks: Option<u32>) -> Self {
        Self::new(DriveKind::CdRom, media_blocks)
    }

    pub fn ls120(media_blocks: Option<u32>) -> Self {
        Self::new(DriveKind::Ls120, media_blocks)
    }

    /// Reply to REQUEST SENSE with 14 bytes and an additional length of 6.
    pub fn with_short_sense(mut self) -> Self {
        self.short_sense = true;
        self
    }

    /// Report an empty slot only through the READ FORMAT CAPACITIES descriptor.
    pub fn with_silent_no_media(mut self) -> Self {
        self.silent_no_media = true;
        self
    }

    /// Complete CHECK POWER MODE without raising DRDY.
    pub fn with_silent_power_mode(mut self) -> Self {
        self.silent_power_mode = true;
        self
    }

    pub fn with_failing_reads_from(mut self, lba: u32) -> Self {
        self.fail_reads_from = Some(lba);
        self
    }

    pub fn silent_power_mode(&self) -> bool {
        self.silent_power_mode
    }

    pub fn media_present(&self) -> bool {
        self.media_blocks.is_some()
    }

    pub fn insert_media(&mut self, blocks: u32) {
        self.media_blocks = Some(blocks);
        self.media_changed = true;
    }

    pub fn eject_media(&mut self) {
        self.media_blocks = None;
        self.media_changed = true;
    }

    /// Fail the next `times` media-access commands with the given sense. `u32::MAX` never
    /// expires.
    pub fn inject_check_condition(&mut self, sense: Sense, times: u32) {
        self.fault = (times > 0).then_some((sense, times));
    }

    /// Every command packet received, oldest first.
    pub fn packets(&self) -> &[[u8; 12]] {
        &self.packets
    }

    pub fn clear_packets(&mut self) {
        self.packets.clear();
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.packets.iter().map(|p| p[0]).collect()
    }

    /// `(lba, blocks)` of every READ(10) received.
    pub fn read10_commands(&self) -> Vec<(u32, u16)> {
        self.packets
            .iter()
            .filter(|p| p[0] == SCSI_READ_10)
            .map(|p| {
                (
                    u32::from_be_bytes([p[2], p[3], p[4], p[5]]),
                    u16::from_be_bytes([p[7], p[8]]),
                )
            })
            .collect()
    }

    /// DEVICE RESET / SRST. Sense data survives so the host can still ask why the last
    /// command failed.
    pub fn reset(&mut self) {
        self.resets += 1;
    }

    pub fn reset_count(&self) -> u32 {
        self.resets
    }

    pub fn identify_packet_data(&self) -> Vec<u8> {
        let mut words = [0u16; 256];

        // General configuration: ATAPI, peripheral type, removable, 12-byte packets.
        words[0] = 0x8000 | (u16::from(self.kind.peripheral_type()) << 8) | 0x0080;

        let model = match self.kind {
            DriveKind::CdRom => "SIM ATAPI CD-ROM",
            DriveKind::Ls120 => "SIM LS-120 DRIVE",
            DriveKind::Other(_) => "SIM ATAPI DEVICE",
        };
        write_ata_string(&mut words[10..20], "SIM0000000000000001", 20);
        write_ata_string(&mut words[23..27], "1.0", 8);
        write_ata_string(&mut words[27..47], model, 40);

        let mut out = vec![0u8; 512];
        for (i, w) in words.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
        out
    }

    fn fail(&mut self, sense: Sense) -> PacketResult {
        self.sense = sense;
        PacketResult::check_condition(sense)
    }

    /// Pending unit attention, then injected faults, then medium presence.
    fn check_ready(&mut self, require_media: bool) -> Result<(), PacketResult> {
        if self.media_changed {
            self.media_changed = false;
            return Err(self.fail(Sense::new(SENSE_UNIT_ATTENTION, ASC_MEDIUM_CHANGED, 0)));
        }
        if let Some((sense, remaining)) = self.fault {
            self.fault = match remaining {
                u32::MAX => Some((sense, remaining)),
                1 => None,
                n => Some((sense, n - 1)),
            };
            return Err(self.fail(sense));
        }
        if require_media && self.media_blocks.is_none() {
            return Err(self.fail(Sense::new(SENSE_NOT_READY, ASC_MEDIUM_NOT_PRESENT, 0)));
        }
        Ok(())
    }

    pub fn handle_packet(&mut self, packet: &[u8; 12]) -> PacketResult {
        self.packets.push(*packet);
        match packet[0] {
            SCSI_INQUIRY => {
                let alloc_len = packet[4] as usize;
                let data = self.inquiry_data();
                PacketResult::DataIn(data[..alloc_len.min(data.len())].to_vec())
            }
            SCSI_TEST_UNIT_READY => match self.check_ready(!self.silent_no_media) {
                Ok(()) => {
                    self.sense = Sense::ok();
                    PacketResult::NoDataSuccess
                }
                Err(e) => e,
            },
            SCSI_REQUEST_SENSE => {
                let alloc_len = packet[4] as usize;
                let data = self.request_sense();
                // A successful REQUEST SENSE clears the current sense data.
                self.sense = Sense::ok();
                PacketResult::DataIn(data[..alloc_len.min(data.len())].to_vec())
            }
            SCSI_READ_CAPACITY => {
                if let Err(e) = self.check_ready(true) {
                    return e;
                }
                let blocks = self.media_blocks.unwrap_or(0);
                let mut out = vec![0u8; 8];
                out[..4].copy_from_slice(&blocks.saturating_sub(1).to_be_bytes());
                out[4..].copy_from_slice(&self.kind.block_size().to_be_bytes());
                PacketResult::DataIn(out)
            }
            SCSI_READ_FORMAT_CAPACITIES => {
                if let Err(e) = self.check_ready(!self.silent_no_media) {
                    return e;
                }
                let alloc_len = u16::from_be_bytes([packet[7], packet[8]]) as usize;
                let data = self.format_capacities();
                PacketResult::DataIn(data[..alloc_len.min(data.len())].to_vec())
            }
            SCSI_READ_10 => {
                if let Err(e) = self.check_ready(true) {
                    return e;
                }
                let lba = u32::from_be_bytes([packet[2], packet[3], packet[4], packet[5]]);
                let blocks = u32::from(u16::from_be_bytes([packet[7], packet[8]]));
                self.read_blocks(lba, blocks)
            }
            _ => self.fail(Sense::new(SENSE_ILLEGAL_REQUEST, ASC_INVALID_COMMAND, 0)),
        }
    }

    fn inquiry_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; 36];
        data[0] = self.kind.peripheral_type();
        data[1] = 0x80; // removable
        data[2] = 0x00;
        data[3] = 0x21; // ATAPI, response data format 1
        data[4] = (data.len() - 5) as u8;
        write_scsi_ascii(&mut data[8..16], b"SIM");
        let product: &[u8] = match self.kind {
            DriveKind::CdRom => b"ATAPI CD-ROM",
            DriveKind::Ls120 => b"LS-120",
            DriveKind::Other(_) => b"ATAPI DEVICE",
        };
        write_scsi_ascii(&mut data[16..32], product);
        write_scsi_ascii(&mut data[32..36], b"1.0");
        data
    }

    fn request_sense(&self) -> Vec<u8> {
        let len = if self.short_sense { 14 } else { 18 };
        let mut data = vec![0u8; len];
        data[0] = 0x70;
        data[2] = self.sense.key & 0x0F;
        data[7] = (len - 8) as u8;
        data[12] = self.sense.asc;
        data[13] = self.sense.ascq;
        data
    }

    fn format_capacities(&self) -> Vec<u8> {
        let (blocks, descriptor) = match self.media_blocks {
            Some(blocks) => (blocks, 0x02),
            None => (LS120_MAX_BLOCKS, 0x03),
        };
        let mut data = vec![0u8; 12];
        data[3] = 8; // capacity list length
        data[4..8].copy_from_slice(&blocks.to_be_bytes());
        data[8] = descriptor;
        let block_len = self.kind.block_size().to_be_bytes();
        data[9..12].copy_from_slice(&block_len[1..]);
        data
    }

    fn read_blocks(&mut self, lba: u32, blocks: u32) -> PacketResult {
        if blocks == 0 {
            self.sense = Sense::ok();
            return PacketResult::NoDataSuccess;
        }
        let capacity = self.media_blocks.unwrap_or(0);
        let end = u64::from(lba) + u64::from(blocks);
        if end > u64::from(capacity) {
            return self.fail(Sense::new(SENSE_ILLEGAL_REQUEST, ASC_LBA_OUT_OF_RANGE, 0));
        }
        if self.fail_reads_from.is_some_and(|bad| u64::from(bad) < end) {
            return self.fail(Sense::new(SENSE_MEDIUM_ERROR, ASC_UNRECOVERED_READ, 0));
        }
        self.sense = Sense::ok();
        PacketResult::DataIn(expected_blocks(lba, blocks, self.kind.block_size()))
    }
}

fn write_scsi_ascii(dst: &mut [u8], src: &[u8]) {
    dst.fill(b' ');
    let copy_len = src.len().min(dst.len());
    dst[..copy_len].copy_from_slice(&src[..copy_len]);
}

pub(crate) fn write_ata_string(dst_words: &mut [u16], src: &str, byte_len: usize) {
    let mut bytes = vec![b' '; byte_len];
    let src_bytes = src.as_bytes();
    let copy_len = src_bytes.len().min(byte_len);
    bytes[..copy_len].copy_from_slice(&src_bytes[..copy_len]);

    for (word, pair) in dst_words.iter_mut().zip(bytes.chunks_exact(2)) {
        *word = u16::from_be_bytes([pair[0], pair[1]]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tur() -> [u8; 12] {
        [0u8; 12]
    }

    fn request_sense_packet() -> [u8; 12] {
        let mut pkt = [0u8; 12];
        pkt[0] = SCSI_REQUEST_SENSE;
        pkt[4] = 18;
        pkt
    }

    #[test]
    fn first_command_after_insert_reports_medium_changed() {
        let mut dev = AtapiDrive::cdrom(Some(10));
        assert!(matches!(
            dev.handle_packet(&tur()),
            PacketResult::Error {
                sense_key: SENSE_UNIT_ATTENTION,
                asc: ASC_MEDIUM_CHANGED,
                ..
            }
        ));
        assert!(matches!(dev.handle_packet(&tur()), PacketResult::NoDataSuccess));
    }

    #[test]
    fn request_sense_reports_then_clears() {
        let mut dev = AtapiDrive::cdrom(None);
        let _ = dev.handle_packet(&tur());

        match dev.handle_packet(&request_sense_packet()) {
            PacketResult::DataIn(data) => {
                assert_eq!(data.len(), 18);
                assert_eq!(data[2], SENSE_NOT_READY);
                assert_eq!(data[12], ASC_MEDIUM_NOT_PRESENT);
            }
            other => panic!("unexpected REQUEST SENSE result: {other:?}"),
        }
        match dev.handle_packet(&request_sense_packet()) {
            PacketResult::DataIn(data) => assert_eq!(data[2], SENSE_NO_SENSE),
            other => panic!("unexpected REQUEST SENSE result: {other:?}"),
        }
    }

    #[test]
    fn injected_fault_expires() {
        let mut dev = AtapiDrive::cdrom(Some(10));
        let _ = dev.handle_packet(&tur());
        dev.inject_check_condition(Sense::new(SENSE_NOT_READY, 0x04, 0x01), 2);

        assert!(matches!(dev.handle_packet(&tur()), PacketResult::Error { .. }));
        assert!(matches!(dev.handle_packet(&tur()), PacketResult::Error { .. }));
        assert!(matches!(dev.handle_packet(&tur()), PacketResult::NoDataSuccess));
    }

    #[test]
    fn silent_ls120_reports_no_media_descriptor() {
        let mut dev = AtapiDrive::ls120(None).with_silent_no_media();
        assert!(matches!(dev.handle_packet(&tur()), PacketResult::NoDataSuccess));

        let mut pkt = [0u8; 12];
        pkt[0] = SCSI_READ_FORMAT_CAPACITIES;
        pkt[8] = 12;
        match dev.handle_packet(&pkt) {
            PacketResult::DataIn(data) => {
                assert_eq!(data.len(), 12);
                assert_eq!(data[8] & 0x03, 0x03);
                assert_eq!(&data[9..12], &[0x00, 0x02, 0x00]);
            }
            other => panic!("unexpected READ FORMAT CAPACITIES result: {other:?}"),
        }
    }

    #[test]
    fn read10_returns_pattern_and_logs_packet() {
        let mut dev = AtapiDrive::cdrom(Some(4));
        let _ = dev.handle_packet(&tur());

        let mut pkt = [0u8; 12];
        pkt[0] = SCSI_READ_10;
        pkt[5] = 2;
        pkt[8] = 2;
        match dev.handle_packet(&pkt) {
            PacketResult::DataIn(data) => assert_eq!(data, expected_blocks(2, 2, 2048)),
            other => panic!("unexpected READ(10) result: {other:?}"),
        }
        assert_eq!(dev.read10_commands(), vec![(2, 2)]);

        pkt[5] = 3;
        assert!(matches!(
            dev.handle_packet(&pkt),
            PacketResult::Error {
                sense_key: SENSE_ILLEGAL_REQUEST,
                asc: ASC_LBA_OUT_OF_RANGE,
                ..
            }
        ));
    }

    #[test]
    fn short_sense_has_six_additional_bytes() {
        let mut dev = AtapiDrive::cdrom(None).with_short_sense();
        match dev.handle_packet(&request_sense_packet()) {
            PacketResult::DataIn(data) => {
                assert_eq!(data.len(), 14);
                assert_eq!(data[7], 6);
            }
            other => panic!("unexpected REQUEST SENSE result: {other:?}"),
        }
    }
}
