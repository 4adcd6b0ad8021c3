//! SCSI command packets carried by ATA PACKET, and the reply layouts the driver parses.

pub const PACKET_LEN: usize = 12;
pub const PACKET_WORDS: usize = PACKET_LEN / 2;

pub const SCSI_TEST_UNIT_READY: u8 = 0x00;
pub const SCSI_REQUEST_SENSE: u8 = 0x03;
pub const SCSI_INQUIRY: u8 = 0x12;
pub const SCSI_READ_FORMAT_CAPACITIES: u8 = 0x23;
pub const SCSI_READ_CAPACITY: u8 = 0x25;
pub const SCSI_READ_10: u8 = 0x28;

pub const INQUIRY_DATA_LEN: usize = 36;
pub const REQUEST_SENSE_DATA_LEN: usize = 18;
pub const READ_CAPACITY_DATA_LEN: usize = 8;
pub const FORMAT_CAPACITY_DATA_LEN: usize = 12;

/// Peripheral device types the driver knows how to read.
pub const PERIPHERAL_DIRECT_ACCESS: u8 = 0x00;
pub const PERIPHERAL_CD_ROM: u8 = 0x05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketCommand {
    TestUnitReady,
    RequestSense { allocation_length: u8 },
    Inquiry { allocation_length: u8 },
    ReadFormatCapacities { allocation_length: u16 },
    ReadCapacity,
    Read10 { lba: u32, blocks: u16 },
}

impl PacketCommand {
    pub const fn opcode(&self) -> u8 {
        match self {
            PacketCommand::TestUnitReady => SCSI_TEST_UNIT_READY,
            PacketCommand::RequestSense { .. } => SCSI_REQUEST_SENSE,
            PacketCommand::Inquiry { .. } => SCSI_INQUIRY,
            PacketCommand::ReadFormatCapacities { .. } => SCSI_READ_FORMAT_CAPACITIES,
            PacketCommand::ReadCapacity => SCSI_READ_CAPACITY,
            PacketCommand::Read10 { .. } => SCSI_READ_10,
        }
    }

    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut pkt = [0u8; PACKET_LEN];
        pkt[0] = self.opcode();
        match *self {
            PacketCommand::TestUnitReady | PacketCommand::ReadCapacity => {}
            PacketCommand::RequestSense { allocation_length }
            | PacketCommand::Inquiry { allocation_length } => {
                pkt[4] = allocation_length;
            }
            PacketCommand::ReadFormatCapacities { allocation_length } => {
                pkt[7..9].copy_from_slice(&allocation_length.to_be_bytes());
            }
            PacketCommand::Read10 { lba, blocks } => {
                pkt[2..6].copy_from_slice(&lba.to_be_bytes());
                pkt[7..9].copy_from_slice(&blocks.to_be_bytes());
            }
        }
        pkt
    }

    /// The packet as written to the Data register, low byte first.
    pub fn to_words(&self) -> [u16; PACKET_WORDS] {
        let bytes = self.to_bytes();
        let mut words = [0u16; PACKET_WORDS];
        for (word, pair) in words.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = u16::from_le_bytes([pair[0], pair[1]]);
        }
        words
    }
}

/// Standard INQUIRY reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryData {
    pub peripheral_device_type: u8,
    pub removable: bool,
    pub vendor: String,
    pub product: String,
    pub revision: String,
}

impl InquiryData {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..INQUIRY_DATA_LEN)?;
        Some(Self {
            peripheral_device_type: bytes[0] & 0x1F,
            removable: bytes[1] & 0x80 != 0,
            vendor: scsi_ascii(&bytes[8..16]),
            product: scsi_ascii(&bytes[16..32]),
            revision: scsi_ascii(&bytes[32..36]),
        })
    }
}

fn scsi_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

/// READ CAPACITY reply: address of the last block and the block length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCapacityData {
    pub last_lba: u32,
    pub block_length: u32,
}

impl ReadCapacityData {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..READ_CAPACITY_DATA_LEN)?;
        Some(Self {
            last_lba: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            block_length: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// Descriptor code of the current/maximum capacity descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityDescriptor {
    Unformatted,
    Formatted,
    NoMedia,
    Reserved,
}

impl CapacityDescriptor {
    pub const fn from_code(code: u8) -> Self {
        match code & 0x3 {
            1 => CapacityDescriptor::Unformatted,
            2 => CapacityDescriptor::Formatted,
            3 => CapacityDescriptor::NoMedia,
            _ => CapacityDescriptor::Reserved,
        }
    }
}

/// READ FORMAT CAPACITIES reply, reduced to the current capacity descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapacityData {
    pub block_count: u32,
    pub descriptor: CapacityDescriptor,
    pub block_length: u32,
}

impl FormatCapacityData {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..FORMAT_CAPACITY_DATA_LEN)?;
        Some(Self {
            block_count: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            descriptor: CapacityDescriptor::from_code(bytes[8]),
            block_length: u32::from_be_bytes([0, bytes[9], bytes[10], bytes[11]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_packet_layout() {
        let pkt = PacketCommand::Inquiry {
            allocation_length: INQUIRY_DATA_LEN as u8,
        };
        assert_eq!(pkt.to_bytes(), [0x12, 0, 0, 0, 36, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn request_sense_packet_layout() {
        let pkt = PacketCommand::RequestSense {
            allocation_length: REQUEST_SENSE_DATA_LEN as u8,
        };
        assert_eq!(pkt.to_bytes(), [0x03, 0, 0, 0, 18, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn read_format_capacities_length_is_big_endian() {
        let pkt = PacketCommand::ReadFormatCapacities {
            allocation_length: FORMAT_CAPACITY_DATA_LEN as u16,
        };
        assert_eq!(pkt.to_bytes(), [0x23, 0, 0, 0, 0, 0, 0, 0, 12, 0, 0, 0]);
    }

    #[test]
    fn read10_fields_are_big_endian() {
        let pkt = PacketCommand::Read10 {
            lba: 0x0102_0304,
            blocks: 0x0506,
        };
        assert_eq!(
            pkt.to_bytes(),
            [0x28, 0, 0x01, 0x02, 0x03, 0x04, 0, 0x05, 0x06, 0, 0, 0]
        );
        assert_eq!(pkt.to_words()[0], 0x0028);
        assert_eq!(pkt.to_words()[1], 0x0201);
        assert_eq!(pkt.to_words()[4], 0x0605);
    }

    #[test]
    fn no_data_packets_are_opcode_only() {
        assert_eq!(PacketCommand::TestUnitReady.to_bytes(), [0u8; 12]);
        let mut expected = [0u8; 12];
        expected[0] = 0x25;
        assert_eq!(PacketCommand::ReadCapacity.to_bytes(), expected);
    }

    #[test]
    fn parses_inquiry_reply() {
        let mut data = [0u8; 36];
        data[0] = 0x05;
        data[1] = 0x80;
        data[8..16].copy_from_slice(b"VENDOR  ");
        data[16..32].copy_from_slice(b"CD-ROM DRIVE    ");
        data[32..36].copy_from_slice(b"1.0 ");
        let inq = InquiryData::parse(&data).unwrap();
        assert_eq!(inq.peripheral_device_type, PERIPHERAL_CD_ROM);
        assert!(inq.removable);
        assert_eq!(inq.vendor, "VENDOR");
        assert_eq!(inq.product, "CD-ROM DRIVE");
        assert_eq!(inq.revision, "1.0");
        assert!(InquiryData::parse(&data[..35]).is_none());
    }

    #[test]
    fn parses_capacity_replies() {
        let cap = ReadCapacityData::parse(&[0, 0, 0, 100, 0, 0, 0x08, 0]).unwrap();
        assert_eq!(cap.last_lba, 100);
        assert_eq!(cap.block_length, 2048);

        let fmt =
            FormatCapacityData::parse(&[0, 0, 0, 8, 0, 0, 0x03, 0xC0, 0x03, 0, 0x02, 0]).unwrap();
        assert_eq!(fmt.block_count, 0x3C0);
        assert_eq!(fmt.descriptor, CapacityDescriptor::NoMedia);
        assert_eq!(fmt.block_length, 512);
    }
}
