use crate::atapi::write_ata_string;

/// Fixed ATA hard disk. Only answers IDENTIFY DEVICE; the recovery driver never reads from it.
#[derive(Debug, Clone)]
pub struct AtaDisk {
    sectors: u32,
}

impl AtaDisk {
    pub fn new(sectors: u32) -> Self {
        Self { sectors }
    }

    pub fn identify_data(&self) -> Vec<u8> {
        let mut words = [0u16; 256];
        words[0] = 0x0040; // fixed device
        write_ata_string(&mut words[10..20], "SIMDISK0000000000001", 20);
        write_ata_string(&mut words[23..27], "1.0", 8);
        write_ata_string(&mut words[27..47], "SIM ATA DISK", 40);
        words[49] = 1 << 9; // LBA supported
        let lba28 = self.sectors.min(0x0FFF_FFFF);
        words[60] = lba28 as u16;
        words[61] = (lba28 >> 16) as u16;

        let mut out = vec![0u8; 512];
        for (i, w) in words.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_reports_fixed_non_packet_device() {
        let data = AtaDisk::new(2048).identify_data();
        let word0 = u16::from_le_bytes([data[0], data[1]]);
        assert_eq!(word0 & 0x8000, 0);
        assert_eq!(u16::from_le_bytes([data[120], data[121]]), 2048);
    }
}
