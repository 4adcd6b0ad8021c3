//! READ(10) transfers split into bounded bursts.

use crate::packet::PacketCommand;
use crate::regs::DevicePosition;
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

/// Bytes moved by one READ(10) command at most.
pub const MAX_TRANSFER_BYTES: u32 = 0x1_0000;

/// One READ(10) command of a split transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub lba: u64,
    pub blocks: u16,
}

/// Blocks per READ(10) for `block_size`: the 64 KiB window, at least one block and no more than
/// the 16-bit transfer length allows.
pub fn max_blocks_per_burst(block_size: u32) -> u16 {
    let blocks = MAX_TRANSFER_BYTES.checked_div(block_size).unwrap_or(1);
    blocks.clamp(1, u32::from(u16::MAX)) as u16
}

/// Ascending, gap-free READ(10) schedule covering `number_of_blocks` from `start_lba`.
pub fn plan_bursts(start_lba: u64, number_of_blocks: u64, block_size: u32) -> BurstPlan {
    BurstPlan {
        next_lba: start_lba,
        remaining: number_of_blocks,
        max_blocks: max_blocks_per_burst(block_size),
    }
}

#[derive(Debug, Clone)]
pub struct BurstPlan {
    next_lba: u64,
    remaining: u64,
    max_blocks: u16,
}

impl Iterator for BurstPlan {
    type Item = Burst;

    fn next(&mut self) -> Option<Burst> {
        if self.remaining == 0 {
            return None;
        }
        let blocks = self.remaining.min(u64::from(self.max_blocks)) as u16;
        let burst = Burst {
            lba: self.next_lba,
            blocks,
        };
        self.next_lba += u64::from(blocks);
        self.remaining -= u64::from(blocks);
        Some(burst)
    }
}

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    /// Read `number_of_blocks` blocks starting at `start_lba` into `buffer`.
    ///
    /// Any failed burst fails the whole call; `buffer` may then hold a partial result.
    pub fn read_sectors(
        &mut self,
        position: DevicePosition,
        buffer: &mut [u8],
        start_lba: u64,
        number_of_blocks: u64,
        block_size: u32,
    ) -> Result<()> {
        if block_size == 0 {
            return Err(AtapiError::InvalidParameter("zero block size"));
        }
        let timeout = self.config.atapi_long_timeout_ms;
        let block_bytes = block_size as usize;

        let mut offset = 0usize;
        for burst in plan_bursts(start_lba, number_of_blocks, block_size) {
            let lba = u32::try_from(burst.lba)
                .map_err(|_| AtapiError::InvalidParameter("lba beyond READ(10) range"))?;
            let len = usize::from(burst.blocks) * block_bytes;
            let chunk = buffer
                .get_mut(offset..offset + len)
                .ok_or(AtapiError::InvalidParameter("buffer shorter than transfer"))?;

            let packet = PacketCommand::Read10 {
                lba,
                blocks: burst.blocks,
            };
            self.packet_command_in(position, &packet, Some(chunk), timeout)?;
            offset += len;
        }
        Ok(())
    }
}
