//! ATA taskfile register layout and bit definitions.

use std::fmt;

use bitflags::bitflags;

use crate::{AtapiError, Result};

pub const MAX_IDE_CHANNELS: usize = 4;
pub const DEVICES_PER_CHANNEL: usize = 2;
pub const MAX_IDE_DEVICES: usize = MAX_IDE_CHANNELS * DEVICES_PER_CHANNEL;

/// Head register value selecting a device for an ATA command (LBA mode, obsolete bits set).
pub const HEAD_SELECT_ATA: u8 = 0xE0;
/// Head register value selecting a device for a PACKET command.
pub const HEAD_SELECT_PACKET: u8 = 0xA0;

/// Command/control block base pair reported by the platform for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdeRegsBaseAddr {
    pub command_block_base: u16,
    pub control_block_base: u16,
}

/// Port addresses of one channel's taskfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRegisters {
    pub data: u16,
    /// Error on read, Feature on write.
    pub error_features: u16,
    pub sector_count: u16,
    pub sector_number: u16,
    pub cylinder_lsb: u16,
    pub cylinder_msb: u16,
    pub head: u16,
    /// Status on read, Command on write.
    pub status_command: u16,
    /// AltStatus on read, DeviceControl on write.
    pub alt_status_device_control: u16,
    pub drive_address: u16,
}

impl ChannelRegisters {
    pub const fn new(base: IdeRegsBaseAddr) -> Self {
        let cmd = base.command_block_base;
        let ctrl = base.control_block_base;
        Self {
            data: cmd,
            error_features: cmd.wrapping_add(1),
            sector_count: cmd.wrapping_add(2),
            sector_number: cmd.wrapping_add(3),
            cylinder_lsb: cmd.wrapping_add(4),
            cylinder_msb: cmd.wrapping_add(5),
            head: cmd.wrapping_add(6),
            status_command: cmd.wrapping_add(7),
            alt_status_device_control: ctrl,
            drive_address: ctrl.wrapping_add(1),
        }
    }
}

/// Flat device slot `channel * 2 + device`, where device 0 is the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePosition(u8);

impl DevicePosition {
    pub fn new(raw: u8) -> Result<Self> {
        if usize::from(raw) < MAX_IDE_DEVICES {
            Ok(Self(raw))
        } else {
            Err(AtapiError::InvalidParameter("device position out of range"))
        }
    }

    pub fn from_parts(channel: u8, device: u8) -> Result<Self> {
        if usize::from(channel) >= MAX_IDE_CHANNELS {
            return Err(AtapiError::InvalidParameter("channel out of range"));
        }
        if usize::from(device) >= DEVICES_PER_CHANNEL {
            return Err(AtapiError::InvalidParameter("device out of range"));
        }
        Ok(Self(channel * 2 + device))
    }

    #[inline]
    pub const fn channel(self) -> u8 {
        self.0 / 2
    }

    #[inline]
    pub const fn device(self) -> u8 {
        self.0 % 2
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Head register value for this device on top of `base` (see [`HEAD_SELECT_ATA`]).
    #[inline]
    pub const fn head_select(self, base: u8) -> u8 {
        base | (self.device() << 4)
    }

    /// Every slot in discovery order: channel ascending, master before slave.
    pub fn all() -> impl Iterator<Item = DevicePosition> {
        (0..MAX_IDE_DEVICES as u8).map(DevicePosition)
    }
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.device() == 0 { "master" } else { "slave" };
        write!(f, "channel {} {}", self.channel(), role)
    }
}

bitflags! {
    /// Status / AltStatus register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AtaStatus: u8 {
        const BSY = 0x80;
        const DRDY = 0x40;
        const DWF = 0x20;
        const DSC = 0x10;
        const DRQ = 0x08;
        const CORR = 0x04;
        const IDX = 0x02;
        const ERR = 0x01;
    }
}

bitflags! {
    /// Error register. Packet devices report the sense key in bits 7..4.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AtaErrorReg: u8 {
        const BBK = 0x80;
        const UNC = 0x40;
        const MC = 0x20;
        const IDNF = 0x10;
        const MCR = 0x08;
        const ABRT = 0x04;
        const TK0NF = 0x02;
        const AMNF = 0x01;
    }
}

impl AtaErrorReg {
    #[inline]
    pub const fn sense_key(self) -> u8 {
        self.bits() >> 4
    }
}

bitflags! {
    /// DeviceControl register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DeviceControl: u8 {
        const HOB = 0x80;
        /// Historically "head select 3"; legacy controllers expect it set.
        const HD15 = 0x08;
        const SRST = 0x04;
        const NIEN = 0x02;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn primary_channel_register_offsets() {
        let regs = ChannelRegisters::new(IdeRegsBaseAddr {
            command_block_base: 0x1F0,
            control_block_base: 0x3F6,
        });
        assert_eq!(regs.data, 0x1F0);
        assert_eq!(regs.error_features, 0x1F1);
        assert_eq!(regs.sector_count, 0x1F2);
        assert_eq!(regs.sector_number, 0x1F3);
        assert_eq!(regs.cylinder_lsb, 0x1F4);
        assert_eq!(regs.cylinder_msb, 0x1F5);
        assert_eq!(regs.head, 0x1F6);
        assert_eq!(regs.status_command, 0x1F7);
        assert_eq!(regs.alt_status_device_control, 0x3F6);
        assert_eq!(regs.drive_address, 0x3F7);
    }

    #[test]
    fn position_rejects_out_of_range() {
        assert!(DevicePosition::new(8).is_err());
        assert!(DevicePosition::from_parts(4, 0).is_err());
        assert!(DevicePosition::from_parts(0, 2).is_err());
    }

    #[test]
    fn head_select_sets_device_bit() {
        let slave = DevicePosition::from_parts(1, 1).unwrap();
        assert_eq!(slave.head_select(HEAD_SELECT_ATA), 0xF0);
        assert_eq!(slave.head_select(HEAD_SELECT_PACKET), 0xB0);
        assert_eq!(slave.to_string(), "channel 1 slave");
    }

    #[test]
    fn discovery_order_is_master_then_slave() {
        let order: Vec<(u8, u8)> = DevicePosition::all()
            .map(|p| (p.channel(), p.device()))
            .collect();
        assert_eq!(order.len(), MAX_IDE_DEVICES);
        assert_eq!(&order[..3], &[(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn packet_error_register_exposes_sense_key() {
        let err = AtaErrorReg::from_bits_retain(0x24);
        assert!(err.contains(AtaErrorReg::ABRT));
        assert_eq!(err.sense_key(), 0x02);
    }

    proptest! {
        #[test]
        fn position_decomposes_into_channel_and_device(raw in 0u8..8) {
            let pos = DevicePosition::new(raw).unwrap();
            prop_assert!(usize::from(pos.channel()) < MAX_IDE_CHANNELS);
            prop_assert!(usize::from(pos.device()) < DEVICES_PER_CHANNEL);
            prop_assert_eq!(pos.channel() * 2 + pos.device(), raw);
            prop_assert_eq!(DevicePosition::from_parts(pos.channel(), pos.device()).unwrap(), pos);
        }
    }
}
