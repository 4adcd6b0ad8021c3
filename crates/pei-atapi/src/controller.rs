use bitflags::bitflags;

use crate::regs::IdeRegsBaseAddr;
use crate::Result;

bitflags! {
    /// Channels the driver asks the platform to enable.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct IdeChannelMask: u8 {
        const PRIMARY = 0x01;
        const SECONDARY = 0x02;
    }
}

/// Platform hook that powers up the ATA controller and reports its channel port bases.
pub trait AtaController {
    fn enable_ata_channels(&mut self, channels: IdeChannelMask) -> Result<()>;

    /// Port base pairs of the enabled channels, in channel order. Entries past the fourth are
    /// ignored.
    fn ide_regs_base_addrs(&self) -> Vec<IdeRegsBaseAddr>;
}

pub const PRIMARY_PORTS: IdeRegsBaseAddr = IdeRegsBaseAddr {
    command_block_base: 0x1F0,
    control_block_base: 0x3F6,
};

pub const SECONDARY_PORTS: IdeRegsBaseAddr = IdeRegsBaseAddr {
    command_block_base: 0x170,
    control_block_base: 0x376,
};

/// ISA-compatible IDE at the fixed legacy port assignments.
#[derive(Debug, Clone, Copy)]
pub struct LegacyIdeController {
    enabled: IdeChannelMask,
}

impl LegacyIdeController {
    pub const fn new() -> Self {
        Self {
            enabled: IdeChannelMask::empty(),
        }
    }
}

impl Default for LegacyIdeController {
    fn default() -> Self {
        Self::new()
    }
}

impl AtaController for LegacyIdeController {
    fn enable_ata_channels(&mut self, channels: IdeChannelMask) -> Result<()> {
        self.enabled |= channels;
        Ok(())
    }

    fn ide_regs_base_addrs(&self) -> Vec<IdeRegsBaseAddr> {
        let mut bases = Vec::with_capacity(2);
        if self.enabled.contains(IdeChannelMask::PRIMARY) {
            bases.push(PRIMARY_PORTS);
        }
        if self.enabled.contains(IdeChannelMask::SECONDARY) {
            bases.push(SECONDARY_PORTS);
        }
        bases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_controller_reports_enabled_channels_only() {
        let mut ctl = LegacyIdeController::new();
        assert!(ctl.ide_regs_base_addrs().is_empty());

        ctl.enable_ata_channels(IdeChannelMask::SECONDARY).unwrap();
        assert_eq!(ctl.ide_regs_base_addrs(), vec![SECONDARY_PORTS]);

        ctl.enable_ata_channels(IdeChannelMask::all()).unwrap();
        assert_eq!(ctl.ide_regs_base_addrs(), vec![PRIMARY_PORTS, SECONDARY_PORTS]);
    }
}
