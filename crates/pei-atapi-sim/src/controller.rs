use pei_atapi::{AtaController, AtapiError, IdeChannelMask, IdeRegsBaseAddr, Result};

/// Controller hook that reports a fixed list of channel bases and records how it was enabled.
#[derive(Debug, Clone, Default)]
pub struct SimAtaController {
    bases: Vec<IdeRegsBaseAddr>,
    enabled: Option<IdeChannelMask>,
    fail_enable: bool,
}

impl SimAtaController {
    pub fn new(bases: Vec<IdeRegsBaseAddr>) -> Self {
        Self {
            bases,
            ..Self::default()
        }
    }

    /// Make `enable_ata_channels` fail with a device error.
    pub fn failing() -> Self {
        Self {
            fail_enable: true,
            ..Self::default()
        }
    }

    /// Mask passed to the last `enable_ata_channels` call.
    pub fn enabled(&self) -> Option<IdeChannelMask> {
        self.enabled
    }
}

impl AtaController for SimAtaController {
    fn enable_ata_channels(&mut self, channels: IdeChannelMask) -> Result<()> {
        if self.fail_enable {
            return Err(AtapiError::DeviceError);
        }
        self.enabled = Some(channels);
        Ok(())
    }

    fn ide_regs_base_addrs(&self) -> Vec<IdeRegsBaseAddr> {
        if self.enabled.is_none() {
            return Vec::new();
        }
        self.bases.clone()
    }
}
