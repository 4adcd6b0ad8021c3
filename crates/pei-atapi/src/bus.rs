use tracing::trace;

use crate::regs::{ChannelRegisters, DevicePosition, IdeRegsBaseAddr, MAX_IDE_CHANNELS};
use crate::{AtapiConfig, AtapiError, PortIo, Result, Stall};

/// The driver's view of the IDE channels: port access, delays and the per-channel register maps.
///
/// Every command helper is a method on this type and takes `&mut self`, so a Head-register
/// selection can never be interleaved with another command's register traffic.
pub struct IdeBus<P, S> {
    pub(crate) io: P,
    pub(crate) stall: S,
    pub(crate) config: AtapiConfig,
    channels: [Option<ChannelRegisters>; MAX_IDE_CHANNELS],
}

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    pub fn new(io: P, stall: S, config: AtapiConfig) -> Self {
        Self {
            io,
            stall,
            config,
            channels: [None; MAX_IDE_CHANNELS],
        }
    }

    /// Derive and store the register map for `channel`.
    pub fn attach_channel(&mut self, channel: usize, base: IdeRegsBaseAddr) -> Result<()> {
        let slot = self
            .channels
            .get_mut(channel)
            .ok_or(AtapiError::InvalidParameter("channel out of range"))?;
        *slot = Some(ChannelRegisters::new(base));
        Ok(())
    }

    pub fn channel_registers(&self, channel: usize) -> Option<&ChannelRegisters> {
        self.channels.get(channel).and_then(Option::as_ref)
    }

    /// Register map of the channel `position` sits on.
    pub fn registers(&self, position: DevicePosition) -> Result<ChannelRegisters> {
        self.channel_registers(usize::from(position.channel()))
            .copied()
            .ok_or(AtapiError::InvalidParameter("channel not configured"))
    }

    pub fn config(&self) -> &AtapiConfig {
        &self.config
    }

    pub(crate) fn read_reg(&mut self, port: u16) -> u8 {
        let value = self.io.read_u8(port);
        trace!(port = format_args!("{port:#06x}"), value = format_args!("{value:#04x}"), "in");
        value
    }

    pub(crate) fn write_reg(&mut self, port: u16, value: u8) {
        trace!(port = format_args!("{port:#06x}"), value = format_args!("{value:#04x}"), "out");
        self.io.write_u8(port, value);
    }

    pub(crate) fn read_data(&mut self, port: u16) -> u16 {
        self.io.read_u16(port)
    }

    pub(crate) fn write_data(&mut self, port: u16, value: u16) {
        self.io.write_u16(port, value);
    }

    pub(crate) fn stall_us(&mut self, us: u64) {
        self.stall.stall(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{CountingStall, ScriptedIo};

    #[test]
    fn unconfigured_channel_is_rejected() {
        let io = ScriptedIo::default();
        let mut bus = IdeBus::new(io, CountingStall::default(), AtapiConfig::default());
        bus.attach_channel(
            0,
            IdeRegsBaseAddr {
                command_block_base: 0x1F0,
                control_block_base: 0x3F6,
            },
        )
        .unwrap();

        let master = DevicePosition::from_parts(0, 0).unwrap();
        let secondary = DevicePosition::from_parts(1, 0).unwrap();
        assert_eq!(bus.registers(master).unwrap().status_command, 0x1F7);
        assert!(matches!(
            bus.registers(secondary),
            Err(AtapiError::InvalidParameter(_))
        ));
        assert!(bus
            .attach_channel(
                MAX_IDE_CHANNELS,
                IdeRegsBaseAddr {
                    command_block_base: 0,
                    control_block_base: 0,
                },
            )
            .is_err());
    }
}
