//! Recovery block-I/O surface: device table, media info and block reads.

use tracing::{debug, warn};

use crate::controller::{AtaController, IdeChannelMask};
use crate::media::{CD_ROM_BLOCK_SIZE, LS120_BLOCK_SIZE};
use crate::regs::{DevicePosition, MAX_IDE_CHANNELS, MAX_IDE_DEVICES};
use crate::{AtapiConfig, AtapiError, IdeBus, PortIo, Result, Stall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BlockDeviceType {
    IdeCdRom = 1,
    IdeLs120 = 2,
}

impl BlockDeviceType {
    pub const fn default_block_size(self) -> u32 {
        match self {
            BlockDeviceType::IdeCdRom => CD_ROM_BLOCK_SIZE,
            BlockDeviceType::IdeLs120 => LS120_BLOCK_SIZE,
        }
    }
}

/// Messaging device-path subtype of the attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InterfaceType {
    Atapi = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub device_type: BlockDeviceType,
    pub media_present: bool,
    pub last_block: u64,
    pub block_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo2 {
    pub interface_type: InterfaceType,
    pub removable_media: bool,
    pub media_present: bool,
    pub read_only: bool,
    pub last_block: u64,
    pub block_size: u32,
}

/// One row of the device table.
///
/// Both media views are only written through the setters below so they always agree on
/// presence, last block and block size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    position: DevicePosition,
    media: MediaInfo,
    media2: MediaInfo2,
}

impl DeviceInfo {
    pub fn new(position: DevicePosition, device_type: BlockDeviceType) -> Self {
        let block_size = device_type.default_block_size();
        Self {
            position,
            media: MediaInfo {
                device_type,
                media_present: false,
                last_block: 0,
                block_size,
            },
            media2: MediaInfo2 {
                interface_type: InterfaceType::Atapi,
                removable_media: true,
                media_present: false,
                read_only: false,
                last_block: 0,
                block_size,
            },
        }
    }

    pub fn position(&self) -> DevicePosition {
        self.position
    }

    pub fn media(&self) -> &MediaInfo {
        &self.media
    }

    pub fn media2(&self) -> &MediaInfo2 {
        &self.media2
    }

    pub(crate) fn set_no_media(&mut self) {
        self.media.media_present = false;
        self.media.last_block = 0;
        self.media2.media_present = false;
        self.media2.last_block = 0;
        self.media2.read_only = false;
    }

    pub(crate) fn set_media_present(&mut self, last_block: u64, block_size: u32, read_only: bool) {
        self.media.media_present = true;
        self.media.last_block = last_block;
        self.media.block_size = block_size;
        self.media2.media_present = true;
        self.media2.last_block = last_block;
        self.media2.block_size = block_size;
        self.media2.read_only = read_only;
    }
}

/// Block-device enumeration and reads, first interface version.
///
/// `device_index` is 1-based.
pub trait RecoveryBlockIo {
    fn number_of_block_devices(&self) -> usize;
    fn block_device_media_info(&mut self, device_index: usize) -> Result<MediaInfo>;
    fn read_blocks(
        &mut self,
        device_index: usize,
        start_lba: u64,
        buffer: Option<&mut [u8]>,
    ) -> Result<()>;
}

/// Second interface version; reports [`MediaInfo2`].
pub trait RecoveryBlockIo2 {
    fn number_of_block_devices(&self) -> usize;
    fn block_device_media_info(&mut self, device_index: usize) -> Result<MediaInfo2>;
    fn read_blocks(
        &mut self,
        device_index: usize,
        start_lba: u64,
        buffer: Option<&mut [u8]>,
    ) -> Result<()>;
}

/// Packet-device block I/O over every ATAPI CD-ROM and LS-120 found at initialization.
pub struct AtapiBlockIoDevice<P, S> {
    bus: IdeBus<P, S>,
    devices: Vec<DeviceInfo>,
}

impl<P: PortIo, S: Stall> AtapiBlockIoDevice<P, S> {
    /// Enable the controller's channels and enumerate the packet devices behind them.
    pub fn initialize<C>(controller: &mut C, io: P, stall: S, config: AtapiConfig) -> Result<Self>
    where
        C: AtaController + ?Sized,
    {
        controller.enable_ata_channels(IdeChannelMask::PRIMARY | IdeChannelMask::SECONDARY)?;

        let mut bus = IdeBus::new(io, stall, config);
        let bases = controller.ide_regs_base_addrs();
        if bases.len() > MAX_IDE_CHANNELS {
            warn!(reported = bases.len(), "ignoring channels past the fourth");
        }
        for (channel, base) in bases.into_iter().take(MAX_IDE_CHANNELS).enumerate() {
            bus.attach_channel(channel, base)?;
        }

        let devices = bus.enumerate_devices()?;
        debug!(count = devices.len(), "enumeration complete");
        Ok(Self { bus, devices })
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn bus(&self) -> &IdeBus<P, S> {
        &self.bus
    }

    pub fn number_of_block_devices(&self) -> usize {
        self.devices.len()
    }

    fn device_slot(&self, device_index: usize) -> Result<usize> {
        let count = self.devices.len().min(MAX_IDE_DEVICES);
        if device_index == 0 || device_index > count {
            return Err(AtapiError::InvalidParameter("device index out of range"));
        }
        Ok(device_index - 1)
    }

    /// Re-run media detection for the device at `slot`.
    fn refresh_media(&mut self, slot: usize) -> Result<&DeviceInfo> {
        let device = self
            .devices
            .get_mut(slot)
            .ok_or(AtapiError::InvalidParameter("device index out of range"))?;
        self.bus.detect_media(device).map_err(|err| {
            debug!(position = %device.position(), ?err, "media detection failed");
            AtapiError::DeviceError
        })?;
        Ok(device)
    }

    pub fn block_device_media_info(&mut self, device_index: usize) -> Result<MediaInfo> {
        let slot = self.device_slot(device_index)?;
        Ok(*self.refresh_media(slot)?.media())
    }

    pub fn block_device_media_info2(&mut self, device_index: usize) -> Result<MediaInfo2> {
        let slot = self.device_slot(device_index)?;
        self.block_device_media_info(device_index)?;
        Ok(*self.devices[slot].media2())
    }

    pub fn read_blocks(
        &mut self,
        device_index: usize,
        start_lba: u64,
        buffer: Option<&mut [u8]>,
    ) -> Result<()> {
        let Some(buffer) = buffer else {
            return Err(AtapiError::InvalidParameter("missing buffer"));
        };
        if buffer.is_empty() {
            return Ok(());
        }
        let slot = self.device_slot(device_index)?;

        let media = *self.refresh_media(slot)?.media();
        if !media.media_present {
            return Err(AtapiError::NoMedia);
        }

        let block_size = media.block_size;
        let size = buffer.len();
        if block_size == 0 || size % block_size as usize != 0 {
            return Err(AtapiError::BadBufferSize { size, block_size });
        }
        let number_of_blocks = (size / block_size as usize) as u64;
        let end = start_lba
            .checked_add(number_of_blocks - 1)
            .ok_or(AtapiError::InvalidParameter("lba range overflows"))?;
        if end > media.last_block {
            return Err(AtapiError::InvalidParameter("read past the last block"));
        }

        let position = self.devices[slot].position();
        self.bus
            .read_sectors(position, buffer, start_lba, number_of_blocks, block_size)
            .map_err(|err| match err {
                AtapiError::InvalidParameter(_) => err,
                _ => AtapiError::DeviceError,
            })
    }
}

impl<P: PortIo, S: Stall> RecoveryBlockIo for AtapiBlockIoDevice<P, S> {
    fn number_of_block_devices(&self) -> usize {
        AtapiBlockIoDevice::number_of_block_devices(self)
    }

    fn block_device_media_info(&mut self, device_index: usize) -> Result<MediaInfo> {
        AtapiBlockIoDevice::block_device_media_info(self, device_index)
    }

    fn read_blocks(
        &mut self,
        device_index: usize,
        start_lba: u64,
        buffer: Option<&mut [u8]>,
    ) -> Result<()> {
        AtapiBlockIoDevice::read_blocks(self, device_index, start_lba, buffer)
    }
}

impl<P: PortIo, S: Stall> RecoveryBlockIo2 for AtapiBlockIoDevice<P, S> {
    fn number_of_block_devices(&self) -> usize {
        AtapiBlockIoDevice::number_of_block_devices(self)
    }

    fn block_device_media_info(&mut self, device_index: usize) -> Result<MediaInfo2> {
        self.block_device_media_info2(device_index)
    }

    fn read_blocks(
        &mut self,
        device_index: usize,
        start_lba: u64,
        buffer: Option<&mut [u8]>,
    ) -> Result<()> {
        AtapiBlockIoDevice::read_blocks(self, device_index, start_lba, buffer)
    }
}
