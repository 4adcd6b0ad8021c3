//! Channel probing and device classification.

use tracing::{debug, info, warn};

use crate::block_io::{BlockDeviceType, DeviceInfo};
use crate::packet::{
    InquiryData, PacketCommand, INQUIRY_DATA_LEN, PERIPHERAL_CD_ROM, PERIPHERAL_DIRECT_ACCESS,
};
use crate::regs::{DevicePosition, MAX_IDE_DEVICES};
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

/// Map an INQUIRY peripheral device type to the block device it is driven as.
pub fn classify_peripheral(peripheral_device_type: u8) -> Result<BlockDeviceType> {
    match peripheral_device_type {
        PERIPHERAL_CD_ROM => Ok(BlockDeviceType::IdeCdRom),
        PERIPHERAL_DIRECT_ACCESS => Ok(BlockDeviceType::IdeLs120),
        other => Err(AtapiError::Unsupported(other)),
    }
}

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    pub fn inquiry(&mut self, position: DevicePosition) -> Result<InquiryData> {
        let mut raw = [0u8; INQUIRY_DATA_LEN];
        let packet = PacketCommand::Inquiry {
            allocation_length: INQUIRY_DATA_LEN as u8,
        };
        let timeout = self.config.atapi_timeout_ms;
        self.packet_command_in(position, &packet, Some(&mut raw), timeout)?;
        InquiryData::parse(&raw).ok_or(AtapiError::DeviceError)
    }

    /// Identify and classify the packet device at `position`, then detect its media once.
    ///
    /// A media detection failure is logged and the device is still returned, with its media
    /// marked absent.
    pub fn discover_atapi_device(&mut self, position: DevicePosition) -> Result<DeviceInfo> {
        if !self.detect_controller(position) {
            return Err(AtapiError::DeviceError);
        }
        let identify = self.atapi_identify(position)?;
        let inquiry = self.inquiry(position)?;
        let device_type = classify_peripheral(inquiry.peripheral_device_type)?;
        info!(
            %position,
            ?device_type,
            model = %identify.model_number(),
            vendor = %inquiry.vendor,
            product = %inquiry.product,
            "found packet device"
        );

        let mut device = DeviceInfo::new(position, device_type);
        if let Err(err) = self.detect_media(&mut device) {
            warn!(%position, ?err, "initial media detection failed");
        }
        Ok(device)
    }

    /// Scan every configured channel, master before slave, and collect the supported devices.
    pub fn enumerate_devices(&mut self) -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();
        devices
            .try_reserve_exact(MAX_IDE_DEVICES)
            .map_err(|_| AtapiError::OutOfResources)?;

        for position in DevicePosition::all() {
            if self.channel_registers(usize::from(position.channel())).is_none() {
                continue;
            }
            match self.discover_atapi_device(position) {
                Ok(device) => devices.push(device),
                Err(err) => debug!(%position, ?err, "skipping"),
            }
        }
        Ok(devices)
    }
}
