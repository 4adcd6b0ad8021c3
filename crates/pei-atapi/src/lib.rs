//! ATA/ATAPI recovery block-I/O driver.
//!
//! Drives packet devices (CD-ROM and LS-120) on legacy-compatible IDE channels using polled PIO,
//! for firmware that needs to read recovery media before any OS or interrupt infrastructure
//! exists. The platform supplies three things:
//!
//! - [`PortIo`]: 8/16-bit port access
//! - [`Stall`]: a microsecond delay
//! - [`AtaController`]: channel enable plus the command/control port bases
//!
//! [`AtapiBlockIoDevice`] scans every channel at initialization and then serves block reads
//! through [`RecoveryBlockIo`] and [`RecoveryBlockIo2`].

mod ata;
mod block_io;
mod bus;
mod config;
mod controller;
mod discovery;
mod error;
mod io;
mod media;
mod packet;
mod poll;
mod read;
mod regs;
mod sense;
mod time;
mod transport;

#[cfg(test)]
mod test_util;

pub use ata::{
    IdentifyData, ATA_CMD_CHECK_POWER_MODE, ATA_CMD_DEVICE_RESET, ATA_CMD_IDENTIFY_DEVICE,
    ATA_CMD_IDENTIFY_PACKET_DEVICE, ATA_CMD_PACKET,
};
pub use block_io::{
    AtapiBlockIoDevice, BlockDeviceType, DeviceInfo, InterfaceType, MediaInfo, MediaInfo2,
    RecoveryBlockIo, RecoveryBlockIo2,
};
pub use bus::IdeBus;
pub use config::AtapiConfig;
pub use controller::{
    AtaController, IdeChannelMask, LegacyIdeController, PRIMARY_PORTS, SECONDARY_PORTS,
};
pub use discovery::classify_peripheral;
pub use error::{AtapiError, Result};
pub use io::PortIo;
pub use media::{CD_ROM_BLOCK_SIZE, LS120_BLOCK_SIZE};
pub use packet::{
    CapacityDescriptor, FormatCapacityData, InquiryData, PacketCommand, ReadCapacityData,
    FORMAT_CAPACITY_DATA_LEN, INQUIRY_DATA_LEN, PACKET_LEN, PERIPHERAL_CD_ROM,
    PERIPHERAL_DIRECT_ACCESS, READ_CAPACITY_DATA_LEN, REQUEST_SENSE_DATA_LEN,
    SCSI_INQUIRY, SCSI_READ_10, SCSI_READ_CAPACITY, SCSI_READ_FORMAT_CAPACITIES,
    SCSI_REQUEST_SENSE, SCSI_TEST_UNIT_READY,
};
pub use poll::poll_budget;
pub use read::{max_blocks_per_burst, plan_bursts, Burst, BurstPlan, MAX_TRANSFER_BYTES};
pub use regs::{
    AtaErrorReg, AtaStatus, ChannelRegisters, DeviceControl, DevicePosition, IdeRegsBaseAddr,
    DEVICES_PER_CHANNEL, MAX_IDE_CHANNELS, MAX_IDE_DEVICES,
};
pub use sense::{
    drive_readiness, is_device_state_unclear, is_media_error, is_no_media, DriveReadiness,
    SenseRecord, ASCQ_IN_PROGRESS, ASCQ_MEDIA_UPSIDE_DOWN, ASC_MEDIA_UPSIDE_DOWN, ASC_NOT_READY,
    ASC_NO_MEDIA, MAX_SENSE_KEY_COUNT, SENSE_MEDIUM_ERROR, SENSE_NOT_READY, SENSE_NO_SENSE,
    SENSE_UNIT_ATTENTION,
};
pub use time::{Stall, ThreadStall, POLL_INTERVAL_US};
