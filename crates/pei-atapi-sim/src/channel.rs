//! One legacy IDE channel: a shared task file in front of up to two devices.
//!
//! Commands complete synchronously except resets, which hold BSY for [`RESET_BUSY_NS`] of
//! virtual time.

use std::cell::RefCell;
use std::rc::Rc;

use pei_atapi::{
    IdeRegsBaseAddr, ATA_CMD_CHECK_POWER_MODE, ATA_CMD_DEVICE_RESET, ATA_CMD_IDENTIFY_DEVICE,
    ATA_CMD_IDENTIFY_PACKET_DEVICE, ATA_CMD_PACKET,
};
use tracing::trace;

use crate::atapi::{AtapiDrive, PacketResult};
use crate::clock::VirtualClock;
use crate::disk::AtaDisk;
use crate::io::{IoPortBus, PortIoDevice};

const IDE_STATUS_BSY: u8 = 0x80;
const IDE_STATUS_DRDY: u8 = 0x40;
const IDE_STATUS_DRQ: u8 = 0x08;
const IDE_STATUS_ERR: u8 = 0x01;

const IDE_CTRL_SRST: u8 = 0x04;

const ATA_ERR_ABRT: u8 = 0x04;

const ATA_REG_DATA: u16 = 0;
const ATA_REG_ERROR_FEATURES: u16 = 1;
const ATA_REG_SECTOR_COUNT: u16 = 2;
const ATA_REG_LBA0: u16 = 3;
const ATA_REG_LBA1: u16 = 4;
const ATA_REG_LBA2: u16 = 5;
const ATA_REG_DEVICE: u16 = 6;
const ATA_REG_STATUS_COMMAND: u16 = 7;

const ATA_CTRL_ALT_STATUS_DEVICE_CTRL: u16 = 0;
const ATA_CTRL_DRIVE_ADDRESS: u16 = 1;

/// How long a device stays busy after SRST or DEVICE RESET.
pub const RESET_BUSY_NS: u64 = 2_000_000;

/// Byte count a device uses when the host leaves the limit at zero.
const DEFAULT_BYTE_LIMIT: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataMode {
    None,
    PioIn,
    PioOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferKind {
    Identify,
    AtapiPacket,
    AtapiPioIn,
}

#[derive(Debug, Clone, Default)]
struct TaskFile {
    features: u8,
    sector_count: u8,
    lba0: u8,
    lba1: u8,
    lba2: u8,
    device: u8,
}

impl TaskFile {
    fn read_reg(&self, reg: u16) -> u8 {
        match reg {
            ATA_REG_ERROR_FEATURES => self.features,
            ATA_REG_SECTOR_COUNT => self.sector_count,
            ATA_REG_LBA0 => self.lba0,
            ATA_REG_LBA1 => self.lba1,
            ATA_REG_LBA2 => self.lba2,
            ATA_REG_DEVICE => self.device,
            _ => 0,
        }
    }

    fn write_reg(&mut self, reg: u16, val: u8) {
        match reg {
            ATA_REG_ERROR_FEATURES => self.features = val,
            ATA_REG_SECTOR_COUNT => self.sector_count = val,
            ATA_REG_LBA0 => self.lba0 = val,
            ATA_REG_LBA1 => self.lba1 = val,
            ATA_REG_LBA2 => self.lba2 = val,
            ATA_REG_DEVICE => self.device = val,
            _ => {}
        }
    }
}

pub enum IdeDevice {
    Ata(AtaDisk),
    Atapi(AtapiDrive),
}

pub struct IdeChannel {
    ports: IdeRegsBaseAddr,
    clock: VirtualClock,
    devices: [Option<IdeDevice>; 2],

    tf: TaskFile,
    status: u8,
    error: u8,
    control: u8,

    data_mode: DataMode,
    transfer_kind: Option<TransferKind>,
    data: Vec<u8>,
    data_index: usize,
    /// End of the current DRQ burst within `data`.
    burst_end: usize,
    /// Host-offered byte count captured when the PACKET command was issued.
    byte_limit: u16,

    busy_until_ns: Option<u64>,
}

pub type SharedIdeChannel = Rc<RefCell<IdeChannel>>;

impl IdeChannel {
    pub fn new(ports: IdeRegsBaseAddr, clock: VirtualClock) -> Self {
        Self {
            ports,
            clock,
            devices: [None, None],
            tf: TaskFile::default(),
            status: IDE_STATUS_DRDY,
            error: 0,
            control: 0,
            data_mode: DataMode::None,
            transfer_kind: None,
            data: Vec::new(),
            data_index: 0,
            burst_end: 0,
            byte_limit: 0,
            busy_until_ns: None,
        }
    }

    pub fn into_shared(self) -> SharedIdeChannel {
        Rc::new(RefCell::new(self))
    }

    pub fn ports(&self) -> IdeRegsBaseAddr {
        self.ports
    }

    /// Attach a device as master (`slot` 0) or slave (`slot` 1).
    pub fn attach(&mut self, slot: usize, device: IdeDevice) {
        self.devices[slot] = Some(device);
    }

    pub fn with_master(mut self, device: IdeDevice) -> Self {
        self.attach(0, device);
        self
    }

    pub fn with_slave(mut self, device: IdeDevice) -> Self {
        self.attach(1, device);
        self
    }

    pub fn atapi(&self, slot: usize) -> Option<&AtapiDrive> {
        match self.devices.get(slot)?.as_ref()? {
            IdeDevice::Atapi(dev) => Some(dev),
            IdeDevice::Ata(_) => None,
        }
    }

    pub fn atapi_mut(&mut self, slot: usize) -> Option<&mut AtapiDrive> {
        match self.devices.get_mut(slot)?.as_mut()? {
            IdeDevice::Atapi(dev) => Some(dev),
            IdeDevice::Ata(_) => None,
        }
    }

    fn selected_drive(&self) -> usize {
        usize::from((self.tf.device >> 4) & 1)
    }

    fn drive_present(&self, idx: usize) -> bool {
        self.devices[idx].is_some()
    }

    fn any_drive_present(&self) -> bool {
        self.devices.iter().any(Option::is_some)
    }

    fn drive_address(&self) -> u8 {
        let head = self.tf.device & 0x0F;
        let dev = self.selected_drive() as u8;
        let n_ds0 = dev;
        let n_ds1 = dev ^ 1;
        0xC0 | (n_ds1 << 5) | (n_ds0 << 4) | ((!head) & 0x0F)
    }

    /// Drop BSY once a pending reset has run its course.
    fn update_busy(&mut self) {
        let Some(deadline) = self.busy_until_ns else {
            return;
        };
        if (self.control & IDE_CTRL_SRST) != 0 || self.clock.now_ns() < deadline {
            return;
        }
        self.busy_until_ns = None;
        self.status &= !IDE_STATUS_BSY;
        if matches!(self.devices[self.selected_drive()], Some(IdeDevice::Ata(_))) {
            self.status |= IDE_STATUS_DRDY;
        }
    }

    fn begin_reset(&mut self) {
        self.abort_transfer();
        self.status = IDE_STATUS_BSY;
        self.error = 0x01; // diagnostic passed
        self.busy_until_ns = Some(self.clock.now_ns().saturating_add(RESET_BUSY_NS));
    }

    /// SRST: both devices reset and the task file returns to its power-on image.
    fn reset(&mut self) {
        trace!(cmd_base = self.ports.command_block_base, "channel reset");
        self.tf = TaskFile::default();
        for dev in self.devices.iter_mut().flatten() {
            if let IdeDevice::Atapi(dev) = dev {
                dev.reset();
            }
        }
        if self
            .devices
            .iter()
            .any(|dev| matches!(dev, Some(IdeDevice::Atapi(_))))
        {
            self.write_packet_signature();
        }
        self.begin_reset();
    }

    fn write_packet_signature(&mut self) {
        self.tf.sector_count = 0x01;
        self.tf.lba0 = 0x01;
        self.tf.lba1 = 0x14;
        self.tf.lba2 = 0xEB;
    }

    fn set_error(&mut self, err: u8) {
        self.error = err;
        self.status |= IDE_STATUS_ERR;
    }

    fn clear_error(&mut self) {
        self.error = 0;
        self.status &= !IDE_STATUS_ERR;
    }

    fn abort_transfer(&mut self) {
        self.data_mode = DataMode::None;
        self.transfer_kind = None;
        self.data.clear();
        self.data_index = 0;
        self.burst_end = 0;
    }

    fn abort_command(&mut self, err: u8) {
        self.abort_transfer();
        self.set_error(err);
        self.status &= !(IDE_STATUS_BSY | IDE_STATUS_DRQ);
        self.status |= IDE_STATUS_DRDY;
    }

    fn begin_pio_in(&mut self, kind: TransferKind, data: Vec<u8>) {
        self.data = data;
        self.data_index = 0;
        self.burst_end = self.data.len();
        self.data_mode = DataMode::PioIn;
        self.transfer_kind = Some(kind);
        self.status &= !IDE_STATUS_BSY;
        self.status |= IDE_STATUS_DRQ | IDE_STATUS_DRDY;
        self.clear_error();
    }

    fn begin_pio_out(&mut self, kind: TransferKind, len: usize) {
        self.data = vec![0u8; len];
        self.data_index = 0;
        self.burst_end = len;
        self.data_mode = DataMode::PioOut;
        self.transfer_kind = Some(kind);
        self.status &= !IDE_STATUS_BSY;
        self.status |= IDE_STATUS_DRQ | IDE_STATUS_DRDY;
        self.clear_error();
    }

    /// Publish the next DRQ burst of an ATAPI data-in phase through the byte count registers.
    fn open_burst(&mut self) {
        let limit = match self.byte_limit & !1 {
            0 => DEFAULT_BYTE_LIMIT,
            n => n,
        };
        let remaining = self.data.len() - self.data_index;
        let burst = remaining.min(usize::from(limit));
        self.burst_end = self.data_index + burst;
        self.tf.lba1 = burst as u8;
        self.tf.lba2 = (burst >> 8) as u8;
        self.status &= !IDE_STATUS_BSY;
        self.status |= IDE_STATUS_DRQ;
    }

    fn complete_non_data_command(&mut self) {
        self.abort_transfer();
        self.status &= !(IDE_STATUS_BSY | IDE_STATUS_DRQ);
        self.status |= IDE_STATUS_DRDY;
        self.clear_error();
    }

    fn data_in_u16(&mut self) -> u16 {
        if self.data_mode != DataMode::PioIn || self.data_index >= self.data.len() {
            return 0;
        }
        let lo = self.data[self.data_index];
        let hi = self.data.get(self.data_index + 1).copied().unwrap_or(0);
        self.data_index += 2;
        if self.data_index >= self.data.len() {
            self.finish_data_phase();
        } else if self.data_index >= self.burst_end {
            self.open_burst();
        }
        u16::from_le_bytes([lo, hi])
    }

    fn data_in_u8(&mut self) -> u8 {
        if self.data_mode != DataMode::PioIn || self.data_index >= self.data.len() {
            return 0;
        }
        let b = self.data[self.data_index];
        self.data_index += 1;
        if self.data_index >= self.data.len() {
            self.finish_data_phase();
        } else if self.data_index >= self.burst_end {
            self.open_burst();
        }
        b
    }

    fn data_out_u16(&mut self, val: u16) {
        if self.data_mode != DataMode::PioOut || self.data_index + 2 > self.data.len() {
            // Ignore overflow.
            return;
        }
        let b = val.to_le_bytes();
        self.data[self.data_index] = b[0];
        self.data[self.data_index + 1] = b[1];
        self.data_index += 2;
        if self.data_index >= self.data.len() {
            self.finish_data_phase();
        }
    }

    fn finish_data_phase(&mut self) {
        match self.transfer_kind {
            Some(TransferKind::AtapiPioIn) => {
                // Data phase complete; transition to status phase.
                self.tf.sector_count = 0x03; // IO=1, CoD=1
                self.complete_non_data_command();
            }
            Some(TransferKind::AtapiPacket) => {
                let mut packet = [0u8; 12];
                packet.copy_from_slice(&self.data[..12]);
                let idx = self.selected_drive();
                let result = match self.devices[idx].as_mut() {
                    Some(IdeDevice::Atapi(dev)) => dev.handle_packet(&packet),
                    _ => {
                        self.abort_command(ATA_ERR_ABRT);
                        return;
                    }
                };

                match result {
                    PacketResult::DataIn(buf) if buf.is_empty() => {
                        self.tf.sector_count = 0x03;
                        self.complete_non_data_command();
                    }
                    PacketResult::DataIn(buf) => {
                        // ATAPI uses sector_count as interrupt reason; IO=1, CoD=0.
                        self.tf.sector_count = 0x02;
                        self.begin_pio_in(TransferKind::AtapiPioIn, buf);
                        self.open_burst();
                    }
                    PacketResult::NoDataSuccess => {
                        self.tf.sector_count = 0x03; // IO=1, CoD=1 (status)
                        self.complete_non_data_command();
                    }
                    PacketResult::Error { sense_key, .. } => {
                        self.tf.sector_count = 0x03;
                        self.abort_command((sense_key << 4) | ATA_ERR_ABRT);
                    }
                }
            }
            Some(TransferKind::Identify) | None => {
                self.complete_non_data_command();
            }
        }
    }

    fn read_cmd_reg(&mut self, reg: u16, size: u8) -> u32 {
        self.update_busy();
        let dev_idx = self.selected_drive();
        if !self.drive_present(dev_idx) {
            return self.absent_read(reg, size);
        }

        match reg {
            ATA_REG_DATA => match size {
                1 => self.data_in_u8() as u32,
                _ => self.data_in_u16() as u32,
            },
            ATA_REG_ERROR_FEATURES => self.error as u32,
            ATA_REG_SECTOR_COUNT | ATA_REG_LBA0 | ATA_REG_LBA1 | ATA_REG_LBA2 | ATA_REG_DEVICE => {
                self.tf.read_reg(reg) as u32
            }
            ATA_REG_STATUS_COMMAND => self.status as u32,
            _ => 0,
        }
    }

    /// Reads aimed at an absent device. With no device on the channel the bus floats high;
    /// otherwise the present device answers status reads with zero (BSY while resetting) and
    /// shadows the task file.
    fn absent_read(&self, reg: u16, size: u8) -> u32 {
        if !self.any_drive_present() {
            return match size {
                1 => 0xFF,
                _ => 0xFFFF,
            };
        }
        match reg {
            ATA_REG_STATUS_COMMAND => u32::from(self.status & IDE_STATUS_BSY),
            ATA_REG_DATA | ATA_REG_ERROR_FEATURES => 0,
            _ => self.tf.read_reg(reg) as u32,
        }
    }

    fn write_cmd_reg(&mut self, reg: u16, size: u8, val: u32) {
        self.update_busy();
        // Writes only reach the selected device. The device register is always honored so the
        // host can select either drive.
        let dev_idx = self.selected_drive();
        if reg != ATA_REG_DEVICE && !self.drive_present(dev_idx) {
            return;
        }

        match reg {
            ATA_REG_DATA => match size {
                1 => self.data_out_u16(u16::from(val as u8)),
                _ => self.data_out_u16(val as u16),
            },
            ATA_REG_ERROR_FEATURES
            | ATA_REG_SECTOR_COUNT
            | ATA_REG_LBA0
            | ATA_REG_LBA1
            | ATA_REG_LBA2
            | ATA_REG_DEVICE => {
                self.tf.write_reg(reg, val as u8);
            }
            ATA_REG_STATUS_COMMAND => self.exec_command(val as u8),
            _ => {}
        }
    }

    fn read_ctrl_reg(&mut self, reg: u16, size: u8) -> u32 {
        self.update_busy();
        let dev_idx = self.selected_drive();
        if !self.drive_present(dev_idx) {
            return match reg {
                ATA_CTRL_ALT_STATUS_DEVICE_CTRL => self.absent_read(ATA_REG_STATUS_COMMAND, size),
                _ => self.absent_read(ATA_REG_DATA, size),
            };
        }

        match reg {
            ATA_CTRL_ALT_STATUS_DEVICE_CTRL => self.status as u32,
            ATA_CTRL_DRIVE_ADDRESS => self.drive_address() as u32,
            _ => 0,
        }
    }

    fn write_ctrl_reg(&mut self, reg: u16, val: u8) {
        if reg != ATA_CTRL_ALT_STATUS_DEVICE_CTRL {
            return;
        }
        let prev = self.control;
        self.control = val;
        if (prev & IDE_CTRL_SRST) == 0 && (val & IDE_CTRL_SRST) != 0 {
            self.reset();
        }
        self.update_busy();
    }

    fn exec_command(&mut self, cmd: u8) {
        if (self.status & IDE_STATUS_BSY) != 0 && cmd != ATA_CMD_DEVICE_RESET {
            trace!(cmd, "command ignored while busy");
            return;
        }
        self.status |= IDE_STATUS_BSY;
        self.status &= !IDE_STATUS_DRQ;

        let dev_idx = self.selected_drive();
        trace!(cmd, drive = dev_idx, "exec command");

        match cmd {
            ATA_CMD_IDENTIFY_DEVICE => {
                match self.devices[dev_idx].as_ref() {
                    Some(IdeDevice::Ata(disk)) => {
                        let data = disk.identify_data();
                        self.begin_pio_in(TransferKind::Identify, data);
                    }
                    Some(IdeDevice::Atapi(_)) => {
                        // Packet devices abort and leave their signature behind.
                        self.write_packet_signature();
                        self.abort_command(ATA_ERR_ABRT);
                    }
                    None => self.abort_command(ATA_ERR_ABRT),
                }
            }
            ATA_CMD_IDENTIFY_PACKET_DEVICE => {
                let data = match self.devices[dev_idx].as_ref() {
                    Some(IdeDevice::Atapi(dev)) => Some(dev.identify_packet_data()),
                    _ => None,
                };
                match data {
                    Some(data) => self.begin_pio_in(TransferKind::Identify, data),
                    None => self.abort_command(ATA_ERR_ABRT),
                }
            }
            ATA_CMD_CHECK_POWER_MODE => {
                // Always active.
                let silent = matches!(
                    self.devices[dev_idx].as_ref(),
                    Some(IdeDevice::Atapi(dev)) if dev.silent_power_mode()
                );
                self.tf.sector_count = 0xFF;
                if silent {
                    self.abort_transfer();
                    self.status &= !(IDE_STATUS_BSY | IDE_STATUS_DRQ | IDE_STATUS_DRDY);
                    self.clear_error();
                } else {
                    self.complete_non_data_command();
                }
            }
            ATA_CMD_DEVICE_RESET => {
                match self.devices[dev_idx].as_mut() {
                    Some(IdeDevice::Atapi(dev)) => {
                        dev.reset();
                        self.write_packet_signature();
                        self.begin_reset();
                    }
                    _ => self.abort_command(ATA_ERR_ABRT),
                }
            }
            ATA_CMD_PACKET => {
                if matches!(self.devices[dev_idx], Some(IdeDevice::Atapi(_))) {
                    self.byte_limit = u16::from_le_bytes([self.tf.lba1, self.tf.lba2]);
                    self.tf.sector_count = 0x01; // CoD=1, IO=0
                    self.begin_pio_out(TransferKind::AtapiPacket, 12);
                } else {
                    self.abort_command(ATA_ERR_ABRT);
                }
            }
            _ => self.abort_command(ATA_ERR_ABRT),
        }
    }

    pub fn io_read(&mut self, port: u16, size: u8) -> u32 {
        let cmd_base = self.ports.command_block_base;
        let ctrl_base = self.ports.control_block_base;
        if (cmd_base..cmd_base.wrapping_add(8)).contains(&port) {
            return self.read_cmd_reg(port - cmd_base, size);
        }
        if (ctrl_base..ctrl_base.wrapping_add(2)).contains(&port) {
            return self.read_ctrl_reg(port - ctrl_base, size);
        }
        0xFFFF_FFFF
    }

    pub fn io_write(&mut self, port: u16, size: u8, val: u32) {
        let cmd_base = self.ports.command_block_base;
        let ctrl_base = self.ports.control_block_base;
        if (cmd_base..cmd_base.wrapping_add(8)).contains(&port) {
            self.write_cmd_reg(port - cmd_base, size, val);
        } else if (ctrl_base..ctrl_base.wrapping_add(2)).contains(&port) {
            self.write_ctrl_reg(port - ctrl_base, val as u8);
        }
    }
}

/// Per-port `PortIoDevice` view into a shared channel.
pub struct IdeChannelPort {
    channel: SharedIdeChannel,
    port: u16,
}

impl IdeChannelPort {
    pub fn new(channel: SharedIdeChannel, port: u16) -> Self {
        Self { channel, port }
    }
}

impl PortIoDevice for IdeChannelPort {
    fn read(&mut self, port: u16, size: u8) -> u32 {
        debug_assert_eq!(port, self.port);
        self.channel.borrow_mut().io_read(port, size)
    }

    fn write(&mut self, port: u16, size: u8, value: u32) {
        debug_assert_eq!(port, self.port);
        self.channel.borrow_mut().io_write(port, size, value);
    }
}

/// Register the channel's command block (8 ports) and control block (2 ports) on `bus`.
pub fn register_ide_channel(bus: &mut IoPortBus, channel: SharedIdeChannel) {
    let ports = channel.borrow().ports();
    bus.register_shared_range(ports.command_block_base, 8, |port| {
        Box::new(IdeChannelPort::new(channel.clone(), port))
    });
    bus.register_shared_range(ports.control_block_base, 2, |port| {
        Box::new(IdeChannelPort::new(channel.clone(), port))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: IdeRegsBaseAddr = IdeRegsBaseAddr {
        command_block_base: 0x1F0,
        control_block_base: 0x3F6,
    };

    fn channel(master: Option<IdeDevice>) -> IdeChannel {
        let mut chan = IdeChannel::new(BASE, VirtualClock::new());
        if let Some(dev) = master {
            chan.attach(0, dev);
        }
        chan
    }

    #[test]
    fn empty_channel_floats_high() {
        let mut chan = channel(None);
        assert_eq!(chan.io_read(0x1F7, 1), 0xFF);
        assert_eq!(chan.io_read(0x3F6, 1), 0xFF);
    }

    #[test]
    fn absent_slave_reads_zero_status_behind_present_master() {
        let mut chan = channel(Some(IdeDevice::Atapi(AtapiDrive::cdrom(None))));
        chan.io_write(0x1F6, 1, 0xB0);
        chan.io_write(0x1F7, 1, 0xE5);
        assert_eq!(chan.io_read(0x1F7, 1), 0);
        chan.io_write(0x1F2, 1, 0x55);
        assert_ne!(chan.io_read(0x1F2, 1), 0x55);
    }

    #[test]
    fn identify_device_on_packet_device_leaves_signature() {
        let mut chan = channel(Some(IdeDevice::Atapi(AtapiDrive::cdrom(None))));
        chan.io_write(0x1F6, 1, 0xA0);
        chan.io_write(0x1F7, 1, u32::from(ATA_CMD_IDENTIFY_DEVICE));
        assert_eq!(chan.io_read(0x1F7, 1) & u32::from(IDE_STATUS_ERR), 1);
        assert_eq!(chan.io_read(0x1F4, 1), 0x14);
        assert_eq!(chan.io_read(0x1F5, 1), 0xEB);
    }

    #[test]
    fn srst_holds_busy_until_deadline() {
        let clock = VirtualClock::new();
        let mut chan = IdeChannel::new(BASE, clock.clone())
            .with_master(IdeDevice::Atapi(AtapiDrive::cdrom(None)));

        chan.io_write(0x3F6, 1, 0x06);
        chan.io_write(0x3F6, 1, 0x02);
        assert_ne!(chan.io_read(0x3F6, 1) & u32::from(IDE_STATUS_BSY), 0);

        clock.advance(RESET_BUSY_NS);
        assert_eq!(chan.io_read(0x3F6, 1) & u32::from(IDE_STATUS_BSY), 0);
    }

    #[test]
    fn packet_data_in_is_split_by_byte_count_limit() {
        let mut chan = channel(Some(IdeDevice::Atapi(AtapiDrive::cdrom(None))));
        chan.io_write(0x1F6, 1, 0xA0);
        chan.io_write(0x1F4, 1, 0x10);
        chan.io_write(0x1F5, 1, 0x00);
        chan.io_write(0x1F7, 1, 0xA0);
        assert_ne!(chan.io_read(0x1F7, 1) & u32::from(IDE_STATUS_DRQ), 0);

        // INQUIRY, 36 bytes, 16-byte bursts.
        let packet: [u16; 6] = [0x0012, 0x0000, 0x0024, 0, 0, 0];
        for word in packet {
            chan.io_write(0x1F0, 2, u32::from(word));
        }

        let mut bursts = Vec::new();
        while chan.io_read(0x1F7, 1) & u32::from(IDE_STATUS_DRQ) != 0 {
            let count = chan.io_read(0x1F4, 1) | (chan.io_read(0x1F5, 1) << 8);
            bursts.push(count);
            for _ in 0..count / 2 {
                chan.io_read(0x1F0, 2);
            }
        }
        assert_eq!(bursts, vec![16, 16, 4]);
        assert_eq!(chan.io_read(0x1F2, 1), 0x03);
    }
}
