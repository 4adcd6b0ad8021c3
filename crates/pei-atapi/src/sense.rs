//! REQUEST SENSE acquisition and sense-data classification.

use tracing::debug;

use crate::packet::{PacketCommand, REQUEST_SENSE_DATA_LEN};
use crate::regs::DevicePosition;
use crate::{AtapiError, IdeBus, PortIo, Result, Stall};

pub const SENSE_NO_SENSE: u8 = 0x00;
pub const SENSE_NOT_READY: u8 = 0x02;
pub const SENSE_MEDIUM_ERROR: u8 = 0x03;
pub const SENSE_UNIT_ATTENTION: u8 = 0x06;

pub const ASC_NOT_READY: u8 = 0x04;
pub const ASC_MEDIA_ERR1: u8 = 0x10;
pub const ASC_MEDIA_ERR2: u8 = 0x11;
pub const ASC_MEDIA_ERR3: u8 = 0x14;
pub const ASC_MEDIA_ERR4: u8 = 0x30;
pub const ASC_MEDIA_UPSIDE_DOWN: u8 = 0x06;
pub const ASC_NO_MEDIA: u8 = 0x3A;

pub const ASCQ_IN_PROGRESS: u8 = 0x01;
pub const ASCQ_MEDIA_UPSIDE_DOWN: u8 = 0x02;

/// Upper bound on records collected by one [`IdeBus::request_sense`] call.
pub const MAX_SENSE_KEY_COUNT: usize = 6;

/// Fixed-format sense data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenseRecord {
    pub error_code: u8,
    pub sense_key: u8,
    pub information: [u8; 4],
    pub addnl_sense_length: u8,
    pub command_specific: [u8; 4],
    pub additional_sense_code: u8,
    pub additional_sense_code_qualifier: u8,
    pub field_replaceable_unit: u8,
}

impl SenseRecord {
    pub fn parse(bytes: &[u8; REQUEST_SENSE_DATA_LEN]) -> Self {
        Self {
            error_code: bytes[0] & 0x7F,
            sense_key: bytes[2] & 0x0F,
            information: [bytes[3], bytes[4], bytes[5], bytes[6]],
            addnl_sense_length: bytes[7],
            command_specific: [bytes[8], bytes[9], bytes[10], bytes[11]],
            additional_sense_code: bytes[12],
            additional_sense_code_qualifier: bytes[13],
            field_replaceable_unit: bytes[14],
        }
    }

    pub const fn new(sense_key: u8, asc: u8, ascq: u8) -> Self {
        Self {
            error_code: 0x70,
            sense_key,
            information: [0; 4],
            addnl_sense_length: 10,
            command_specific: [0; 4],
            additional_sense_code: asc,
            additional_sense_code_qualifier: ascq,
            field_replaceable_unit: 0,
        }
    }
}

/// Readiness verdict derived from a sense set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveReadiness {
    Ready,
    NotReady { need_retry: bool },
}

pub fn is_no_media(senses: &[SenseRecord]) -> bool {
    senses
        .iter()
        .any(|s| s.sense_key == SENSE_NOT_READY && s.additional_sense_code == ASC_NO_MEDIA)
}

pub fn is_media_error(senses: &[SenseRecord]) -> bool {
    senses.iter().any(|s| match s.sense_key {
        SENSE_MEDIUM_ERROR => matches!(
            s.additional_sense_code,
            ASC_MEDIA_ERR1 | ASC_MEDIA_ERR2 | ASC_MEDIA_ERR3 | ASC_MEDIA_ERR4
        ),
        SENSE_NOT_READY => {
            s.additional_sense_code == ASC_MEDIA_UPSIDE_DOWN
                && s.additional_sense_code_qualifier == ASCQ_MEDIA_UPSIDE_DOWN
        }
        _ => false,
    })
}

/// The last "logical unit not ready" record decides.
pub fn drive_readiness(senses: &[SenseRecord]) -> DriveReadiness {
    senses
        .iter()
        .rev()
        .find(|s| s.sense_key == SENSE_NOT_READY && s.additional_sense_code == ASC_NOT_READY)
        .map_or(DriveReadiness::Ready, |s| DriveReadiness::NotReady {
            need_retry: s.additional_sense_code_qualifier == ASCQ_IN_PROGRESS,
        })
}

/// A pending unit attention means earlier sense data may be stale.
pub fn is_device_state_unclear(senses: &[SenseRecord]) -> bool {
    senses.iter().any(|s| s.sense_key == SENSE_UNIT_ATTENTION)
}

impl<P: PortIo, S: Stall> IdeBus<P, S> {
    /// Drain the device's sense data: repeat REQUEST SENSE until it reports NO SENSE or
    /// [`MAX_SENSE_KEY_COUNT`] records were collected.
    ///
    /// A failure before the first record is a `DeviceError`; a later failure returns what was
    /// already collected.
    pub fn request_sense(&mut self, position: DevicePosition) -> Result<Vec<SenseRecord>> {
        let mut senses = Vec::new();
        senses
            .try_reserve_exact(MAX_SENSE_KEY_COUNT)
            .map_err(|_| AtapiError::OutOfResources)?;

        let packet = PacketCommand::RequestSense {
            allocation_length: REQUEST_SENSE_DATA_LEN as u8,
        };
        while senses.len() < MAX_SENSE_KEY_COUNT {
            let mut raw = [0u8; REQUEST_SENSE_DATA_LEN];
            let timeout = self.config.atapi_timeout_ms;
            if let Err(err) = self.packet_command_in(position, &packet, Some(&mut raw), timeout) {
                if senses.is_empty() {
                    return Err(err);
                }
                break;
            }

            let record = SenseRecord::parse(&raw);
            debug!(
                %position,
                key = record.sense_key,
                asc = record.additional_sense_code,
                ascq = record.additional_sense_code_qualifier,
                "sense"
            );
            senses.push(record);
            if record.sense_key == SENSE_NO_SENSE {
                break;
            }
        }
        Ok(senses)
    }
}
