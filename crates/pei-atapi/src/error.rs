use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtapiError>;

/// Failure reported by the recovery block-I/O driver.
///
/// Poll primitives produce [`AtapiError::Timeout`] and [`AtapiError::Aborted`]; the command
/// layers above them fold both into [`AtapiError::DeviceError`] before anything reaches a
/// block-I/O caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AtapiError {
    #[error("timed out waiting for the device")]
    Timeout,

    #[error("device aborted the command")]
    Aborted,

    #[error("device reported an error")]
    DeviceError,

    #[error("no media in the drive")]
    NoMedia,

    #[error("buffer length {size} is not a multiple of the block size {block_size}")]
    BadBufferSize { size: usize, block_size: u32 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("unsupported peripheral device type {0:#04x}")]
    Unsupported(u8),

    #[error("out of resources")]
    OutOfResources,
}

impl AtapiError {
    /// Collapse poll-level failures into a device error.
    pub(crate) fn into_device_error(self) -> Self {
        match self {
            AtapiError::Timeout | AtapiError::Aborted => AtapiError::DeviceError,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_failures_fold_into_device_error() {
        assert_eq!(AtapiError::Timeout.into_device_error(), AtapiError::DeviceError);
        assert_eq!(AtapiError::Aborted.into_device_error(), AtapiError::DeviceError);
        assert_eq!(AtapiError::NoMedia.into_device_error(), AtapiError::NoMedia);
    }

    #[test]
    fn bad_buffer_size_message_names_both_sizes() {
        let err = AtapiError::BadBufferSize {
            size: 100,
            block_size: 2048,
        };
        assert_eq!(
            err.to_string(),
            "buffer length 100 is not a multiple of the block size 2048"
        );
    }
}
