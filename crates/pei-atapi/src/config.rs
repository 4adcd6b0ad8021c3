use serde::{Deserialize, Serialize};

/// Timeouts, delays and retry limits used by the driver.
///
/// Timeouts are in milliseconds and feed the poll budget (see [`crate::poll_budget`]); delays are
/// in microseconds and go straight to [`crate::Stall`]. Any field missing from a serialized
/// configuration takes its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtapiConfig {
    /// Bound on ATA taskfile handshakes (IDENTIFY, DRQ settling).
    pub ata_timeout_ms: u64,
    /// Bound on ordinary PACKET commands.
    pub atapi_timeout_ms: u64,
    /// Bound on READ(10) bursts.
    pub atapi_long_timeout_ms: u64,
    /// Bound on the BSY wait of controller detection.
    pub detect_timeout_ms: u64,
    /// Worst-case BSY duration after a soft or hard reset.
    pub reset_timeout_ms: u64,
    /// Settle delay after a successful soft reset.
    pub reset_settle_us: u64,
    /// Delay after a PACKET command reports ERR.
    pub error_recovery_us: u64,
    /// Delay between capacity attempts in media detection.
    pub retry_interval_us: u64,
    pub test_unit_ready_attempts: u32,
    pub request_sense_attempts: u32,
    pub read_capacity_max_attempts: u32,
}

impl Default for AtapiConfig {
    fn default() -> Self {
        Self {
            ata_timeout_ms: 1_000,
            atapi_timeout_ms: 5_000,
            atapi_long_timeout_ms: 5_000,
            detect_timeout_ms: 3_000,
            reset_timeout_ms: 31_000,
            reset_settle_us: 5_000_000,
            error_recovery_us: 3_000_000,
            retry_interval_us: 200_000,
            test_unit_ready_attempts: 2,
            request_sense_attempts: 5,
            read_capacity_max_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: AtapiConfig =
            serde_json::from_str(r#"{ "atapi_timeout_ms": 250, "request_sense_attempts": 2 }"#)
                .unwrap();
        assert_eq!(cfg.atapi_timeout_ms, 250);
        assert_eq!(cfg.request_sense_attempts, 2);
        assert_eq!(cfg.reset_timeout_ms, 31_000);
        assert_eq!(cfg.retry_interval_us, 200_000);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = AtapiConfig {
            atapi_long_timeout_ms: 12_000,
            ..AtapiConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AtapiConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
