//! Relay metrics wiring.
//!
//! Wraps the session relay from `vless-core` with Prometheus byte counters.

use vless_core::io::RelayMetrics;
use vless_metrics::{record_bytes_downlink, record_bytes_uplink};

/// Metrics recorder for global bytes tracking.
pub(crate) struct SessionMetrics;

impl RelayMetrics for SessionMetrics {
    #[inline]
    fn record_inbound(&self, bytes: u64) {
        record_bytes_uplink(bytes);
    }
    #[inline]
    fn record_outbound(&self, bytes: u64) {
        record_bytes_downlink(bytes);
    }
}
