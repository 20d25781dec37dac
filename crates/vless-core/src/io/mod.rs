//! I/O primitives: the session relay engine and stream adapters.

mod prefixed;
mod relay;

pub use prefixed::PrefixedStream;
pub use relay::{
    CloseReason, DOWNLINK_PROLOGUE, NoOpMetrics, RelayMetrics, RelaySession, relay_session,
};
