//! VLESS-over-WebSocket relay server.
//!
//! Exposes the server loop and the connection establisher for integration
//! tests and embedding.

pub mod cli;
mod connect;
mod error;
mod handler;
mod relay;
mod server;
mod state;
mod tls;
mod upgrade;
mod util;

pub use cli::ServerArgs;
pub use connect::{Dialer, Established, Route, TcpDialer, establish};
pub use error::ServerError;
pub use server::{DEFAULT_SHUTDOWN_TIMEOUT, run, run_with_shutdown};
pub use state::{Endpoint, ServerState};
pub use tokio_util::sync::CancellationToken;
pub use upgrade::RejectStatus;
