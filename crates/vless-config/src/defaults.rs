//! Serde default functions backed by `vless_core::defaults`.

use vless_core::defaults;

/// Generate default value functions for `Copy` constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return `String` from `&str` constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_connect_timeout_secs => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_max_header_bytes     => DEFAULT_MAX_HEADER_BYTES: usize,
    min_header_bytes             => MIN_HEADER_BYTES: usize,
    default_relay_buffer_size    => DEFAULT_RELAY_BUFFER_SIZE: usize,
    default_connection_backlog   => DEFAULT_CONNECTION_BACKLOG: u32,
    default_ws_max_frame_bytes   => DEFAULT_WS_MAX_FRAME_BYTES: usize,
    default_tcp_no_delay         => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs   => DEFAULT_TCP_KEEPALIVE_SECS: u64,
}

default_string_fns! {
    default_tls_min_version => DEFAULT_TLS_MIN_VERSION,
    default_tls_max_version => DEFAULT_TLS_MAX_VERSION,
    default_ws_path         => DEFAULT_WS_PATH,
}
