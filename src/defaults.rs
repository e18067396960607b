//! Default values used across the crate.

pub mod http {
    use std::time::Duration;

    /// Request timeout forwarded to backends unless the client overrides it.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Root a client is rewritten to when addressed through a unix socket.
    pub const UDS_ROOT: &str = "http://socket";

    /// Pseudo-scheme selecting unix domain socket addressing.
    pub const UDS_SCHEME: &str = "uds://";

    pub const USER_AGENT: &str = concat!("apiclient/", env!("CARGO_PKG_VERSION"));
}
