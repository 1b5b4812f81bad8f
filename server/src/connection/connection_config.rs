use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by a Connection
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Largest frame payload accepted from or sent to a client, in bytes
    pub max_frame_size: usize,
    /// A warning is logged once a per-connection queue grows past this many
    /// commands
    pub queue_warn_threshold: usize,
    /// How long an orderly close may spend writing already queued commands
    pub flush_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            queue_warn_threshold: 1024,
            flush_timeout: Duration::from_secs(2),
        }
    }
}
