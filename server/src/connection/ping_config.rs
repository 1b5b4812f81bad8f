use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by the Server's ping loop
#[derive(Clone, Debug)]
pub struct PingConfig {
    /// The duration to wait before sending a ping message to every online client
    pub ping_interval: Duration,
    /// Connections that have sent nothing for this long are disconnected
    pub idle_timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(35),
        }
    }
}
