use std::{default::Default, time::Duration};

use entsync_shared::TemplateAccessor;

use crate::connection::{connection_config::ConnectionConfig, ping_config::PingConfig};

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Used to configure the connections with Clients
    pub connection: ConnectionConfig,
    /// Configuration used to measure ping and drop idle Clients
    pub ping: PingConfig,
    /// How often timed shares expire and tick hooks run
    pub tick_interval: Duration,
    /// Template of the ClientSession entity created for every new connection
    pub client_session_template: Option<TemplateAccessor>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            ping: PingConfig::default(),
            tick_interval: Duration::from_millis(100),
            client_session_template: None,
        }
    }
}
