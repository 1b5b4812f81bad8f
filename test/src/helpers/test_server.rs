use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};

use entsync_server::{
    ConnectionHandle, ConnectionPhase, DisconnectReason, EntityRegistry, Handlers, Server,
    ServerConfig,
};
use entsync_shared::Protocol;

use crate::{helpers::test_client::TestClient, test_protocol::protocol};

/// A [`Server`] running the test protocol, reached over in-memory streams.
pub struct TestServer {
    pub server: Arc<Server>,
}

impl TestServer {
    pub fn new(handlers: Handlers) -> Self {
        Self::with_config(ServerConfig::default(), handlers)
    }

    pub fn with_config(config: ServerConfig, handlers: Handlers) -> Self {
        Self::with_protocol(config, protocol(), handlers)
    }

    pub fn with_protocol(config: ServerConfig, protocol: Protocol, handlers: Handlers) -> Self {
        Self {
            server: Server::new(config, protocol, handlers),
        }
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        self.server.registry()
    }

    /// Connects a new client and completes its handshake.
    pub async fn connect(&self) -> (TestClient, ConnectionHandle) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let connection = self.server.connect(server, None);
        let mut client = TestClient::new(client, self.server.protocol().clone());
        client.handshake().await;
        (client, connection)
    }

    /// Waits until the server has finished cleaning up after `connection`.
    pub async fn wait_closed(&self, connection: &ConnectionHandle) -> DisconnectReason {
        timeout(Duration::from_secs(5), async {
            while connection.phase() != ConnectionPhase::Closed {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connection did not close within the wait time");

        connection
            .close_reason()
            .expect("a closed connection has a reason")
    }
}
