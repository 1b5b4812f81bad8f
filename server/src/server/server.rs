use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
    },
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, ToSocketAddrs},
    sync::watch,
    time::MissedTickBehavior,
};

use entsync_shared::{Command, PingEvent, Protocol, Timestamp};

use crate::{
    connection::{
        disconnect_reason::DisconnectReason,
        handle::{ConnectionHandle, ConnectionKey, ConnectionPhase},
        pipeline::{self, PipelineContext},
    },
    error::ServerError,
    executor::CommandExecutor,
    handlers::{HandlerContext, Handlers},
    world::{entity::EntityRef, entity_registry::EntityRegistry},
    ServerConfig,
};

/// Accepts TCP clients and runs a pipeline for each of them, together with the
/// process-wide ping and tick loops.
pub struct Server {
    config: ServerConfig,
    protocol: Arc<Protocol>,
    handlers: Arc<Handlers>,
    registry: Arc<EntityRegistry>,
    pipeline: Arc<PipelineContext>,
    connections: RwLock<HashMap<ConnectionKey, ConnectionHandle>>,
    next_key: AtomicU64,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
    this: Weak<Server>,
}

impl Server {
    /// Create a new Server. The protocol is locked here if it was not already.
    pub fn new(config: ServerConfig, mut protocol: Protocol, handlers: Handlers) -> Arc<Self> {
        protocol.lock();
        let protocol = Arc::new(protocol);
        let handlers = Arc::new(handlers);
        let registry = EntityRegistry::new();
        let pipeline = Arc::new(PipelineContext {
            protocol: protocol.clone(),
            executor: Arc::new(CommandExecutor::new(registry.clone(), handlers.clone())),
            config: config.connection.clone(),
        });
        let (shutdown, _) = watch::channel(false);

        Arc::new_cyclic(|this| Self {
            config,
            protocol,
            handlers,
            registry,
            pipeline,
            connections: RwLock::new(HashMap::new()),
            next_key: AtomicU64::new(1),
            started: AtomicBool::new(false),
            shutdown,
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    // Listening

    /// Binds `address` and accepts clients on it in the background. Returns
    /// the bound address.
    pub async fn listen(&self, address: impl ToSocketAddrs) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(ServerError::Bind)?;
        let local_address = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let server = self.start()?;
        tokio::spawn(server.accept_loop(listener));

        info!("Listening on {local_address}");
        Ok(local_address)
    }

    /// Accepts clients on `listener` until [`shutdown`](Self::shutdown) is called.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let server = self.start()?;
        server.accept_loop(listener).await;
        Ok(())
    }

    fn start(&self) -> Result<Arc<Self>, ServerError> {
        let server = self.this.upgrade().ok_or(ServerError::AlreadyStarted)?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ServerError::AlreadyStarted);
        }

        tokio::spawn(ping_loop(
            self.this.clone(),
            self.shutdown.subscribe(),
            self.config.ping.ping_interval,
        ));
        tokio::spawn(tick_loop(
            self.this.clone(),
            self.shutdown.subscribe(),
            self.config.tick_interval,
        ));
        Ok(server)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            let accepted = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, address)) => {
                    if let Err(error) = stream.set_nodelay(true) {
                        warn!("Failed to disable Nagle for {address}: {error}");
                    }
                    self.connect(stream, Some(address));
                }
                Err(error) => {
                    error!("Failed to accept connection: {error}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        debug!("Accept loop stopped");
    }

    // Connections

    /// Starts serving a client on an already established stream: queues
    /// `InitTime`, shares a fresh ClientSession entity, spawns the pipeline and
    /// runs the connect hooks.
    pub fn connect<S>(&self, stream: S, address: Option<SocketAddr>) -> ConnectionHandle
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let key = ConnectionKey::new(self.next_key.fetch_add(1, Ordering::Relaxed));
        let (connection, outbound) = ConnectionHandle::new(key, address, &self.config.connection);
        write(&self.connections).insert(key, connection.clone());

        connection.send(Command::InitTime {
            server_time: Timestamp::now_millis(),
        });
        let session = self
            .registry
            .create(self.config.client_session_template.clone());
        connection.set_client_session(session.clone());
        session.share(&connection);

        let this = self.this.clone();
        pipeline::spawn(
            stream,
            connection.clone(),
            outbound,
            self.pipeline.clone(),
            move |connection, reason| match this.upgrade() {
                Some(server) => server.finish_connection(&connection, &reason),
                None => connection.advance_phase(ConnectionPhase::Closed),
            },
        );

        connection.advance_phase(ConnectionPhase::Online);
        info!("{connection}: connected");

        let context = HandlerContext {
            connection: &connection,
            registry: &self.registry,
        };
        if let Err(error) = self.handlers.connected(&context) {
            warn!("{connection}: connect hook failed: {error}");
            connection.kick(error.to_string());
        }

        connection
    }

    /// Releases everything a closed connection held: its place in every
    /// observer set, the temporary entities only it observed, and its session
    /// entities.
    fn finish_connection(&self, connection: &ConnectionHandle, reason: &DisconnectReason) {
        write(&self.connections).remove(&connection.key());

        let context = HandlerContext {
            connection,
            registry: &self.registry,
        };
        self.handlers.disconnected(&context, reason);

        for (id, entity) in connection.close_shared_entities() {
            if let Some(entity) = entity.upgrade() {
                entity.detach(connection.key());
            }
            self.registry.reclaim_if_temporary(id);
        }
        connection.clear_notifications();

        let session = connection.take_session();
        for entity in [session.user, session.client_session].into_iter().flatten() {
            self.retire(&entity);
        }

        connection.advance_phase(ConnectionPhase::Closed);
        info!("{connection}: disconnected, {reason}");
    }

    fn retire(&self, entity: &EntityRef) {
        for observer in entity.shared_players() {
            entity.unshare(&observer);
        }
        self.registry.remove(entity.id());
    }

    pub fn connection(&self, key: &ConnectionKey) -> Option<ConnectionHandle> {
        read(&self.connections).get(key).cloned()
    }

    pub fn connections(&self) -> Vec<ConnectionHandle> {
        read(&self.connections).values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        read(&self.connections).len()
    }

    // Periodic work

    /// Sends a `PingEvent` to every online connection and closes those that
    /// have been silent for longer than the idle timeout.
    pub fn ping_connections(&self, now: Instant) {
        let idle_timeout = self.config.ping.idle_timeout;
        for connection in self.connections() {
            if !connection.is_online() {
                continue;
            }
            if connection.idle_for(now) > idle_timeout {
                info!(
                    "{connection}: idle for more than {}s",
                    idle_timeout.as_secs()
                );
                connection.close(DisconnectReason::IdleTimeout);
                continue;
            }

            let command_id = connection.start_ping(now);
            connection.send_event(PingEvent {
                server_time: Timestamp::now_millis(),
                command_id,
            });
        }
    }

    /// Expires timed shares, then runs the tick hooks.
    pub fn tick(&self, now: Instant) {
        for connection in self.connections() {
            for entity in connection.expire_notifications(now) {
                connection.unshare(&entity);
            }
        }
        self.handlers.tick(&self.registry);
    }

    /// Stops accepting, and closes every connection after telling its client.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        for connection in self.connections() {
            connection.send(Command::Close {
                reason: DisconnectReason::ServerShutdown.to_string(),
            });
            connection.close(DisconnectReason::ServerShutdown);
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // an error means the server is gone, which is a shutdown too
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn ping_loop(server: Weak<Server>, mut shutdown: watch::Receiver<bool>, period: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = interval.tick() => {}
        }
        let Some(server) = server.upgrade() else {
            break;
        };
        server.ping_connections(Instant::now());
    }
}

async fn tick_loop(server: Weak<Server>, mut shutdown: watch::Receiver<bool>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = interval.tick() => {}
        }
        let Some(server) = server.upgrade() else {
            break;
        };
        server.tick(Instant::now());
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
