use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    net::SocketAddr,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::{Duration, Instant},
};

use log::{trace, warn};
use tokio::sync::watch;

use entsync_shared::{Command, EntityId, Event};

use crate::{
    connection::{
        connection_config::ConnectionConfig,
        disconnect_reason::DisconnectReason,
        ping_state::PingState,
        queue::{monitored_channel, MonitoredReceiver, MonitoredSender},
    },
    world::entity::{Entity, EntityRef},
};

// ConnectionKey
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ConnectionKey(u64);

impl ConnectionKey {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a connection. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionPhase {
    Connecting = 0,
    Online = 1,
    Disconnecting = 2,
    Closed = 3,
}

impl ConnectionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Online,
            2 => Self::Disconnecting,
            _ => Self::Closed,
        }
    }
}

/// Entities observed by a connection: the inverse of each entity's observer set.
/// Once closed, nothing can be added to it again.
#[derive(Default)]
struct SharedEntities {
    entities: HashMap<EntityId, Weak<Entity>>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct SessionEntities {
    pub user: Option<EntityRef>,
    pub client_session: Option<EntityRef>,
}

struct Notification {
    expires_at: Instant,
    entity: Weak<Entity>,
}

struct ConnectionInner {
    key: ConnectionKey,
    address: Option<SocketAddr>,
    outbound: MonitoredSender<Command>,
    phase: AtomicU8,
    shared: Mutex<SharedEntities>,
    session: Mutex<SessionEntities>,
    ping: Mutex<PingState>,
    notifications: Mutex<Vec<Notification>>,
    close: watch::Sender<Option<DisconnectReason>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle to one client connection.
///
/// Everything that targets a client goes through here: commands are queued on
/// the connection's outbound queue and written by its send stage in queue order.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

impl ConnectionHandle {
    /// Creates a connection in the `Connecting` phase together with the
    /// receiving end of its outbound queue.
    pub fn new(
        key: ConnectionKey,
        address: Option<SocketAddr>,
        config: &ConnectionConfig,
    ) -> (Self, MonitoredReceiver<Command>) {
        let (outbound, receiver) = monitored_channel("outbound", key, config.queue_warn_threshold);
        let (close, _) = watch::channel(None);

        let handle = Self {
            inner: Arc::new(ConnectionInner {
                key,
                address,
                outbound,
                phase: AtomicU8::new(ConnectionPhase::Connecting as u8),
                shared: Mutex::new(SharedEntities::default()),
                session: Mutex::new(SessionEntities::default()),
                ping: Mutex::new(PingState::new(Instant::now())),
                notifications: Mutex::new(Vec::new()),
                close,
            }),
        };

        (handle, receiver)
    }

    pub fn key(&self) -> ConnectionKey {
        self.inner.key
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.inner.address
    }

    // Phase

    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    pub fn is_online(&self) -> bool {
        self.phase() == ConnectionPhase::Online
    }

    /// Moves the phase forward; moving backwards is ignored.
    pub(crate) fn advance_phase(&self, phase: ConnectionPhase) {
        self.inner.phase.fetch_max(phase as u8, Ordering::AcqRel);
    }

    // Outbound

    /// Queues a command for this client. Returns `false` once the connection
    /// is closed and the command was dropped.
    pub fn send(&self, command: Command) -> bool {
        if self.phase() == ConnectionPhase::Closed {
            trace!("{self}: dropping {command}, connection closed");
            return false;
        }

        trace!("{self}: queueing {command}");
        self.inner.outbound.send(command).is_ok()
    }

    /// Sends an event targeting this connection's client session entity.
    pub fn send_event<E: Event>(&self, event: E) -> bool {
        let entities = self
            .client_session()
            .map(|session| vec![session.id()])
            .unwrap_or_default();
        self.send(Command::send_event(event, entities))
    }

    pub fn outbound_len(&self) -> usize {
        self.inner.outbound.len()
    }

    // Sharing

    /// Starts observing `entity`. Returns `false` if it was already observed
    /// or the connection is going away.
    pub fn share(&self, entity: &EntityRef) -> bool {
        entity.share(self)
    }

    /// Stops observing `entity`. Returns `false` if it was not observed.
    pub fn unshare(&self, entity: &EntityRef) -> bool {
        entity.unshare(self)
    }

    pub fn share_if_unshared(&self, entity: &EntityRef) -> bool {
        !self.is_sharing(entity.id()) && entity.share(self)
    }

    pub fn unshare_if_shared(&self, entity: &EntityRef) -> bool {
        self.is_sharing(entity.id()) && entity.unshare(self)
    }

    /// Shares `entity` and unshares it again once `lifetime` has passed,
    /// as checked by the server tick.
    pub fn share_for(&self, entity: &EntityRef, lifetime: Duration) -> bool {
        if !self.share(entity) {
            return false;
        }

        lock(&self.inner.notifications).push(Notification {
            expires_at: Instant::now() + lifetime,
            entity: Arc::downgrade(entity),
        });
        true
    }

    pub fn is_sharing(&self, entity: EntityId) -> bool {
        lock(&self.inner.shared).entities.contains_key(&entity)
    }

    /// Resolves an id against the entities this connection observes.
    pub fn shared_entity(&self, entity: EntityId) -> Option<EntityRef> {
        lock(&self.inner.shared)
            .entities
            .get(&entity)
            .and_then(Weak::upgrade)
    }

    pub fn shared_entities(&self) -> Vec<EntityRef> {
        lock(&self.inner.shared)
            .entities
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn shared_count(&self) -> usize {
        lock(&self.inner.shared).entities.len()
    }

    /// Adds an entity to the observed set; called by `Entity::share` while it
    /// holds the entity lock.
    pub(crate) fn track(&self, entity: EntityId, reference: Weak<Entity>) -> bool {
        let mut shared = lock(&self.inner.shared);
        if shared.closed {
            return false;
        }
        shared.entities.insert(entity, reference);
        true
    }

    pub(crate) fn untrack(&self, entity: EntityId) {
        lock(&self.inner.shared).entities.remove(&entity);
    }

    /// Empties the observed set and refuses any further sharing.
    pub(crate) fn close_shared_entities(&self) -> HashMap<EntityId, Weak<Entity>> {
        let mut shared = lock(&self.inner.shared);
        shared.closed = true;
        std::mem::take(&mut shared.entities)
    }

    /// Removes and returns every timed share whose lifetime has passed.
    pub(crate) fn expire_notifications(&self, now: Instant) -> Vec<EntityRef> {
        let mut notifications = lock(&self.inner.notifications);
        let mut expired = Vec::new();
        notifications.retain(|notification| {
            if notification.expires_at > now {
                return true;
            }
            if let Some(entity) = notification.entity.upgrade() {
                expired.push(entity);
            }
            false
        });
        expired
    }

    pub(crate) fn clear_notifications(&self) {
        lock(&self.inner.notifications).clear();
    }

    // Session entities

    pub fn user(&self) -> Option<EntityRef> {
        lock(&self.inner.session).user.clone()
    }

    pub fn client_session(&self) -> Option<EntityRef> {
        lock(&self.inner.session).client_session.clone()
    }

    pub(crate) fn set_user(&self, user: EntityRef) -> Option<EntityRef> {
        lock(&self.inner.session).user.replace(user)
    }

    pub(crate) fn set_client_session(&self, session: EntityRef) {
        lock(&self.inner.session).client_session = Some(session);
    }

    pub(crate) fn take_session(&self) -> SessionEntities {
        std::mem::take(&mut *lock(&self.inner.session))
    }

    // Ping

    /// Last measured round trip, if a pong has been received
    pub fn ping(&self) -> Option<Duration> {
        lock(&self.inner.ping).ping()
    }

    pub(crate) fn start_ping(&self, now: Instant) -> i8 {
        lock(&self.inner.ping).start(now)
    }

    pub(crate) fn record_pong(&self, command_id: i8, now: Instant) -> Option<Duration> {
        lock(&self.inner.ping).finish(command_id, now)
    }

    pub(crate) fn touch(&self, now: Instant) {
        lock(&self.inner.ping).touch(now);
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        lock(&self.inner.ping).idle_for(now)
    }

    // Closing

    /// Sends `Close(reason)` to the client, then closes the connection once the
    /// queued commands are flushed.
    pub fn kick(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{self}: kicked ({reason})");
        self.send(Command::Close {
            reason: reason.clone(),
        });
        self.close(DisconnectReason::Kicked(reason));
    }

    /// Requests the connection to close. Only the first reason is kept;
    /// returns whether this call was the first.
    pub fn close(&self, reason: DisconnectReason) -> bool {
        let first = self.inner.close.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            self.advance_phase(ConnectionPhase::Disconnecting);
        }
        first
    }

    pub fn close_reason(&self) -> Option<DisconnectReason> {
        self.inner.close.borrow().clone()
    }

    /// Resolves once the connection has been asked to close.
    pub async fn closed(&self) -> DisconnectReason {
        let mut receiver = self.inner.close.subscribe();
        let reason = match receiver.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(DisconnectReason::ServerShutdown),
            Err(_) => DisconnectReason::ServerShutdown,
        };
        reason
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address() {
            Some(address) => write!(f, "Connection {} ({address})", self.key()),
            None => write!(f, "Connection {}", self.key()),
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("key", &self.key())
            .field("address", &self.address())
            .field("phase", &self.phase())
            .finish()
    }
}
