use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use log::{debug, warn};
use tokio::sync::mpsc::{self, error::SendError, error::TryRecvError};

use crate::connection::handle::ConnectionKey;

struct QueueMonitor {
    name: &'static str,
    owner: ConnectionKey,
    len: AtomicUsize,
    warn_threshold: usize,
    warned: AtomicBool,
}

impl QueueMonitor {
    fn pushed(&self) {
        let len = self.len.fetch_add(1, Ordering::Relaxed) + 1;
        if len > self.warn_threshold && !self.warned.swap(true, Ordering::Relaxed) {
            warn!(
                "Connection {}: {} queue holds {} commands (threshold {})",
                self.owner, self.name, len, self.warn_threshold
            );
        }
    }

    fn popped(&self) {
        let len = self.len.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        if len <= self.warn_threshold / 2 && self.warned.swap(false, Ordering::Relaxed) {
            debug!(
                "Connection {}: {} queue drained to {} commands",
                self.owner, self.name, len
            );
        }
    }
}

/// Unbounded queue whose length is watched; crossing the warning threshold
/// is logged once until the queue drains to half of it.
pub fn monitored_channel<T>(
    name: &'static str,
    owner: ConnectionKey,
    warn_threshold: usize,
) -> (MonitoredSender<T>, MonitoredReceiver<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let monitor = Arc::new(QueueMonitor {
        name,
        owner,
        len: AtomicUsize::new(0),
        warn_threshold,
        warned: AtomicBool::new(false),
    });

    (
        MonitoredSender {
            sender,
            monitor: monitor.clone(),
        },
        MonitoredReceiver { receiver, monitor },
    )
}

pub struct MonitoredSender<T> {
    sender: mpsc::UnboundedSender<T>,
    monitor: Arc<QueueMonitor>,
}

impl<T> MonitoredSender<T> {
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        // Counted before the value is visible, so a concurrent pop never sees
        // the count lag behind the queue
        self.monitor.pushed();
        self.sender.send(value).map_err(|error| {
            self.monitor.len.fetch_sub(1, Ordering::Relaxed);
            error
        })
    }

    pub fn len(&self) -> usize {
        self.monitor.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for MonitoredSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

pub struct MonitoredReceiver<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    monitor: Arc<QueueMonitor>,
}

impl<T> MonitoredReceiver<T> {
    pub async fn recv(&mut self) -> Option<T> {
        let value = self.receiver.recv().await?;
        self.monitor.popped();
        Some(value)
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let value = self.receiver.try_recv()?;
        self.monitor.popped();
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.monitor.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
