use std::io;

use log::{error, info};

use crate::connection::{disconnect_reason::DisconnectReason, handle::ConnectionHandle};

/// Socket error kinds that mean the peer went away rather than something
/// going wrong on our side.
pub fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

/// Logs a socket failure at a level matching its kind and turns it into the
/// reason the connection is closed with.
pub(crate) fn classify(
    connection: &ConnectionHandle,
    stage: &'static str,
    error: &io::Error,
) -> DisconnectReason {
    if is_disconnect(error.kind()) {
        info!("{connection}: {stage} stopped, peer disconnected ({error})");
    } else {
        error!("{connection}: {stage} failed with unexpected socket error: {error}");
    }
    DisconnectReason::Io(error.kind())
}
