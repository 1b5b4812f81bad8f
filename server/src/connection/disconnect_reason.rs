use std::{fmt, io};

use entsync_shared::ConnectionError;

/// Why a connection left the `Online` phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client closed its end of the socket between frames
    PeerClosed,
    /// The server sent `Close` with this reason
    Kicked(String),
    /// Reading or writing the socket failed
    Io(io::ErrorKind),
    /// A frame could not be decoded, or a command could not be encoded
    Protocol(ConnectionError),
    /// Nothing was received within the configured idle timeout
    IdleTimeout,
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("closed by peer"),
            Self::Kicked(reason) => write!(f, "kicked ({reason})"),
            Self::Io(kind) => write!(f, "socket error ({kind})"),
            Self::Protocol(error) => write!(f, "protocol error ({error})"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::ServerShutdown => f.write_str("server shutdown"),
        }
    }
}
