use thiserror::Error;

use crate::ProtocolId;

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// Two types were registered under the same protocol id
    #[error("Protocol id {id} is already registered to {existing}, cannot register {added}")]
    DuplicateProtocolId {
        id: ProtocolId,
        existing: &'static str,
        added: &'static str,
    },
}
