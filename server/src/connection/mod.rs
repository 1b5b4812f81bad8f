pub mod connection_config;
pub mod disconnect_reason;
pub mod handle;
pub mod io;
pub mod ping_config;
pub mod ping_state;
pub mod pipeline;
pub mod queue;
pub mod session;
