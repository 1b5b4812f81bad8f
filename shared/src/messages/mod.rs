pub mod builtin;
pub mod event;
pub mod event_kinds;
