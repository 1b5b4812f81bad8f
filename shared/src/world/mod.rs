pub mod component;
pub mod template;
