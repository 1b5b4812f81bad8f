pub mod component_kinds;
pub mod replicate;
