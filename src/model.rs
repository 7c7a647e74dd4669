pub mod brief;
pub mod config;
