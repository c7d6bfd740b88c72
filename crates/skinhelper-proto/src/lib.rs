pub mod config;
pub mod media;
pub mod platform;
pub mod properties;
pub mod protocol;
