pub mod config;
pub mod focus;
pub mod timeline;
