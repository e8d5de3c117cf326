pub mod config;
pub mod measure;
pub mod watch;
