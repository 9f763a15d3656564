pub mod app;
pub mod arguments;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod logger;
pub mod realtime;
pub mod stats;

#[cfg(feature = "web")]
pub mod webserver;
