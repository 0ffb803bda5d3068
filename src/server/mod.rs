//! HTTP server
//!
//! A small HTTP/1.1 front end over tokio TCP. Each connection carries one
//! request and is closed after the response; stream responses last until
//! the viewer leaves.

pub mod config;
mod connection;
pub mod http;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::FeedServer;
pub use routes::Route;
