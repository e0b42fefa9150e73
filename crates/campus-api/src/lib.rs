// campus-api: Async client for the Smart Campus backend (REST + Socket.IO push)

pub mod client;
pub mod error;
pub mod models;
pub mod push;
pub mod socketio;
pub mod transport;

pub use client::{CampusClient, RESTART_NETWORK_MEASURE};
pub use error::Error;
pub use push::{LinkState, LinkStatus, PushEvent, PushHandle, ReconnectConfig, socket_url};
pub use transport::TransportConfig;
