pub mod broadcast;
pub mod error;
pub mod export;
pub mod handlers;
pub mod server;
pub mod subscribers;
pub mod ws;

pub use server::{start, AppState, ServerConfig, ServerHandle};
