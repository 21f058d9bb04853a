//! Core subscription types.

mod client;
mod config;
mod update;

pub use client::Client;
pub use config::{
    ClientConfig, DEFAULT_HOST, DEFAULT_INTERVAL, DEFAULT_TIMEOUT, MIN_RECOMMENDED_INTERVAL,
    VERSION,
};
pub use update::Update;
