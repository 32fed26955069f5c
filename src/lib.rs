//! A live transit map.
//!
//! The map combines reference data fetched once from a transit API with a
//! stream of vehicle notifications into a single store and renders it.

pub use self::config::Config;
pub use self::engine::{MapState, Session};
pub use self::render::Presenter;
pub use self::server::Server;

pub mod cancel;
pub mod client;
pub mod config;
pub mod engine;
pub mod entity;
pub mod loader;
pub mod notify;
pub mod projection;
pub mod record;
pub mod render;
pub mod server;
pub mod sse;
pub mod store;
pub mod stream;
pub mod transform;
