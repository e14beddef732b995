//! Core module - configuration, shared state, process supervision
//!
//! - [`Config`] - environment configuration
//! - [`ServerState`] - database, printer and notifier handles
//! - [`Server`] - pipeline lifecycle
//! - [`BackgroundTasks`] - task registry

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{Config, ShopInfo};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
