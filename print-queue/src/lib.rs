//! Vicanto Print Queue - customer receipt pipeline of the gelateria POS
//!
//! Orders sent from the tablets land in the `print_queue` table; one or
//! more queue watchers claim those jobs, print the receipt on the
//! thermal printer and record the outcome. Outcomes and printer health
//! are pushed to the real-time hub on a best-effort side channel.
//!
//! # Module structure
//!
//! ```text
//! print-queue/src/
//! ├── core/          # config, shared state, task supervision, server
//! ├── db/            # SQLite pool, models, repositories (job store, orders)
//! ├── printing/      # renderer, printer adapters, watcher, health monitor
//! ├── notify/        # event notifier and hub transport
//! └── utils/         # errors, logging, time, money
//! ```

pub mod core;
pub mod db;
pub mod notify;
pub mod printing;
pub mod utils;

pub use crate::core::{BackgroundTasks, Config, Server, ServerState, TaskKind};
pub use db::DbService;
pub use db::models::{Order, OrderItem, PrintJob, PrintJobStatus};
pub use notify::{EventNotifier, EventPublisher, PrintEvent};
pub use printing::{PrintQueueService, PrinterAdapter, QueueWatcher};
pub use utils::{AppError, AppResult};

pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env`, then initialize logging from the environment
pub fn setup_environment() -> AppResult<Config> {
    match dotenv::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(AppError::config(format!("Failed to read .env: {e}"))),
    }

    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.log_dir.as_deref(),
    );
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
 _    ___                  __
| |  / (_)________ _____  / /_____
| | / / / ___/ __ `/ __ \/ __/ __ \
| |/ / / /__/ /_/ / / / / /_/ /_/ /
|___/_/\___/\__,_/_/ /_/\__/\____/
        print queue
    "#
    );
}
