pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod query;
pub mod seed;
pub mod store;

use config::Config;
use store::Store;

/// Shared application state handed to every handler through `web::Data`.
pub struct AppState {
    pub config: Config,
    pub store: Store,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Store::open(&config);
        Self { config, store }
    }
}
