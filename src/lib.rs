pub mod cat;
pub mod config;
pub mod function;
pub mod reply;
pub mod server;
pub mod traits;

pub use cat::{CatSelector, ImageUrl, STATUS_CODES, select_url};
pub use traits::Handler;

use env_logger::Env;

/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
