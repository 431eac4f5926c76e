//! Logging bootstrap shared by every binary built on top of this workspace.
//!
//! Mirrors the teacher's `server`/`client` startup sequence: set `RUST_LOG`
//! from config, then hand off to `env_logger`.

use log::info;

use crate::config::Config;
use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize `env_logger` once, using the level from `config`. Safe to call
/// more than once; only the first call takes effect.
pub fn init(config: &Config) {
    INIT.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", config.get_log_level());
        }
        env_logger::init();
        info!("logging initialized at level {}", config.get_log_level());
    });
}
