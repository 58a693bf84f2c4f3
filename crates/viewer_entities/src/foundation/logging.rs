//! Logger setup for hosts and demos
//!
//! The crate itself only emits through `log`. These helpers install
//! `env_logger` with the crate's records shown at `debug` unless `RUST_LOG`
//! says otherwise.

pub use log::{debug, error, info, trace, warn};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,viewer_entities=debug";

fn builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
}

/// Install the logger; panics if one is already installed
pub fn init() {
    builder().init();
}

/// Install the logger unless the host already has one
pub fn try_init() -> bool {
    builder().is_test(cfg!(test)).try_init().is_ok()
}
