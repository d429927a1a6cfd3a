//! Glow - GPU triangle particles with an edge glow.
//!
//! Set `GLOW_CONFIG` to a JSON file to override the default parameters and
//! `RUST_LOG` to control logging.

use sim::SimConfig;
use std::path::Path;

fn main() {
    env_logger::init();

    let config = match std::env::var_os("GLOW_CONFIG") {
        Some(path) => match SimConfig::load_json(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load {:?}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    if let Err(e) = glow::app::run(config) {
        log::error!("Event loop error: {}", e);
        std::process::exit(1);
    }
}
