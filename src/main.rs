//! Planar - headless simulation runner
//!
//! Loads the app config, builds the configured level and steps it for the
//! configured number of frames, logging body positions along the way.

use planar::config::AppConfig;
use planar::level::Level;

fn main() {
    // Config is read before logging starts so the configured level can be
    // used as the default filter
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()),
    )
    .init();
    log::info!("Starting Planar");

    if let Some(e) = load_error {
        log::warn!("Failed to load config: {}. Using defaults.", e);
    }

    let mut level = Level::build(config.space.clone(), &config.level);
    level.run(config.demo.frames, config.demo.log_every);

    let stats = level.space.stats();
    log::info!(
        "Simulated {} frames: {} collisions, {} pair tests, {} static tests, {} overlap passes",
        stats.frames,
        stats.collisions,
        stats.narrow_phase_tests,
        stats.static_tests,
        stats.overlap_passes
    );
}
