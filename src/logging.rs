use log::LevelFilter;
use simplelog::{ConfigBuilder, SimpleLogger};
use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Installs a stdout logger the first time it is called. Later calls only adjust the level.
///
/// Another logger installed by the embedding program wins; messages then go there.
pub fn init(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        let config = ConfigBuilder::new()
            .set_time_level(LevelFilter::Off)
            .set_target_level(LevelFilter::Off)
            .set_thread_level(LevelFilter::Off)
            .build();
        let _ = SimpleLogger::init(LevelFilter::Trace, config);
    });
    log::set_max_level(level);
}
