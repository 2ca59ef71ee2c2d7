use log::LevelFilter;
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::str::FromStr;

/// Defaults for every run on this process, read from the environment once.
pub static DEFAULT_CONFIG: Lazy<TbConfig> = Lazy::new(TbConfig::from_env);

/// Run configuration of the native host.
///
/// | variable         | field           | default |
/// |------------------|-----------------|---------|
/// | `RSTB_LOG`       | `log_level`     | `warn`  |
/// | `RSTB_RESULTS`   | `results_xml`   | none    |
/// | `RSTB_MAX_STEPS` | `max_sim_steps` | none    |
#[derive(Debug, Clone, PartialEq)]
pub struct TbConfig {
    pub log_level: LevelFilter,
    pub results_xml: Option<PathBuf>,
    pub max_sim_steps: Option<u64>,
    pub max_deltas: u32,
    pub summary: bool,
    pub suite_name: String,
}

impl Default for TbConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Warn,
            results_xml: None,
            max_sim_steps: None,
            max_deltas: 10_000,
            summary: true,
            suite_name: "rstb-uart".to_string(),
        }
    }
}

impl TbConfig {
    /// Process defaults, see [`DEFAULT_CONFIG`].
    pub fn new() -> Self {
        DEFAULT_CONFIG.clone()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Unparsable values are ignored, a typo in RSTB_LOG shouldn't abort a regression.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = lookup("RSTB_LOG").and_then(|s| LevelFilter::from_str(&s).ok()) {
            config.log_level = level;
        }
        if let Some(path) = lookup("RSTB_RESULTS").filter(|s| !s.is_empty()) {
            config.results_xml = Some(PathBuf::from(path));
        }
        if let Some(steps) = lookup("RSTB_MAX_STEPS").and_then(|s| s.parse().ok()) {
            config.max_sim_steps = Some(steps);
        }
        config
    }

    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }
    pub fn results_xml(mut self, path: Option<PathBuf>) -> Self {
        self.results_xml = path;
        self
    }
    pub fn max_sim_steps(mut self, steps: Option<u64>) -> Self {
        self.max_sim_steps = steps;
        self
    }
    pub fn max_deltas(mut self, max: u32) -> Self {
        self.max_deltas = max;
        self
    }
    pub fn summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }
    pub fn suite_name(mut self, name: &str) -> Self {
        self.suite_name = name.to_string();
        self
    }
}
