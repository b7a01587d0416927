//! Handles presentation configuration loading and management.
//!
//! This module defines the `PresentationConfig` struct which holds the surface
//! size, the transition policy flags and the defaults used by the demo shell.
//! It provides `load_config` to read these settings from the `[presentation]`
//! section of an INI file.
//!
//! The engine itself never reads configuration: callers snapshot
//! [`TransitionPreferences`] at call time and pass them with each request.

use std::str::FromStr;
use std::time::Duration;

use configparser::ini::Ini;
use log::{debug, error, info};

use super::errors::ConfigError;
use crate::animator::TransitionAnimator;
use crate::model::Dimensions;
use crate::transition::{Direction, Easing, TransitionKind};

const SECTION: &str = "presentation";

/// The policy flags consumed by the engine on every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionPreferences {
    /// Queue requests behind an in-flight transition instead of cutting it short.
    pub wait_for_transition: bool,
    /// Keep an identical video background playing across slides.
    pub smart_video_transitions: bool,
    /// Keep an identical image background steady across slides.
    pub smart_image_transitions: bool,
}

impl Default for TransitionPreferences {
    fn default() -> Self {
        Self { wait_for_transition: true, smart_video_transitions: true, smart_image_transitions: true }
    }
}

/// Holds the presentation's configuration parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PresentationConfig {
    pub dimensions: Dimensions,
    pub preferences: TransitionPreferences,
    /// Render-loop period used by the demo shell.
    pub tick_interval: Duration,
    pub default_transition: TransitionKind,
    pub default_duration: Duration,
    pub default_easing: Easing,
    pub media_cache_capacity: usize,
}

impl PresentationConfig {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            preferences: TransitionPreferences::default(),
            tick_interval: Duration::from_millis(33),
            default_transition: TransitionKind::Fade,
            default_duration: Duration::from_millis(300),
            default_easing: Easing::Linear,
            media_cache_capacity: 32,
        }
    }

    pub fn preferences(&self) -> TransitionPreferences {
        self.preferences
    }

    /// Builds the configured default animator for the given direction.
    pub fn default_animator(&self, direction: Direction) -> TransitionAnimator {
        TransitionAnimator::new(self.default_transition.build(direction), self.default_duration)
            .with_easing(self.default_easing)
    }
}

/// Loads presentation configuration from the specified INI file path.
///
/// `width` and `height` are required; every other key falls back to its
/// default when absent.
///
/// # Errors
/// Returns `ConfigError` if the file cannot be read, is malformed, if a
/// required key is missing, or if a value cannot be interpreted.
#[must_use = "loading configuration can fail, the Result must be handled"]
pub fn load_config(path: &str) -> Result<PresentationConfig, ConfigError> {
    info!("Attempting to load config from: {}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| {
        error!("Error reading config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config = parse_config(&contents)?;
    info!("Configuration loaded successfully from {}: {:?}", path, config);
    Ok(config)
}

/// Parses presentation configuration from INI text.
#[must_use = "parsing configuration can fail, the Result must be handled"]
pub fn parse_config(contents: &str) -> Result<PresentationConfig, ConfigError> {
    let mut parser = Ini::new();
    parser.read(contents.to_string()).map_err(|e| {
        error!("Error parsing configuration: {}", e);
        ConfigError::Parse(e)
    })?;

    // Helper closure to get a key or return MissingKey error
    let get_key = |key_name: &str| {
        parser.get(SECTION, key_name).ok_or_else(|| {
            error!("Missing configuration key '{}' in section '[{}]'", key_name, SECTION);
            ConfigError::MissingKey(key_name.to_string())
        })
    };

    let width = parse_value::<u32>("width", &get_key("width")?)?;
    let height = parse_value::<u32>("height", &get_key("height")?)?;
    if width == 0 || height == 0 {
        return Err(ConfigError::InvalidValue { key: "width/height".into(), value: format!("{}x{}", width, height) });
    }
    debug!("Loaded config dimensions: {}x{}", width, height);

    let mut config = PresentationConfig::new(Dimensions::new(width, height));

    let get_bool = |key: &str, default: bool| -> Result<bool, ConfigError> {
        parser
            .getbool(SECTION, key)
            .map_err(|e| ConfigError::InvalidValue { key: key.to_string(), value: e })
            .map(|v| v.unwrap_or(default))
    };
    config.preferences.wait_for_transition = get_bool("wait_for_transition", true)?;
    config.preferences.smart_video_transitions = get_bool("smart_video_transitions", true)?;
    config.preferences.smart_image_transitions = get_bool("smart_image_transitions", true)?;
    debug!("Loaded transition preferences: {:?}", config.preferences);

    if let Some(ms) = parser.get(SECTION, "tick_interval_ms") {
        config.tick_interval = Duration::from_millis(parse_value::<u64>("tick_interval_ms", &ms)?.max(1));
    }
    if let Some(name) = parser.get(SECTION, "default_transition") {
        config.default_transition = parse_value::<TransitionKind>("default_transition", &name)?;
    }
    if let Some(ms) = parser.get(SECTION, "default_duration_ms") {
        config.default_duration = Duration::from_millis(parse_value::<u64>("default_duration_ms", &ms)?);
    }
    if let Some(name) = parser.get(SECTION, "default_easing") {
        config.default_easing = parse_value::<Easing>("default_easing", &name)?;
    }
    if let Some(capacity) = parser.get(SECTION, "media_cache_capacity") {
        config.media_cache_capacity = parse_value::<usize>("media_cache_capacity", &capacity)?.max(1);
    }
    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| {
        error!("Invalid value '{}' for configuration key '{}'", value, key);
        ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_section() {
        let config = parse_config(
            "[presentation]\n\
             width = 1280\n\
             height = 720\n\
             wait_for_transition = false\n\
             smart_video_transitions = true\n\
             smart_image_transitions = false\n\
             tick_interval_ms = 16\n\
             default_transition = wipe\n\
             default_duration_ms = 750\n\
             default_easing = cubic-out\n\
             media_cache_capacity = 4\n",
        )
        .expect("valid config");
        assert_eq!(config.dimensions, Dimensions::new(1280, 720));
        assert!(!config.preferences.wait_for_transition);
        assert!(config.preferences.smart_video_transitions);
        assert!(!config.preferences.smart_image_transitions);
        assert_eq!(config.tick_interval, Duration::from_millis(16));
        assert_eq!(config.default_transition, TransitionKind::Wipe);
        assert_eq!(config.default_duration, Duration::from_millis(750));
        assert_eq!(config.media_cache_capacity, 4);
        let anim = config.default_animator(Direction::Out);
        assert_eq!(anim.direction(), Direction::Out);
        assert_eq!(anim.duration(), Duration::from_millis(750));
    }

    #[test]
    fn applies_defaults_for_optional_keys() {
        let config = parse_config("[presentation]\nwidth = 640\nheight = 480\n").expect("valid config");
        assert_eq!(config.preferences, TransitionPreferences::default());
        assert_eq!(config.default_transition, TransitionKind::Fade);
        assert_eq!(config.default_duration, Duration::from_millis(300));
    }

    #[test]
    fn missing_dimensions_are_reported() {
        let err = parse_config("[presentation]\nwidth = 640\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(ref k) if k == "height"));
    }

    #[test]
    fn bad_values_are_reported() {
        let err = parse_config("[presentation]\nwidth = wide\nheight = 480\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        let err = parse_config("[presentation]\nwidth = 1\nheight = 1\ndefault_transition = spin\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "default_transition"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[presentation]\nwidth = 320\nheight = 240").expect("write config");
        let path = file.path().to_str().expect("utf-8 temp path").to_string();
        let config = load_config(&path).expect("config loads");
        assert_eq!(config.dimensions, Dimensions::new(320, 240));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config("/nonexistent/presenter.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
