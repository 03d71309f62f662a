use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Settings read from `labs.toml`; every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShowcaseConfig {
    pub window: WindowSettings,
    #[serde(deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    pub background: bool,
    pub projects: Option<PathBuf>,
    pub shaders: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub frame_interval: Duration,
    pub seed: Option<u64>,
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            antialias: None,
            background: true,
            projects: None,
            shaders: None,
            frame_interval: default_frame_interval(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        parse_antialias(raw)
    }
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

impl ShowcaseConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let raw: ShowcaseConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads the config at `path`, or returns defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(CatalogError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.frame_interval.is_zero() {
            return Err(CatalogError::Invalid(
                "frame_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ShowcaseConfig::from_toml_str("").expect("parse");
        assert_eq!(config, ShowcaseConfig::default());
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert!(config.background);
    }

    #[test]
    fn parses_full_config() {
        let config = ShowcaseConfig::from_toml_str(
            r#"
antialias = 4
background = false
projects = "data/projects.toml"
shaders = "shaders"
frame_interval = "8ms"
seed = 7

[window]
width = 1920
height = 1080
"#,
        )
        .expect("parse");
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.antialias, Some(AntialiasSetting::Samples4));
        assert!(!config.background);
        assert_eq!(config.frame_interval, Duration::from_millis(8));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.shaders.as_deref(), Some(Path::new("shaders")));
    }

    #[test]
    fn rejects_zero_window() {
        let err = ShowcaseConfig::from_toml_str("[window]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_antialias() {
        assert!(ShowcaseConfig::from_toml_str("antialias = \"3\"").is_err());
        assert_eq!(AntialiasSetting::parse("OFF"), Ok(AntialiasSetting::Off));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShowcaseConfig::load_or_default(&dir.path().join("labs.toml")).unwrap();
        assert_eq!(config, ShowcaseConfig::default());
    }
}
