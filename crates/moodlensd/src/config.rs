use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Daemon configuration: optional TOML file, then `MOODLENS_*` environment
/// variables on top.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Frames per session when the caller does not ask for a count.
    pub frames_per_session: usize,
    /// Upper bound on a single RunSession call, in seconds.
    pub session_timeout_secs: u64,
    /// Frames discarded after opening the camera (AE stabilization).
    pub warmup_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: moodlens_core::default_model_dir(),
            frames_per_session: moodlens_core::session::DEFAULT_FRAMES_PER_SESSION,
            session_timeout_secs: 60,
            warmup_frames: 5,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    ///
    /// An explicit `MOODLENS_CONFIG` must exist; the XDG default is optional.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("MOODLENS_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `MOODLENS_*` variables. Unparseable numbers are
    /// ignored with a warning.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(device) = lookup("MOODLENS_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        if let Some(dir) = lookup("MOODLENS_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        env_parse(&lookup, "MOODLENS_FRAMES_PER_SESSION", &mut self.frames_per_session);
        env_parse(&lookup, "MOODLENS_SESSION_TIMEOUT_SECS", &mut self.session_timeout_secs);
        env_parse(&lookup, "MOODLENS_WARMUP_FRAMES", &mut self.warmup_frames);
    }

    /// Path to the SCRFD landmark model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(moodlens_core::SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the FER+ emotion model.
    pub fn emotion_model_path(&self) -> String {
        self.model_dir
            .join(moodlens_core::EMOTION_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("moodlens").join("config.toml"))
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.frames_per_session, 10);
        assert_eq!(config.session_timeout_secs, 60);
        assert!(config.scrfd_model_path().ends_with("det_10g.onnx"));
        assert!(config.emotion_model_path().ends_with("emotion-ferplus-8.onnx"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("frames_per_session = 25\ncamera_device = \"/dev/video3\"\n").unwrap();
        assert_eq!(config.frames_per_session, 25);
        assert_eq!(config.camera_device, "/dev/video3");
        assert_eq!(config.session_timeout_secs, 60);
    }

    #[test]
    fn test_env_overrides_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "warmup_frames = 2\nsession_timeout_secs = 30\n").unwrap();

        let mut config = Config::from_file(&path).unwrap();
        config.apply_env(env(&[
            ("MOODLENS_WARMUP_FRAMES", "0"),
            ("MOODLENS_MODEL_DIR", "/opt/models"),
        ]));
        assert_eq!(config.warmup_frames, 0);
        assert_eq!(config.session_timeout_secs, 30);
        assert_eq!(config.scrfd_model_path(), "/opt/models/det_10g.onnx");
    }

    #[test]
    fn test_unparseable_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("MOODLENS_FRAMES_PER_SESSION", "many")]));
        assert_eq!(config.frames_per_session, 10);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "frames_per_session = \"ten\"").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::from_file(&tmp.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
