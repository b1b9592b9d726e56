use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings shared by the producer and consumer binaries.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    #[serde(default = "defaults::latch_path")]
    pub latch_path: String,
    #[serde(default = "defaults::data_path")]
    pub data_path: String,
    #[serde(default = "defaults::records")]
    pub records: usize,
    #[serde(default = "defaults::fields")]
    pub fields: usize,
    #[serde(default = "defaults::steps")]
    pub steps: u64,
    /// `0` waits forever.
    #[serde(default = "defaults::spin_timeout_ms")]
    pub spin_timeout_ms: u64,
    #[serde(default = "defaults::open_timeout_ms")]
    pub open_timeout_ms: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

mod defaults {
    pub fn latch_path() -> String {
        "/tmp/baton_latch".into()
    }

    pub fn data_path() -> String {
        "/tmp/baton_records".into()
    }

    pub fn records() -> usize {
        1024
    }

    pub fn fields() -> usize {
        4
    }

    pub fn steps() -> u64 {
        1000
    }

    pub fn spin_timeout_ms() -> u64 {
        5000
    }

    pub fn open_timeout_ms() -> u64 {
        5000
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            latch_path: defaults::latch_path(),
            data_path: defaults::data_path(),
            records: defaults::records(),
            fields: defaults::fields(),
            steps: defaults::steps(),
            spin_timeout_ms: defaults::spin_timeout_ms(),
            open_timeout_ms: defaults::open_timeout_ms(),
            log_level: defaults::log_level(),
        }
    }
}

impl ExchangeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml_to_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    /// Defaults when `path` is `None`.
    pub fn load_or_default(path: Option<impl AsRef<Path>>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let cfg: ExchangeConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.records == 0 {
            return Err(ConfigError::Invalid("records must be > 0".into()));
        }
        if self.fields == 0 {
            return Err(ConfigError::Invalid("fields must be > 0".into()));
        }
        self.buffer_bytes()?;
        Ok(())
    }

    /// Scalars in one batch: `records * fields`.
    pub fn buffer_len(&self) -> Result<usize, ConfigError> {
        self.records.checked_mul(self.fields).ok_or_else(|| {
            ConfigError::Invalid(format!("{} records x {} fields overflows", self.records, self.fields))
        })
    }

    /// Size of the shared record file for `f32` fields.
    pub fn buffer_bytes(&self) -> Result<usize, ConfigError> {
        self.buffer_len()?
            .checked_mul(size_of::<f32>())
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "{} records x {} fields don't fit in one mapping",
                    self.records, self.fields
                ))
            })
    }

    /// `None` means spin without a deadline.
    pub fn spin_timeout(&self) -> Option<Duration> {
        (self.spin_timeout_ms > 0).then(|| Duration::from_millis(self.spin_timeout_ms))
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = ExchangeConfig::parse("").unwrap();
        assert_eq!(cfg, ExchangeConfig::default());
        assert_eq!(cfg.records, 1024);
        assert_eq!(cfg.spin_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn overrides_apply() {
        let cfg = ExchangeConfig::parse(
            r#"
            latch_path = "/dev/shm/l"
            records = 8
            fields = 3
            spin_timeout_ms = 0
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.latch_path, "/dev/shm/l");
        assert_eq!(cfg.records, 8);
        assert_eq!(cfg.fields, 3);
        assert_eq!(cfg.spin_timeout(), None);
        assert_eq!(cfg.data_path, "/tmp/baton_records");
    }

    #[test]
    fn zero_records_rejected() {
        let err = ExchangeConfig::parse("records = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = ExchangeConfig::parse("fields = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_buffer_rejected() {
        let err = ExchangeConfig::parse("records = 4611686018427387904").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");

        let err = ExchangeConfig::parse("records = 4611686018427387904\nfields = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");

        let cfg = ExchangeConfig::parse("records = 10\nfields = 3").unwrap();
        assert_eq!(cfg.buffer_len().unwrap(), 30);
        assert_eq!(cfg.buffer_bytes().unwrap(), 120);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(ExchangeConfig::parse("records = \"x\""), Err(ConfigError::Parse(_))));
        assert!(matches!(ExchangeConfig::parse("nope = 1"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ExchangeConfig::load("/nonexistent/baton.toml").unwrap_err();
        match err {
            ConfigError::Read { path, source } => {
                assert_eq!(path, "/nonexistent/baton.toml");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            ExchangeConfig::load_or_default(None::<&str>).unwrap(),
            ExchangeConfig::default()
        );
    }
}
