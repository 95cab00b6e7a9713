use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use log::debug;
use serde::Deserialize;

use crate::api::Tokens;
use crate::draft::DraftTimings;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const CONFIG_FILE: &str = "campus_royale";
pub const ENV_PREFIX: &str = "CAMPUS_ROYALE";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub credentials_dir: String,
    pub notice_delay_ms: u64,
    pub placed_delay_ms: u64,
    pub port: u16,
    pub initial_tokens: Tokens,
    pub admins: Vec<String>,
}
impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("admins"),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("credentials_dir", ".campus-royale")?
            .set_default("notice_delay_ms", 2000_i64)?
            .set_default("placed_delay_ms", 2000_i64)?
            .set_default("port", 5000_i64)?
            .set_default("initial_tokens", 1000_i64)?
            .set_default("admins", Vec::<String>::new())
    }
    pub fn timings(&self) -> DraftTimings {
        DraftTimings {
            notice: Duration::from_millis(self.notice_delay_ms),
            placed: Duration::from_millis(self.placed_delay_ms),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.initial_tokens, 1000);
        assert!(settings.admins.is_empty());
        assert_eq!(settings.timings(), DraftTimings::default());
    }

    #[test]
    fn overrides() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .set_override("port", 6000_i64)
            .unwrap()
            .set_override("notice_delay_ms", 500_i64)
            .unwrap()
            .set_override("admins", vec!["root".to_string()])
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.port, 6000);
        assert_eq!(settings.admins, vec!["root"]);
        assert_eq!(settings.timings().notice, Duration::from_millis(500));
        assert_eq!(settings.timings().placed, Duration::from_secs(2));
    }
}
