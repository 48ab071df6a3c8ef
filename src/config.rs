use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::footprints::City;
use crate::geocode::DEFAULT_NOMINATIM_URL;

/// Combined footprint file shared by every city unless a dataset overrides it
pub const DEFAULT_FOOTPRINT_FILE: &str = "buildings.csv";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConfig,
    pub matching: MatchingConfig,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    pub data_dir: PathBuf,
    pub nominatim_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: concat!("bldgfinder/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    pub endpoint: String,
    pub user: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.reonomy.com/v2/nyc/properties".to_string(),
            user: String::new(),
            api_key_env: "PROPERTY_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub city: City,
    pub path: PathBuf,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Footprint file for `city`; relative paths resolve against `data_dir`
    pub fn dataset_path(&self, city: City) -> PathBuf {
        let path = self
            .datasets
            .iter()
            .find(|d| d.city == city)
            .map(|d| d.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FOOTPRINT_FILE));

        if path.is_absolute() {
            path
        } else {
            self.global.data_dir.join(path)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.global.timeout_secs)
    }
}

impl MatchingConfig {
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("Environment variable {} is not set", self.api_key_env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load_or_default(None).unwrap();
        assert_eq!(config.global.nominatim_url, DEFAULT_NOMINATIM_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(
            config.dataset_path(City::Paris),
            PathBuf::from("data").join(DEFAULT_FOOTPRINT_FILE)
        );
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[global]
data_dir = "/srv/bldg"
timeout_secs = 5

[matching]
user = "analyst"

[[datasets]]
city = "london"
path = "gb.csv.gz"

[[datasets]]
city = "dublin"
path = "/mnt/ie.csv"
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.global.nominatim_url, DEFAULT_NOMINATIM_URL);
        assert_eq!(config.matching.user, "analyst");
        assert_eq!(config.matching.api_key_env, "PROPERTY_API_KEY");
        assert_eq!(
            config.dataset_path(City::London),
            PathBuf::from("/srv/bldg/gb.csv.gz")
        );
        assert_eq!(config.dataset_path(City::Dublin), PathBuf::from("/mnt/ie.csv"));
        assert_eq!(
            config.dataset_path(City::Berlin),
            PathBuf::from("/srv/bldg/buildings.csv")
        );
    }

    #[test]
    fn test_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[datasets]]\ncity = \"atlantis\"\npath = \"x.csv\"\n").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }
}
