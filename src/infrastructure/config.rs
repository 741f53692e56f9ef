use crate::application::ingest_service::CountMode;
use crate::domain::session::DeviceTimeUnit;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "config/relay";
const CONFIG_PATH_VAR: &str = "RELAY_CONFIG";
const ENV_PREFIX: &str = "RELAY";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub influx: InfluxSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub static_root: PathBuf,
    pub index_document: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3001),
            static_root: PathBuf::from("."),
            index_document: "index.html".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Most points sent in a single write request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Upper bound on one write request, in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IngestSettings {
    pub device_time_unit: DeviceTimeUnit,
    pub count_mode: CountMode,
}

fn default_batch_size() -> usize {
    1000
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

impl AppConfig {
    /// Load from `config/relay.*` (or the file named by `RELAY_CONFIG`),
    /// then apply `RELAY__SECTION__KEY` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).ok();
        let settings = config::Config::builder()
            .add_source(
                config::File::with_name(path.as_deref().unwrap_or(DEFAULT_CONFIG_FILE))
                    .required(path.is_some()),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg = Self::from_config(settings)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_config(settings: config::Config) -> anyhow::Result<Self> {
        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (key, value) in [
            ("influx.url", &self.influx.url),
            ("influx.token", &self.influx.token),
            ("influx.org", &self.influx.org),
            ("influx.bucket", &self.influx.bucket),
        ] {
            anyhow::ensure!(!value.trim().is_empty(), "{key} cannot be empty");
        }
        anyhow::ensure!(self.influx.batch_size > 0, "influx.batch_size must be positive");
        anyhow::ensure!(
            self.influx.write_timeout_ms > 0,
            "influx.write_timeout_ms must be positive"
        );
        anyhow::ensure!(
            !self.server.index_document.trim().is_empty(),
            "server.index_document cannot be empty"
        );
        Ok(())
    }
}
