use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Cache {
    /// Defaults to the platform cache directory when unset.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    #[serde(default)]
    pub cache: Cache,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.url", "https://valuelife-backend.onrender.com")?
            .set_default("server.timeout_secs", 30)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("WALLET").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
