use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_any_origin: bool,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut settings: Settings = Self::defaults()?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))

            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?
            .try_deserialize()?;

        settings.apply_port_override(env::var("PORT").ok())?;
        Ok(settings)
    }

    /// Built-in defaults shared by every configuration source.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 10000)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.url", "sqlite:students.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.busy_timeout_secs", 5)?
            .set_default("cors.enabled", true)?
            .set_default("cors.allow_any_origin", true)?
            .set_default("cors.max_age", 3600)
    }

    /// Hosting platforms hand out the listening port through a bare `PORT`
    /// variable; it wins over every other source.
    pub fn apply_port_override(&mut self, port: Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::Message(format!("invalid PORT '{}': {}", raw, e)))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::defaults()?
            .set_override("environment", "test")?
            .set_override("database.url", "sqlite::memory:")?
            .set_override("database.max_connections", 1)?
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::new_for_test().expect("Failed to load settings");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 10000);
        assert_eq!(settings.server.workers as usize, num_cpus::get());
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.database.max_connections, 1);
        assert_eq!(settings.database.busy_timeout_secs, 5);
        assert!(settings.cors.enabled);
    }

    #[test]
    fn test_file_override() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .add_source(File::from_str(
                r#"
                environment = "production"

                [server]
                port = 9000
                workers = 2

                [database]
                url = "sqlite:/var/lib/tracker/students.db"
                "#,
                FileFormat::Toml,
            ))
            .build()
            .expect("Failed to build config")
            .try_deserialize()
            .expect("Failed to deserialize settings");

        assert_eq!(settings.environment, "production");
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.workers, 2);
        assert_eq!(settings.database.url, "sqlite:/var/lib/tracker/students.db");
        assert_eq!(settings.database.max_connections, 5);
    }

    #[test]
    fn test_invalid_port() {
        let result = Settings::defaults()
            .unwrap()
            .add_source(File::from_str("[server]\nport = \"invalid\"", FileFormat::Toml))
            .build()
            .and_then(|config| config.try_deserialize::<Settings>());

        assert!(result.is_err(), "Expected error for invalid port");
    }

    #[test]
    fn test_port_override() {
        let mut settings = Settings::new_for_test().unwrap();

        settings.apply_port_override(None).unwrap();
        assert_eq!(settings.server.port, 10000);

        settings.apply_port_override(Some("5001".into())).unwrap();
        assert_eq!(settings.server.port, 5001);

        assert!(settings.apply_port_override(Some("eighty".into())).is_err());
        assert_eq!(settings.server.port, 5001);
    }
}
