use clap::Parser;
use config::{ConfigError, Environment, File};
use serde::Deserialize;

use handle_errors::Error;

use crate::routes::authentication::SessionSettings;

const PASETO_KEY_LEN: usize = 32;

/// Q&A forum server
#[derive(Parser, Debug, Default, PartialEq)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file, `setup.toml` when omitted
    #[clap(long)]
    pub config: Option<String>,
    /// Port the server listens on
    #[clap(long)]
    pub port: Option<u16>,
    /// Tracing filter, e.g. `forum=info,warp=error`
    #[clap(long)]
    pub log_level: Option<String>,
    /// PostgreSQL connection string
    #[clap(long)]
    pub database_url: Option<String>,
    /// Serve the session cookie without the `Secure` flag
    #[clap(long)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub paseto_key: String,
    pub session_hours: i64,
    pub debug: bool,
}

impl Config {
    /// Reads `.env`, the settings file, the environment and the command line.
    pub fn new() -> Result<Config, Error> {
        dotenv::dotenv().ok();
        let args = Args::parse();
        Config::load(&args)
    }

    pub fn load(args: &Args) -> Result<Config, Error> {
        let config = layered(args)
            .and_then(|c| c.try_deserialize::<Config>())
            .map_err(Error::ConfigError)?;
        config.check()
    }

    fn check(self) -> Result<Config, Error> {
        if self.paseto_key.len() != PASETO_KEY_LEN {
            return Err(Error::ConfigError(ConfigError::Message(format!(
                "paseto_key must be exactly {} bytes",
                PASETO_KEY_LEN
            ))));
        }
        if self.db_max_connections == 0 || self.session_hours <= 0 {
            return Err(Error::ConfigError(ConfigError::Message(
                "db_max_connections and session_hours must be positive".to_string(),
            )));
        }
        Ok(self)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            key: self.paseto_key.as_bytes().to_vec(),
            lifetime_hours: self.session_hours,
            secure_cookie: !self.debug,
        }
    }
}

fn layered(args: &Args) -> Result<config::Config, ConfigError> {
    config::Config::builder()
        .set_default("port", 3030_i64)?
        .set_default("log_level", "forum=info,warp=error")?
        .set_default("database_url", "postgres://localhost:5432/forum")?
        .set_default("db_max_connections", 5_i64)?
        .set_default("session_hours", 24_i64)?
        .set_default("debug", false)?
        .add_source(File::with_name(args.config.as_deref().unwrap_or("setup")).required(false))
        .add_source(Environment::default())
        .set_override_option("port", args.port.map(i64::from))?
        .set_override_option("log_level", args.log_level.clone())?
        .set_override_option("database_url", args.database_url.clone())?
        .set_override_option("debug", args.debug.then_some(true))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            port: 3030,
            log_level: "forum=info".to_string(),
            database_url: "postgres://localhost:5432/forum".to_string(),
            db_max_connections: 5,
            paseto_key: "RANDOM WORDS WINTER MACINTOSH PC".to_string(),
            session_hours: 24,
            debug: false,
        }
    }

    #[test]
    fn flags_are_optional() {
        let args = Args::try_parse_from(["forum"]).unwrap();
        assert_eq!(args, Args::default());
    }

    #[test]
    fn flags_are_parsed() {
        let args = Args::try_parse_from([
            "forum",
            "--port",
            "8080",
            "--database-url",
            "postgres://db/forum",
            "--debug",
        ])
        .unwrap();
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.database_url.as_deref(), Some("postgres://db/forum"));
        assert!(args.debug);
    }

    #[test]
    fn short_key_is_rejected() {
        let config = Config {
            paseto_key: "too short".to_string(),
            ..config()
        };
        assert!(matches!(config.check(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(config().check().unwrap(), config());
    }

    #[test]
    fn debug_drops_the_secure_flag() {
        assert!(config().session_settings().secure_cookie);
        let debug = Config {
            debug: true,
            ..config()
        };
        assert!(!debug.session_settings().secure_cookie);
        assert_eq!(debug.session_settings().key.len(), PASETO_KEY_LEN);
    }
}
