//! Server configuration.

use std::time::Duration;

use recards_transport::OriginPolicy;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;

/// Errors from reading configuration out of the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var} value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for a [`RecardsServer`](crate::RecardsServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// Browser origins allowed to connect.
    pub client_origin: OriginPolicy,
    /// How long a connection may go without any frame, pongs included,
    /// before it is dropped. The server pings every half period, so a live
    /// client never trips it. `None` (the default) never drops anyone.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            client_origin: OriginPolicy::Any,
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Reads `PORT`, `CLIENT_ORIGIN` and `RECARDS_IDLE_TIMEOUT_SECS` from
    /// the process environment, falling back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead.
    ///
    /// An idle timeout of `0` disables it, same as leaving it unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "PORT",
                    value: port.clone(),
                    reason: e.to_string(),
                }
            })?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(origin) = lookup("CLIENT_ORIGIN") {
            config.client_origin = OriginPolicy::from_setting(&origin);
        }

        if let Some(secs) = lookup("RECARDS_IDLE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "RECARDS_IDLE_TIMEOUT_SECS",
                    value: secs.clone(),
                    reason: e.to_string(),
                }
            })?;
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}
