use std::{env, fmt::Display, io::Write, str::FromStr};

use chrono::Duration;
use dispatch_common::{Paise, Secret};
use dispatch_engine::{DispatchPolicy, PricingPolicy};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_FDS_HOST: &str = "127.0.0.1";
const DEFAULT_FDS_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/fds_store.db";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub dispatch: DispatchPolicy,
    pub pricing: PricingPolicy,
    /// How often the stale-broadcast sweep runs. It only does anything if `dispatch.broadcast_ttl` is set.
    pub sweep_interval: std::time::Duration,
    pub notifier: NotifierConfig,
    /// Capacity of the queues between the engine and the event hooks
    pub event_buffer_size: usize,
    pub max_db_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FDS_HOST.to_string(),
            port: DEFAULT_FDS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            dispatch: DispatchPolicy::default(),
            pricing: PricingPolicy::default(),
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            notifier: NotifierConfig::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FDS_HOST").ok().unwrap_or_else(|| DEFAULT_FDS_HOST.into());
        let port = parse_env("FDS_PORT", DEFAULT_FDS_PORT);
        let database_url = env::var("FDS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ FDS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.into()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            error!("🪛️ Could not load the authentication configuration. {e}");
            AuthConfig::default()
        });
        let dispatch = dispatch_policy_from_env();
        let pricing = PricingPolicy {
            delivery_fee: Paise::from(parse_env("FDS_DELIVERY_FEE", PricingPolicy::default().delivery_fee.value())),
            free_delivery_threshold: Paise::from(parse_env(
                "FDS_FREE_DELIVERY_THRESHOLD",
                PricingPolicy::default().free_delivery_threshold.value(),
            )),
        };
        let sweep_interval =
            std::time::Duration::from_secs(parse_env("FDS_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1));
        let notifier = NotifierConfig::from_env();
        let event_buffer_size = parse_env("FDS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE).max(1);
        let max_db_connections = parse_env("FDS_MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS).max(1);
        Self {
            host,
            port,
            database_url,
            auth,
            dispatch,
            pricing,
            sweep_interval,
            notifier,
            event_buffer_size,
            max_db_connections,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default` (with a warning) if the value is invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn dispatch_policy_from_env() -> DispatchPolicy {
    let defaults = DispatchPolicy::default();
    let near_radius_m = parse_env("FDS_NEAR_RADIUS_M", defaults.near_radius_m);
    let mut far_radius_m = parse_env("FDS_FAR_RADIUS_M", defaults.far_radius_m);
    if far_radius_m < near_radius_m {
        warn!(
            "🪛️ FDS_FAR_RADIUS_M ({far_radius_m}) is smaller than FDS_NEAR_RADIUS_M ({near_radius_m}). Using the near \
             radius for both searches."
        );
        far_radius_m = near_radius_m;
    }
    let handoff_code_ttl =
        Duration::seconds(parse_env("FDS_HANDOFF_CODE_TTL_SECS", defaults.handoff_code_ttl.num_seconds()));
    let broadcast_ttl = match env::var("FDS_BROADCAST_TTL_SECS") {
        Ok(s) => match s.trim().parse::<i64>() {
            Ok(secs) if secs > 0 => {
                info!("🪛️ Unanswered broadcasts will be re-dispatched after {secs}s");
                Some(Duration::seconds(secs))
            },
            Ok(_) => None,
            Err(e) => {
                warn!("🪛️ Invalid configuration value for FDS_BROADCAST_TTL_SECS. {e}. Broadcasts will not expire.");
                None
            },
        },
        Err(_) => {
            info!("🪛️ FDS_BROADCAST_TTL_SECS is not set. Broadcasts will not expire.");
            None
        },
    };
    DispatchPolicy { near_radius_m, far_radius_m, handoff_code_ttl, broadcast_ttl }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the auth service that issues access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No token issued by \
             the auth service will be accepted. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        match NamedTempFile::new().ok().and_then(|f| f.keep().ok()) {
            Some((mut f, p)) => match writeln!(f, "{secret}") {
                Ok(()) => warn!(
                    "🚨️🚨️🚨️ The JWT secret for this session was written to {}. Set FDS_JWT_SECRET instead. 🚨️🚨️🚨️",
                    p.to_str().unwrap_or("???")
                ),
                Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
            },
            None => warn!("🪛️ Could not create a temporary file to store the JWT secret."),
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("FDS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [FDS_JWT_SECRET]")))?;
        let jwt_secret = Secret::new(secret);
        if jwt_secret.is_empty() {
            return Err(ServerError::ConfigurationError("FDS_JWT_SECRET is empty".to_string()));
        }
        Ok(Self { jwt_secret })
    }
}

//-----------------------------------------------  NotifierConfig  -----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct NotifierConfig {
    /// Where notification requests are POSTed. When `None`, notifications are only logged.
    pub url: Option<String>,
    pub api_key: Secret<String>,
}

impl NotifierConfig {
    pub fn from_env() -> Self {
        let url = env::var("FDS_NOTIFIER_URL").ok().filter(|s| !s.trim().is_empty());
        if url.is_none() {
            info!("🪛️ FDS_NOTIFIER_URL is not set. Notifications will be logged, not sent.");
        }
        let api_key = Secret::new(env::var("FDS_NOTIFIER_API_KEY").unwrap_or_default());
        Self { url, api_key }
    }
}
