use serde::Deserialize;

/// How channel senders are wired at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderMode {
    /// Real providers where credentials are configured, unavailable otherwise.
    Live,
    /// Every channel logs the message and reports success with provider `mock`.
    Mock,
}

impl std::str::FromStr for SenderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(SenderMode::Live),
            "mock" => Ok(SenderMode::Mock),
            other => Err(anyhow::anyhow!(
                "SENDER_MODE must be 'live' or 'mock', got '{}'",
                other
            )),
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (worker wake signal)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// HS256 secret used to validate identity provider tokens
    pub jwt_secret: String,

    /// Shared secret the scheduler presents in `X-Service-Key`
    pub service_key: String,

    /// Port the API server listens on (default: 3000)
    pub api_port: u16,

    /// Live providers or mock delivery
    pub sender_mode: SenderMode,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Telnyx API key for SMS delivery
    pub telnyx_api_key: Option<String>,

    /// Telnyx sending number in E.164 form
    pub telnyx_from_number: Option<String>,

    /// Optional Telnyx messaging profile
    pub telnyx_messaging_profile_id: Option<String>,

    /// Maximum records claimed per worker invocation (default: 25)
    pub outbox_batch_size: u32,

    /// Maximum dispatch attempts per record (default: 6)
    pub outbox_max_attempts: u32,

    /// Timeout for a single sender call in seconds (default: 15)
    pub outbox_send_timeout_secs: u64,

    /// Age after which a `processing` lock is considered stale (default: 300)
    pub outbox_processing_timeout_secs: u64,

    /// Idle poll interval of the worker process in milliseconds (default: 15000)
    pub outbox_poll_interval_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            service_key: std::env::var("SERVICE_KEY")
                .map_err(|_| anyhow::anyhow!("SERVICE_KEY environment variable is required"))?,
            api_port: parse_var("API_PORT", 3000)?,
            sender_mode: parse_var("SENDER_MODE", SenderMode::Live)?,
            resend_api_key: non_empty_var("RESEND_API_KEY"),
            email_from: non_empty_var("EMAIL_FROM"),
            telnyx_api_key: non_empty_var("TELNYX_API_KEY"),
            telnyx_from_number: non_empty_var("TELNYX_FROM_NUMBER"),
            telnyx_messaging_profile_id: non_empty_var("TELNYX_MESSAGING_PROFILE_ID"),
            outbox_batch_size: parse_var("OUTBOX_BATCH_SIZE", 25)?,
            outbox_max_attempts: parse_var("OUTBOX_MAX_ATTEMPTS", 6)?,
            outbox_send_timeout_secs: parse_var("OUTBOX_SEND_TIMEOUT_SECS", 15)?,
            outbox_processing_timeout_secs: parse_var("OUTBOX_PROCESSING_TIMEOUT_SECS", 300)?,
            outbox_poll_interval_ms: parse_var("OUTBOX_POLL_INTERVAL_MS", 15_000)?,
        })
    }
}

/// Read an optional variable, treating an empty value as unset.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable, falling back to `default` when it is unset.
fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_mode_parse() {
        assert_eq!("live".parse::<SenderMode>().unwrap(), SenderMode::Live);
        assert_eq!("MOCK".parse::<SenderMode>().unwrap(), SenderMode::Mock);
        assert!("carrier-pigeon".parse::<SenderMode>().is_err());
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u32 = parse_var("DRAFTBELL_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
