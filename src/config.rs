use std::time::Duration;

use lettre::message::Mailbox;

use crate::error::{AppError, Result};

pub const PREDICTIT_API_URL: &str = "https://www.predictit.org/api/marketdata/all/";
pub const SMTP_HOST: &str = "smtp.gmail.com";
pub const SMTP_PORT: u16 = 587;

/// PredictIt refreshes its market data once a minute; polling faster is pointless
/// and against their API policy.
pub const MIN_POLL_INTERVAL_SECS: u64 = 60;

/// Retries after the first failed fetch attempt, before falling back to the
/// extended backoff.
pub const FETCH_MAX_RETRIES: u32 = 5;

/// Delay between fetch attempts (seconds).
pub const FETCH_RETRY_DELAY_SECS: u64 = 15;

/// Pause after a whole round of fetch attempts failed (seconds). PredictIt goes
/// down for scheduled maintenance for hours at a time.
pub const FETCH_EXTENDED_BACKOFF_SECS: u64 = 15 * 60;

/// SMTP login attempts before the mail relay is declared unavailable.
pub const MAIL_LOGIN_ATTEMPTS: u32 = 5;

/// Delay after a failed SMTP login (seconds).
pub const MAIL_LOGIN_RETRY_DELAY_SECS: u64 = 5 * 60;

/// Timeout on a single market API request (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Body of the notification sent once when the process starts.
pub const STARTUP_MESSAGE: &str = "predictit-watch started!";

/// Retry timings for the market fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRetry {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub extended_backoff: Duration,
}

impl Default for FetchRetry {
    fn default() -> Self {
        Self {
            max_retries: FETCH_MAX_RETRIES,
            retry_delay: Duration::from_secs(FETCH_RETRY_DELAY_SECS),
            extended_backoff: Duration::from_secs(FETCH_EXTENDED_BACKOFF_SECS),
        }
    }
}

/// Retry timings for acquiring a mail session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailRetry {
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for MailRetry {
    fn default() -> Self {
        Self {
            attempts: MAIL_LOGIN_ATTEMPTS,
            retry_delay: Duration::from_secs(MAIL_LOGIN_RETRY_DELAY_SECS),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub api_url: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Mailbox the notifications are sent from; also the SMTP login (EMAIL_FROM)
    pub sender_address: String,
    /// SMTP password or app password (EMAIL_PASSWORD)
    pub sender_password: String,
    /// Mailbox (or SMS gateway address) notified of new markets (EMAIL_TO)
    pub recipient_address: String,
    /// Seconds to wait between polls, at least MIN_POLL_INTERVAL_SECS (POLL_INTERVAL_SECS)
    pub poll_interval_secs: u64,
    /// Force a notification on the first poll, then stop (DEBUG_MODE)
    pub debug_mode: bool,
    pub markets_csv: String,
    pub log_file: String,
    pub log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender_address", &self.sender_address)
            .field("sender_password", &"<redacted>")
            .field("recipient_address", &self.recipient_address)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("debug_mode", &self.debug_mode)
            .field("markets_csv", &self.markets_csv)
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Loads `.env` if there is one, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };

        let sender_address = required("EMAIL_FROM")?;
        let sender_password = required("EMAIL_PASSWORD")?;
        let recipient_address = required("EMAIL_TO")?;
        for (key, addr) in [("EMAIL_FROM", &sender_address), ("EMAIL_TO", &recipient_address)] {
            addr.parse::<Mailbox>()
                .map_err(|e| AppError::Config(format!("{key} is not a valid address: {e}")))?;
        }

        let poll_interval_secs = match var("POLL_INTERVAL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                AppError::Config("POLL_INTERVAL_SECS must be a whole number of seconds".to_string())
            })?,
            None => MIN_POLL_INTERVAL_SECS,
        };
        if poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(AppError::Config(format!(
                "POLL_INTERVAL_SECS must be at least {MIN_POLL_INTERVAL_SECS}, got {poll_interval_secs}"
            )));
        }

        let debug_mode = match var("DEBUG_MODE").map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) => match v.as_str() {
                "" | "0" | "false" | "no" => false,
                "1" | "true" | "yes" => true,
                _ => return Err(AppError::Config(format!("DEBUG_MODE must be true or false, got {v:?}"))),
            },
        };

        Ok(Self {
            api_url: var("PREDICTIT_API_URL").unwrap_or_else(|| PREDICTIT_API_URL.to_string()),
            smtp_host: var("SMTP_HOST").unwrap_or_else(|| SMTP_HOST.to_string()),
            smtp_port: var("SMTP_PORT")
                .unwrap_or_else(|| SMTP_PORT.to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("SMTP_PORT must be a valid port number".to_string()))?,
            sender_address,
            sender_password,
            recipient_address,
            poll_interval_secs,
            debug_mode,
            markets_csv: var("MARKETS_CSV").unwrap_or_else(|| "markets.csv".to_string()),
            log_file: var("LOG_FILE").unwrap_or_else(|| "app.log".to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
