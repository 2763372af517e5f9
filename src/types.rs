use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PredictIt assigns numeric market ids; they are the uniqueness key.
pub type MarketId = u64;

// ---------------------------------------------------------------------------
// API payload
// ---------------------------------------------------------------------------

/// Body of `GET /api/marketdata/all/`. Contracts, prices and the rest of the
/// payload are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<MarketSummary>,
}

/// One listed market as the API reports it. All three fields are required;
/// an element missing any of them fails the whole parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub id: MarketId,
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Detected market
// ---------------------------------------------------------------------------

/// A market detected as new, ready to be mailed and recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    pub short_name: String,
    /// Link with the trailing path segment removed.
    pub url: String,
    pub detected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Watch loop state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Polling,
    Notifying,
    Recording,
    Waiting,
    Terminated,
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WatchState::Polling => "polling",
            WatchState::Notifying => "notifying",
            WatchState::Recording => "recording",
            WatchState::Waiting => "waiting",
            WatchState::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// Why the watch loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// Every SMTP login attempt failed.
    MailUnavailable,
    /// New markets could not be appended to the ledger.
    StoreWriteFailed(crate::error::AppError),
    /// Debug mode finished its single notify/record cycle.
    DebugComplete,
}

impl Termination {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Termination::DebugComplete)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::MailUnavailable => write!(f, "mail relay unavailable"),
            Termination::StoreWriteFailed(e) => write!(f, "could not record new markets: {e}"),
            Termination::DebugComplete => write!(f, "debug run complete"),
        }
    }
}
