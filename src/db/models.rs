use serde::{Deserialize, Serialize};

use crate::types::{Market, MarketId};

/// Column order of the markets ledger.
pub const LEDGER_HEADER: [&str; 4] = ["id", "shortName", "url", "datedetected"];

/// Timestamp layout of the `datedetected` column. Rows are stamped in UTC,
/// and the `url` column holds the normalized link that was mailed, so rows
/// from older local-time ledgers with raw URLs will differ in both columns.
pub const DETECTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One ledger row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRow {
    pub id: MarketId,
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub url: String,
    pub datedetected: String,
}

impl From<&Market> for MarketRow {
    fn from(m: &Market) -> Self {
        Self {
            id: m.id,
            short_name: m.short_name.clone(),
            url: m.url.clone(),
            datedetected: m.detected_at.format(DETECTED_AT_FORMAT).to_string(),
        }
    }
}
