use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::notifier::message::normalize_url;
use crate::types::{Market, MarketId, MarketSummary};

/// Markets in `fetched` whose id is not in `known`, in source order.
/// A market listed twice in one response is reported once.
pub fn detect_new(fetched: &[MarketSummary], known: &HashSet<MarketId>) -> Vec<MarketSummary> {
    let mut seen = HashSet::new();
    fetched
        .iter()
        .filter(|m| !known.contains(&m.id) && seen.insert(m.id))
        .cloned()
        .collect()
}

/// The most recently listed market, i.e. the last one in source order.
/// Used in debug mode to exercise the notify path without a real listing.
pub fn debug_pick(fetched: &[MarketSummary]) -> Option<MarketSummary> {
    fetched.last().cloned()
}

/// Turn a detected batch into records sharing one detection timestamp.
pub fn stamp(batch: Vec<MarketSummary>, detected_at: DateTime<Utc>) -> Vec<Market> {
    batch
        .into_iter()
        .map(|m| Market {
            id: m.id,
            url: normalize_url(&m.url),
            short_name: m.short_name,
            detected_at,
        })
        .collect()
}
