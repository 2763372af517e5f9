use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{FetchRetry, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::{MarketSummary, MarketsResponse};

/// One attempt at reading the full market list. Any error is transient.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_once(&self) -> Result<Vec<MarketSummary>>;
}

/// PredictIt `marketdata/all` endpoint over HTTPS.
pub struct HttpMarketSource {
    client: reqwest::Client,
    url: String,
}

impl HttpMarketSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl MarketSource for HttpMarketSource {
    async fn fetch_once(&self) -> Result<Vec<MarketSummary>> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Status(status));
        }
        let body = resp.text().await?;
        let parsed: MarketsResponse = serde_json::from_str(&body)?;
        Ok(parsed.markets)
    }
}

/// Wraps a [`MarketSource`] with bounded retry and an open-ended extended
/// backoff. `fetch` only returns once some attempt succeeds.
pub struct MarketFetcher<S> {
    source: S,
    retry: FetchRetry,
}

impl<S: MarketSource> MarketFetcher<S> {
    pub fn new(source: S, retry: FetchRetry) -> Self {
        Self { source, retry }
    }

    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch(&self) -> Vec<MarketSummary> {
        let attempts_per_round = self.retry.max_retries + 1;
        let mut round = 0u64;

        loop {
            round += 1;
            for attempt in 1..=attempts_per_round {
                match self.source.fetch_once().await {
                    Ok(markets) => {
                        debug!(markets = markets.len(), attempt, round, "Market list fetched");
                        return markets;
                    }
                    Err(e) => {
                        debug!(attempt, round, "Market fetch failed: {e}");
                        if attempt < attempts_per_round {
                            tokio::time::sleep(self.retry.retry_delay).await;
                        }
                    }
                }
            }

            warn!(
                round,
                attempts = attempts_per_round,
                "Market fetch exceeded {} attempts with no data. Trying again in {} minutes.",
                attempts_per_round,
                self.retry.extended_backoff.as_secs() / 60,
            );
            tokio::time::sleep(self.retry.extended_backoff).await;
            info!(round = round + 1, "Resuming market fetch after extended backoff");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{garbage, ScriptedSource};
    use super::*;
    use crate::logging::capture::LogCapture;
    use tokio::time::Instant;

    fn summary(id: u64) -> MarketSummary {
        MarketSummary {
            id,
            short_name: format!("Market {id}"),
            url: format!("https://site/m/{id}/detail"),
        }
    }

    fn source(script: Vec<Result<Vec<MarketSummary>>>) -> ScriptedSource {
        ScriptedSource::new(script, vec![summary(1)])
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_does_not_sleep() {
        let fetcher = MarketFetcher::new(source(vec![Ok(vec![summary(9)])]), FetchRetry::default());
        let start = Instant::now();
        let markets = fetcher.fetch().await;
        assert_eq!(markets, vec![summary(9)]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_attempt_succeeds_without_extended_backoff() {
        let mut script: Vec<_> = (0..5).map(|_| garbage()).collect();
        script.push(Ok(vec![summary(42)]));
        let fetcher = MarketFetcher::new(source(script), FetchRetry::default());

        let start = Instant::now();
        let markets = fetcher.fetch().await;

        assert_eq!(markets, vec![summary(42)]);
        assert_eq!(fetcher.source.calls(), 6);
        // five 15s retry delays, no 15 minute pause
        assert_eq!(start.elapsed(), Duration::from_secs(75));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_round_backs_off_then_retries() {
        let retry = FetchRetry::default();
        let mut script: Vec<_> = (0..6).map(|_| garbage()).collect();
        script.push(Ok(vec![summary(7)]));
        let fetcher = MarketFetcher::new(source(script), retry);

        let start = Instant::now();
        let markets = fetcher.fetch().await;

        assert_eq!(markets, vec![summary(7)]);
        assert_eq!(fetcher.source.calls(), 7);
        assert!(start.elapsed() >= retry.extended_backoff, "elapsed={:?}", start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_round_is_logged_as_warning() {
        let logs = LogCapture::default();
        let _guard = logs.install();
        let script: Vec<_> = (0..6).map(|_| garbage()).collect();
        let fetcher = MarketFetcher::new(source(script), FetchRetry::default());

        fetcher.fetch().await;

        let warnings = logs.matching("WARN", &["exceeded 6 attempts"]);
        assert_eq!(warnings.len(), 1, "{:#?}", logs.lines());
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_retrying_across_many_rounds() {
        let script: Vec<_> = (0..20).map(|_| garbage()).collect();
        let fetcher = MarketFetcher::new(source(script), FetchRetry::default());

        let markets = fetcher.fetch().await;

        assert_eq!(markets, vec![summary(1)]);
        assert_eq!(fetcher.source.calls(), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_market_list_is_a_success() {
        let fetcher = MarketFetcher::new(source(vec![Ok(Vec::new())]), FetchRetry::default());
        assert!(fetcher.fetch().await.is_empty());
        assert_eq!(fetcher.source.calls(), 1);
    }
}
