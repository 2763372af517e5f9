pub mod mail;
pub mod message;

use tracing::{info, warn};

use crate::types::Market;
use mail::MailSession;
use message::compose_body;

/// Mail every market in the batch through `session`. A failed send is logged
/// and skipped so one bad message never blocks the rest. Returns how many
/// messages went out.
pub async fn notify_batch<S: MailSession>(session: &mut S, markets: &[Market]) -> usize {
    let mut sent = 0;
    for market in markets {
        let body = compose_body(market);
        info!(market_id = market.id, "New market: {body}");
        match session.send(&body).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(market_id = market.id, "Email failed to send, skipping: {e}"),
        }
    }
    sent
}
