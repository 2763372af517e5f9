use crate::types::Market;

/// Drop everything after the last `/`, keeping the slash. PredictIt links end
/// in a slug of the market title which is noisy in a text message.
/// `https://site/m/103/detail` → `https://site/m/103/`.
pub fn normalize_url(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => url[..=idx].to_string(),
        None => url.to_string(),
    }
}

/// Plain-text notification body. Non-ASCII characters are stripped because
/// the recipient is typically an SMS gateway.
pub fn compose_body(market: &Market) -> String {
    strip_non_ascii(&format!("{} {}", market.short_name, market.url))
}

pub fn strip_non_ascii(s: &str) -> String {
    s.chars().filter(char::is_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn normalize_strips_trailing_segment() {
        assert_eq!(normalize_url("https://site/m/103/detail"), "https://site/m/103/");
        assert_eq!(
            normalize_url("https://www.predictit.org/markets/detail/7053/Who-will-win-the-2024-election"),
            "https://www.predictit.org/markets/detail/7053/"
        );
    }

    #[test]
    fn normalize_keeps_directory_urls_and_slashless_input() {
        assert_eq!(normalize_url("https://site/m/103/"), "https://site/m/103/");
        assert_eq!(normalize_url("no-slash-here"), "no-slash-here");
    }

    #[test]
    fn body_has_name_and_link_without_non_ascii() {
        let market = Market {
            id: 5,
            short_name: "Café “runoff” in São Paulo?".to_string(),
            url: "https://site/m/5/".to_string(),
            detected_at: Utc::now(),
        };
        let body = compose_body(&market);
        assert_eq!(body, "Caf runoff in So Paulo? https://site/m/5/");
        assert!(body.is_ascii());
    }
}
