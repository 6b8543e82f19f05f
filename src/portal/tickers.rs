use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::PortalError;

/// Ticker to e-disclosure company id, embedded at build time so the
/// workflow has no runtime file dependency.
static TICKER_TO_ID: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let mut map = HashMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(include_str!("../../data/tickers.csv").as_bytes());
    for record in reader.records().flatten() {
        if let (Some(ticker), Some(id)) = (record.get(0), record.get(1)) {
            let ticker = ticker.trim();
            let id = id.trim();
            if !ticker.is_empty() && !id.is_empty() {
                map.insert(ticker.to_uppercase(), id.to_string());
            }
        }
    }
    map
});

pub fn company_id(ticker: &str) -> Result<&'static str, PortalError> {
    TICKER_TO_ID
        .get(&ticker.trim().to_uppercase())
        .map(|id| id.as_str())
        .ok_or_else(|| PortalError::UnknownTicker(ticker.to_string()))
}
