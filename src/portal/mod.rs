pub mod client;
pub mod documents;
pub mod period;
pub mod table;
pub mod tickers;

use reqwest::StatusCode;
use thiserror::Error;

pub use client::{ListingPage, PortalClient};
pub use documents::{collect_documents, Document, ReportKind};

pub const BASE_URL: &str = "https://www.e-disclosure.ru/portal/";

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },
}
