use chrono::NaiveDateTime;
use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};
use url::Url;

use super::client::{ListingPage, PortalClient};
use super::period::{normalize_period, parse_publish_date};
use super::table::extract_file_rows;
use super::{PortalError, BASE_URL};

/// Compact document bucket used in titles, payloads and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "String", into = "String")]
pub enum ReportKind {
    Ifrs,
    Rsbu,
}

impl TryFrom<String> for ReportKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ReportKind::from_str(&s)
    }
}

impl From<ReportKind> for String {
    fn from(kind: ReportKind) -> String {
        kind.to_string()
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Ifrs => write!(f, "МСФО"),
            ReportKind::Rsbu => write!(f, "РСБУ"),
        }
    }
}

pub static REPORT_KINDS: Lazy<String> = Lazy::new(|| {
    ReportKind::iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl ReportKind {
    pub fn list_kinds() -> &'static str {
        &REPORT_KINDS
    }

    /// Classify the verbose type column. Anything mentioning МСФО is IFRS,
    /// any other non-empty text is RAS.
    pub fn from_raw_label(raw: &str) -> Option<ReportKind> {
        if raw.is_empty() {
            return None;
        }
        if raw.to_uppercase().contains("МСФО") {
            Some(ReportKind::Ifrs)
        } else {
            Some(ReportKind::Rsbu)
        }
    }

    /// IFRS reports sometimes appear on the RAS page, so both pages are
    /// scanned for IFRS. RAS uses only its own page.
    pub fn listing_pages(self) -> &'static [ListingPage] {
        match self {
            ReportKind::Ifrs => &[ListingPage::Ifrs, ListingPage::Rsbu],
            ReportKind::Rsbu => &[ListingPage::Rsbu],
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<ReportKind, String> {
        match s.trim().to_uppercase().as_str() {
            "MSFO" | "МСФО" | "IFRS" => Ok(ReportKind::Ifrs),
            "RSBU" | "РСБУ" | "RAS" => Ok(ReportKind::Rsbu),
            _ => Err(format!(
                "unknown document type: {} (expected one of: {})",
                s,
                ReportKind::list_kinds()
            )),
        }
    }
}

/// One listed report, ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc_type_raw: String,
    pub doc_type: ReportKind,
    pub period_raw: String,
    pub period: String,
    pub publish_date: NaiveDateTime,
    pub url: String,
}

fn absolute_url(href: &str) -> Option<String> {
    let base = Url::parse(BASE_URL).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Turn one listing page into documents of the wanted kind.
///
/// Rows with the wrong type, a missing link, an unresolvable URL or an
/// unparsable publish date are skipped row by row.
pub fn documents_from_html(html: &str, kind: ReportKind) -> Vec<Document> {
    let mut docs = Vec::new();

    for row in extract_file_rows(html) {
        let raw_type = row.doc_type.trim();
        match ReportKind::from_raw_label(raw_type) {
            Some(compact) if compact == kind => {}
            _ => continue,
        }

        let period_raw = row.period.trim();
        let publish_raw = row.publish_date.trim();
        let url_raw = row.file_url.trim();

        let url = match absolute_url(url_raw) {
            Some(u) => u,
            None => {
                debug!("skipping row with unresolvable link: {:?}", url_raw);
                continue;
            }
        };
        if publish_raw.is_empty() {
            continue;
        }
        let publish_date = match parse_publish_date(publish_raw) {
            Some(dt) => dt,
            None => {
                debug!("skipping row with unparsable date: {:?}", publish_raw);
                continue;
            }
        };

        docs.push(Document {
            doc_type_raw: raw_type.to_string(),
            doc_type: kind,
            period_raw: period_raw.to_string(),
            period: normalize_period(period_raw),
            publish_date,
            url,
        });
    }

    docs
}

/// Fetch every relevant listing page and return documents newest first.
pub fn collect_documents(
    client: &PortalClient,
    company_id: &str,
    kind: ReportKind,
) -> Result<Vec<Document>, PortalError> {
    let mut docs = Vec::new();

    for page in kind.listing_pages() {
        let html = client.fetch_listing(company_id, *page)?;
        docs.extend(documents_from_html(&html, kind));
    }

    // Newest first; equal dates keep page order.
    docs.sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
    Ok(docs)
}
