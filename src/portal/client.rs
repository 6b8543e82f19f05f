use encoding_rs::Encoding;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::core::config::WorkflowConfig;

use super::{PortalError, BASE_URL};

const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
                           image/avif,image/webp,image/apng,*/*;q=0.8,\
                           application/signed-exchange;v=b3;q=0.7";
const ARCHIVE_ACCEPT: &str = "application/zip,application/octet-stream;q=0.9,*/*;q=0.8";

/// files.aspx page variants. IFRS and RAS listings live on separate
/// query types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPage {
    Ifrs,
    Rsbu,
}

impl ListingPage {
    pub fn query_type(self) -> u8 {
        match self {
            ListingPage::Ifrs => 4,
            ListingPage::Rsbu => 3,
        }
    }
}

/// Header set mimicking a concrete browser build. The portal serves
/// anti-bot pages to clients that do not look like one.
struct BrowserProfile {
    user_agent: &'static str,
    sec_ch_ua: &'static str,
}

const CHROME_124: BrowserProfile = BrowserProfile {
    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                 AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/124.0.0.0 Safari/537.36",
    sec_ch_ua: "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
};

const CHROME_142: BrowserProfile = BrowserProfile {
    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                 AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/142.0.0.0 Safari/537.36",
    sec_ch_ua: "\"Chromium\";v=\"142\", \"Google Chrome\";v=\"142\", \"Not_A Brand\";v=\"99\"",
};

impl BrowserProfile {
    fn named(name: &str) -> &'static BrowserProfile {
        match name {
            "chrome124" => &CHROME_124,
            "chrome142" => &CHROME_142,
            other => {
                warn!("unknown impersonation profile {:?}, using chrome124", other);
                &CHROME_124
            }
        }
    }
}

/// Synchronous portal client, built once per invocation and passed down.
pub struct PortalClient {
    http: Client,
    base_url: String,
}

impl PortalClient {
    pub fn new(config: &WorkflowConfig) -> Result<Self, PortalError> {
        Self::with_base_url(config, BASE_URL)
    }

    /// Point the client at a different host, mainly for tests.
    pub fn with_base_url(config: &WorkflowConfig, base_url: &str) -> Result<Self, PortalError> {
        let profile = BrowserProfile::named(&config.impersonate);

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(profile.user_agent));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("sec-ch-ua", HeaderValue::from_static(profile.sec_ch_ua));
        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"macOS\""));
        if let Some(cookie) = &config.cookie {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.insert(header::COOKIE, value);
                }
                Err(_) => warn!("EDISCLOSURE_COOKIE contains invalid header bytes, ignoring it"),
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one files.aspx listing page as decoded text.
    pub fn fetch_listing(&self, company_id: &str, page: ListingPage) -> Result<String, PortalError> {
        let url = format!(
            "{}/files.aspx?id={}&type={}",
            self.base_url,
            company_id,
            page.query_type()
        );
        debug!("fetching listing page {}", url);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, HTML_ACCEPT)
            .header(header::CACHE_CONTROL, "max-age=0")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header("Upgrade-Insecure-Requests", "1")
            .timeout(LIST_TIMEOUT)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::HttpStatus { status, url });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes()?;

        Ok(decode_body(&body, content_type.as_deref()))
    }

    /// Download a report archive and hand back the raw bytes.
    pub fn download(&self, url: &str) -> Result<Vec<u8>, PortalError> {
        debug!("downloading {}", url);

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, ARCHIVE_ACCEPT)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}

/// Decode a listing body. The portal mostly serves UTF-8 but some pages
/// still come as windows-1251, with or without a charset in the header.
fn decode_body(raw: &[u8], content_type: Option<&str>) -> String {
    let labeled = content_type
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .and_then(|m| m.get_param(mime::CHARSET).map(|c| c.as_str().to_string()));

    let encoding = match labeled {
        Some(label) => Encoding::for_label(label.as_bytes()),
        None => {
            let detected = chardet::detect(raw).0;
            debug!("detected character encoding: {}", detected);
            Encoding::for_label(detected.as_bytes())
        }
    }
    .unwrap_or(encoding_rs::UTF_8);

    let (text, _, _) = encoding.decode(raw);
    text.into_owned()
}
