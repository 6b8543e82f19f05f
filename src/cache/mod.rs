use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::archive::{detect_file_type, extract_archive, stage_pdf, FileType};
use crate::portal::{PortalClient, ReportKind};
use crate::utils::dirs::ensure_dir;

/// Extensions a previous run may have left a raw download under.
const RAW_CANDIDATES: [&str; 5] = ["pdf", "zip", "7z", "rar", "bin"];

/// Everything the retrieval step needs, carried through the launcher's
/// `arg` string as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub ticker: String,
    pub url: String,
    pub period: String,
    pub doc_type: ReportKind,
    pub publish_date: NaiveDate,
    #[serde(default)]
    pub period_raw: Option<String>,
    #[serde(default)]
    pub doc_type_raw: Option<String>,
}

impl ReportPayload {
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.ticker.trim().is_empty() {
            missing.push("ticker");
        }
        if self.url.trim().is_empty() {
            missing.push("url");
        }
        if self.period.trim().is_empty() {
            missing.push("period");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Missing payload fields: {}", missing.join(", ")))
        }
    }

    /// Deterministic cache key. NaiveDate renders as YYYY-MM-DD.
    pub fn base_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.ticker.to_uppercase(),
            self.doc_type,
            self.period,
            self.publish_date
        )
    }

    pub fn cache_dir(&self, cache_root: &Path) -> PathBuf {
        cache_root.join(self.ticker.to_uppercase())
    }
}

fn fetch_and_save(client: &PortalClient, url: &str, filepath: &Path) -> Result<()> {
    let content = client.download(url)?;
    let mut file = File::create(filepath)?;
    file.write_all(&content)?;
    Ok(())
}

fn locate_raw_download(cache_dir: &Path, base_name: &str) -> Option<PathBuf> {
    for ext in RAW_CANDIDATES {
        let candidate = cache_dir.join(format!("{}.{}", base_name, ext));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Idempotent download-detect-extract-stage pipeline.
///
/// A staged PDF short-circuits everything, a leftover raw download skips
/// the network, and only a cold cache downloads. The sniffed type names
/// the canonical file, so a direct PDF response lands in the final slot
/// by the rename alone.
pub fn ensure_pdf_cached(
    client: &PortalClient,
    payload: &ReportPayload,
    cache_root: &Path,
) -> Result<PathBuf> {
    payload.validate()?;

    let cache_dir = payload.cache_dir(cache_root);
    let base_name = payload.base_name();
    let final_pdf = cache_dir.join(format!("{}.pdf", base_name));

    if final_pdf.exists() {
        debug!("cache hit: {}", final_pdf.display());
        return Ok(final_pdf);
    }
    ensure_dir(&cache_dir)?;

    let raw = match locate_raw_download(&cache_dir, &base_name) {
        Some(path) => {
            debug!("reusing raw download {}", path.display());
            path
        }
        None => {
            let fresh = cache_dir.join(format!("{}.bin", base_name));
            fetch_and_save(client, &payload.url, &fresh)
                .with_context(|| format!("downloading {}", payload.url))?;
            info!("downloaded {} to {}", payload.url, fresh.display());
            fresh
        }
    };

    let file_type = detect_file_type(&raw)?;
    let typed = cache_dir.join(format!("{}.{}", base_name, file_type.extension()));
    if raw != typed {
        fs::rename(&raw, &typed)?;
    }

    if file_type == FileType::Pdf {
        return Ok(typed);
    }

    let extract_dir = cache_dir.join(&base_name);
    extract_archive(&typed, &extract_dir, file_type)?;
    let staged = stage_pdf(&extract_dir, &final_pdf)?;
    Ok(staged)
}

/// Copy a staged PDF into the user's Downloads directory.
pub fn save_pdf_to_downloads(pdf_path: &Path, payload: &ReportPayload) -> Result<PathBuf> {
    let downloads = dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .ok_or_else(|| anyhow!("could not determine the Downloads directory"))?;
    ensure_dir(&downloads)?;

    let destination = downloads.join(format!("{}.pdf", payload.base_name()));
    fs::copy(pdf_path, &destination)?;
    info!("saved report to {}", destination.display());
    Ok(destination)
}
