use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Command;
use structopt::StructOpt;

use crate::cache::ReportPayload;
use crate::portal::Document;

/// One row in the launcher's Script Filter list.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptFilterItem {
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptFilterOutput {
    pub items: Vec<ScriptFilterItem>,
}

/// Split a launcher query into ticker and optional period prefix.
pub fn parse_query(query: &str) -> (Option<String>, Option<String>) {
    let mut words = query.split_whitespace();
    let ticker = words.next().map(str::to_string);
    let period = words.next().map(str::to_string);
    (ticker, period)
}

/// Turn fetched documents into launcher rows, newest first, optionally
/// narrowed to periods starting with `period_filter`.
pub fn build_script_filter_items(
    documents: &[Document],
    ticker: &str,
    period_filter: Option<&str>,
) -> Result<ScriptFilterOutput> {
    let ticker = ticker.trim().to_uppercase();
    let filter = period_filter.map(|p| p.trim().to_uppercase());

    let mut items = Vec::new();
    for doc in documents {
        if let Some(prefix) = &filter {
            if !doc.period.to_uppercase().starts_with(prefix.as_str()) {
                continue;
            }
        }
        let payload = ReportPayload {
            ticker: ticker.clone(),
            url: doc.url.clone(),
            period: doc.period.clone(),
            doc_type: doc.doc_type,
            publish_date: doc.publish_date.date(),
            period_raw: Some(doc.period_raw.clone()),
            doc_type_raw: Some(doc.doc_type_raw.clone()),
        };
        let arg = serde_json::to_string(&payload)?;
        items.push(ScriptFilterItem {
            title: format!("{} - {}", doc.doc_type, doc.period),
            subtitle: doc.publish_date.format("%d.%m.%Y").to_string(),
            arg: Some(arg),
            valid: true,
        });
    }

    if items.is_empty() {
        let title = if filter.is_some() {
            "No reports match the filter"
        } else {
            "No reports found"
        };
        items.push(ScriptFilterItem {
            title: title.to_string(),
            subtitle: format!("{} — try another period or command.", ticker),
            arg: None,
            valid: false,
        });
    }

    Ok(ScriptFilterOutput { items })
}

/// A single invalid row describing a failure, so the launcher still
/// renders something instead of an empty list.
pub fn error_items(message: &str, detail: &str) -> ScriptFilterOutput {
    let subtitle = if detail.is_empty() {
        "Check ticker, period, or network connectivity.".to_string()
    } else {
        detail.to_string()
    };
    ScriptFilterOutput {
        items: vec![ScriptFilterItem {
            title: message.to_string(),
            subtitle,
            arg: None,
            valid: false,
        }],
    }
}

/// Print Script Filter JSON to stdout. Pretty-printed and without ASCII
/// escaping, so Cyrillic titles stay readable in the debugger.
pub fn emit(output: &ScriptFilterOutput) -> Result<()> {
    let rendered = serde_json::to_string_pretty(output)?;
    println!("{}", rendered);
    Ok(())
}

/// Hand a cached PDF to the system opener. Launcher actions fire and
/// forget, a viewer refusing the file is not this program's failure.
pub fn open_pdf(path: &Path) -> Result<()> {
    let status = Command::new("open").arg(path).status()?;
    if !status.success() {
        debug!("opener exited with {} for {}", status, path.display());
    }
    Ok(())
}

/// Retrieval arguments shared by the open and save binaries. A full JSON
/// payload wins over individual flags.
#[derive(Debug, StructOpt)]
pub struct RetrieveArgs {
    /// Complete report payload as JSON, as produced by list-reports
    #[structopt(long)]
    pub payload: Option<String>,

    #[structopt(long)]
    pub ticker: Option<String>,

    #[structopt(long)]
    pub url: Option<String>,

    #[structopt(long)]
    pub period: Option<String>,

    #[structopt(long = "doc-type")]
    pub doc_type: Option<String>,

    #[structopt(long = "publish-date")]
    pub publish_date: Option<String>,

    #[structopt(long = "period-raw")]
    pub period_raw: Option<String>,

    #[structopt(long = "doc-type-raw")]
    pub doc_type_raw: Option<String>,
}

const REQUIRED_FIELDS: [&str; 5] = ["ticker", "url", "period", "doc_type", "publish_date"];

fn field_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Assemble a payload from either the JSON blob or the individual flags,
/// reporting every missing required field at once.
pub fn load_payload(args: &RetrieveArgs) -> Result<ReportPayload> {
    let value: Value = match &args.payload {
        Some(raw) => serde_json::from_str(raw).context("payload is not valid JSON")?,
        None => json!({
            "ticker": args.ticker,
            "url": args.url,
            "period": args.period,
            "doc_type": args.doc_type,
            "publish_date": args.publish_date,
            "period_raw": args.period_raw,
            "doc_type_raw": args.doc_type_raw,
        }),
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|field| field_missing(value.get(**field)))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!("Missing payload fields: {}", missing.join(", ")));
    }

    let payload: ReportPayload =
        serde_json::from_value(value).context("payload fields failed to parse")?;
    Ok(payload)
}
