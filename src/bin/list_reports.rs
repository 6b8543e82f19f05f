use anyhow::Result;
use colored::*;
use edisclosure::portal::{collect_documents, tickers, Document, PortalClient, PortalError};
use edisclosure::{workflow, ReportKind, WorkflowConfig};
use log::warn;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "list-reports",
    about = "List RSBU/MSFO reports from e-disclosure.ru as Alfred Script Filter JSON."
)]
struct Opt {
    /// Report kind to list (MSFO or RSBU)
    #[structopt(parse(try_from_str))]
    command: ReportKind,

    /// Ticker symbol, e.g. SBER
    ticker: Option<String>,

    /// Period prefix filter, e.g. 2024 or 2024Q3
    period: Option<String>,

    /// Period filter, takes precedence over the positional argument
    #[structopt(long = "period")]
    period_override: Option<String>,

    /// Raw launcher query, split into ticker and period
    #[structopt(long = "alfred-query")]
    alfred_query: Option<String>,
}

fn fetch_documents(ticker: &str, kind: ReportKind) -> Result<Vec<Document>, PortalError> {
    let company_id = tickers::company_id(ticker)?;
    let config = WorkflowConfig::from_env();
    let client = PortalClient::new(&config)?;
    collect_documents(&client, company_id, kind)
}

fn run(opt: Opt) -> Result<i32> {
    let mut ticker = opt.ticker;
    let mut period = opt.period_override.or(opt.period);
    if let Some(query) = opt.alfred_query.as_deref() {
        let (query_ticker, query_period) = workflow::parse_query(query);
        ticker = query_ticker.or(ticker);
        period = query_period.or(period);
    }

    let ticker = match ticker {
        Some(ticker) => ticker,
        None => {
            let output = workflow::error_items("Ticker is required", "Usage: msfo TICKER [PERIOD]");
            workflow::emit(&output)?;
            return Ok(0);
        }
    };

    let documents = match fetch_documents(&ticker, opt.command) {
        Ok(documents) => documents,
        Err(PortalError::UnknownTicker(symbol)) => {
            eprintln!("{}", format!("Unknown ticker: {}", symbol).red());
            return Ok(1);
        }
        Err(err) => {
            let output = workflow::error_items("Failed to fetch reports", &err.to_string());
            workflow::emit(&output)?;
            return Ok(0);
        }
    };

    let output = workflow::build_script_filter_items(&documents, &ticker, period.as_deref())?;
    workflow::emit(&output)?;
    Ok(0)
}

fn main() {
    dotenv::dotenv().ok();
    env_logger::init();
    if let Err(err) = ctrlc::set_handler(|| std::process::exit(130)) {
        warn!("could not install the interrupt handler: {}", err);
    }

    let opt = Opt::from_args();
    match run(opt) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{}", format!("Failed to list reports: {}", err).red());
            std::process::exit(1);
        }
    }
}
