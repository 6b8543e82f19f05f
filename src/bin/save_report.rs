use anyhow::Result;
use colored::*;
use edisclosure::cache::{ensure_pdf_cached, save_pdf_to_downloads};
use edisclosure::portal::PortalClient;
use edisclosure::workflow::{self, RetrieveArgs};
use edisclosure::WorkflowConfig;
use log::warn;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "save-report",
    about = "Fetch the report described by a list-reports payload and copy it to Downloads."
)]
struct Opt {
    #[structopt(flatten)]
    retrieve: RetrieveArgs,
}

fn run(opt: Opt) -> Result<PathBuf> {
    let payload = workflow::load_payload(&opt.retrieve)?;
    let config = WorkflowConfig::from_env();
    let client = PortalClient::new(&config)?;
    let pdf = ensure_pdf_cached(&client, &payload, &config.cache_root)?;
    save_pdf_to_downloads(&pdf, &payload)
}

fn main() {
    dotenv::dotenv().ok();
    env_logger::init();
    if let Err(err) = ctrlc::set_handler(|| std::process::exit(130)) {
        warn!("could not install the interrupt handler: {}", err);
    }

    let opt = Opt::from_args();
    match run(opt) {
        Ok(path) => println!("Saved {}", path.display()),
        Err(err) => {
            eprintln!("{}", format!("Failed to save report: {}", err).red());
            std::process::exit(1);
        }
    }
}
