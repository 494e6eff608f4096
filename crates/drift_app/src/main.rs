mod backlog_file;
mod config;
mod logging;
mod runner;

use std::fs;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use drift_core::BacklogItem;
use drift_logging::{drift_info, parse_level};

use crate::backlog_file::FileBacklogStore;
use crate::config::{Cli, Command};
use crate::runner::{Completion, Runner};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings;
    logging::initialize(
        settings.log_destination,
        parse_level(&settings.log_level),
        &settings.log_file,
    );

    let store = Arc::new(
        FileBacklogStore::open(&settings.backlog_file)
            .with_context(|| format!("opening backlog {:?}", settings.backlog_file))?,
    );

    let completions = match cli.command {
        Command::Add { repos, inactive } => {
            for repo in repos {
                let item = BacklogItem::new(repo);
                store.upsert(if inactive { item.inactive() } else { item })?;
            }
            drift_info!("Backlog now holds {} repositories", store.snapshot()?.len());
            return Ok(());
        }
        Command::List => {
            for row in store.snapshot()? {
                println!("{}", serde_json::to_string(&row)?);
            }
            return Ok(());
        }
        Command::Reset => Runner::start(&settings, store)?.reset()?,
        Command::Drain => Runner::start(&settings, store)?.drain()?,
        Command::Job { payload } => {
            let payload = serde_json::from_str(&payload).context("job payload is not JSON")?;
            Runner::start(&settings, store)?.job(payload)?
        }
        Command::Cicd { log, from_file } => {
            let text = match (log, from_file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("reading CI/CD log {:?}", path))?,
                (None, None) => anyhow::bail!("no CI/CD log given"),
            };
            Runner::start(&settings, store)?.cicd(&text)?
        }
    };

    report(&completions)
}

fn report(completions: &[Completion]) -> anyhow::Result<()> {
    for completion in completions {
        println!("{}", completion.to_json());
    }
    let failed = completions.iter().filter(|c| c.result.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} invocations failed", completions.len());
    }
    Ok(())
}
