mod cli;

use std::env;

use anyhow::Context;
use clap::Parser;

use finnhub_sync::database::Database;
use finnhub_sync::fetch::FinnhubClient;
use finnhub_sync::store::{SyncJob, SyncRequest};

use crate::cli::Cli;

const TOKEN_ENV: &str = "FINNHUB_TOKEN";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let token = env::var(TOKEN_ENV)
        .with_context(|| format!("{} must be set to a Finnhub API token", TOKEN_ENV))?;

    let client = FinnhubClient::new(token)?;
    let mut db = Database::open(&cli.database)?;
    db.reset()?;

    println!(
        "Syncing {} constituents and {} FX pairs into {} (free-tier rate limits \
         make this slow; expect long pauses)",
        cli.market,
        cli.pairs.len(),
        cli.database
    );

    let request = SyncRequest {
        market: cli.market,
        from_date: cli.from_date,
        to_date: cli.to_date,
        fx_pairs: cli.pairs,
    };

    let summary = SyncJob::new(&client).run(&mut db, &request)?;

    println!(
        "Done in {:.1}s: {} stock profiles, {} stock price bars, {} FX symbols, {} FX price bars",
        summary.elapsed.as_secs_f64(),
        summary.stock_profiles,
        summary.stock_prices,
        summary.fx_symbols,
        summary.fx_prices
    );

    Ok(())
}
