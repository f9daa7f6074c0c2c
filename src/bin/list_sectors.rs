//! Print the fundamentus sector directory, optionally with the tickers
//! listed under one sector.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::Level;

use fundamentus_dash::api::FundamentusClient;
use fundamentus_dash::listing::ListingFetcher;
use fundamentus_dash::models::Config;

#[derive(Parser, Debug)]
#[command(name = "list_sectors")]
struct Args {
    /// Also list the tickers of this sector id
    #[arg(long)]
    sector: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = Config::from_env()?;
    let client = Arc::new(FundamentusClient::new(&config)?);
    let listing = ListingFetcher::new(client);

    let sectors = listing.list_sectors().await?;
    for sector in &sectors {
        println!("{} - {}", sector.id, sector.name);
    }

    if let Some(sector_id) = args.sector {
        println!("\nTickers in sector {}:", sector_id);
        for ticker in listing.list_tickers_for_sector(&sector_id).await? {
            println!("{}", ticker);
        }
    }

    Ok(())
}
