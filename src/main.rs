use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use fundamentus_dash::api::FundamentusClient;
use fundamentus_dash::composition::{composition_table, CompositionFetcher};
use fundamentus_dash::download::{BrowserDownloadAgent, DownloadAgent, NoopDownloadAgent};
use fundamentus_dash::fundamentals::{BatchResult, FundamentalsFetcher, SecurityKind};
use fundamentus_dash::models::{Config, Constituent, DataTable, IndexId};
use fundamentus_dash::ui::{self, TabContent};

/// Fetch B3 index compositions and fundamentus.com.br fundamentals and show
/// them as dashboard tables.
#[derive(Parser, Debug)]
#[command(name = "fundamentus-dash")]
struct Args {
    /// Indices to fetch, comma separated (IBOV, SMLL, IFIX)
    #[arg(long, value_delimiter = ',', default_value = "IBOV,SMLL,IFIX")]
    indices: Vec<String>,

    /// Keep only the first N constituents of each index
    #[arg(long, default_value_t = 5)]
    limit: usize,

    /// Print tables to stdout instead of opening the dashboard
    #[arg(long)]
    no_ui: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Suppress most logs while the TUI owns the terminal
    let (max_level, filter) = if args.no_ui {
        (Level::INFO, "fundamentus_dash=info")
    } else {
        (Level::ERROR, "fundamentus_dash=error")
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration Error: {}", e);
            std::process::exit(1);
        }
    };

    let indices: Vec<IndexId> = args
        .indices
        .iter()
        .filter_map(|s| {
            let parsed = IndexId::parse(s);
            if parsed.is_none() {
                eprintln!("⚠️  Unknown index {:?}, skipping (known: IBOV, SMLL, IFIX)", s);
            }
            parsed
        })
        .collect();
    if indices.is_empty() {
        eprintln!("❌ No valid indices requested");
        std::process::exit(1);
    }

    let agent: Box<dyn DownloadAgent> = match &config.browser_cmd {
        Some(cmd) => Box::new(BrowserDownloadAgent::new(cmd.clone(), &config)),
        None => Box::new(NoopDownloadAgent),
    };
    let compositions = CompositionFetcher::new(&config, agent);

    let mut tabs: Vec<TabContent> = Vec::new();
    let mut smll: Vec<Constituent> = Vec::new();
    let mut ifix: Vec<Constituent> = Vec::new();

    for index in &indices {
        match compositions.fetch(*index).await? {
            Some(mut constituents) => {
                constituents.truncate(args.limit);
                info!("{}: {} constituents", index, constituents.len());
                tabs.push(TabContent::new(
                    format!("Composição {}", index),
                    "Código",
                    composition_table(&constituents),
                    format!("{} constituents (head {})", constituents.len(), args.limit),
                ));
                match index {
                    IndexId::Smll => smll = constituents,
                    IndexId::Ifix => ifix = constituents,
                    IndexId::Ibov => {}
                }
            }
            None => {
                tabs.push(TabContent::new(
                    format!("Composição {}", index),
                    "Código",
                    DataTable::empty(),
                    format!("No portfolio CSV found for {index}; place one in the download directory or set FDASH_BROWSER_CMD"),
                ));
            }
        }
    }

    let client = FundamentusClient::new(&config)?;
    let fetcher = FundamentalsFetcher::new(client, &config);

    if !smll.is_empty() {
        let tickers: Vec<String> = smll.iter().map(|c| c.ticker.clone()).collect();
        let result = fetcher.fetch_batch(SecurityKind::Equity, &tickers).await;
        tabs.push(batch_tab("Fundamentos SMLL", "Papel", result));
    }
    if !ifix.is_empty() {
        let tickers: Vec<String> = ifix.iter().map(|c| c.ticker.clone()).collect();
        let result = fetcher.fetch_batch(SecurityKind::Fii, &tickers).await;
        tabs.push(batch_tab("Fundamentos IFIX", "FII", result));
    }

    if args.no_ui {
        for tab in &tabs {
            print_tab(tab);
        }
        return Ok(());
    }

    if let Err(e) = ui::run_dashboard(tabs) {
        eprintln!("❌ Dashboard error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn batch_tab(title: &str, key_header: &str, result: BatchResult) -> TabContent {
    for outcome in &result.outcomes {
        if let Err(err) = &outcome.result {
            info!("{}: {}", outcome.ticker, err);
        }
    }
    let s = &result.summary;
    let note = format!(
        "ok {} | not found {} | layout mismatch {} | network errors {}",
        s.succeeded, s.not_found, s.layout_mismatch, s.network_errors
    );
    TabContent::new(title, key_header, result.table, note)
}

fn print_tab(tab: &TabContent) {
    println!("\n== {} ({}) ==", tab.title, tab.note);
    let header: Vec<&str> = std::iter::once(tab.key_header.as_str())
        .chain(tab.table.columns().iter().map(String::as_str))
        .collect();
    println!("{}", header.join(";"));
    for (ticker, cells) in tab.table.rows() {
        let row: Vec<&str> = std::iter::once(ticker)
            .chain(cells.iter().map(String::as_str))
            .collect();
        println!("{}", row.join(";"));
    }
}
