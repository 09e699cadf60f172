mod refresh;
mod report;
mod track;

use clap::{Parser, Subcommand};

use brickdeal_core::Retailer;

#[derive(Debug, Parser)]
#[command(name = "brickdeal-cli")]
#[command(about = "brickdeal scraping and reporting command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// Register a set and the retailer URL to scrape for it.
    Track {
        /// Retailer the URL belongs to (amazon, lego, rakuten).
        retailer: Retailer,
        /// Catalog set number, or a vendor token if the number is unknown.
        set_id: String,
        /// Product page URL to scrape.
        url: String,
        /// Display name; defaults to a placeholder.
        #[arg(long)]
        name: Option<String>,
        /// Manufacturer list price in cents, used as a scoring anchor.
        #[arg(long)]
        msrp_cents: Option<i64>,
    },
    /// Scrape one set from one retailer, using the stored URL unless one is given.
    RefreshOne {
        retailer: Retailer,
        set_id: String,
        /// Override the stored offer URL.
        #[arg(long)]
        url: Option<String>,
    },
    /// Scrape every stored offer URL for a retailer.
    RefreshAll {
        retailer: Retailer,
        /// Concurrent fetches (capped at 10).
        #[arg(long)]
        concurrency: Option<usize>,
        /// Stop after this many sets; 0 means all.
        #[arg(long, default_value_t = 0)]
        take: usize,
    },
    /// Print the earnings-per-click report.
    Epc,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = brickdeal_db::connect_pool_from_env().await?;

    match cli.command {
        Commands::Migrate => {
            brickdeal_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Track {
            retailer,
            set_id,
            url,
            name,
            msrp_cents,
        } => {
            track::run_track(&pool, retailer, &set_id, &url, name.as_deref(), msrp_cents).await?;
        }
        Commands::RefreshOne {
            retailer,
            set_id,
            url,
        } => {
            refresh::run_refresh_one(&pool, retailer, &set_id, url.as_deref()).await?;
        }
        Commands::RefreshAll {
            retailer,
            concurrency,
            take,
        } => {
            refresh::run_refresh_all(&pool, retailer, concurrency, take).await?;
        }
        Commands::Epc => {
            report::run_epc(&pool).await?;
        }
    }

    Ok(())
}
