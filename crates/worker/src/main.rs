use anyhow::Context;
use clap::{Parser, Subcommand};
use ratewatch_core::config::{ExtractionStrategy, Settings};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analyze;
mod scrape;

#[derive(Debug, Parser)]
#[command(name = "ratewatch_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape nightly prices for one hotel across cities and dates.
    Scrape(ScrapeArgs),
    /// Rank stored prices and print the analysis report.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, clap::Args)]
struct ScrapeArgs {
    /// Hotel name to look for in result titles.
    #[arg(long)]
    hotel: Option<String>,

    /// City to search; repeat for several. Defaults to SCRAPE_CITIES.
    #[arg(long = "city")]
    cities: Vec<String>,

    /// First check-in date (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long)]
    start_date: Option<String>,

    /// Last check-in date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    stride_days: Option<u32>,

    /// real | synthetic
    #[arg(long)]
    strategy: Option<ExtractionStrategy>,

    /// Keep records in memory instead of writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, clap::Args)]
struct AnalyzeArgs {
    #[arg(long)]
    hotel: Option<String>,

    #[arg(long = "city")]
    cities: Vec<String>,

    /// Number of lowest prices per city. Defaults to ANALYSIS_TOP_K.
    #[arg(long)]
    top_k: Option<usize>,

    /// Only check-ins on or after this date (YYYY-MM-DD). Needs --end-date.
    #[arg(long, requires = "end_date")]
    start_date: Option<String>,

    #[arg(long, requires = "start_date")]
    end_date: Option<String>,

    /// Analyze every hotel/city pair in the database instead.
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Scrape(a) => scrape::run(&settings, a).await,
        Command::Analyze(a) => analyze::run(&settings, a).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    ratewatch_core::storage::migrate(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scrape_flags() {
        let args = Args::try_parse_from([
            "ratewatch_worker",
            "scrape",
            "--hotel",
            "Four Seasons",
            "--city",
            "Miami",
            "--city",
            "Dubai",
            "--stride-days",
            "1",
            "--strategy",
            "synthetic",
            "--dry-run",
        ])
        .unwrap();

        let Command::Scrape(scrape) = args.command else {
            panic!("expected scrape");
        };
        assert_eq!(scrape.hotel.as_deref(), Some("Four Seasons"));
        assert_eq!(scrape.cities, vec!["Miami", "Dubai"]);
        assert_eq!(scrape.stride_days, Some(1));
        assert_eq!(scrape.strategy, Some(ExtractionStrategy::Synthetic));
        assert!(scrape.dry_run);
    }

    #[test]
    fn rejects_unknown_strategy() {
        assert!(Args::try_parse_from(["ratewatch_worker", "scrape", "--strategy", "selenium"]).is_err());
    }

    #[test]
    fn parses_analyze_flags() {
        let args =
            Args::try_parse_from(["ratewatch_worker", "analyze", "--top-k", "5", "--all"]).unwrap();
        let Command::Analyze(analyze) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(analyze.top_k, Some(5));
        assert!(analyze.all);

        assert!(Args::try_parse_from(["ratewatch_worker", "analyze", "--start-date", "2026-01-01"]).is_err());
    }
}
