use crate::ScrapeArgs;
use anyhow::Context;
use ratewatch_core::config::{parse_date, ExtractionStrategy, ScrapeOptions, Settings};
use ratewatch_core::scrape::extract::SelectorFallbackExtractor;
use ratewatch_core::scrape::navigator::PageNavigator;
use ratewatch_core::scrape::orchestrator::{RunAborted, RunReport, ScrapeOrchestrator, ScrapePlan};
use ratewatch_core::scrape::search::SearchUrlBuilder;
use ratewatch_core::scrape::selectors::SelectorCatalog;
use ratewatch_core::scrape::synthetic::SyntheticSession;
use ratewatch_core::storage::{self, MemoryPriceStore, PgPriceStore, PriceStore};

pub async fn run(settings: &Settings, args: ScrapeArgs) -> anyhow::Result<()> {
    let today = chrono::Utc::now().date_naive();
    let opts = apply_args(ScrapeOptions::from_env(today)?, args_overrides(&args)?);
    let plan = opts.plan()?;

    tracing::info!(
        hotel = %plan.hotel_name,
        cities = ?plan.cities,
        start = %opts.start_date,
        end = %opts.end_date,
        stride_days = opts.stride_days,
        strategy = %opts.strategy,
        dry_run = args.dry_run,
        "scrape requested"
    );

    if args.dry_run {
        let store = MemoryPriceStore::new();
        let outcome = execute(settings, &opts, plan, &store).await?;
        log_report(&outcome);
        tracing::info!(stored = store.len().await, dry_run = true, "records kept in memory only");
        return match outcome {
            Ok(_) => Ok(()),
            Err(aborted) => Err(aborted.into()),
        };
    }

    let pool = crate::connect(settings).await?;
    let hotel_name = plan.hotel_name.clone();

    let Some(lock) = storage::lock::try_acquire_hotel_lock(&pool, &hotel_name).await? else {
        tracing::warn!(hotel = %hotel_name, "hotel lock not acquired; another scrape in progress");
        return Ok(());
    };

    let store = PgPriceStore::new(pool.clone());
    let result = execute(settings, &opts, plan, &store).await;

    let persisted = match &result {
        Ok(outcome) => {
            log_report(outcome);
            let (report, error) = match outcome {
                Ok(report) => (report, None),
                Err(aborted) => (&aborted.report, Some(aborted.to_string())),
            };
            storage::runs::record_scrape_run(&pool, report, opts.strategy.as_str(), error.as_deref())
                .await
                .map(Some)
        }
        Err(_) => Ok(None),
    };

    if let Err(e) = lock.release().await {
        tracing::warn!(hotel = %hotel_name, error = %e, "failed to release hotel lock");
    }

    if let Some(run_id) = persisted? {
        tracing::info!(%run_id, hotel = %hotel_name, "persisted scrape run");
    }
    match result? {
        Ok(_) => Ok(()),
        Err(aborted) => Err(aborted.into()),
    }
}

/// CLI values that take precedence over `SCRAPE_*`.
#[derive(Debug, Default)]
struct Overrides {
    hotel: Option<String>,
    cities: Vec<String>,
    start_date: Option<chrono::NaiveDate>,
    end_date: Option<chrono::NaiveDate>,
    stride_days: Option<u32>,
    strategy: Option<ExtractionStrategy>,
}

fn args_overrides(args: &ScrapeArgs) -> anyhow::Result<Overrides> {
    Ok(Overrides {
        hotel: args.hotel.clone(),
        cities: args.cities.clone(),
        start_date: args
            .start_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .context("--start-date")?,
        end_date: args
            .end_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .context("--end-date")?,
        stride_days: args.stride_days,
        strategy: args.strategy,
    })
}

fn apply_args(mut opts: ScrapeOptions, o: Overrides) -> ScrapeOptions {
    if let Some(hotel) = o.hotel {
        opts.hotel_name = hotel;
    }
    if !o.cities.is_empty() {
        opts.cities = o.cities;
    }
    if let Some(start) = o.start_date {
        let window = opts.end_date - opts.start_date;
        opts.start_date = start;
        if o.end_date.is_none() {
            opts.end_date = start + window;
        }
    }
    if let Some(end) = o.end_date {
        opts.end_date = end;
    }
    if let Some(stride) = o.stride_days {
        opts.stride_days = stride;
    }
    if let Some(strategy) = o.strategy {
        opts.strategy = strategy;
    }
    opts
}

/// The outer `Err` is a setup failure (no session, bad URL) or Ctrl-C; the
/// inner one is a run that lost its session part way through.
async fn execute(
    settings: &Settings,
    opts: &ScrapeOptions,
    plan: ScrapePlan,
    store: &dyn PriceStore,
) -> anyhow::Result<Result<RunReport, RunAborted>> {
    let catalog = SelectorCatalog::default();
    let mut orchestrator = ScrapeOrchestrator::new(plan, store, chrono::Utc::now().date_naive())
        .with_catalog(catalog.clone())
        .with_timing(opts.timing.clone())
        .with_search_urls(SearchUrlBuilder::new(&opts.search_base_url)?);
    if let Some(timeout) = opts.selector_timeout {
        orchestrator = orchestrator.with_extractor(SelectorFallbackExtractor::with_timeout(timeout));
    }

    match opts.strategy {
        ExtractionStrategy::Synthetic => {
            let session = SyntheticSession::booking_like(&opts.hotel_name, &catalog);
            drive(orchestrator, session).await
        }
        ExtractionStrategy::Real => real_session(settings, opts, orchestrator).await,
    }
}

#[cfg(feature = "browser")]
async fn real_session(
    settings: &Settings,
    opts: &ScrapeOptions,
    orchestrator: ScrapeOrchestrator<'_>,
) -> anyhow::Result<Result<RunReport, RunAborted>> {
    use ratewatch_core::scrape::browser::{ChromeOptions, ChromeSession};

    let chrome = ChromeOptions {
        executable: settings.chrome_executable.as_ref().map(Into::into),
        remote_url: settings.chrome_remote_url.clone(),
        headless: opts.headless,
        request_timeout: opts.timing.results_timeout.max(std::time::Duration::from_secs(30)),
    };
    let session = ChromeSession::open(&chrome).await?;
    drive(orchestrator, session).await
}

#[cfg(not(feature = "browser"))]
async fn real_session(
    _settings: &Settings,
    _opts: &ScrapeOptions,
    _orchestrator: ScrapeOrchestrator<'_>,
) -> anyhow::Result<Result<RunReport, RunAborted>> {
    anyhow::bail!("built without the browser feature; use --strategy synthetic")
}

async fn drive<N: PageNavigator>(
    orchestrator: ScrapeOrchestrator<'_>,
    session: N,
) -> anyhow::Result<Result<RunReport, RunAborted>> {
    tokio::select! {
        outcome = orchestrator.run(session) => Ok(outcome),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::warn!("interrupted; dropping scrape run");
            anyhow::bail!("scrape interrupted")
        }
    }
}

fn log_report(outcome: &Result<RunReport, RunAborted>) {
    let report = match outcome {
        Ok(report) => report,
        Err(aborted) => {
            tracing::error!(error = %aborted, "scrape run aborted");
            &aborted.report
        }
    };

    for line in report.summary_lines() {
        tracing::info!(hotel = %report.hotel_name, "{line}");
    }
    tracing::info!(
        hotel = %report.hotel_name,
        state = ?report.state,
        attempted = report.attempted(),
        recorded = report.records_emitted(),
        "scrape run finished"
    );
}
