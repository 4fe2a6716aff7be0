use crate::AnalyzeArgs;
use anyhow::Context;
use chrono::NaiveDate;
use ratewatch_core::analysis::{self, render_store_overview, render_text_report, CityAnalysis};
use ratewatch_core::config::{analysis_top_k, parse_date, ScrapeOptions, Settings};
use ratewatch_core::storage::PgPriceStore;

pub async fn run(settings: &Settings, args: AnalyzeArgs) -> anyhow::Result<()> {
    let k = args.top_k.unwrap_or_else(analysis_top_k);
    anyhow::ensure!(k >= 1, "--top-k must be >= 1");
    let window = check_in_window(args.start_date.as_deref(), args.end_date.as_deref())?;

    let pool = crate::connect(settings).await?;
    let store = PgPriceStore::new(pool);

    if args.all {
        let all = analysis::analyze_store(&store, k).await?;
        tracing::info!(
            hotels = all.hotels.len(),
            cities = all.cities.len(),
            pairs = all.pairs.len(),
            k,
            "analyzed every hotel/city pair"
        );
        print!("{}", render_store_overview(&all));
        for (hotel_name, group) in by_hotel(all.pairs) {
            print!("{}", render_text_report(&hotel_name, &group));
        }
        return Ok(());
    }

    let defaults = ScrapeOptions::from_env(chrono::Utc::now().date_naive())?;
    let hotel_name = args.hotel.unwrap_or(defaults.hotel_name);
    let cities = if args.cities.is_empty() {
        defaults.cities
    } else {
        args.cities
    };

    let analyses = analysis::analyze_cities(&store, &hotel_name, &cities, k, window).await?;
    for a in &analyses {
        tracing::info!(
            key = %a.ranked.key,
            records = a.total_records,
            stats = %a.statistics,
            "city analysis"
        );
    }
    print!("{}", render_text_report(&hotel_name, &analyses));
    Ok(())
}

fn check_in_window(
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<Option<(NaiveDate, NaiveDate)>> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some((
            parse_date(start).context("--start-date")?,
            parse_date(end).context("--end-date")?,
        ))),
        (None, None) => Ok(None),
        _ => anyhow::bail!("--start-date and --end-date go together"),
    }
}

/// Splits store-wide results into one report group per hotel. Input is sorted by hotel.
fn by_hotel(all: Vec<CityAnalysis>) -> Vec<(String, Vec<CityAnalysis>)> {
    let mut out: Vec<(String, Vec<CityAnalysis>)> = Vec::new();
    for a in all {
        match out.last_mut() {
            Some((hotel, group)) if *hotel == a.ranked.key.hotel_name => group.push(a),
            _ => out.push((a.ranked.key.hotel_name.clone(), vec![a])),
        }
    }
    out
}
