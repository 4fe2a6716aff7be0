use crate::domain::analysis::{CityPriceSummary, HotelCity, PriceStatistics, RankedResult};
use crate::domain::record::PriceRecord;
use crate::storage::PriceStore;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;

pub mod report;

pub use report::{render_store_overview, render_text_report};

pub const DEFAULT_TOP_K: usize = 10;

/// Cheapest first, at most `k`. Equal prices keep their input order.
pub fn rank(records: &[PriceRecord], k: usize) -> Vec<PriceRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.price());
    sorted.truncate(k);
    sorted
}

pub fn statistics(records: &[PriceRecord]) -> PriceStatistics {
    let mut prices = records.iter().map(PriceRecord::price);
    let Some(first) = prices.next() else {
        return PriceStatistics::default();
    };

    let (min, max, sum) = prices.fold((first, first, first), |(min, max, sum), p| {
        (min.min(p), max.max(p), sum + p)
    });
    let average = (sum / Decimal::from(records.len()))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    PriceStatistics { min, max, average }
}

pub fn group_and_rank(records: &[PriceRecord], k: usize) -> BTreeMap<HotelCity, RankedResult> {
    let mut groups: BTreeMap<HotelCity, Vec<PriceRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(HotelCity::of(record))
            .or_default()
            .push(record.clone());
    }

    groups
        .into_iter()
        .map(|(key, group)| {
            let records = rank(&group, k);
            (key.clone(), RankedResult { key, records })
        })
        .collect()
}

pub fn filter_check_in(records: &[PriceRecord], start: NaiveDate, end: NaiveDate) -> Vec<PriceRecord> {
    records
        .iter()
        .filter(|r| r.check_in() >= start && r.check_in() <= end)
        .cloned()
        .collect()
}

fn unique_by<'a>(records: &'a [PriceRecord], field: impl Fn(&'a PriceRecord) -> &'a str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        let value = field(record);
        if !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

pub fn unique_hotels(records: &[PriceRecord]) -> Vec<String> {
    unique_by(records, PriceRecord::hotel_name)
}

pub fn unique_cities(records: &[PriceRecord]) -> Vec<String> {
    unique_by(records, PriceRecord::city)
}

pub fn city_summaries(records: &[PriceRecord]) -> Vec<CityPriceSummary> {
    unique_cities(records)
        .into_iter()
        .map(|city| {
            let in_city: Vec<PriceRecord> = records
                .iter()
                .filter(|r| r.city() == city)
                .cloned()
                .collect();
            let stats = statistics(&in_city);
            CityPriceSummary {
                city,
                records: in_city.len(),
                min: stats.min,
                average: stats.average,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CityAnalysis {
    pub ranked: RankedResult,
    pub statistics: PriceStatistics,
    pub total_records: usize,
}

impl CityAnalysis {
    pub fn from_records(key: HotelCity, records: &[PriceRecord], k: usize) -> Self {
        Self {
            ranked: RankedResult {
                key,
                records: rank(records, k),
            },
            statistics: statistics(records),
            total_records: records.len(),
        }
    }
}

/// Cities without data are included with empty rankings.
pub async fn analyze_cities(
    store: &dyn PriceStore,
    hotel_name: &str,
    cities: &[String],
    k: usize,
    window: Option<(NaiveDate, NaiveDate)>,
) -> anyhow::Result<Vec<CityAnalysis>> {
    if let Some((start, end)) = window {
        anyhow::ensure!(start <= end, "start date {start} is after end date {end}");
    }

    let mut out = Vec::with_capacity(cities.len());
    for city in cities {
        let mut records = store.query_all(hotel_name, city).await?;
        if let Some((start, end)) = window {
            records = filter_check_in(&records, start, end);
        }
        out.push(CityAnalysis::from_records(
            HotelCity::new(hotel_name, city.as_str()),
            &records,
            k,
        ));
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreAnalysis {
    pub hotels: Vec<String>,
    pub cities: Vec<CityPriceSummary>,
    pub pairs: Vec<CityAnalysis>,
}

pub async fn analyze_store(store: &dyn PriceStore, k: usize) -> anyhow::Result<StoreAnalysis> {
    let mut all = Vec::new();
    for key in store.combinations().await? {
        let records = store.query_all(&key.hotel_name, &key.city).await?;
        tracing::debug!(%key, records = records.len(), "loaded");
        all.extend(records);
    }

    let pairs = group_and_rank(&all, k)
        .into_values()
        .map(|ranked| {
            let group: Vec<PriceRecord> = all
                .iter()
                .filter(|r| HotelCity::of(r) == ranked.key)
                .cloned()
                .collect();
            CityAnalysis {
                ranked,
                statistics: statistics(&group),
                total_records: group.len(),
            }
        })
        .collect();

    Ok(StoreAnalysis {
        hotels: unique_hotels(&all),
        cities: city_summaries(&all),
        pairs,
    })
}
