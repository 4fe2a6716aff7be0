use crate::domain::record::{PriceRecord, Stay};
use crate::scrape::dates::DateRange;
use crate::scrape::extract::SelectorFallbackExtractor;
use crate::scrape::matcher::find_match;
use crate::scrape::navigator::PageNavigator;
use crate::scrape::obstruction::ObstructionHandler;
use crate::scrape::price::normalize_price;
use crate::scrape::search::SearchUrlBuilder;
use crate::scrape::selectors::SelectorCatalog;
use crate::scrape::ScrapeError;
use crate::storage::PriceStore;
use chrono::{DateTime, NaiveDate, Utc};
use futures::FutureExt;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    NavigatingPage,
    DismissingObstructions,
    ScanningResults,
    ExtractingRecord,
    Recording,
    Advancing,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return self != Idle && self != Advancing;
        }

        matches!(
            (self, next),
            (Idle, NavigatingPage)
                | (Idle, Done)
                | (NavigatingPage, DismissingObstructions)
                | (NavigatingPage, Advancing)
                | (DismissingObstructions, ScanningResults)
                | (DismissingObstructions, Advancing)
                | (ScanningResults, ExtractingRecord)
                | (ScanningResults, Advancing)
                | (ExtractingRecord, Recording)
                | (ExtractingRecord, Advancing)
                | (Recording, Advancing)
                | (Advancing, NavigatingPage)
                | (Advancing, Done)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ScrapePlan {
    pub hotel_name: String,
    pub cities: Vec<String>,
    pub dates: DateRange,
}

impl ScrapePlan {
    pub fn try_new(hotel_name: &str, cities: &[String], dates: DateRange) -> anyhow::Result<Self> {
        let hotel_name = hotel_name.trim().to_string();
        anyhow::ensure!(!hotel_name.is_empty(), "hotel name must be non-empty");

        let mut unique: Vec<String> = Vec::with_capacity(cities.len());
        for city in cities {
            let city = city.trim();
            if city.is_empty() || unique.iter().any(|c| c.eq_ignore_ascii_case(city)) {
                continue;
            }
            unique.push(city.to_string());
        }
        anyhow::ensure!(!unique.is_empty(), "at least one city is required");

        Ok(Self {
            hotel_name,
            cities: unique,
            dates,
        })
    }

    pub fn probes(&self) -> usize {
        self.cities.len() * self.dates.len()
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeTiming {
    pub settle: Duration,
    pub results_timeout: Duration,
    pub between_dates: Duration,
    pub between_cities: Duration,
    pub scroll_steps: u32,
    pub scroll_pause: Duration,
    pub dismiss_pause: Duration,
}

impl Default for ScrapeTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(3000),
            results_timeout: Duration::from_millis(20_000),
            between_dates: Duration::from_millis(1000),
            between_cities: Duration::from_millis(2000),
            scroll_steps: 3,
            scroll_pause: Duration::from_millis(500),
            dismiss_pause: Duration::from_millis(300),
        }
    }
}

impl ScrapeTiming {
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            results_timeout: Duration::from_secs(1),
            between_dates: Duration::ZERO,
            between_cities: Duration::ZERO,
            scroll_steps: 3,
            scroll_pause: Duration::ZERO,
            dismiss_pause: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DateOutcome {
    Recorded { price: Decimal },
    NotFound,
    Unparseable { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DateDiagnostic {
    pub city: String,
    pub stay: Stay,
    #[serde(flatten)]
    pub outcome: DateOutcome,
}

impl fmt::Display for DateDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.stay.check_in, self.city)?;
        match &self.outcome {
            DateOutcome::Recorded { price } => write!(f, "recorded ${price:.2}"),
            DateOutcome::NotFound => write!(f, "hotel not found for this date"),
            DateOutcome::Unparseable { reason } => {
                write!(f, "found but price extraction failed ({reason})")
            }
            DateOutcome::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitySummary {
    pub city: String,
    pub attempted: usize,
    pub recorded: usize,
    pub not_found: usize,
    pub unparseable: usize,
    pub failed: usize,
    /// Subset of `failed` where the record was extracted but not stored.
    pub save_failed: usize,
}

impl CitySummary {
    fn new(city: &str) -> Self {
        Self {
            city: city.to_string(),
            ..Default::default()
        }
    }

    fn count(&mut self, outcome: &DateOutcome) {
        match outcome {
            DateOutcome::Recorded { .. } => self.recorded += 1,
            DateOutcome::NotFound => self.not_found += 1,
            DateOutcome::Unparseable { .. } => self.unparseable += 1,
            DateOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for CitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} | found {:>3} of {:>3} dates | not found {:>3} | unparseable {:>3} | failed {:>3}",
            self.city, self.recorded, self.attempted, self.not_found, self.unparseable, self.failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub hotel_name: String,
    pub state: RunState,
    pub transitions: Vec<RunState>,
    pub diagnostics: Vec<DateDiagnostic>,
    pub cities: Vec<CitySummary>,
    pub records: Vec<PriceRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn new(hotel_name: &str) -> Self {
        Self {
            hotel_name: hotel_name.to_string(),
            state: RunState::Idle,
            transitions: Vec::new(),
            diagnostics: Vec::new(),
            cities: Vec::new(),
            records: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn records_emitted(&self) -> usize {
        self.records.len()
    }

    pub fn attempted(&self) -> usize {
        self.cities.iter().map(|c| c.attempted).sum()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        self.cities.iter().map(|c| c.to_string()).collect()
    }
}

/// Returned when the navigation session dies. Carries everything scraped so far.
#[derive(Debug, thiserror::Error)]
#[error("scrape run aborted: {source}")]
pub struct RunAborted {
    pub report: RunReport,
    #[source]
    pub source: ScrapeError,
}

enum Probe {
    Record(PriceRecord),
    NotFound,
    Unparseable(ScrapeError),
}

pub struct ScrapeOrchestrator<'a> {
    plan: ScrapePlan,
    catalog: SelectorCatalog,
    timing: ScrapeTiming,
    urls: SearchUrlBuilder,
    extractor: SelectorFallbackExtractor,
    store: &'a dyn PriceStore,
    scraped_date: NaiveDate,
    state: RunState,
    transitions: Vec<RunState>,
}

impl<'a> ScrapeOrchestrator<'a> {
    pub fn new(plan: ScrapePlan, store: &'a dyn PriceStore, scraped_date: NaiveDate) -> Self {
        Self {
            plan,
            catalog: SelectorCatalog::default(),
            timing: ScrapeTiming::default(),
            urls: SearchUrlBuilder::default(),
            extractor: SelectorFallbackExtractor::new(),
            store,
            scraped_date,
            state: RunState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: SelectorCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_timing(mut self, timing: ScrapeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_search_urls(mut self, urls: SearchUrlBuilder) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_extractor(mut self, extractor: SelectorFallbackExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn run<N: PageNavigator>(mut self, mut session: N) -> Result<RunReport, RunAborted> {
        let outcome = AssertUnwindSafe(self.drive(&mut session))
            .catch_unwind()
            .await;
        session.release().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive<N: PageNavigator>(&mut self, session: &mut N) -> Result<RunReport, RunAborted> {
        let mut report = RunReport::new(&self.plan.hotel_name);
        let obstructions =
            ObstructionHandler::new(self.catalog.obstructions.clone(), self.timing.dismiss_pause);
        let cities = self.plan.cities.clone();
        let dates = self.plan.dates;

        tracing::info!(
            hotel = %self.plan.hotel_name,
            cities = cities.len(),
            start = %dates.start(),
            end = %dates.end(),
            stride_days = dates.stride_days(),
            probes = self.plan.probes(),
            "scrape run starting"
        );

        for (city_idx, city) in cities.iter().enumerate() {
            if city_idx > 0 {
                tokio::time::sleep(self.timing.between_cities).await;
            }
            let mut summary = CitySummary::new(city);

            for (date_idx, stay) in dates.iter().enumerate() {
                if date_idx > 0 {
                    tokio::time::sleep(self.timing.between_dates).await;
                }
                summary.attempted += 1;

                let outcome = match self.probe(session, &obstructions, city, stay).await {
                    Ok(Probe::Record(record)) => {
                        self.transition(RunState::Recording);
                        match self.store.save(&record).await {
                            Ok(()) => {
                                let price = record.price();
                                report.records.push(record);
                                DateOutcome::Recorded { price }
                            }
                            Err(err) => {
                                summary.save_failed += 1;
                                DateOutcome::Failed {
                                    reason: format!("save failed: {err:#}"),
                                }
                            }
                        }
                    }
                    Ok(Probe::NotFound) => DateOutcome::NotFound,
                    Ok(Probe::Unparseable(err)) => DateOutcome::Unparseable {
                        reason: err.to_string(),
                    },
                    Err(err) if err.is_fatal() => {
                        tracing::error!(%city, check_in = %stay.check_in, error = %err, "navigation session lost; aborting run");
                        self.transition(RunState::Failed);
                        report.cities.push(summary);
                        self.finish(&mut report);
                        return Err(RunAborted {
                            report,
                            source: err,
                        });
                    }
                    Err(err) => DateOutcome::Failed {
                        reason: err.to_string(),
                    },
                };

                summary.count(&outcome);
                let diagnostic = DateDiagnostic {
                    city: city.clone(),
                    stay,
                    outcome,
                };
                match diagnostic.outcome {
                    DateOutcome::Recorded { .. } => tracing::info!("{diagnostic}"),
                    _ => tracing::warn!("{diagnostic}"),
                }
                report.diagnostics.push(diagnostic);

                self.transition(RunState::Advancing);
            }

            tracing::info!(hotel = %self.plan.hotel_name, "{summary}");
            report.cities.push(summary);
        }

        self.transition(RunState::Done);
        self.finish(&mut report);
        tracing::info!(
            hotel = %self.plan.hotel_name,
            attempted = report.attempted(),
            recorded = report.records_emitted(),
            "scrape run done"
        );
        Ok(report)
    }

    async fn probe<N: PageNavigator>(
        &mut self,
        session: &mut N,
        obstructions: &ObstructionHandler,
        city: &str,
        stay: Stay,
    ) -> Result<Probe, ScrapeError> {
        self.transition(RunState::NavigatingPage);
        let url = self
            .urls
            .build(&self.plan.hotel_name, city, stay)
            .map_err(|e| ScrapeError::Navigation {
                url: String::new(),
                reason: format!("{e:#}"),
            })?;
        let nav_err = |e| ScrapeError::from_navigator(e, &url);

        session.navigate(&url).await.map_err(nav_err)?;
        tokio::time::sleep(self.timing.settle).await;
        session
            .wait_for_selector(&self.catalog.results_container, self.timing.results_timeout)
            .await
            .map_err(nav_err)?;

        self.transition(RunState::DismissingObstructions);
        let dismissed = obstructions
            .dismiss_known_obstructions(session)
            .await
            .map_err(nav_err)?;
        if dismissed.dismissed > 0 || !dismissed.failures.is_empty() {
            tracing::debug!(
                dismissed = dismissed.dismissed,
                resisted = dismissed.failures.len(),
                "obstruction pass"
            );
        }
        self.scroll_for_lazy_content(session).await?;

        self.transition(RunState::ScanningResults);
        let cards = session
            .find_all(&self.catalog.result_card)
            .await
            .map_err(nav_err)?;
        let card_count = cards.len();
        let Some(matched) = find_match(
            cards,
            &self.plan.hotel_name,
            &self.catalog.title,
            &self.extractor,
        )
        .await
        .map_err(nav_err)?
        else {
            tracing::debug!(%city, check_in = %stay.check_in, cards = card_count, "no card matched");
            return Ok(Probe::NotFound);
        };

        self.transition(RunState::ExtractingRecord);
        let fields = self
            .extractor
            .extract_card(&matched.card, &self.catalog)
            .await
            .map_err(nav_err)?;
        tracing::debug!(
            title = %matched.title,
            position = matched.position,
            price_text = ?fields.price_text,
            "matched result card"
        );

        let Some(price_text) = fields.price_text else {
            return Ok(Probe::Unparseable(ScrapeError::ElementNotFound {
                field: self.catalog.price.name.clone(),
            }));
        };
        let price = match normalize_price(&price_text) {
            Ok(price) => price,
            Err(err) => return Ok(Probe::Unparseable(err.into())),
        };

        match PriceRecord::try_new(
            &self.plan.hotel_name,
            city,
            stay,
            price,
            fields.rating,
            fields.address,
            self.scraped_date,
        ) {
            Ok(record) => Ok(Probe::Record(record)),
            Err(err) => Ok(Probe::Unparseable(ScrapeError::Navigation {
                url,
                reason: err.to_string(),
            })),
        }
    }

    async fn scroll_for_lazy_content<N: PageNavigator>(
        &self,
        session: &mut N,
    ) -> Result<(), ScrapeError> {
        for _ in 0..self.timing.scroll_steps {
            if let Err(err) = session.scroll_by_viewport().await {
                if err.is_fatal() {
                    return Err(ScrapeError::NavigationSessionFatal(err.to_string()));
                }
                tracing::debug!(error = %err, "scroll failed");
                break;
            }
            tokio::time::sleep(self.timing.scroll_pause).await;
        }

        match session.scroll_to_top().await {
            Err(err) if err.is_fatal() => Err(ScrapeError::NavigationSessionFatal(err.to_string())),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run state transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "run state");
        self.state = next;
        self.transitions.push(next);
    }

    fn finish(&mut self, report: &mut RunReport) {
        report.state = self.state;
        report.transitions = std::mem::take(&mut self.transitions);
        report.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::navigator::NavigatorError;
    use crate::scrape::synthetic::{StaticElement, StaticSession, SyntheticSession};
    use crate::storage::memory::MemoryPriceStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const CARD: &str = "[data-testid='property-card']";
    const TITLE: &str = "[data-testid='title']";
    const PRICE: &str = "[data-testid='price-and-discounted-price']";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn plan(cities: &[&str], start: NaiveDate, end: NaiveDate) -> ScrapePlan {
        let cities: Vec<String> = cities.iter().map(|c| c.to_string()).collect();
        ScrapePlan::try_new("Ritz-Carlton", &cities, DateRange::new(start, end, 1)).unwrap()
    }

    fn orchestrator<'a>(plan: ScrapePlan, store: &'a MemoryPriceStore) -> ScrapeOrchestrator<'a> {
        ScrapeOrchestrator::new(plan, store, d(2025, 12, 1)).with_timing(ScrapeTiming::immediate())
    }

    fn results_page(title: &str, price: &str) -> StaticElement {
        StaticElement::document().child(
            CARD,
            StaticElement::document()
                .child(TITLE, StaticElement::new(title))
                .child(PRICE, StaticElement::new(price)),
        )
    }

    #[tokio::test]
    async fn synthetic_run_records_every_priced_date() {
        let store = MemoryPriceStore::new();
        let catalog = SelectorCatalog::default();
        let session = SyntheticSession::booking_like("Ritz-Carlton", &catalog);
        let released = session.release_counter();

        // 2026-01-11 is day 11 of the year: the synthetic page shows "Sold out".
        let report = orchestrator(plan(&["Miami"], d(2026, 1, 1), d(2026, 1, 12)), &store)
            .run(session)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.records_emitted(), 11);
        assert_eq!(store.len().await, 11);
        assert_eq!(
            report.cities[0],
            CitySummary {
                city: "Miami".to_string(),
                attempted: 12,
                recorded: 11,
                not_found: 0,
                unparseable: 1,
                failed: 0,
                save_failed: 0,
            }
        );
        let sold_out = &report.diagnostics[10];
        assert_eq!(sold_out.stay.check_in, d(2026, 1, 11));
        assert!(matches!(sold_out.outcome, DateOutcome::Unparseable { .. }));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn never_matched_hotel_ends_done_with_no_records() {
        let store = MemoryPriceStore::new();
        let session = StaticSession::new(Box::new(|_| {
            Ok(results_page("Four Seasons Atlanta", "$500"))
        }));
        let released = session.release_counter();

        let report = orchestrator(plan(&["Atlanta", "Miami"], d(2026, 3, 1), d(2026, 3, 5)), &store)
            .run(session)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.records_emitted(), 0);
        assert!(store.is_empty().await);
        assert_eq!(report.attempted(), 10);
        assert!(report
            .diagnostics
            .iter()
            .all(|d| d.outcome == DateOutcome::NotFound));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_date_walks_the_full_state_sequence() {
        let store = MemoryPriceStore::new();
        let session = StaticSession::new(Box::new(|_| {
            Ok(results_page("The Ritz-Carlton, Dallas", "US$1,234.50"))
        }));

        let report = orchestrator(plan(&["Dallas"], d(2026, 2, 1), d(2026, 2, 1)), &store)
            .run(session)
            .await
            .unwrap();

        use RunState::*;
        assert_eq!(
            report.transitions,
            vec![
                NavigatingPage,
                DismissingObstructions,
                ScanningResults,
                ExtractingRecord,
                Recording,
                Advancing,
                Done
            ]
        );
        assert_eq!(report.records[0].price(), Decimal::new(123450, 2));
        assert_eq!(report.records[0].check_out(), d(2026, 2, 2));
        assert_eq!(report.records[0].scraped_date(), d(2025, 12, 1));
    }

    #[tokio::test]
    async fn missing_results_container_is_a_per_date_failure() {
        let store = MemoryPriceStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let session = StaticSession::new(Box::new(move |_| {
            // Every other page never renders results.
            if seen.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Ok(StaticElement::document())
            } else {
                Ok(results_page("Ritz-Carlton Miami Beach", "$640"))
            }
        }));

        let report = orchestrator(plan(&["Miami"], d(2026, 4, 1), d(2026, 4, 4)), &store)
            .run(session)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.cities[0].failed, 2);
        assert_eq!(report.cities[0].recorded, 2);
        assert!(report.diagnostics[0].to_string().contains("failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn missing_price_text_is_unparseable() {
        let store = MemoryPriceStore::new();
        let session = StaticSession::new(Box::new(|_| {
            Ok(StaticElement::document().child(
                CARD,
                StaticElement::document().child(TITLE, StaticElement::new("The Ritz-Carlton")),
            ))
        }));

        let report = orchestrator(plan(&["Dubai"], d(2026, 1, 2), d(2026, 1, 2)), &store)
            .run(session)
            .await
            .unwrap();

        assert_eq!(report.cities[0].unparseable, 1);
        assert!(report.diagnostics[0]
            .to_string()
            .contains("found but price extraction failed"));
    }

    #[tokio::test]
    async fn resisting_obstruction_does_not_stop_extraction() {
        let store = MemoryPriceStore::new();
        let session = StaticSession::new(Box::new(|_| {
            Ok(results_page("The Ritz-Carlton", "$410")
                .child("#onetrust-accept-btn-handler", StaticElement::new("OK").resisting_clicks()))
        }));

        let report = orchestrator(plan(&["Paris"], d(2026, 5, 1), d(2026, 5, 1)), &store)
            .run(session)
            .await
            .unwrap();

        assert_eq!(report.records_emitted(), 1);
    }

    struct RejectingStore;

    #[async_trait::async_trait]
    impl PriceStore for RejectingStore {
        async fn save(&self, _record: &PriceRecord) -> anyhow::Result<()> {
            anyhow::bail!("database unavailable")
        }

        async fn query_lowest(&self, _: &str, _: &str, _: usize) -> anyhow::Result<Vec<PriceRecord>> {
            Ok(Vec::new())
        }

        async fn query_lowest_between(
            &self,
            _: &str,
            _: &str,
            _: NaiveDate,
            _: NaiveDate,
            _: usize,
        ) -> anyhow::Result<Vec<PriceRecord>> {
            Ok(Vec::new())
        }

        async fn query_all(&self, _: &str, _: &str) -> anyhow::Result<Vec<PriceRecord>> {
            Ok(Vec::new())
        }

        async fn combinations(&self) -> anyhow::Result<Vec<crate::domain::analysis::HotelCity>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn save_failure_is_counted_and_run_continues() {
        let store = RejectingStore;
        let session = StaticSession::new(Box::new(|_| Ok(results_page("The Ritz-Carlton", "$512"))));

        let report = ScrapeOrchestrator::new(
            plan(&["Miami"], d(2026, 6, 1), d(2026, 6, 3)),
            &store,
            d(2026, 5, 1),
        )
        .with_timing(ScrapeTiming::immediate())
        .run(session)
        .await
        .unwrap();

        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.records_emitted(), 0);
        assert_eq!(report.cities[0].failed, 3);
        assert_eq!(report.cities[0].save_failed, 3);
        assert!(report.diagnostics[0].to_string().contains("database unavailable"));
    }

    #[tokio::test]
    async fn session_loss_aborts_run_and_releases_once() {
        let store = MemoryPriceStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let session = StaticSession::new(Box::new(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(NavigatorError::SessionFatal("browser crashed".to_string()));
            }
            Ok(results_page("The Ritz-Carlton", "$700"))
        }));
        let released = session.release_counter();

        let aborted = orchestrator(plan(&["Miami", "Dallas"], d(2026, 1, 1), d(2026, 1, 5)), &store)
            .run(session)
            .await
            .unwrap_err();

        assert!(aborted.source.is_fatal());
        assert_eq!(aborted.report.state, RunState::Failed);
        assert_eq!(aborted.report.records_emitted(), 1);
        assert_eq!(aborted.report.cities.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panic_mid_loop_still_releases_session_once() {
        let store = MemoryPriceStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let session = StaticSession::new(Box::new(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 2 {
                panic!("renderer blew up");
            }
            Ok(results_page("The Ritz-Carlton", "$700"))
        }));
        let released = session.release_counter();

        let outcome = AssertUnwindSafe(
            orchestrator(plan(&["Miami"], d(2026, 1, 1), d(2026, 1, 5)), &store).run(session),
        )
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn empty_date_range_goes_straight_to_done() {
        let store = MemoryPriceStore::new();
        let session = StaticSession::new(Box::new(|_| Ok(StaticElement::document())));
        let released = session.release_counter();

        let report = orchestrator(plan(&["Miami"], d(2026, 2, 1), d(2026, 1, 1)), &store)
            .run(session)
            .await
            .unwrap();

        assert_eq!(report.transitions, vec![RunState::Done]);
        assert_eq!(report.attempted(), 0);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_is_reachable_only_from_active_states() {
        assert!(RunState::NavigatingPage.can_transition_to(RunState::Failed));
        assert!(RunState::Recording.can_transition_to(RunState::Failed));
        assert!(!RunState::Done.can_transition_to(RunState::Failed));
        assert!(!RunState::Failed.can_transition_to(RunState::NavigatingPage));
        assert!(!RunState::Idle.can_transition_to(RunState::Recording));
    }

    #[test]
    fn plan_trims_and_dedups_cities() {
        let cities = vec![
            " Miami ".to_string(),
            "miami".to_string(),
            "".to_string(),
            "Dubai".to_string(),
        ];
        let plan =
            ScrapePlan::try_new("Ritz-Carlton", &cities, DateRange::new(d(2026, 1, 1), d(2026, 1, 3), 1))
                .unwrap();
        assert_eq!(plan.cities, vec!["Miami", "Dubai"]);
        assert_eq!(plan.probes(), 6);

        assert!(ScrapePlan::try_new(" ", &cities, plan.dates).is_err());
        assert!(ScrapePlan::try_new("Ritz", &[], plan.dates).is_err());
    }
}
