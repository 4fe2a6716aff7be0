pub mod analysis;
pub mod domain;
pub mod scrape;
pub mod storage;

pub mod config {
    use crate::scrape::dates::DateRange;
    use crate::scrape::orchestrator::{ScrapePlan, ScrapeTiming};
    use crate::scrape::search::DEFAULT_SEARCH_BASE_URL;
    use anyhow::Context;
    use chrono::{Duration as DateDuration, NaiveDate};
    use std::fmt;
    use std::str::FromStr;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub chrome_executable: Option<String>,
        pub chrome_remote_url: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                chrome_executable: std::env::var("CHROME_EXECUTABLE").ok(),
                chrome_remote_url: std::env::var("CHROME_REMOTE_URL").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum ExtractionStrategy {
        #[default]
        Real,
        Synthetic,
    }

    impl ExtractionStrategy {
        pub fn as_str(self) -> &'static str {
            match self {
                ExtractionStrategy::Real => "real",
                ExtractionStrategy::Synthetic => "synthetic",
            }
        }
    }

    impl fmt::Display for ExtractionStrategy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for ExtractionStrategy {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "real" | "browser" => Ok(ExtractionStrategy::Real),
                "synthetic" | "mock" => Ok(ExtractionStrategy::Synthetic),
                other => Err(format!(
                    "unknown extraction strategy {other:?} (expected real or synthetic)"
                )),
            }
        }
    }

    pub const DEFAULT_HOTEL: &str = "Ritz-Carlton";
    pub const DEFAULT_CITIES: &[&str] = &["Dallas", "New York City", "Miami", "Dubai", "Los Angeles"];
    pub const DEFAULT_STRIDE_DAYS: u32 = 3;
    pub const DEFAULT_WINDOW_DAYS: i64 = 167;

    #[derive(Debug, Clone)]
    pub struct ScrapeOptions {
        pub hotel_name: String,
        pub cities: Vec<String>,
        pub start_date: NaiveDate,
        pub end_date: NaiveDate,
        pub stride_days: u32,
        pub strategy: ExtractionStrategy,
        pub headless: bool,
        pub search_base_url: String,
        pub timing: ScrapeTiming,
        /// Bound on each selector lookup while reading a result card.
        pub selector_timeout: Option<Duration>,
    }

    impl ScrapeOptions {
        pub fn defaults(today: NaiveDate) -> Self {
            Self {
                hotel_name: DEFAULT_HOTEL.to_string(),
                cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
                start_date: today,
                end_date: today + DateDuration::days(DEFAULT_WINDOW_DAYS),
                stride_days: DEFAULT_STRIDE_DAYS,
                strategy: ExtractionStrategy::default(),
                headless: true,
                search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
                timing: ScrapeTiming::default(),
                selector_timeout: None,
            }
        }

        /// Defaults overridden by `SCRAPE_*` variables. Unparseable numbers and
        /// booleans are ignored; a malformed date or strategy is an error.
        pub fn from_env(today: NaiveDate) -> anyhow::Result<Self> {
            let mut out = Self::defaults(today);

            if let Some(hotel) = env_string("SCRAPE_HOTEL") {
                out.hotel_name = hotel;
            }
            if let Some(cities) = env_string("SCRAPE_CITIES") {
                out.cities = split_cities(&cities);
            }
            if let Some(s) = env_string("SCRAPE_START_DATE") {
                out.start_date = parse_date(&s).context("SCRAPE_START_DATE")?;
                out.end_date = out.start_date + DateDuration::days(DEFAULT_WINDOW_DAYS);
            }
            if let Some(s) = env_string("SCRAPE_END_DATE") {
                out.end_date = parse_date(&s).context("SCRAPE_END_DATE")?;
            }
            if let Some(n) = env_parse::<u32>("SCRAPE_STRIDE_DAYS") {
                out.stride_days = n;
            }
            if let Some(s) = env_string("SCRAPE_STRATEGY") {
                out.strategy = s
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("SCRAPE_STRATEGY")?;
            }
            if let Some(b) = env_parse::<bool>("SCRAPE_HEADLESS") {
                out.headless = b;
            }
            if let Some(url) = env_string("SCRAPE_SEARCH_BASE_URL") {
                out.search_base_url = url;
            }
            if let Some(ms) = env_parse::<u64>("SCRAPE_SELECTOR_TIMEOUT_MS").filter(|ms| *ms > 0) {
                out.selector_timeout = Some(Duration::from_millis(ms));
            }

            let timing = &mut out.timing;
            if let Some(ms) = env_parse::<u64>("SCRAPE_RESULTS_TIMEOUT_MS") {
                timing.results_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = env_parse::<u64>("SCRAPE_SETTLE_MS") {
                timing.settle = Duration::from_millis(ms);
            }
            if let Some(ms) = env_parse::<u64>("SCRAPE_DATE_DELAY_MS") {
                timing.between_dates = Duration::from_millis(ms);
            }
            if let Some(ms) = env_parse::<u64>("SCRAPE_CITY_DELAY_MS") {
                timing.between_cities = Duration::from_millis(ms);
            }
            if let Some(n) = env_parse::<u32>("SCRAPE_SCROLL_STEPS") {
                timing.scroll_steps = n;
            }
            if let Some(ms) = env_parse::<u64>("SCRAPE_SCROLL_PAUSE_MS") {
                timing.scroll_pause = Duration::from_millis(ms);
            }
            if let Some(ms) = env_parse::<u64>("SCRAPE_DISMISS_PAUSE_MS") {
                timing.dismiss_pause = Duration::from_millis(ms);
            }

            Ok(out)
        }

        pub fn date_range(&self) -> DateRange {
            DateRange::new(self.start_date, self.end_date, self.stride_days)
        }

        pub fn plan(&self) -> anyhow::Result<ScrapePlan> {
            anyhow::ensure!(
                self.start_date <= self.end_date,
                "start date {} is after end date {}",
                self.start_date,
                self.end_date
            );
            ScrapePlan::try_new(&self.hotel_name, &self.cities, self.date_range())
        }
    }

    /// Top-K for analysis output (`ANALYSIS_TOP_K`, default 10).
    pub fn analysis_top_k() -> usize {
        env_parse::<usize>("ANALYSIS_TOP_K")
            .filter(|k| *k > 0)
            .unwrap_or(crate::analysis::DEFAULT_TOP_K)
    }

    pub fn split_cities(s: &str) -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("expected YYYY-MM-DD, got {s:?}"))
    }

    fn env_string(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn env_parse<T: FromStr>(key: &str) -> Option<T> {
        env_string(key).and_then(|s| s.parse().ok())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn today() -> NaiveDate {
            NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()
        }

        #[test]
        fn defaults_cover_five_cities_every_third_day() {
            let opts = ScrapeOptions::defaults(today());
            assert_eq!(opts.hotel_name, "Ritz-Carlton");
            assert_eq!(opts.cities.len(), 5);
            assert_eq!(opts.stride_days, 3);
            assert_eq!(opts.end_date, NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
            assert_eq!(opts.strategy, ExtractionStrategy::Real);
            assert_eq!(opts.selector_timeout, None);

            let plan = opts.plan().unwrap();
            assert_eq!(plan.dates.len(), 56);
        }

        #[test]
        fn inverted_dates_are_rejected() {
            let mut opts = ScrapeOptions::defaults(today());
            opts.end_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
            assert!(opts.plan().is_err());
        }

        #[test]
        fn parses_strategy_names() {
            assert_eq!(
                "Synthetic".parse::<ExtractionStrategy>().unwrap(),
                ExtractionStrategy::Synthetic
            );
            assert_eq!(" real ".parse::<ExtractionStrategy>().unwrap(), ExtractionStrategy::Real);
            assert!("selenium".parse::<ExtractionStrategy>().is_err());
        }

        #[test]
        fn splits_city_lists() {
            assert_eq!(
                split_cities("Dallas, New York City,,Miami "),
                vec!["Dallas", "New York City", "Miami"]
            );
        }
    }
}
