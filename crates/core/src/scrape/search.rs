use crate::domain::record::Stay;
use anyhow::{Context, Result};

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.booking.com/searchresults.html";

const GROUP_ADULTS: &str = "2";
const NO_ROOMS: &str = "1";

#[derive(Debug, Clone)]
pub struct SearchUrlBuilder {
    base: reqwest::Url,
}

impl SearchUrlBuilder {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = reqwest::Url::parse(base_url)
            .with_context(|| format!("invalid search base url: {base_url}"))?;
        anyhow::ensure!(
            matches!(base.scheme(), "http" | "https"),
            "search base url must be http(s): {base_url}"
        );
        Ok(Self { base })
    }

    pub fn build(&self, hotel_name: &str, city: &str, stay: Stay) -> Result<String> {
        let hotel_name = hotel_name.trim();
        let city = city.trim();
        anyhow::ensure!(!hotel_name.is_empty(), "hotel name must be non-empty");
        anyhow::ensure!(!city.is_empty(), "city must be non-empty");

        let mut url = self.base.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("ss", &format!("{hotel_name} {city}"))
            .append_pair("checkin", &stay.check_in.format("%Y-%m-%d").to_string())
            .append_pair("checkout", &stay.check_out.format("%Y-%m-%d").to_string())
            .append_pair("group_adults", GROUP_ADULTS)
            .append_pair("no_rooms", NO_ROOMS);
        Ok(url.into())
    }
}

impl Default for SearchUrlBuilder {
    fn default() -> Self {
        Self {
            base: reqwest::Url::parse(DEFAULT_SEARCH_BASE_URL)
                .expect("default search url is valid"),
        }
    }
}
