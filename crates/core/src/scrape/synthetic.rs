use crate::domain::record::Stay;
use crate::scrape::navigator::{NavResult, NavigatorError, PageElement, PageNavigator};
use crate::scrape::selectors::SelectorCatalog;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickEffect {
    /// Element disappears once clicked (banners, close buttons).
    Dismiss,
    /// Click fails; element stays.
    Resist,
    Nothing,
}

#[derive(Debug, Clone)]
pub struct StaticElement {
    text: String,
    children: Vec<(String, StaticElement)>,
    visible: Arc<AtomicBool>,
    clicks: Arc<AtomicUsize>,
    on_click: ClickEffect,
}

impl StaticElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
            visible: Arc::new(AtomicBool::new(true)),
            clicks: Arc::new(AtomicUsize::new(0)),
            on_click: ClickEffect::Nothing,
        }
    }

    pub fn document() -> Self {
        Self::new("")
    }

    pub fn child(mut self, selector: impl Into<String>, element: StaticElement) -> Self {
        self.children.push((selector.into(), element));
        self
    }

    pub fn hidden(self) -> Self {
        self.visible.store(false, Ordering::SeqCst);
        self
    }

    pub fn dismissed_on_click(mut self) -> Self {
        self.on_click = ClickEffect::Dismiss;
        self
    }

    pub fn resisting_clicks(mut self) -> Self {
        self.on_click = ClickEffect::Resist;
        self
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn visible_now(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PageElement for StaticElement {
    async fn text(&self) -> NavResult<String> {
        Ok(self.text.clone())
    }

    async fn is_visible(&self) -> NavResult<bool> {
        Ok(self.visible_now())
    }

    async fn click(&self) -> NavResult<()> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        match self.on_click {
            ClickEffect::Dismiss => {
                self.visible.store(false, Ordering::SeqCst);
                Ok(())
            }
            ClickEffect::Resist => Err(NavigatorError::Interaction(
                "element is not clickable".to_string(),
            )),
            ClickEffect::Nothing => Ok(()),
        }
    }

    async fn find_element(&self, selector: &str) -> NavResult<Option<Self>> {
        Ok(self
            .children
            .iter()
            .find(|(key, _)| key == selector)
            .map(|(_, el)| el.clone()))
    }

    async fn find_all(&self, selector: &str) -> NavResult<Vec<Self>> {
        Ok(self
            .children
            .iter()
            .filter(|(key, _)| key == selector)
            .map(|(_, el)| el.clone())
            .collect())
    }
}

pub type PageRenderer = Box<dyn FnMut(&str) -> NavResult<StaticElement> + Send>;

pub struct StaticSession {
    render: PageRenderer,
    current: Option<StaticElement>,
    released: bool,
    release_count: Arc<AtomicUsize>,
    pages_served: usize,
}

impl StaticSession {
    pub fn new(render: PageRenderer) -> Self {
        Self {
            render,
            current: None,
            released: false,
            release_count: Arc::new(AtomicUsize::new(0)),
            pages_served: 0,
        }
    }

    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.release_count)
    }

    fn page(&self) -> NavResult<&StaticElement> {
        if self.released {
            return Err(NavigatorError::SessionFatal(
                "session already released".to_string(),
            ));
        }
        self.current
            .as_ref()
            .ok_or_else(|| NavigatorError::Interaction("no page loaded".to_string()))
    }
}

#[async_trait::async_trait]
impl PageNavigator for StaticSession {
    type Element = StaticElement;

    async fn navigate(&mut self, url: &str) -> NavResult<()> {
        if self.released {
            return Err(NavigatorError::SessionFatal(
                "session already released".to_string(),
            ));
        }
        self.pages_served += 1;
        self.current = None;
        self.current = Some((self.render)(url)?);
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> NavResult<StaticElement> {
        self.page()?
            .find_element(selector)
            .await?
            .ok_or_else(|| NavigatorError::Timeout {
                selector: selector.to_string(),
                timeout,
            })
    }

    async fn find_all(&mut self, selector: &str) -> NavResult<Vec<StaticElement>> {
        self.page()?.find_all(selector).await
    }

    async fn scroll_by_viewport(&mut self) -> NavResult<()> {
        self.page().map(|_| ())
    }

    async fn scroll_to_top(&mut self) -> NavResult<()> {
        self.page().map(|_| ())
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.current = None;
        self.release_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(pages = self.pages_served, "static session released");
    }
}

pub struct SyntheticSession;

impl SyntheticSession {
    // Every 11th day of the year the target card shows "Sold out" instead of a price.
    pub fn booking_like(hotel_name: &str, catalog: &SelectorCatalog) -> StaticSession {
        let hotel_name = hotel_name.trim().to_string();
        let catalog = catalog.clone();
        StaticSession::new(Box::new(move |url| {
            render_results_page(url, &hotel_name, &catalog)
        }))
    }
}

fn render_results_page(
    url: &str,
    hotel_name: &str,
    catalog: &SelectorCatalog,
) -> NavResult<StaticElement> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| NavigatorError::Interaction(format!("bad url {url}: {e}")))?;

    let mut search = None;
    let mut check_in = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "ss" => search = Some(value.into_owned()),
            "checkin" => check_in = NaiveDate::parse_from_str(&value, "%Y-%m-%d").ok(),
            _ => {}
        }
    }

    let (Some(search), Some(check_in)) = (search, check_in) else {
        // Site landing page without results.
        return Ok(StaticElement::document());
    };

    let city = search
        .strip_prefix(hotel_name)
        .unwrap_or(&search)
        .trim()
        .to_string();
    let stay = Stay {
        check_in,
        check_out: check_in.succ_opt().unwrap_or(check_in),
    };

    let decoy_price = synthetic_price("Four Seasons", &city, stay) + Decimal::new(75, 0);
    let target_price = if check_in.ordinal() % 11 == 0 {
        "Sold out".to_string()
    } else {
        format_usd(synthetic_price(hotel_name, &city, stay))
    };

    let mut page = StaticElement::document();
    if catalog.results_container != catalog.result_card {
        page = page.child(catalog.results_container.clone(), StaticElement::document());
    }
    if let Some(banner) = catalog.obstructions.selectors.first() {
        page = page.child(banner.clone(), StaticElement::new("Accept").dismissed_on_click());
    }

    page = page
        .child(
            catalog.result_card.clone(),
            card(
                catalog,
                &format!("Four Seasons Hotel {city}"),
                &format_usd(decoy_price),
                "9.4",
                &format!("Uptown, {city}"),
            ),
        )
        .child(
            catalog.result_card.clone(),
            card(
                catalog,
                &format!("The {hotel_name}, {city}"),
                &target_price,
                "9.1",
                &format!("Downtown, {city}"),
            ),
        )
        .child(
            catalog.result_card.clone(),
            card(
                catalog,
                &format!("Hilton Garden Inn {city}"),
                &format_usd(decoy_price / Decimal::new(3, 0)),
                "8.0",
                &format!("Airport, {city}"),
            ),
        );

    Ok(page)
}

fn card(
    catalog: &SelectorCatalog,
    title: &str,
    price: &str,
    rating: &str,
    address: &str,
) -> StaticElement {
    let mut card = StaticElement::document();
    for (field, text) in [
        (&catalog.title, title),
        (&catalog.price, price),
        (&catalog.rating, rating),
        (&catalog.address, address),
    ] {
        if let Some(selector) = field.selectors.first() {
            card = card.child(selector.clone(), StaticElement::new(text));
        }
    }
    card
}

fn hotel_multiplier(hotel_name: &str) -> Decimal {
    match hotel_name {
        "Four Seasons" => Decimal::new(120, 2),
        "Ritz-Carlton" => Decimal::new(115, 2),
        "Park Hyatt" => Decimal::new(110, 2),
        "St. Regis" => Decimal::new(125, 2),
        "Waldorf Astoria" => Decimal::new(118, 2),
        _ => Decimal::ONE,
    }
}

fn city_base_rate(city: &str) -> Decimal {
    let base = match city {
        "Las Vegas" => 350,
        "New York City" => 450,
        "Miami" => 380,
        "Paris" => 420,
        "Los Angeles" => 400,
        "Dallas" => 330,
        "Dubai" => 520,
        _ => 350,
    };
    Decimal::new(base, 0)
}

pub fn synthetic_price(hotel_name: &str, city: &str, stay: Stay) -> Decimal {
    let seed = stay.check_in.num_days_from_ce() as i64 * 37 + city.len() as i64 * 11;
    let variance_cents = seed.rem_euclid(20_000) - 10_000;
    let price = city_base_rate(city) * hotel_multiplier(hotel_name) + Decimal::new(variance_cents, 2);
    price.round_dp(2)
}

fn format_usd(amount: Decimal) -> String {
    let amount = amount.round_dp(2);
    let whole = amount.trunc().to_string();
    let cents = ((amount - amount.trunc()) * Decimal::new(100, 0))
        .round()
        .to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("US${grouped}.{cents:0>2}")
}
