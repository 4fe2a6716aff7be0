use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub selectors: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: &str, selectors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCatalog {
    /// Waited on after navigation; its appearance means results have rendered.
    pub results_container: String,
    pub result_card: String,
    pub title: FieldDescriptor,
    pub price: FieldDescriptor,
    pub rating: FieldDescriptor,
    pub address: FieldDescriptor,
    pub obstructions: FieldDescriptor,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            results_container: "[data-testid='property-card']".to_string(),
            result_card: "[data-testid='property-card']".to_string(),
            title: FieldDescriptor::new(
                "title",
                &["[data-testid='title']", ".sr-hotel__name", "h3 a div"],
            ),
            price: FieldDescriptor::new(
                "price",
                &[
                    "[data-testid='price-and-discounted-price']",
                    ".prco-valign-middle-helper",
                    ".price_price",
                    "[class*='price']",
                ],
            ),
            rating: FieldDescriptor::new(
                "rating",
                &[
                    "[data-testid='review-score'] > div:first-child",
                    "[data-testid='review-score']",
                ],
            ),
            address: FieldDescriptor::new(
                "address",
                &["[data-testid='address']", "[data-testid='address-link']"],
            ),
            obstructions: FieldDescriptor::new(
                "obstruction",
                &[
                    "#onetrust-accept-btn-handler",
                    "button[aria-label='Dismiss sign-in info.']",
                    "[aria-label='Dismiss']",
                    "button.close",
                ],
            ),
        }
    }
}
