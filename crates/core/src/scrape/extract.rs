use crate::scrape::navigator::{NavResult, PageElement};
use crate::scrape::selectors::{FieldDescriptor, SelectorCatalog};
use std::time::Duration;

/// Only a session-fatal error is `Err`; running out of selectors is `Ok(None)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorFallbackExtractor {
    per_selector_timeout: Option<Duration>,
}

impl SelectorFallbackExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            per_selector_timeout: Some(timeout),
        }
    }

    pub async fn extract<E: PageElement>(
        &self,
        root: &E,
        field: &FieldDescriptor,
    ) -> NavResult<Option<String>> {
        for selector in &field.selectors {
            let Some(element) = self.lookup(root, &field.name, selector).await? else {
                continue;
            };

            match element.text().await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        tracing::debug!(field = %field.name, %selector, "selector hit");
                        return Ok(Some(text.to_string()));
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::debug!(field = %field.name, %selector, error = %err, "text read failed");
                }
            }
        }

        tracing::debug!(field = %field.name, tried = field.selectors.len(), "selector chain exhausted");
        Ok(None)
    }

    async fn lookup<E: PageElement>(
        &self,
        root: &E,
        field: &str,
        selector: &str,
    ) -> NavResult<Option<E>> {
        let found = match self.per_selector_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, root.find_element(selector)).await
            {
                Ok(res) => res,
                Err(_) => {
                    tracing::debug!(%field, %selector, ?timeout, "selector lookup timed out");
                    return Ok(None);
                }
            },
            None => root.find_element(selector).await,
        };

        match found {
            Ok(element) => Ok(element),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::debug!(%field, %selector, error = %err, "selector lookup failed");
                Ok(None)
            }
        }
    }

    pub async fn extract_card<E: PageElement>(
        &self,
        card: &E,
        catalog: &SelectorCatalog,
    ) -> NavResult<CardFields> {
        Ok(CardFields {
            title: self.extract(card, &catalog.title).await?,
            price_text: self.extract(card, &catalog.price).await?,
            rating: self.extract(card, &catalog.rating).await?,
            address: self.extract(card, &catalog.address).await?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub rating: Option<String>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::navigator::NavigatorError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CardStub {
        text: String,
        children: HashMap<String, CardStub>,
        failing: HashMap<String, NavigatorError>,
        hanging: Vec<String>,
        lookups: Arc<Mutex<Vec<String>>>,
    }

    impl CardStub {
        fn with_child(mut self, selector: &str, text: &str) -> Self {
            self.children.insert(
                selector.to_string(),
                CardStub {
                    text: text.to_string(),
                    ..Default::default()
                },
            );
            self
        }

        fn with_failure(mut self, selector: &str, err: NavigatorError) -> Self {
            self.failing.insert(selector.to_string(), err);
            self
        }

        fn with_hang(mut self, selector: &str) -> Self {
            self.hanging.push(selector.to_string());
            self
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PageElement for CardStub {
        async fn text(&self) -> NavResult<String> {
            Ok(self.text.clone())
        }

        async fn is_visible(&self) -> NavResult<bool> {
            Ok(true)
        }

        async fn click(&self) -> NavResult<()> {
            Ok(())
        }

        async fn find_element(&self, selector: &str) -> NavResult<Option<Self>> {
            self.lookups.lock().unwrap().push(selector.to_string());
            if self.hanging.iter().any(|s| s == selector) {
                return futures::future::pending().await;
            }
            if let Some(err) = self.failing.get(selector) {
                return Err(err.clone());
            }
            Ok(self.children.get(selector).cloned())
        }

        async fn find_all(&self, selector: &str) -> NavResult<Vec<Self>> {
            Ok(self.children.get(selector).cloned().into_iter().collect())
        }
    }

    fn price_field() -> FieldDescriptor {
        FieldDescriptor::new("price", &["#a", "#b", "#c"])
    }

    #[tokio::test]
    async fn returns_first_hit_and_stops_probing() {
        let card = CardStub::default()
            .with_child("#b", " $420 ")
            .with_child("#c", "$999");

        let text = SelectorFallbackExtractor::new()
            .extract(&card, &price_field())
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("$420"));
        assert_eq!(card.lookups(), vec!["#a", "#b"]);
    }

    #[tokio::test]
    async fn skips_empty_text_nodes() {
        let card = CardStub::default()
            .with_child("#a", "   ")
            .with_child("#c", "$310");

        let text = SelectorFallbackExtractor::new()
            .extract(&card, &price_field())
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("$310"));
    }

    #[tokio::test]
    async fn exhausted_chain_is_none_not_error() {
        let card = CardStub::default().with_failure(
            "#a",
            NavigatorError::Interaction("stale element".to_string()),
        );

        let text = SelectorFallbackExtractor::new()
            .extract(&card, &price_field())
            .await
            .unwrap();

        assert_eq!(text, None);
        assert_eq!(card.lookups(), vec!["#a", "#b", "#c"]);
    }

    #[tokio::test]
    async fn fatal_session_errors_propagate() {
        let card = CardStub::default()
            .with_failure("#a", NavigatorError::SessionFatal("browser closed".to_string()))
            .with_child("#b", "$1");

        let err = SelectorFallbackExtractor::new()
            .extract(&card, &price_field())
            .await
            .unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn reads_all_card_fields() {
        let catalog = SelectorCatalog::default();
        let card = CardStub::default()
            .with_child("[data-testid='title']", "The Ritz-Carlton, Dallas")
            .with_child(".price_price", "US$612")
            .with_child("[data-testid='review-score']", "9.2");

        let fields = SelectorFallbackExtractor::with_timeout(Duration::from_secs(1))
            .extract_card(&card, &catalog)
            .await
            .unwrap();

        assert_eq!(fields.title.as_deref(), Some("The Ritz-Carlton, Dallas"));
        assert_eq!(fields.price_text.as_deref(), Some("US$612"));
        assert_eq!(fields.rating.as_deref(), Some("9.2"));
        assert_eq!(fields.address, None);
    }

    #[tokio::test]
    async fn lookup_that_never_resolves_moves_to_next_selector() {
        let card = CardStub::default()
            .with_hang("#a")
            .with_child("#b", "$275");

        let text = SelectorFallbackExtractor::with_timeout(Duration::from_millis(50))
            .extract(&card, &price_field())
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("$275"));
        assert_eq!(card.lookups(), vec!["#a", "#b"]);
    }
}
