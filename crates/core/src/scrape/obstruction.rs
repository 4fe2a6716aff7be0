use crate::scrape::navigator::{NavResult, PageElement, PageNavigator};
use crate::scrape::selectors::FieldDescriptor;
use crate::scrape::ScrapeError;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ObstructionReport {
    pub dismissed: usize,
    pub failures: Vec<ScrapeError>,
}

#[derive(Debug, Clone)]
pub struct ObstructionHandler {
    selectors: FieldDescriptor,
    pause: Duration,
}

impl ObstructionHandler {
    pub fn new(selectors: FieldDescriptor, pause: Duration) -> Self {
        Self { selectors, pause }
    }

    pub async fn dismiss_known_obstructions<N: PageNavigator>(
        &self,
        page: &mut N,
    ) -> NavResult<ObstructionReport> {
        let mut report = ObstructionReport::default();

        for selector in &self.selectors.selectors {
            let candidates = match page.find_all(selector).await {
                Ok(found) => found,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::debug!(%selector, error = %err, "obstruction lookup failed");
                    continue;
                }
            };

            for element in candidates {
                match element.is_visible().await {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        tracing::debug!(%selector, error = %err, "visibility check failed");
                        continue;
                    }
                }

                match element.click().await {
                    Ok(()) => {
                        report.dismissed += 1;
                        tracing::debug!(%selector, "dismissed obstruction");
                        tokio::time::sleep(self.pause).await;
                    }
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        tracing::warn!(%selector, error = %err, "obstruction resisted dismissal; continuing");
                        report.failures.push(ScrapeError::ObstructionDismissFailure {
                            selector: selector.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::navigator::NavigatorError;
    use crate::scrape::synthetic::{StaticElement, StaticSession};

    fn handler() -> ObstructionHandler {
        ObstructionHandler::new(
            FieldDescriptor::new("obstruction", &["#cookies", "button.close"]),
            Duration::ZERO,
        )
    }

    async fn session_with(page: StaticElement) -> StaticSession {
        let mut session = StaticSession::new(Box::new(move |_| Ok(page.clone())));
        session.navigate("https://example.test/").await.unwrap();
        session
    }

    #[tokio::test]
    async fn clicks_visible_obstructions_in_order() {
        let cookies = StaticElement::new("Accept").dismissed_on_click();
        let modal = StaticElement::new("x").dismissed_on_click();
        let page = StaticElement::document()
            .child("#cookies", cookies.clone())
            .child("button.close", modal.clone());
        let mut session = session_with(page).await;

        let report = handler().dismiss_known_obstructions(&mut session).await.unwrap();

        assert_eq!(report.dismissed, 2);
        assert!(report.failures.is_empty());
        assert!(!cookies.visible_now());
        assert!(!modal.visible_now());
    }

    #[tokio::test]
    async fn skips_hidden_elements() {
        let hidden = StaticElement::new("x").hidden();
        let page = StaticElement::document().child("button.close", hidden.clone());
        let mut session = session_with(page).await;

        let report = handler().dismiss_known_obstructions(&mut session).await.unwrap();

        assert_eq!(report.dismissed, 0);
        assert_eq!(hidden.click_count(), 0);
    }

    #[tokio::test]
    async fn resisting_obstruction_is_recorded_not_fatal() {
        let stubborn = StaticElement::new("x").resisting_clicks();
        let cookies = StaticElement::new("Accept").dismissed_on_click();
        let page = StaticElement::document()
            .child("#cookies", stubborn)
            .child("button.close", cookies.clone());
        let mut session = session_with(page).await;

        let report = handler().dismiss_known_obstructions(&mut session).await.unwrap();

        assert_eq!(report.dismissed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            ScrapeError::ObstructionDismissFailure { .. }
        ));
        assert!(!cookies.visible_now());
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let cookies = StaticElement::new("Accept").dismissed_on_click();
        let page = StaticElement::document().child("#cookies", cookies.clone());
        let mut session = session_with(page).await;

        handler().dismiss_known_obstructions(&mut session).await.unwrap();
        let again = handler().dismiss_known_obstructions(&mut session).await.unwrap();

        assert_eq!(again.dismissed, 0);
        assert_eq!(cookies.click_count(), 1);
    }

    #[tokio::test]
    async fn fatal_lookup_aborts() {
        let mut session = StaticSession::new(Box::new(|_| {
            Err(NavigatorError::SessionFatal("gone".to_string()))
        }));
        session.release().await;

        let err = handler()
            .dismiss_known_obstructions(&mut session)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
