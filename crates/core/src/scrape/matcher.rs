use crate::scrape::extract::SelectorFallbackExtractor;
use crate::scrape::navigator::{NavResult, PageElement};
use crate::scrape::selectors::FieldDescriptor;

#[derive(Debug)]
pub struct MatchedCard<E> {
    pub card: E,
    pub title: String,
    pub position: usize,
}

/// Case-insensitive substring match, so "The Ritz-Carlton, Atlanta" matches "Ritz-Carlton".
pub fn title_matches(title: &str, target: &str) -> bool {
    let target = target.trim().to_lowercase();
    if target.is_empty() {
        return false;
    }
    title.to_lowercase().contains(&target)
}

pub async fn find_match<E: PageElement>(
    cards: Vec<E>,
    target: &str,
    title_field: &FieldDescriptor,
    extractor: &SelectorFallbackExtractor,
) -> NavResult<Option<MatchedCard<E>>> {
    for (position, card) in cards.into_iter().enumerate() {
        let Some(title) = extractor.extract(&card, title_field).await? else {
            tracing::debug!(position, "result card has no readable title");
            continue;
        };

        if title_matches(&title, target) {
            return Ok(Some(MatchedCard {
                card,
                title,
                position,
            }));
        }
    }
    Ok(None)
}
