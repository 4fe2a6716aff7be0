use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceParseError {
    #[error("no digits in price text {0:?}")]
    Empty(String),
    #[error("price text {raw:?} cleaned to {cleaned:?}, which is not a decimal")]
    Invalid { raw: String, cleaned: String },
    #[error("price {0} is not positive")]
    NonPositive(Decimal),
}

pub fn normalize_price(raw: &str) -> Result<Decimal, PriceParseError> {
    let Some(first_digit) = raw.find(|c: char| c.is_ascii_digit()) else {
        return Err(PriceParseError::Empty(raw.to_string()));
    };
    let (prefix, number) = raw.split_at(first_digit);

    // "$.99" keeps its point; "Rs.350" and "approx. 350" end a word with it.
    let leading_point = prefix
        .strip_suffix('.')
        .is_some_and(|rest| !rest.ends_with(char::is_alphabetic));

    let mut cleaned = String::from(if leading_point { "." } else { "" });
    cleaned.extend(
        number
            .replace(',', "")
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.'),
    );
    let cleaned = cleaned.trim_end_matches('.');

    let value = Decimal::from_str(cleaned).map_err(|_| PriceParseError::Invalid {
        raw: raw.to_string(),
        cleaned: cleaned.to_string(),
    })?;

    if value <= Decimal::ZERO {
        return Err(PriceParseError::NonPositive(value));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_and_thousands_separators() {
        assert_eq!(normalize_price("$1,234.50").unwrap(), Decimal::new(123450, 2));
        assert_eq!(normalize_price("US$ 12,345").unwrap(), Decimal::new(12345, 0));
        assert_eq!(
            normalize_price("Price 480 per night").unwrap(),
            Decimal::new(480, 0)
        );
    }

    #[test]
    fn rejects_text_without_digits() {
        assert!(matches!(normalize_price(""), Err(PriceParseError::Empty(_))));
        assert!(matches!(normalize_price("N/A"), Err(PriceParseError::Empty(_))));
        assert!(matches!(
            normalize_price("Sold out"),
            Err(PriceParseError::Empty(_))
        ));
    }

    #[test]
    fn rejects_non_positive_values() {
        assert!(matches!(
            normalize_price("$0.00"),
            Err(PriceParseError::NonPositive(_))
        ));
    }

    #[test]
    fn rejects_multiple_decimal_points() {
        // Two prices glued together (original + discounted) are ambiguous.
        assert!(matches!(
            normalize_price("$1.200.50"),
            Err(PriceParseError::Invalid { .. })
        ));
    }

    #[test]
    fn ignores_trailing_sentence_dots() {
        assert_eq!(normalize_price("approx. 350.").unwrap(), Decimal::new(350, 0));
        assert_eq!(normalize_price("Rs.350").unwrap(), Decimal::new(350, 0));
    }

    #[test]
    fn keeps_a_bare_leading_decimal_point() {
        assert_eq!(normalize_price("$.99").unwrap(), Decimal::new(99, 2));
        assert_eq!(normalize_price(".5").unwrap(), Decimal::new(5, 1));
        assert_eq!(normalize_price("US$ 0.99").unwrap(), Decimal::new(99, 2));
    }
}
