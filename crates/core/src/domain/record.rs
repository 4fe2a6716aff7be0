use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// One scraped nightly price. Built once, never mutated; a correction is a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRecord {
    hotel_name: String,
    city: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    price: Decimal,
    rating: Option<String>,
    address: Option<String>,
    scraped_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("hotel name must be non-empty")]
    EmptyHotelName,
    #[error("city must be non-empty")]
    EmptyCity,
    #[error("check-out {check_out} must be after check-in {check_in}")]
    StayOrder {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    #[error("price must be positive (got {0})")]
    NonPositivePrice(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl PriceRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        hotel_name: &str,
        city: &str,
        stay: Stay,
        price: Decimal,
        rating: Option<String>,
        address: Option<String>,
        scraped_date: NaiveDate,
    ) -> Result<Self, RecordError> {
        let hotel_name = hotel_name.trim();
        if hotel_name.is_empty() {
            return Err(RecordError::EmptyHotelName);
        }
        let city = city.trim();
        if city.is_empty() {
            return Err(RecordError::EmptyCity);
        }
        if stay.check_out <= stay.check_in {
            return Err(RecordError::StayOrder {
                check_in: stay.check_in,
                check_out: stay.check_out,
            });
        }
        if price <= Decimal::ZERO {
            return Err(RecordError::NonPositivePrice(price));
        }

        Ok(Self {
            hotel_name: hotel_name.to_string(),
            city: city.to_string(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            price,
            rating: non_blank(rating),
            address: non_blank(address),
            scraped_date,
        })
    }

    pub fn hotel_name(&self) -> &str {
        &self.hotel_name
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn stay(&self) -> Stay {
        Stay {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn rating(&self) -> Option<&str> {
        self.rating.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn scraped_date(&self) -> NaiveDate {
        self.scraped_date
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
