use crate::domain::record::{PriceRecord, Stay};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const ISO_DATE: &str = "%Y-%m-%d";

/// Flat persisted shape of a [`PriceRecord`]. Dates travel as ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceRow {
    pub hotel_name: String,
    pub city: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub price: Decimal,
    pub rating: Option<String>,
    pub address: Option<String>,
    pub scraped_date: String,
}

impl From<&PriceRecord> for PriceRow {
    fn from(record: &PriceRecord) -> Self {
        Self {
            hotel_name: record.hotel_name().to_string(),
            city: record.city().to_string(),
            check_in_date: record.check_in().format(ISO_DATE).to_string(),
            check_out_date: record.check_out().format(ISO_DATE).to_string(),
            price: record.price(),
            rating: record.rating().map(str::to_string),
            address: record.address().map(str::to_string),
            scraped_date: record.scraped_date().format(ISO_DATE).to_string(),
        }
    }
}

impl PriceRow {
    pub fn validate_and_into_record(self) -> Result<PriceRecord> {
        let check_in = parse_iso(&self.check_in_date, "check_in_date")?;
        let check_out = parse_iso(&self.check_out_date, "check_out_date")?;
        let scraped_date = parse_iso(&self.scraped_date, "scraped_date")?;

        PriceRecord::try_new(
            &self.hotel_name,
            &self.city,
            Stay {
                check_in,
                check_out,
            },
            self.price,
            self.rating,
            self.address,
            scraped_date,
        )
        .with_context(|| {
            format!(
                "invalid stored price row (hotel={}, city={}, check_in={})",
                self.hotel_name, self.city, self.check_in_date
            )
        })
    }
}

fn parse_iso(value: &str, column: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE)
        .with_context(|| format!("{column} is not an ISO date: {value:?}"))
}
