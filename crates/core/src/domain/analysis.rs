use crate::domain::record::PriceRecord;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HotelCity {
    pub hotel_name: String,
    pub city: String,
}

impl HotelCity {
    pub fn new(hotel_name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            hotel_name: hotel_name.into(),
            city: city.into(),
        }
    }

    pub fn of(record: &PriceRecord) -> Self {
        Self::new(record.hotel_name(), record.city())
    }
}

impl fmt::Display for HotelCity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.hotel_name, self.city)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub key: HotelCity,
    pub records: Vec<PriceRecord>,
}

/// Min / max / average price. All zero for an empty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PriceStatistics {
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
}

impl fmt::Display for PriceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={:.2}, max={:.2}, avg={:.2}",
            self.min, self.max, self.average
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityPriceSummary {
    pub city: String,
    pub records: usize,
    pub min: Decimal,
    pub average: Decimal,
}
