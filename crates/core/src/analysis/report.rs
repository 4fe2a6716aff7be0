use crate::analysis::{CityAnalysis, StoreAnalysis};
use std::fmt::Write;

pub fn render_text_report(hotel_name: &str, cities: &[CityAnalysis]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "=== Hotel Price Analysis Report ===");
    let _ = writeln!(out, "Hotel: {hotel_name}");
    let _ = writeln!(out);

    for analysis in cities {
        let _ = writeln!(out, "City: {}", analysis.ranked.key.city);
        if analysis.ranked.records.is_empty() {
            let _ = writeln!(out, "  No data available");
            let _ = writeln!(out);
            continue;
        }

        let _ = writeln!(
            out,
            "  {} records, {}",
            analysis.total_records, analysis.statistics
        );
        let _ = writeln!(out, "  Top {} Lowest Prices:", analysis.ranked.records.len());
        for (i, record) in analysis.ranked.records.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. Check-in: {}, Price: ${:.2}, Rating: {}",
                i + 1,
                record.check_in(),
                record.price(),
                record.rating().unwrap_or("N/A")
            );
        }
        let _ = writeln!(out);
    }

    out
}

pub fn render_store_overview(store: &StoreAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Stored Price Overview ===");
    let _ = writeln!(out, "Hotels: {}", store.hotels.join(", "));
    for city in &store.cities {
        let _ = writeln!(
            out,
            "  {}: {} records, lowest ${:.2}, average ${:.2}",
            city.city, city.records, city.min, city.average
        );
    }
    let _ = writeln!(out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{CityPriceSummary, HotelCity};
    use crate::domain::record::{PriceRecord, Stay};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn renders_ranked_cities_and_empty_ones() {
        let check_in = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let record = PriceRecord::try_new(
            "Ritz-Carlton",
            "Miami",
            Stay {
                check_in,
                check_out: check_in.succ_opt().unwrap(),
            },
            Decimal::new(4125, 1),
            Some("9.1".to_string()),
            None,
            check_in,
        )
        .unwrap();

        let cities = vec![
            CityAnalysis::from_records(HotelCity::new("Ritz-Carlton", "Miami"), &[record], 10),
            CityAnalysis::from_records(HotelCity::new("Ritz-Carlton", "Paris"), &[], 10),
        ];
        let report = render_text_report("Ritz-Carlton", &cities);

        assert!(report.starts_with("=== Hotel Price Analysis Report ===\nHotel: Ritz-Carlton\n"));
        assert!(report.contains("  Top 1 Lowest Prices:\n"));
        assert!(report.contains("  1. Check-in: 2026-01-14, Price: $412.50, Rating: 9.1\n"));
        assert!(report.contains("City: Paris\n  No data available\n"));
    }

    #[test]
    fn overview_lists_hotels_and_city_aggregates() {
        let store = StoreAnalysis {
            hotels: vec!["Ritz-Carlton".to_string(), "Four Seasons".to_string()],
            cities: vec![CityPriceSummary {
                city: "Dubai".to_string(),
                records: 4,
                min: Decimal::new(810, 0),
                average: Decimal::new(92550, 2),
            }],
            pairs: Vec::new(),
        };

        let text = render_store_overview(&store);
        assert!(text.contains("Hotels: Ritz-Carlton, Four Seasons\n"));
        assert!(text.contains("  Dubai: 4 records, lowest $810.00, average $925.50\n"));
    }
}
