use crate::domain::analysis::HotelCity;
use crate::domain::record::PriceRecord;
use crate::domain::row::PriceRow;
use crate::storage::PriceStore;
use anyhow::Context;
use chrono::NaiveDate;

const SELECT_ROW: &str = "SELECT hotel_name, city, check_in_date, check_out_date, price, rating, address, scraped_date \
     FROM hotel_prices";

#[derive(Debug, Clone)]
pub struct PgPriceStore {
    pool: sqlx::PgPool,
}

impl PgPriceStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn into_records(rows: Vec<PriceRow>) -> anyhow::Result<Vec<PriceRecord>> {
    rows.into_iter()
        .map(PriceRow::validate_and_into_record)
        .collect()
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait::async_trait]
impl PriceStore for PgPriceStore {
    async fn save(&self, record: &PriceRecord) -> anyhow::Result<()> {
        let row = PriceRow::from(record);

        sqlx::query(
            "INSERT INTO hotel_prices (hotel_name, city, check_in_date, check_out_date, price, rating, address, scraped_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (hotel_name, city, check_in_date, scraped_date) DO UPDATE \
               SET check_out_date = EXCLUDED.check_out_date, price = EXCLUDED.price, \
                   rating = EXCLUDED.rating, address = EXCLUDED.address",
        )
        .persistent(false)
        .bind(&row.hotel_name)
        .bind(&row.city)
        .bind(&row.check_in_date)
        .bind(&row.check_out_date)
        .bind(row.price)
        .bind(&row.rating)
        .bind(&row.address)
        .bind(&row.scraped_date)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "insert hotel_prices failed (hotel={}, city={}, check_in={})",
                row.hotel_name, row.city, row.check_in_date
            )
        })?;

        Ok(())
    }

    async fn query_lowest(
        &self,
        hotel_name: &str,
        city: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<PriceRecord>> {
        let rows: Vec<PriceRow> = sqlx::query_as(&format!(
            "{SELECT_ROW} WHERE hotel_name = $1 AND city = $2 \
             ORDER BY price ASC, check_in_date ASC, id ASC LIMIT $3"
        ))
        .persistent(false)
        .bind(hotel_name)
        .bind(city)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .context("select lowest hotel_prices failed")?;

        into_records(rows)
    }

    async fn query_lowest_between(
        &self,
        hotel_name: &str,
        city: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: usize,
    ) -> anyhow::Result<Vec<PriceRecord>> {
        anyhow::ensure!(start <= end, "start date {start} is after end date {end}");

        // ISO text sorts like the date it encodes.
        let rows: Vec<PriceRow> = sqlx::query_as(&format!(
            "{SELECT_ROW} WHERE hotel_name = $1 AND city = $2 \
               AND check_in_date >= $3 AND check_in_date <= $4 \
             ORDER BY price ASC, check_in_date ASC, id ASC LIMIT $5"
        ))
        .persistent(false)
        .bind(hotel_name)
        .bind(city)
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .context("select lowest hotel_prices in window failed")?;

        into_records(rows)
    }

    async fn query_all(&self, hotel_name: &str, city: &str) -> anyhow::Result<Vec<PriceRecord>> {
        let rows: Vec<PriceRow> = sqlx::query_as(&format!(
            "{SELECT_ROW} WHERE hotel_name = $1 AND city = $2 ORDER BY check_in_date ASC, id ASC"
        ))
        .persistent(false)
        .bind(hotel_name)
        .bind(city)
        .fetch_all(&self.pool)
        .await
        .context("select hotel_prices failed")?;

        into_records(rows)
    }

    async fn combinations(&self) -> anyhow::Result<Vec<HotelCity>> {
        let pairs: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT hotel_name, city FROM hotel_prices ORDER BY hotel_name, city",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select hotel/city combinations failed")?;

        Ok(pairs
            .into_iter()
            .map(|(hotel_name, city)| HotelCity::new(hotel_name, city))
            .collect())
    }
}
