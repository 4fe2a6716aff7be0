use crate::domain::analysis::HotelCity;
use crate::domain::record::PriceRecord;
use anyhow::Context;
use chrono::NaiveDate;

pub mod lock;
pub mod memory;
pub mod prices;
pub mod runs;

pub use memory::MemoryPriceStore;
pub use prices::PgPriceStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Hotel and city match exactly. Lowest-price queries order by price, then
/// check-in date, so ties come back in date order.
#[async_trait::async_trait]
pub trait PriceStore: Send + Sync {
    /// Stores one record. A second record for the same hotel, city, check-in
    /// and scrape date replaces the first.
    async fn save(&self, record: &PriceRecord) -> anyhow::Result<()>;

    async fn query_lowest(
        &self,
        hotel_name: &str,
        city: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<PriceRecord>>;

    async fn query_lowest_between(
        &self,
        hotel_name: &str,
        city: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: usize,
    ) -> anyhow::Result<Vec<PriceRecord>>;

    async fn query_all(&self, hotel_name: &str, city: &str) -> anyhow::Result<Vec<PriceRecord>>;

    async fn combinations(&self) -> anyhow::Result<Vec<HotelCity>>;
}
