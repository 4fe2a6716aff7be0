use crate::domain::analysis::HotelCity;
use crate::domain::record::PriceRecord;
use crate::storage::PriceStore;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    records: Mutex<Vec<PriceRecord>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PriceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    async fn select(
        &self,
        hotel_name: &str,
        city: &str,
        window: Option<(NaiveDate, NaiveDate)>,
    ) -> Vec<PriceRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.hotel_name() == hotel_name && r.city() == city)
            .filter(|r| match window {
                Some((start, end)) => r.check_in() >= start && r.check_in() <= end,
                None => true,
            })
            .cloned()
            .collect()
    }
}

fn cheapest(mut records: Vec<PriceRecord>, limit: usize) -> Vec<PriceRecord> {
    records.sort_by(|a, b| {
        a.price()
            .cmp(&b.price())
            .then_with(|| a.check_in().cmp(&b.check_in()))
    });
    records.truncate(limit);
    records
}

#[async_trait::async_trait]
impl PriceStore for MemoryPriceStore {
    async fn save(&self, record: &PriceRecord) -> anyhow::Result<()> {
        let mut records = self.records.lock().await;
        let existing = records.iter_mut().find(|r| {
            r.hotel_name() == record.hotel_name()
                && r.city() == record.city()
                && r.check_in() == record.check_in()
                && r.scraped_date() == record.scraped_date()
        });
        match existing {
            Some(slot) => *slot = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn query_lowest(
        &self,
        hotel_name: &str,
        city: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<PriceRecord>> {
        Ok(cheapest(self.select(hotel_name, city, None).await, limit))
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
        Ok(cheapest(
            self.select(hotel_name, city, Some((start, end))).await,
            limit,
        ))
    }

    async fn query_all(&self, hotel_name: &str, city: &str) -> anyhow::Result<Vec<PriceRecord>> {
        let mut records = self.select(hotel_name, city, None).await;
        records.sort_by_key(|r| r.check_in());
        Ok(records)
    }

    async fn combinations(&self) -> anyhow::Result<Vec<HotelCity>> {
        let pairs: BTreeSet<HotelCity> = self
            .records
            .lock()
            .await
            .iter()
            .map(HotelCity::of)
            .collect();
        Ok(pairs.into_iter().collect())
    }
}
