use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the guard keeps its own connection.
const LOCK_NAMESPACE: i64 = 0x5241_5445_5754; // "RATEWT"

/// FNV-1a over the case-folded hotel name; stable across processes and releases.
fn lock_key_for_hotel(hotel_name: &str) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in hotel_name.trim().to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub struct HotelLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

/// `None` when another session already holds the lock for this hotel.
pub async fn try_acquire_hotel_lock(
    pool: &sqlx::PgPool,
    hotel_name: &str,
) -> anyhow::Result<Option<HotelLock>> {
    let key = lock_key_for_hotel(hotel_name);
    let mut conn = pool
        .acquire()
        .await
        .context("failed to check out a connection for the advisory lock")?;

    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;

    Ok(acquired.0.then_some(HotelLock { conn, key }))
}

impl HotelLock {
    /// Unlocks on the session that took the lock. If that fails the connection
    /// is closed instead, which drops every lock the session held.
    pub async fn release(mut self) -> anyhow::Result<()> {
        let key = self.key;
        let unlocked: Result<(bool,), sqlx::Error> = sqlx::query_as("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await;

        match unlocked {
            Ok((true,)) => Ok(()),
            Ok((false,)) => {
                let _ = self.conn.close().await;
                anyhow::bail!("advisory lock (key={key}) was not held by its session")
            }
            Err(e) => {
                let _ = self.conn.close().await;
                Err(e).with_context(|| format!("failed to release advisory lock (key={key})"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_case_and_padding() {
        assert_eq!(
            lock_key_for_hotel("Ritz-Carlton"),
            lock_key_for_hotel("  ritz-carlton ")
        );
        assert_ne!(
            lock_key_for_hotel("Ritz-Carlton"),
            lock_key_for_hotel("Four Seasons")
        );
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn lock_is_exclusive_until_released() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(3)
            .connect(&url)
            .await
            .unwrap();
        let hotel = format!("lock-test-{}", uuid::Uuid::new_v4());

        let held = try_acquire_hotel_lock(&pool, &hotel).await.unwrap().unwrap();
        assert!(try_acquire_hotel_lock(&pool, &hotel).await.unwrap().is_none());

        // Busy the pool so the unlock cannot happen to land on an idle session.
        let _other = pool.acquire().await.unwrap();
        held.release().await.unwrap();

        let again = try_acquire_hotel_lock(&pool, &hotel).await.unwrap().unwrap();
        again.release().await.unwrap();
    }
}
