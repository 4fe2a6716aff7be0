use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratewatch_core::analysis::{self, CityAnalysis, StoreAnalysis};
use ratewatch_core::config::{analysis_top_k, parse_date, split_cities};
use ratewatch_core::domain::record::PriceRecord;
use ratewatch_core::storage::{PgPriceStore, PriceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ratewatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let store: Option<Arc<dyn PriceStore>> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match ratewatch_core::storage::migrate(&pool).await {
                Ok(()) => Some(Arc::new(PgPriceStore::new(pool)) as Arc<dyn PriceStore>),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        store,
        default_k: analysis_top_k(),
    };

    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/hotels/lowest-prices", get(get_lowest_prices))
        .route("/hotels/prices", get(get_prices))
        .route("/hotels/analysis", get(get_analysis))
        .route("/hotels/analysis-report", get(get_analysis_report))
        .route("/hotels/overview", get(get_overview))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Option<Arc<dyn PriceStore>>,
    default_k: usize,
}

impl AppState {
    fn store(&self) -> Result<&dyn PriceStore, StatusCode> {
        self.store.as_deref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn required(value: &str) -> Result<&str, StatusCode> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(value)
}

fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, StatusCode> {
    value
        .map(|s| parse_date(s).map_err(|_| StatusCode::BAD_REQUEST))
        .transpose()
}

/// Both ends or neither; a window needs both.
fn check_in_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<(NaiveDate, NaiveDate)>, StatusCode> {
    match (optional_date(start)?, optional_date(end)?) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) if start <= end => Ok(Some((start, end))),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

#[derive(Debug, Deserialize)]
struct LowestPricesQuery {
    hotel_name: String,
    city: String,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<usize>,
}

async fn get_lowest_prices(
    State(state): State<AppState>,
    Query(q): Query<LowestPricesQuery>,
) -> Result<Json<Vec<PriceRecord>>, StatusCode> {
    let store = state.store()?;
    let hotel_name = required(&q.hotel_name)?;
    let city = required(&q.city)?;
    let limit = q.limit.unwrap_or(state.default_k);
    if limit == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let records = match check_in_window(q.start_date.as_deref(), q.end_date.as_deref())? {
        None => store.query_lowest(hotel_name, city, limit).await,
        Some((start, end)) => {
            store
                .query_lowest_between(hotel_name, city, start, end, limit)
                .await
        }
    }
    .map_err(internal)?;

    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct PricesQuery {
    hotel_name: String,
    city: String,
}

async fn get_prices(
    State(state): State<AppState>,
    Query(q): Query<PricesQuery>,
) -> Result<Json<Vec<PriceRecord>>, StatusCode> {
    let store = state.store()?;
    let records = store
        .query_all(required(&q.hotel_name)?, required(&q.city)?)
        .await
        .map_err(internal)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct AnalysisQuery {
    hotel_name: String,
    /// Comma-separated.
    cities: String,
    k: Option<usize>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiAnalysis {
    hotel_name: String,
    k: usize,
    cities: Vec<CityAnalysis>,
}

async fn analyze(state: &AppState, q: &AnalysisQuery) -> Result<ApiAnalysis, StatusCode> {
    let store = state.store()?;
    let hotel_name = required(&q.hotel_name)?;
    let cities = split_cities(&q.cities);
    if cities.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let k = q.k.unwrap_or(state.default_k);
    if k == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let window = check_in_window(q.start_date.as_deref(), q.end_date.as_deref())?;

    let cities = analysis::analyze_cities(store, hotel_name, &cities, k, window)
        .await
        .map_err(internal)?;

    Ok(ApiAnalysis {
        hotel_name: hotel_name.to_string(),
        k,
        cities,
    })
}

async fn get_analysis(
    State(state): State<AppState>,
    Query(q): Query<AnalysisQuery>,
) -> Result<Json<ApiAnalysis>, StatusCode> {
    Ok(Json(analyze(&state, &q).await?))
}

async fn get_analysis_report(
    State(state): State<AppState>,
    Query(q): Query<AnalysisQuery>,
) -> Result<String, StatusCode> {
    let out = analyze(&state, &q).await?;
    Ok(analysis::render_text_report(&out.hotel_name, &out.cities))
}

#[derive(Debug, Deserialize)]
struct OverviewQuery {
    k: Option<usize>,
}

async fn get_overview(
    State(state): State<AppState>,
    Query(q): Query<OverviewQuery>,
) -> Result<Json<StoreAnalysis>, StatusCode> {
    let store = state.store()?;
    let k = q.k.unwrap_or(state.default_k);
    if k == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let overview = analysis::analyze_store(store, k).await.map_err(internal)?;
    Ok(Json(overview))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &ratewatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
