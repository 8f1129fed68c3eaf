//! `GET /health` endpoint for container health checks.
use crate::cache::Cache;
use crate::db::{self, Pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: bool,
    pub redis: bool,
}

impl HealthReport {
    /// Redis is optional, so only the database decides `ok` vs `degraded`.
    pub fn new(database: bool, redis: bool) -> Self {
        Self {
            status: if database { "ok" } else { "degraded" },
            database,
            redis,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if self.database {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Backends the endpoint reports on.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn database(&self) -> bool;
    async fn redis(&self) -> bool;
}

pub struct ServiceHealth {
    pool: Pool,
    cache: Arc<Cache>,
}

impl ServiceHealth {
    pub fn new(pool: Pool, cache: Arc<Cache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl HealthCheck for ServiceHealth {
    async fn database(&self) -> bool {
        db::health_check(&self.pool).await
    }

    async fn redis(&self) -> bool {
        self.cache.health().await.redis
    }
}

async fn health(State(backends): State<Arc<dyn HealthCheck>>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::new(backends.database().await, backends.redis().await);
    (report.status_code(), Json(report))
}

pub fn router(backends: Arc<dyn HealthCheck>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(backends)
}

pub async fn serve(addr: &str, backends: Arc<dyn HealthCheck>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health listener on {}", addr))?;
    info!(%addr, "health endpoint listening");
    axum::serve(listener, router(backends))
        .await
        .context("health server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt; // for `oneshot`

    struct FixedHealth {
        database: bool,
        redis: bool,
    }

    #[async_trait]
    impl HealthCheck for FixedHealth {
        async fn database(&self) -> bool {
            self.database
        }

        async fn redis(&self) -> bool {
            self.redis
        }
    }

    async fn get_path(backends: FixedHealth, path: &str) -> (StatusCode, Vec<u8>) {
        let app = router(Arc::new(backends));
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn healthy_database_is_ok_even_without_redis() {
        let (status, body) = get_path(FixedHealth { database: true, redis: false }, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["database"], true);
        assert_eq!(v["redis"], false);
    }

    #[tokio::test]
    async fn database_down_is_degraded() {
        let (status, body) = get_path(FixedHealth { database: false, redis: true }, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "degraded");
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (status, _) = get_path(FixedHealth { database: true, redis: true }, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
