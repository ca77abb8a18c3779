//! Read-only lookups for reconciled records.

use crate::{
    errors::AppError,
    models::{job_posting::Job, subscription::Subscription},
    services::checkout_service::CheckoutService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
}

/// GET `/subscriptions/{user_id}`
pub async fn get_subscription(
    State(service): State<CheckoutService>,
    Path(user_id): Path<String>,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(service.subscription_for_user(&user_id).await?))
}

/// GET `/jobs/{id}`
pub async fn get_job(
    State(service): State<CheckoutService>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(service.job(id).await?))
}

/// GET `/jobs?limit=`: newest first.
pub async fn list_jobs(
    State(service): State<CheckoutService>,
    Query(q): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(service.list_jobs(q.limit).await?))
}
