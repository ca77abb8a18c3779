//! HTTP handlers for starting checkouts and receiving provider callbacks.
//! Business rules live in `CheckoutService`; these map its results onto
//! JSON bodies and redirects.

use crate::{
    errors::AppError,
    models::{checkout::CheckoutSession, job_posting::JobPosting},
    services::checkout_service::CheckoutService,
};
use axum::{
    Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;

/// Body for `POST /checkout/membership`.
#[derive(Debug, Deserialize)]
pub struct MembershipCheckoutReq {
    #[serde(default)]
    pub user_id: String,
}

/// Body for `POST /checkout/job-posting`.
#[derive(Debug, Deserialize)]
pub struct JobPostingCheckoutReq {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub job: JobPosting,
}

/// Query string the provider appends to success URLs.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub checkout_id: Option<String>,
}

/// POST `/checkout/membership`: returns `{checkout_id, url}` for a client-side redirect.
pub async fn start_membership_checkout(
    State(service): State<CheckoutService>,
    Json(req): Json<MembershipCheckoutReq>,
) -> Result<Json<CheckoutSession>, AppError> {
    let session = service.start_membership_checkout(&req.user_id).await?;
    Ok(Json(session))
}

/// POST `/checkout/job-posting`: validates the posting and returns `{checkout_id, url}`.
pub async fn start_job_posting_checkout(
    State(service): State<CheckoutService>,
    Json(req): Json<JobPostingCheckoutReq>,
) -> Result<Json<CheckoutSession>, AppError> {
    let session = service
        .start_job_posting_checkout(&req.user_id, &req.job)
        .await?;
    Ok(Json(session))
}

/// GET `/checkout/membership/callback?checkout_id=...`
///
/// Redirects only when the subscription was activated; every failure is a
/// JSON error.
pub async fn membership_callback(
    State(service): State<CheckoutService>,
    Query(q): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let checkout_id = q.checkout_id.unwrap_or_default();
    service.reconcile_membership(&checkout_id).await?;
    Ok(Redirect::to(&public_link(&service, "/membership/success")))
}

/// GET `/checkout/job-posting/callback?checkout_id=...`: redirects to the published job.
pub async fn job_posting_callback(
    State(service): State<CheckoutService>,
    Query(q): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let checkout_id = q.checkout_id.unwrap_or_default();
    let job = service.reconcile_job_posting(&checkout_id).await?;
    Ok(Redirect::to(&public_link(&service, &format!("/jobs/{}", job.id))))
}

// Absolute when a public base URL is configured, otherwise site-relative.
fn public_link(service: &CheckoutService, path: &str) -> String {
    match service.config.public_base_url.as_deref() {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
        None => path.to_string(),
    }
}
