//! Defines routes for checkout initiation, provider callbacks and lookups.
//!
//! ## Structure
//! - **Checkout endpoints**
//!   - `POST /checkout/membership`: start a membership checkout
//!   - `POST /checkout/job-posting`: start a paid job posting checkout
//!
//! - **Provider callbacks** (success URLs, `?checkout_id=`)
//!   - `GET /checkout/membership/callback`: activate membership, redirect
//!   - `GET /checkout/job-posting/callback`: publish job, redirect
//!
//! - **Lookups**
//!   - `GET /subscriptions/{user_id}`
//!   - `GET /jobs`, `GET /jobs/{id}`

use crate::{
    handlers::{
        checkout_handlers::{
            job_posting_callback, membership_callback, start_job_posting_checkout,
            start_membership_checkout,
        },
        health_handlers::{healthz, readyz},
        listing_handlers::{get_job, get_subscription, list_jobs},
    },
    services::checkout_service::CheckoutService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for all checkout routes.
///
/// The router carries shared state (`CheckoutService`) to all handlers.
pub fn routes() -> Router<CheckoutService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Checkout initiation
        .route("/checkout/membership", post(start_membership_checkout))
        .route("/checkout/job-posting", post(start_job_posting_checkout))
        // Provider callbacks
        .route("/checkout/membership/callback", get(membership_callback))
        .route("/checkout/job-posting/callback", get(job_posting_callback))
        // Lookups
        .route("/subscriptions/{user_id}", get(get_subscription))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
}
