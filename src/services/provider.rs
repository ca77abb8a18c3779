//! Payment provider client.
//!
//! The service talks to the provider only through [`PaymentProvider`]; the
//! HTTP implementation is built once at startup and shared behind an `Arc`.

use crate::{
    errors::{CheckoutError, CheckoutResult},
    models::{
        checkout::{CheckoutRecord, CheckoutSession, CreateCheckout},
        metadata::MetadataMap,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Response, Url, header};
use serde::Serialize;
use tracing::debug;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout and return its id and payment URL.
    async fn create_checkout(&self, request: CreateCheckout) -> CheckoutResult<CheckoutSession>;

    /// Fetch a checkout's current status and metadata.
    async fn retrieve_checkout(&self, checkout_id: &str) -> CheckoutResult<CheckoutRecord>;
}

/// JSON/HTTP provider client authenticated with a bearer token.
#[derive(Clone)]
pub struct HttpPaymentProvider {
    client: Client,
    api_url: String,
    access_token: String,
}

#[derive(Serialize)]
struct CreateCheckoutBody<'a> {
    products: [&'a str; 1],
    success_url: &'a str,
    metadata: &'a MetadataMap,
    allow_discount_codes: bool,
}

impl HttpPaymentProvider {
    pub fn new(api_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Join `segments` onto the API base URL, each escaped as a single path
    /// segment so caller-supplied ids cannot leave the resource path.
    fn endpoint(&self, segments: &[&str]) -> CheckoutResult<Url> {
        let invalid = || CheckoutError::Provider {
            status: None,
            message: format!("invalid provider API URL: {}", self.api_url),
        };
        let mut url = Url::parse(&self.api_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_checkout(&self, request: CreateCheckout) -> CheckoutResult<CheckoutSession> {
        let body = CreateCheckoutBody {
            products: [request.product_id.as_str()],
            success_url: &request.success_url,
            metadata: &request.metadata,
            allow_discount_codes: request.allow_discount_codes,
        };
        debug!(
            product_id = %request.product_id,
            metadata_keys = request.metadata.len(),
            "creating checkout"
        );

        let response = self
            .client
            .post(self.endpoint(&["checkouts", ""])?)
            .bearer_auth(&self.access_token)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        parse_json(response).await
    }

    async fn retrieve_checkout(&self, checkout_id: &str) -> CheckoutResult<CheckoutRecord> {
        let response = self
            .client
            .get(self.endpoint(&["checkouts", checkout_id])?)
            .bearer_auth(&self.access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        parse_json(response).await
    }
}

/// Provider stand-in used when no access token is configured.
///
/// Every call fails with a configuration error, so the process still serves
/// lookups and health checks.
pub struct UnconfiguredProvider;

#[async_trait]
impl PaymentProvider for UnconfiguredProvider {
    async fn create_checkout(&self, _request: CreateCheckout) -> CheckoutResult<CheckoutSession> {
        Err(CheckoutError::Configuration {
            missing: vec!["JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN"],
        })
    }

    async fn retrieve_checkout(&self, _checkout_id: &str) -> CheckoutResult<CheckoutRecord> {
        Err(CheckoutError::Configuration {
            missing: vec!["JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN"],
        })
    }
}

fn transport_error(err: reqwest::Error) -> CheckoutError {
    CheckoutError::Provider {
        status: err.status().map(|s| s.as_u16()),
        message: format!("request failed: {err}"),
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> CheckoutResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CheckoutError::Provider {
            status: Some(status.as_u16()),
            message: provider_detail(&body).unwrap_or_else(|| status.to_string()),
        });
    }

    response.json().await.map_err(|err| CheckoutError::Provider {
        status: Some(status.as_u16()),
        message: format!("unreadable response: {err}"),
    })
}

/// Extract the provider's error detail from a response body.
///
/// `detail` may be a string or a structured validation report; anything else
/// falls back to the raw body.
fn provider_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
pub mod fake {
    //! In-process provider for tests.

    use super::*;
    use crate::models::checkout::CheckoutStatus;
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    #[derive(Default)]
    pub struct FakeProvider {
        pub checkouts: Mutex<HashMap<String, CheckoutRecord>>,
        pub created: Mutex<Vec<CreateCheckout>>,
        pub calls: AtomicUsize,
    }

    impl FakeProvider {
        pub fn with_checkout(
            self,
            id: &str,
            status: &str,
            metadata: &[(&str, &str)],
        ) -> Self {
            let metadata: MetadataMap = metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.insert(CheckoutRecord {
                id: id.into(),
                status: CheckoutStatus::parse(status),
                metadata,
                subscription_id: Some(format!("sub_{id}")),
                customer_id: Some(format!("cus_{id}")),
            });
            self
        }

        pub fn insert(&self, record: CheckoutRecord) {
            self.checkouts
                .lock()
                .unwrap()
                .insert(record.id.clone(), record);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn create_checkout(&self, request: CreateCheckout) -> CheckoutResult<CheckoutSession> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut created = self.created.lock().unwrap();
            let id = format!("chk_{}", created.len() + 1);
            self.checkouts.lock().unwrap().insert(
                id.clone(),
                CheckoutRecord {
                    id: id.clone(),
                    status: CheckoutStatus::Open,
                    metadata: request.metadata.clone(),
                    subscription_id: None,
                    customer_id: None,
                },
            );
            created.push(request);
            Ok(CheckoutSession {
                url: format!("https://pay.example/{id}"),
                id,
            })
        }

        async fn retrieve_checkout(&self, checkout_id: &str) -> CheckoutResult<CheckoutRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.checkouts
                .lock()
                .unwrap()
                .get(checkout_id)
                .cloned()
                .ok_or_else(|| CheckoutError::Provider {
                    status: Some(404),
                    message: "Checkout not found".into(),
                })
        }
    }
}
