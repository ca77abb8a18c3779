//! src/services/checkout_service.rs
//!
//! CheckoutService: starts provider checkouts for memberships and job
//! postings, and reconciles paid checkouts into durable rows. Reconciliation
//! passes through four gates (fetch, paid status, flow, identity) before a
//! single atomic write keyed so that replays of the same callback cannot
//! create duplicates.

use crate::{
    config::ProviderConfig,
    errors::{CheckoutError, CheckoutResult, Rejection},
    models::{
        checkout::{CheckoutRecord, CheckoutSession, CreateCheckout, Flow},
        job_posting::{Job, JobPosting},
        metadata::MetadataMap,
        subscription::{MEMBERSHIP_PLAN, STATUS_ACTIVE, Subscription},
    },
    services::{
        metadata_encoder::{FLOW_KEY, USER_ID_KEY, decode_job_posting, encode_job_posting},
        provider::PaymentProvider,
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Placeholder the provider replaces with the checkout id in success URLs.
pub const CHECKOUT_ID_PLACEHOLDER: &str = "{CHECKOUT_ID}";

const DEFAULT_JOB_LIST_LIMIT: i64 = 50;
const MAX_JOB_LIST_LIMIT: i64 = 200;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, status, provider_customer_id, \
     provider_subscription_id, checkout_id, created_at, updated_at";

const JOB_COLUMNS: &str = "id, checkout_id, user_id, title, company_name, website, category, \
     apply_url, receive_emails, contact_email, highlight_color, description, tags, job_type, \
     remote_scope, location, salary_min, salary_max, created_at";

/// A checkout that passed every reconciliation gate.
struct PaidCheckout {
    record: CheckoutRecord,
    user_id: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    /// Shared SQLite connection pool holding subscriptions and jobs.
    pub db: Arc<SqlitePool>,

    /// Provider client, constructed once at startup.
    pub provider: Arc<dyn PaymentProvider>,

    pub config: Arc<ProviderConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<SqlitePool>,
        provider: Arc<dyn PaymentProvider>,
        config: Arc<ProviderConfig>,
    ) -> Self {
        Self {
            db,
            provider,
            config,
        }
    }

    /// Start a membership checkout for `user_id`.
    pub async fn start_membership_checkout(&self, user_id: &str) -> CheckoutResult<CheckoutSession> {
        if user_id.trim().is_empty() {
            return Err(CheckoutError::Validation {
                missing: vec!["user_id".into()],
            });
        }

        let mut metadata = MetadataMap::new();
        tag_flow(&mut metadata, Flow::Membership, user_id);
        self.create_checkout(Flow::Membership, metadata).await
    }

    /// Validate and encode a job posting, then start its checkout.
    ///
    /// Nothing is persisted here; the job row is created by
    /// [`CheckoutService::reconcile_job_posting`] once payment succeeds.
    pub async fn start_job_posting_checkout(
        &self,
        user_id: &str,
        posting: &JobPosting,
    ) -> CheckoutResult<CheckoutSession> {
        let mut missing = posting.missing_fields();
        if user_id.trim().is_empty() {
            missing.insert(0, "user_id".into());
        }
        if !missing.is_empty() {
            return Err(CheckoutError::Validation { missing });
        }
        if let (Some(min), Some(max)) = (posting.salary_min, posting.salary_max) {
            if min > max {
                return Err(CheckoutError::InvalidField {
                    field: "salary_min",
                    reason: format!("{min} is greater than salary_max {max}"),
                });
            }
        }

        let mut metadata = encode_job_posting(posting)?;
        tag_flow(&mut metadata, Flow::JobPosting, user_id);
        self.create_checkout(Flow::JobPosting, metadata).await
    }

    async fn create_checkout(
        &self,
        flow: Flow,
        metadata: MetadataMap,
    ) -> CheckoutResult<CheckoutSession> {
        let settings = self.config.require(flow).inspect_err(|err| {
            warn!(flow = %flow, error = %err, "checkout not started");
        })?;

        let request = CreateCheckout {
            product_id: settings.product_id.to_string(),
            success_url: success_url(settings.public_base_url, flow),
            metadata,
            allow_discount_codes: flow.allows_discount_codes(),
        };

        let session = self
            .provider
            .create_checkout(request)
            .await
            .inspect_err(|err| warn!(flow = %flow, error = %err, "provider refused checkout"))?;

        info!(flow = %flow, checkout_id = %session.id, "checkout created");
        Ok(session)
    }

    /// Reconcile a membership checkout into the user's subscription.
    ///
    /// Upserts by user id in one statement: the first success creates the
    /// row, later ones refresh it in place.
    pub async fn reconcile_membership(&self, checkout_id: &str) -> CheckoutResult<Subscription> {
        let flow = Flow::Membership;
        let paid = self.fetch_paid(checkout_id, flow).await?;
        let now = Utc::now();

        // Unchanged rows are left alone so a replayed callback keeps `updated_at`.
        let upserted = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                status = excluded.status,
                provider_customer_id = COALESCE(excluded.provider_customer_id, subscriptions.provider_customer_id),
                provider_subscription_id = COALESCE(excluded.provider_subscription_id, subscriptions.provider_subscription_id),
                checkout_id = excluded.checkout_id,
                updated_at = excluded.updated_at
            WHERE subscriptions.checkout_id IS NOT excluded.checkout_id
               OR subscriptions.status IS NOT excluded.status
               OR subscriptions.plan IS NOT excluded.plan
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&paid.user_id)
        .bind(MEMBERSHIP_PLAN)
        .bind(STATUS_ACTIVE)
        .bind(paid.record.customer_id.as_deref())
        .bind(paid.record.subscription_id.as_deref())
        .bind(&paid.record.id)
        .bind(now)
        .bind(now)
        .fetch_optional(&*self.db)
        .await
        .inspect_err(|err| db_failed(flow, &paid.record.id, err))?;

        let subscription = match upserted {
            Some(subscription) => subscription,
            None => sqlx::query_as::<_, Subscription>(&format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?"
            ))
            .bind(&paid.user_id)
            .fetch_one(&*self.db)
            .await
            .inspect_err(|err| db_failed(flow, &paid.record.id, err))?,
        };

        info!(
            flow = %flow,
            checkout_id = %paid.record.id,
            user_id = %subscription.user_id,
            subscription_id = %subscription.id,
            "membership activated"
        );
        Ok(subscription)
    }

    /// Reconcile a job-posting checkout into a published job.
    ///
    /// The job row is keyed by checkout id; a replayed callback finds the
    /// existing row instead of inserting another.
    pub async fn reconcile_job_posting(&self, checkout_id: &str) -> CheckoutResult<Job> {
        let flow = Flow::JobPosting;
        let paid = self.fetch_paid(checkout_id, flow).await?;
        let posting = decode_job_posting(&paid.record.metadata)
            .map_err(|rejection| reject(flow, checkout_id, rejection))?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO jobs ({JOB_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(checkout_id) DO NOTHING"
        ))
        .bind(Uuid::new_v4())
        .bind(&paid.record.id)
        .bind(&paid.user_id)
        .bind(&posting.title)
        .bind(&posting.company_name)
        .bind(posting.website.as_deref())
        .bind(&posting.category)
        .bind(&posting.apply_url)
        .bind(posting.receive_emails.unwrap_or(false))
        .bind(posting.contact_email.as_deref().unwrap_or_default())
        .bind(posting.highlight_color.as_deref())
        .bind(&posting.description)
        .bind(posting.tags.join(","))
        .bind(&posting.job_type)
        .bind(&posting.remote_scope)
        .bind(&posting.location)
        .bind(posting.salary_min)
        .bind(posting.salary_max)
        .bind(Utc::now())
        .execute(&*self.db)
        .await
        .inspect_err(|err| db_failed(flow, &paid.record.id, err))?
        .rows_affected();

        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE checkout_id = ?"
        ))
        .bind(&paid.record.id)
        .fetch_one(&*self.db)
        .await
        .inspect_err(|err| db_failed(flow, &paid.record.id, err))?;

        info!(
            flow = %flow,
            checkout_id = %paid.record.id,
            job_id = %job.id,
            replay = inserted == 0,
            "job posting published"
        );
        Ok(job)
    }

    /// Fetch a checkout and run it through the status, flow and identity gates.
    async fn fetch_paid(&self, checkout_id: &str, flow: Flow) -> CheckoutResult<PaidCheckout> {
        let checkout_id = checkout_id.trim();
        if checkout_id.is_empty() {
            return Err(CheckoutError::Validation {
                missing: vec!["checkout_id".into()],
            });
        }
        if !is_checkout_id(checkout_id) {
            warn!(flow = %flow, checkout_id, "malformed checkout id");
            return Err(CheckoutError::InvalidField {
                field: "checkout_id",
                reason: "must contain only letters, digits, '_' or '-'".into(),
            });
        }

        let record = self
            .provider
            .retrieve_checkout(checkout_id)
            .await
            .inspect_err(|err| {
                warn!(flow = %flow, checkout_id, error = %err, "checkout fetch failed");
            })?;

        if !record.status.is_paid() {
            return Err(reject(
                flow,
                checkout_id,
                Rejection::UnpaidStatus {
                    status: record.status.as_str().to_string(),
                },
            ));
        }

        let actual_flow = record.metadata.get(FLOW_KEY).unwrap_or_default();
        if actual_flow != flow.as_str() {
            return Err(reject(
                flow,
                checkout_id,
                Rejection::FlowMismatch {
                    expected: flow.as_str().to_string(),
                    actual: if actual_flow.is_empty() {
                        "missing".to_string()
                    } else {
                        actual_flow.to_string()
                    },
                },
            ));
        }

        let user_id = match record.metadata.get(USER_ID_KEY).map(str::trim) {
            Some(user_id) if !user_id.is_empty() => user_id.to_string(),
            _ => return Err(reject(flow, checkout_id, Rejection::MissingIdentity)),
        };

        Ok(PaidCheckout { record, user_id })
    }

    /// Current subscription for a user.
    pub async fn subscription_for_user(&self, user_id: &str) -> CheckoutResult<Subscription> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| CheckoutError::NotFound {
            entity: "subscription",
            id: user_id.to_string(),
        })
    }

    /// A single published job.
    pub async fn job(&self, id: Uuid) -> CheckoutResult<Job> {
        sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| CheckoutError::NotFound {
                entity: "job",
                id: id.to_string(),
            })
    }

    /// Most recently published jobs, newest first.
    pub async fn list_jobs(&self, limit: Option<i64>) -> CheckoutResult<Vec<Job>> {
        let limit = limit
            .unwrap_or(DEFAULT_JOB_LIST_LIMIT)
            .clamp(1, MAX_JOB_LIST_LIMIT);
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&*self.db)
        .await?;
        Ok(jobs)
    }
}

/// `{base}/checkout/{flow}/callback?checkout_id={CHECKOUT_ID}`
pub fn success_url(public_base_url: &str, flow: Flow) -> String {
    format!(
        "{}/checkout/{}/callback?checkout_id={}",
        public_base_url.trim_end_matches('/'),
        flow.path_segment(),
        CHECKOUT_ID_PLACEHOLDER
    )
}

fn tag_flow(metadata: &mut MetadataMap, flow: Flow, user_id: &str) {
    metadata.insert_raw(FLOW_KEY, flow.as_str());
    metadata.insert_raw(USER_ID_KEY, user_id.trim());
}

/// Provider checkout ids are opaque tokens of ASCII letters, digits, `_` and `-`.
fn is_checkout_id(id: &str) -> bool {
    id.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn db_failed(flow: Flow, checkout_id: &str, err: &sqlx::Error) {
    warn!(flow = %flow, checkout_id, error = %err, "reconciliation write failed");
}

fn reject(flow: Flow, checkout_id: &str, rejection: Rejection) -> CheckoutError {
    warn!(
        flow = %flow,
        checkout_id,
        reason = rejection.reason(),
        value = ?rejection.value(),
        "checkout rejected"
    );
    CheckoutError::Rejected(rejection)
}
