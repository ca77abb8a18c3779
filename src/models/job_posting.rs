//! Job posting submissions and the paid job rows created from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A job posting as submitted by an employer before payment.
///
/// Transient: it only lives long enough to be encoded into checkout metadata.
/// Missing string fields deserialize as empty so [`JobPosting::missing_fields`]
/// can report all of them at once.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct JobPosting {
    pub title: String,
    pub company_name: String,
    pub website: Option<String>,
    /// Category slug, e.g. `engineering`.
    pub category: String,
    pub apply_url: String,
    pub receive_emails: Option<bool>,
    pub contact_email: Option<String>,
    /// Optional highlight color for the listing (e.g. `#ffeeaa`).
    pub highlight_color: Option<String>,
    /// Rich-text description, unbounded length.
    pub description: String,
    pub tags: Vec<String>,
    pub job_type: String,
    pub remote_scope: String,
    pub location: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
}

impl JobPosting {
    /// Names of required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<String> {
        let required = [
            ("title", &self.title),
            ("company_name", &self.company_name),
            ("category", &self.category),
            ("apply_url", &self.apply_url),
            ("job_type", &self.job_type),
            ("remote_scope", &self.remote_scope),
            ("location", &self.location),
        ];

        let mut missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name.to_string())
            .collect();

        if self.receive_emails == Some(true)
            && self.contact_email.as_deref().is_none_or(|e| e.trim().is_empty())
        {
            missing.push("contact_email".into());
        }

        missing
    }
}

/// A paid job listing, created once its job-posting checkout reconciles.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Job {
    pub id: Uuid,

    /// Checkout that paid for this listing. Unique, so replays map to one row.
    pub checkout_id: String,

    /// Employer account that started the checkout.
    pub user_id: String,

    pub title: String,
    pub company_name: String,
    pub website: Option<String>,
    pub category: String,
    pub apply_url: String,
    pub receive_emails: bool,
    pub contact_email: String,
    pub highlight_color: Option<String>,
    pub description: String,

    /// Comma-separated, as carried in checkout metadata.
    pub tags: String,

    pub job_type: String,
    pub remote_scope: String,
    pub location: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub created_at: DateTime<Utc>,
}
