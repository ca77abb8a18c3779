use crate::{errors::CheckoutError, models::checkout::Flow};
use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_PROVIDER_API_URL: &str = "https://api.polar.sh/v1";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub provider: ProviderConfig,
}

/// Payment provider settings.
///
/// Every field except the API URL may be absent at startup; checkout
/// operations call [`ProviderConfig::require`] before talking to the provider.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    pub api_url: String,
    pub access_token: Option<String>,
    pub membership_product_id: Option<String>,
    pub job_posting_product_id: Option<String>,
    pub public_base_url: Option<String>,
}

/// The subset of [`ProviderConfig`] a single flow needs, all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings<'a> {
    pub product_id: &'a str,
    pub public_base_url: &'a str,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Checkout and reconciliation API for the job board")]
pub struct Args {
    /// Host to bind to (overrides JOB_CHECKOUT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides JOB_CHECKOUT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides JOB_CHECKOUT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Payment provider API base URL (overrides JOB_CHECKOUT_PROVIDER_API_URL)
    #[arg(long)]
    pub provider_api_url: Option<String>,

    /// Externally reachable base URL used in callback links (overrides JOB_CHECKOUT_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("JOB_CHECKOUT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("JOB_CHECKOUT_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing JOB_CHECKOUT_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading JOB_CHECKOUT_PORT"),
        };
        let env_db = env::var("JOB_CHECKOUT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/job_checkout.db".into());

        let mut provider = ProviderConfig::from_lookup(|key| env::var(key).ok());

        // --- Merge ---
        if let Some(url) = args.provider_api_url {
            provider.api_url = url;
        }
        if let Some(url) = non_blank(args.public_base_url) {
            provider.public_base_url = Some(url);
        }

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            provider,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ProviderConfig {
    /// Build provider settings from a variable lookup (normally the process environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| non_blank(lookup(key));
        Self {
            api_url: var("JOB_CHECKOUT_PROVIDER_API_URL")
                .unwrap_or_else(|| DEFAULT_PROVIDER_API_URL.into()),
            access_token: var("JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN"),
            membership_product_id: var("JOB_CHECKOUT_MEMBERSHIP_PRODUCT_ID"),
            job_posting_product_id: var("JOB_CHECKOUT_JOB_POSTING_PRODUCT_ID"),
            public_base_url: var("JOB_CHECKOUT_PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Return the settings `flow` needs, or a configuration error naming
    /// every missing variable.
    pub fn require(&self, flow: Flow) -> Result<FlowSettings<'_>, CheckoutError> {
        let product_id = match flow {
            Flow::Membership => self.membership_product_id.as_deref(),
            Flow::JobPosting => self.job_posting_product_id.as_deref(),
        };

        let mut missing = Vec::new();
        if self.access_token.is_none() {
            missing.push("JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN");
        }
        if product_id.is_none() {
            missing.push(match flow {
                Flow::Membership => "JOB_CHECKOUT_MEMBERSHIP_PRODUCT_ID",
                Flow::JobPosting => "JOB_CHECKOUT_JOB_POSTING_PRODUCT_ID",
            });
        }
        if self.public_base_url.is_none() {
            missing.push("JOB_CHECKOUT_PUBLIC_BASE_URL");
        }

        match (product_id, self.public_base_url.as_deref()) {
            (Some(product_id), Some(public_base_url)) if missing.is_empty() => Ok(FlowSettings {
                product_id,
                public_base_url,
            }),
            _ => Err(CheckoutError::Configuration { missing }),
        }
    }

    /// Names of all variables missing for any flow; empty when fully configured.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for flow in [Flow::Membership, Flow::JobPosting] {
            if let Err(CheckoutError::Configuration { missing: names }) = self.require(flow) {
                for name in names {
                    if !missing.contains(&name) {
                        missing.push(name);
                    }
                }
            }
        }
        missing
    }
}

// The access token stays out of startup logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("membership_product_id", &self.membership_product_id)
            .field("job_posting_product_id", &self.job_posting_product_id)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_reports_every_missing_variable() {
        let cfg = ProviderConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.api_url, DEFAULT_PROVIDER_API_URL);

        match cfg.require(Flow::Membership) {
            Err(CheckoutError::Configuration { missing }) => assert_eq!(
                missing,
                vec![
                    "JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN",
                    "JOB_CHECKOUT_MEMBERSHIP_PRODUCT_ID",
                    "JOB_CHECKOUT_PUBLIC_BASE_URL",
                ]
            ),
            other => panic!("expected configuration error, got {other:?}"),
        }
        assert_eq!(cfg.missing().len(), 4);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = ProviderConfig::from_lookup(lookup(&[
            ("JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN", "   "),
            ("JOB_CHECKOUT_MEMBERSHIP_PRODUCT_ID", "prod_member"),
            ("JOB_CHECKOUT_PUBLIC_BASE_URL", "https://jobs.example"),
        ]));
        assert!(cfg.access_token.is_none());
        assert!(matches!(
            cfg.require(Flow::Membership),
            Err(CheckoutError::Configuration { missing }) if missing == vec!["JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN"]
        ));
    }

    #[test]
    fn product_ids_are_per_flow() {
        let cfg = ProviderConfig::from_lookup(lookup(&[
            ("JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN", "tok"),
            ("JOB_CHECKOUT_MEMBERSHIP_PRODUCT_ID", "prod_member"),
            ("JOB_CHECKOUT_PUBLIC_BASE_URL", "https://jobs.example/"),
        ]));

        let settings = cfg.require(Flow::Membership).unwrap();
        assert_eq!(settings.product_id, "prod_member");
        assert_eq!(settings.public_base_url, "https://jobs.example");

        assert!(matches!(
            cfg.require(Flow::JobPosting),
            Err(CheckoutError::Configuration { missing }) if missing == vec!["JOB_CHECKOUT_JOB_POSTING_PRODUCT_ID"]
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = ProviderConfig::from_lookup(lookup(&[(
            "JOB_CHECKOUT_PROVIDER_ACCESS_TOKEN",
            "polar_secret",
        )]));
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("polar_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
