//! Encodes job postings into provider checkout metadata and back.
//!
//! The provider only accepts flat string values of at most
//! [`MAX_VALUE_LEN`] characters and rejects empty values. Layout:
//!
//! - required scalars under fixed `job_*` keys (written even when empty)
//! - optional fields (website, contact email, highlight color, salary bounds,
//!   tags) omitted when empty
//! - booleans as `"true"` / `"false"`, numbers in decimal
//! - tags joined with `,` and truncated to the value limit
//! - the description split into `job_description_00`, `job_description_01`, ...
//!
//! Flow and identity keys (`custom_*`) are added by the checkout service.

use crate::{
    errors::{CheckoutError, CheckoutResult, Rejection},
    models::{
        job_posting::JobPosting,
        metadata::{MAX_VALUE_LEN, MetadataMap},
    },
};

pub const FLOW_KEY: &str = "custom_flow";
pub const USER_ID_KEY: &str = "custom_user_id";

pub const TITLE_KEY: &str = "job_title";
pub const COMPANY_NAME_KEY: &str = "job_company_name";
pub const WEBSITE_KEY: &str = "job_website";
pub const CATEGORY_KEY: &str = "job_category";
pub const APPLY_URL_KEY: &str = "job_apply_url";
pub const RECEIVE_EMAILS_KEY: &str = "job_receive_emails";
pub const CONTACT_EMAIL_KEY: &str = "job_contact_email";
pub const HIGHLIGHT_COLOR_KEY: &str = "job_highlight_color";
pub const TAGS_KEY: &str = "job_tags";
pub const JOB_TYPE_KEY: &str = "job_type";
pub const REMOTE_SCOPE_KEY: &str = "job_remote_scope";
pub const LOCATION_KEY: &str = "job_location";
pub const SALARY_MIN_KEY: &str = "job_salary_min";
pub const SALARY_MAX_KEY: &str = "job_salary_max";

/// Prefix of description chunk keys; the two-digit index follows.
pub const DESCRIPTION_PREFIX: &str = "job_description_";

/// Two-digit chunk suffixes allow indices `00..=99`.
pub const MAX_DESCRIPTION_CHUNKS: usize = 100;

/// Keys that must be present for a posting to be rebuilt from metadata.
const REQUIRED_KEYS: [&str; 8] = [
    TITLE_KEY,
    COMPANY_NAME_KEY,
    CATEGORY_KEY,
    APPLY_URL_KEY,
    RECEIVE_EMAILS_KEY,
    JOB_TYPE_KEY,
    REMOTE_SCOPE_KEY,
    LOCATION_KEY,
];

/// Encode a posting into checkout metadata.
///
/// Deterministic: the same posting always yields the same map. Fails only
/// when the description needs more chunks than two-digit indices can name.
pub fn encode_job_posting(posting: &JobPosting) -> CheckoutResult<MetadataMap> {
    let chunks = chunk_description(&posting.description)?;

    let mut entries: Vec<(String, String)> = vec![
        (TITLE_KEY.into(), truncate(&posting.title)),
        (COMPANY_NAME_KEY.into(), truncate(&posting.company_name)),
        (CATEGORY_KEY.into(), truncate(&posting.category)),
        (APPLY_URL_KEY.into(), truncate(&posting.apply_url)),
        (
            RECEIVE_EMAILS_KEY.into(),
            posting.receive_emails.unwrap_or(false).to_string(),
        ),
        (JOB_TYPE_KEY.into(), truncate(&posting.job_type)),
        (REMOTE_SCOPE_KEY.into(), truncate(&posting.remote_scope)),
        (LOCATION_KEY.into(), truncate(&posting.location)),
    ];

    let optional = [
        (WEBSITE_KEY, posting.website.as_deref().map(truncate)),
        (CONTACT_EMAIL_KEY, posting.contact_email.as_deref().map(truncate)),
        (HIGHLIGHT_COLOR_KEY, posting.highlight_color.as_deref().map(truncate)),
        (SALARY_MIN_KEY, posting.salary_min.map(|n| n.to_string())),
        (SALARY_MAX_KEY, posting.salary_max.map(|n| n.to_string())),
        (TAGS_KEY, Some(truncate(&posting.tags.join(",")))),
    ];
    for (key, value) in optional {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            entries.push((key.into(), value));
        }
    }

    entries.extend(
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| (chunk_key(index), chunk)),
    );

    Ok(entries.into_iter().collect())
}

/// Rebuild a posting from metadata written by [`encode_job_posting`].
pub fn decode_job_posting(metadata: &MetadataMap) -> Result<JobPosting, Rejection> {
    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| !metadata.contains_key(key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::MissingJobData { missing });
    }

    let text = |key: &str| metadata.get(key).unwrap_or_default().to_string();
    let optional = |key: &str| metadata.get(key).filter(|v| !v.is_empty()).map(str::to_string);
    let number = |key: &str| metadata.get(key).and_then(|v| v.parse::<i64>().ok());

    Ok(JobPosting {
        title: text(TITLE_KEY),
        company_name: text(COMPANY_NAME_KEY),
        website: optional(WEBSITE_KEY),
        category: text(CATEGORY_KEY),
        apply_url: text(APPLY_URL_KEY),
        receive_emails: Some(metadata.get(RECEIVE_EMAILS_KEY) == Some("true")),
        contact_email: optional(CONTACT_EMAIL_KEY),
        highlight_color: optional(HIGHLIGHT_COLOR_KEY),
        description: join_description(metadata),
        tags: metadata
            .get(TAGS_KEY)
            .map(|tags| {
                tags.split(',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        job_type: text(JOB_TYPE_KEY),
        remote_scope: text(REMOTE_SCOPE_KEY),
        location: text(LOCATION_KEY),
        salary_min: number(SALARY_MIN_KEY),
        salary_max: number(SALARY_MAX_KEY),
    })
}

/// Concatenate description chunks in ascending key order.
pub fn join_description(metadata: &MetadataMap) -> String {
    metadata
        .with_prefix(DESCRIPTION_PREFIX)
        .map(|(_, chunk)| chunk)
        .collect()
}

/// Split a description into chunks of at most [`MAX_VALUE_LEN`] characters.
///
/// An empty description yields no chunks; an exact multiple of the chunk
/// size yields no trailing empty chunk.
pub fn chunk_description(description: &str) -> CheckoutResult<Vec<String>> {
    let chars: Vec<char> = description.chars().collect();
    let chunks: Vec<String> = chars
        .chunks(MAX_VALUE_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect();

    if chunks.len() > MAX_DESCRIPTION_CHUNKS {
        return Err(CheckoutError::InvalidField {
            field: "description",
            reason: format!(
                "{} characters exceeds the maximum of {}",
                chars.len(),
                MAX_DESCRIPTION_CHUNKS * MAX_VALUE_LEN
            ),
        });
    }

    Ok(chunks)
}

fn chunk_key(index: usize) -> String {
    format!("{DESCRIPTION_PREFIX}{index:02}")
}

fn truncate(value: &str) -> String {
    value.chars().take(MAX_VALUE_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting() -> JobPosting {
        JobPosting {
            title: "Senior Rust Engineer".into(),
            company_name: "Ferrous Systems".into(),
            website: Some("https://ferrous.example".into()),
            category: "engineering".into(),
            apply_url: "https://ferrous.example/apply".into(),
            receive_emails: Some(true),
            contact_email: Some("jobs@ferrous.example".into()),
            highlight_color: Some("#ffeeaa".into()),
            description: "Build fast, reliable services.".into(),
            tags: vec!["rust".into(), "tokio".into()],
            job_type: "full_time".into(),
            remote_scope: "worldwide".into(),
            location: "Remote".into(),
            salary_min: Some(120_000),
            salary_max: Some(160_000),
        }
    }

    fn with_description(description: String) -> JobPosting {
        JobPosting {
            description,
            ..posting()
        }
    }

    fn assert_round_trips(description: String) {
        let encoded = encode_job_posting(&with_description(description.clone())).unwrap();
        assert_eq!(join_description(&encoded), description);
    }

    #[test]
    fn description_round_trips_at_boundaries() {
        assert_round_trips(String::new());
        assert_round_trips("x".into());
        assert_round_trips("a".repeat(479));
        assert_round_trips("b".repeat(480));
        assert_round_trips("c".repeat(481));
        assert_round_trips("d".repeat(960));
        assert_round_trips("<p>héllo wörld ✓</p>".repeat(97));
    }

    #[test]
    fn thousand_char_description_makes_three_chunks() {
        let description: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let encoded = encode_job_posting(&with_description(description)).unwrap();

        let chunks: Vec<_> = encoded.with_prefix(DESCRIPTION_PREFIX).collect();
        let keys: Vec<_> = chunks.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["job_description_00", "job_description_01", "job_description_02"]
        );
        assert_eq!(chunks[2].1.len(), 40);
    }

    #[test]
    fn exact_multiple_has_no_trailing_chunk() {
        let encoded = encode_job_posting(&with_description("z".repeat(960))).unwrap();
        assert_eq!(encoded.with_prefix(DESCRIPTION_PREFIX).count(), 2);
        assert!(!encoded.contains_key("job_description_02"));
    }

    #[test]
    fn empty_description_emits_no_chunk_keys() {
        let encoded = encode_job_posting(&with_description(String::new())).unwrap();
        assert_eq!(encoded.with_prefix(DESCRIPTION_PREFIX).count(), 0);
    }

    #[test]
    fn multibyte_chunks_count_characters() {
        let encoded = encode_job_posting(&with_description("é".repeat(500))).unwrap();
        let lens: Vec<_> = encoded
            .with_prefix(DESCRIPTION_PREFIX)
            .map(|(_, v)| v.chars().count())
            .collect();
        assert_eq!(lens, vec![480, 20]);
    }

    #[test]
    fn hundred_chunks_fit_and_the_hundred_and_first_overflows() {
        let max = MAX_DESCRIPTION_CHUNKS * MAX_VALUE_LEN;

        let encoded = encode_job_posting(&with_description("q".repeat(max))).unwrap();
        assert_eq!(encoded.with_prefix(DESCRIPTION_PREFIX).count(), 100);
        assert!(encoded.contains_key("job_description_99"));

        let err = encode_job_posting(&with_description("q".repeat(max + 1))).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidField { field: "description", .. }
        ));
    }

    #[test]
    fn tags_are_comma_joined() {
        let encoded = encode_job_posting(&JobPosting {
            tags: vec!["go".into(), "rust".into(), "c++".into()],
            ..posting()
        })
        .unwrap();
        assert_eq!(encoded.get(TAGS_KEY), Some("go,rust,c++"));
    }

    #[test]
    fn long_tags_are_truncated_not_chunked() {
        let tags: Vec<String> = (0..200).map(|i| format!("tag{i}")).collect();
        let encoded = encode_job_posting(&JobPosting { tags, ..posting() }).unwrap();

        assert_eq!(encoded.get(TAGS_KEY).unwrap().chars().count(), MAX_VALUE_LEN);
        assert!(encoded.iter().all(|(k, _)| !k.starts_with("job_tags_")));
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let encoded = encode_job_posting(&JobPosting {
            website: Some(String::new()),
            contact_email: None,
            highlight_color: None,
            salary_min: None,
            salary_max: None,
            tags: vec![],
            description: String::new(),
            ..posting()
        })
        .unwrap();

        for key in [
            WEBSITE_KEY,
            CONTACT_EMAIL_KEY,
            HIGHLIGHT_COLOR_KEY,
            SALARY_MIN_KEY,
            SALARY_MAX_KEY,
            TAGS_KEY,
        ] {
            assert!(!encoded.contains_key(key), "{key} should be omitted");
        }
        assert_eq!(encoded.with_prefix(DESCRIPTION_PREFIX).count(), 0);
    }

    #[test]
    fn required_keys_present_even_when_empty() {
        let encoded = encode_job_posting(&JobPosting::default()).unwrap();

        for key in REQUIRED_KEYS {
            assert!(encoded.contains_key(key), "{key} should be present");
        }
        assert_eq!(encoded.get(TITLE_KEY), Some(""));
        assert_eq!(encoded.get(RECEIVE_EMAILS_KEY), Some("false"));
        assert_eq!(encoded.len(), REQUIRED_KEYS.len());
    }

    #[test]
    fn scalars_encode_as_strings() {
        let encoded = encode_job_posting(&posting()).unwrap();
        assert_eq!(encoded.get(RECEIVE_EMAILS_KEY), Some("true"));
        assert_eq!(encoded.get(SALARY_MIN_KEY), Some("120000"));
        assert_eq!(encoded.get(SALARY_MAX_KEY), Some("160000"));
    }

    #[test]
    fn every_value_respects_the_length_limit() {
        let long = "w".repeat(2000);
        let encoded = encode_job_posting(&JobPosting {
            title: long.clone(),
            company_name: long.clone(),
            website: Some(long.clone()),
            apply_url: long.clone(),
            description: long,
            ..posting()
        })
        .unwrap();

        assert!(encoded.iter().all(|(_, v)| v.chars().count() <= MAX_VALUE_LEN));
    }

    #[test]
    fn encoding_is_deterministic() {
        let input = with_description("detail ".repeat(300));
        assert_eq!(
            encode_job_posting(&input).unwrap(),
            encode_job_posting(&input).unwrap()
        );
    }

    #[test]
    fn decode_rebuilds_the_posting() {
        let original = with_description("long text ".repeat(150));
        let decoded = decode_job_posting(&encode_job_posting(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_reports_missing_required_keys() {
        let mut metadata = MetadataMap::new();
        metadata.insert_raw(TITLE_KEY, "Only a title");

        match decode_job_posting(&metadata) {
            Err(Rejection::MissingJobData { missing }) => {
                assert_eq!(missing.len(), REQUIRED_KEYS.len() - 1);
                assert!(missing.contains(&"job_company_name".to_string()));
                assert!(!missing.contains(&"job_title".to_string()));
            }
            other => panic!("expected MissingJobData, got {other:?}"),
        }
    }
}
