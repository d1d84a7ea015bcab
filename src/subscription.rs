//! Subscription resolution
//!
//! Maintains a cached view of an externally hosted subscription feed. Each
//! group owns one cache record; `resolve` refreshes it over HTTP when the
//! TTL has lapsed (or on demand), decodes the payload into raw link rows,
//! and applies the group's exclude-keyword filter. A failed refresh is
//! recorded in `last_error` and never destroys previously good cache data.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SubscriptionError;
use crate::link::{RawLink, derive_name_from_link};
use crate::parser::base64::decode_base64_string;

/// Seconds between unforced refreshes of a subscription feed
pub const SUBSCRIPTION_CACHE_TTL_SECONDS: u64 = 300;

/// Timeout for one subscription fetch
pub const SUBSCRIPTION_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Keywords filtered out of subscription feeds when a group supplies none
/// of its own: the data-quota/expiry marketing lines providers prepend
pub const DEFAULT_EXCLUDE_KEYWORDS: &[&str] = &["流量", "套餐", "到期", "剩余"];

// ============================================================================
// Cache Record
// ============================================================================

/// Per-group subscription cache record, persisted by the storage layer.
///
/// Mutated on every fetch attempt: success replaces the payload and clears
/// `last_error`; failure sets `last_error` and leaves the payload, count
/// and fetch timestamp untouched.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubscriptionRecord {
    pub group_id: String,
    pub subscription_url: String,

    /// Raw response body of the last successful fetch
    #[serde(default)]
    pub cached_payload: Option<String>,

    /// Number of links the cached payload resolved to
    #[serde(default)]
    pub cached_node_count: usize,

    /// Unix timestamp of the last successful fetch
    #[serde(default)]
    pub last_fetched_at: Option<u64>,

    /// Message of the last failed fetch; cleared on success
    #[serde(default)]
    pub last_error: Option<String>,

    /// Unix timestamp of the last record mutation
    #[serde(default)]
    pub updated_at: u64,

    /// Group-specific keyword filter; empty means use the defaults
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl SubscriptionRecord {
    /// A fresh record for a newly created subscription group
    pub fn new(group_id: impl Into<String>, subscription_url: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            subscription_url: subscription_url.into(),
            cached_payload: None,
            cached_node_count: 0,
            last_fetched_at: None,
            last_error: None,
            updated_at: 0,
            exclude_keywords: Vec::new(),
        }
    }
}

/// Result of one `resolve` call
#[derive(Clone, Debug)]
pub struct SubscriptionResolution {
    /// Raw link rows decoded from the (fresh or cached) payload
    pub links: Vec<RawLink>,

    /// The updated record, for the storage layer to persist;
    /// `None` when no record existed
    pub metadata: Option<SubscriptionRecord>,

    /// Whether a fetch succeeded during this call
    pub refreshed: bool,
}

// ============================================================================
// Subscription Manager
// ============================================================================

/// Fetches and caches subscription feeds.
///
/// Concurrent resolves for different groups are independent; callers that
/// resolve the same group concurrently should serialize, though racing
/// refreshes merely overwrite each other with equivalent data.
pub struct SubscriptionManager {
    ttl: Duration,
    timeout: Duration,
    default_keywords: Vec<String>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Manager with the default TTL, timeout and keyword set
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(SUBSCRIPTION_CACHE_TTL_SECONDS),
            timeout: SUBSCRIPTION_FETCH_TIMEOUT,
            default_keywords: DEFAULT_EXCLUDE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Override the refresh TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the fetch timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the default exclude-keyword set
    pub fn with_default_keywords(mut self, keywords: Vec<String>) -> Self {
        self.default_keywords = keywords;
        self
    }

    /// Resolve a group's subscription into raw link rows.
    ///
    /// Refreshes over HTTP when `force_refresh` is set, the record has
    /// never been fetched, or the TTL has lapsed. Fetch failures are
    /// recorded on the returned record and the previous cached payload is
    /// used instead; they are never propagated.
    pub async fn resolve(
        &self,
        record: Option<SubscriptionRecord>,
        force_refresh: bool,
    ) -> SubscriptionResolution {
        let Some(mut record) = record else {
            return SubscriptionResolution {
                links: Vec::new(),
                metadata: None,
                refreshed: false,
            };
        };

        let keywords = self.effective_keywords(&record.exclude_keywords);
        let now = unix_now();
        let should_refresh = force_refresh
            || record.last_fetched_at.is_none()
            || now.saturating_sub(record.last_fetched_at.unwrap_or(0)) >= self.ttl.as_secs();

        let mut refreshed = false;
        let mut links: Vec<RawLink> = Vec::new();

        if should_refresh {
            match self.fetch_payload(&record.subscription_url).await {
                Ok(body) => {
                    links = payload_to_links(&body, &record.group_id, &keywords);
                    debug!(
                        "Refreshed subscription group '{}': {} links",
                        record.group_id,
                        links.len()
                    );
                    record.cached_payload = Some(body);
                    record.cached_node_count = links.len();
                    record.last_fetched_at = Some(now);
                    record.last_error = None;
                    record.updated_at = now;
                    refreshed = true;
                }
                Err(e) => {
                    warn!(
                        "Failed to refresh subscription group '{}': {}",
                        record.group_id, e
                    );
                    record.last_error = Some(e.to_string());
                    record.updated_at = now;
                }
            }
        }

        let Some(payload) = record.cached_payload.clone() else {
            return SubscriptionResolution {
                links: Vec::new(),
                metadata: Some(record),
                refreshed,
            };
        };

        if links.is_empty() {
            links = payload_to_links(&payload, &record.group_id, &keywords);
        }

        // Self-heal count drift (e.g. a keyword list edited since the last
        // fetch) without refetching
        if record.cached_node_count != links.len() {
            debug!(
                "Correcting cached node count for group '{}': {} -> {}",
                record.group_id,
                record.cached_node_count,
                links.len()
            );
            record.cached_node_count = links.len();
        }

        SubscriptionResolution {
            links,
            metadata: Some(record),
            refreshed,
        }
    }

    /// The keyword filter to apply for a record
    fn effective_keywords(&self, record_keywords: &[String]) -> Vec<String> {
        clean_keywords(record_keywords, &self.default_keywords)
    }

    /// GET the subscription document
    async fn fetch_payload(&self, url: &str) -> Result<String, SubscriptionError> {
        debug!("Fetching subscription from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(format!("switchboard/{}", crate::get_version()))
            .timeout(self.timeout)
            .build()?;

        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubscriptionError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

// ============================================================================
// Payload Decoding & Filtering
// ============================================================================

/// Decode a subscription payload into raw link rows for a group.
///
/// `keywords` should already be the effective filter set; pass an empty
/// slice to fall back to [`DEFAULT_EXCLUDE_KEYWORDS`].
pub fn payload_to_links(payload: &str, group_id: &str, keywords: &[String]) -> Vec<RawLink> {
    let defaults: Vec<String> = DEFAULT_EXCLUDE_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect();
    let keywords = clean_keywords(keywords, &defaults);

    extract_subscription_entries(payload, &keywords)
        .into_iter()
        .enumerate()
        .map(|(index, entry)| RawLink {
            id: format!("subscription:{}:{}", group_id, index),
            name: Some(derive_name_from_link(&entry)),
            raw: entry,
        })
        .collect()
}

/// Split a decoded payload into filtered, trimmed, non-empty lines
fn extract_subscription_entries(payload: &str, keywords: &[String]) -> Vec<String> {
    let decoded = decode_subscription_payload(payload);

    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            // literal substring test against both the derived name and the
            // raw link text, case-sensitive
            let derived_name = derive_name_from_link(line);
            !keywords
                .iter()
                .any(|kw| !kw.is_empty() && (derived_name.contains(kw) || line.contains(kw)))
        })
        .map(str::to_string)
        .collect()
}

/// Decode a payload body, treating it as plaintext when it is not base64
fn decode_subscription_payload(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match decode_base64_payload(trimmed) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("Subscription payload is not base64, using as-is: {}", e);
            trimmed.to_string()
        }
    }
}

/// Base64-decode a whole payload body (whitespace stripped first)
fn decode_base64_payload(payload: &str) -> Result<String, SubscriptionError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    decode_base64_string(&compact).map_err(|e| SubscriptionError::Decode(e.to_string()))
}

// ============================================================================
// Keyword Handling
// ============================================================================

/// Trim, drop empties and dedup a keyword list, preserving order; an
/// unusable list falls back to `defaults`
pub fn clean_keywords(input: &[String], defaults: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let cleaned: Vec<String> = input
        .iter()
        .map(|kw| kw.trim().to_string())
        .filter(|kw| !kw.is_empty() && seen.insert(kw.clone()))
        .collect();

    if cleaned.is_empty() {
        defaults.to_vec()
    } else {
        cleaned
    }
}

/// Parse a stored exclude-keywords column (a JSON array string).
///
/// Anything unusable — null, malformed JSON, a non-array, an empty list —
/// yields the built-in default keyword set.
pub fn parse_exclude_keywords(raw: Option<&str>) -> Vec<String> {
    let defaults: Vec<String> = DEFAULT_EXCLUDE_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect();

    let Some(raw) = raw else {
        return defaults;
    };

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => {
            let keywords: Vec<String> = items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect();
            clean_keywords(&keywords, &defaults)
        }
        _ => defaults,
    }
}

/// Normalize a keyword list arriving from an API payload: either a JSON
/// array or a newline/comma separated string
pub fn normalize_exclude_keywords_input(input: &serde_json::Value) -> Vec<String> {
    let defaults: Vec<String> = DEFAULT_EXCLUDE_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect();

    match input {
        serde_json::Value::Array(items) => {
            let keywords: Vec<String> = items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            clean_keywords(&keywords, &defaults)
        }
        serde_json::Value::String(text) => {
            let splits: Vec<String> = text
                .split(['\n', ','])
                .map(str::to_string)
                .collect();
            clean_keywords(&splits, &defaults)
        }
        _ => defaults,
    }
}

/// Current unix timestamp in seconds
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ------------------------------------------------------------------------
    // Keyword Handling
    // ------------------------------------------------------------------------

    #[test]
    fn test_clean_keywords_trims_and_dedups() {
        let cleaned = clean_keywords(&strings(&[" a ", "b", "a", ""]), &strings(&["d"]));
        assert_eq!(cleaned, vec!["a", "b"]);
    }

    #[test]
    fn test_clean_keywords_falls_back_to_defaults() {
        let cleaned = clean_keywords(&strings(&["", "  "]), &strings(&["d1", "d2"]));
        assert_eq!(cleaned, vec!["d1", "d2"]);
    }

    #[test]
    fn test_parse_exclude_keywords_valid_json() {
        assert_eq!(
            parse_exclude_keywords(Some(r#"["ads", "expired"]"#)),
            vec!["ads", "expired"]
        );
    }

    #[test]
    fn test_parse_exclude_keywords_unusable_inputs_get_defaults() {
        let defaults: Vec<String> = DEFAULT_EXCLUDE_KEYWORDS.iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_exclude_keywords(None), defaults);
        assert_eq!(parse_exclude_keywords(Some("not json")), defaults);
        assert_eq!(parse_exclude_keywords(Some(r#""string""#)), defaults);
        assert_eq!(parse_exclude_keywords(Some("[]")), defaults);
    }

    #[test]
    fn test_normalize_exclude_keywords_from_string() {
        let input = serde_json::json!("quota, expired\nslow");
        assert_eq!(
            normalize_exclude_keywords_input(&input),
            vec!["quota", "expired", "slow"]
        );
    }

    #[test]
    fn test_normalize_exclude_keywords_from_array() {
        let input = serde_json::json!(["a", "b"]);
        assert_eq!(normalize_exclude_keywords_input(&input), vec!["a", "b"]);
    }

    // ------------------------------------------------------------------------
    // Payload Decoding
    // ------------------------------------------------------------------------

    #[test]
    fn test_decode_payload_base64() {
        let plain = "trojan://pw@a.com:443#one\ntrojan://pw@b.com:443#two";
        let encoded = STANDARD.encode(plain);
        assert_eq!(decode_subscription_payload(&encoded), plain);
    }

    #[test]
    fn test_decode_payload_base64_with_linebreaks() {
        let plain = "trojan://pw@a.com:443#one";
        let encoded = STANDARD.encode(plain);
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_subscription_payload(&wrapped), plain);
    }

    #[test]
    fn test_decode_payload_plaintext_fallback() {
        let plain = "trojan://pw@a.com:443#one";
        assert_eq!(decode_subscription_payload(plain), plain);
    }

    #[test]
    fn test_decode_payload_empty() {
        assert_eq!(decode_subscription_payload("  \n "), "");
    }

    // ------------------------------------------------------------------------
    // Entry Extraction & Filtering
    // ------------------------------------------------------------------------

    #[test]
    fn test_payload_to_links_rows() {
        let payload = "trojan://pw@a.com:443#one\n\ntrojan://pw@b.com:443#two\n";
        let links = payload_to_links(payload, "g1", &strings(&["unrelated"]));

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].id, "subscription:g1:0");
        assert_eq!(links[0].name.as_deref(), Some("one"));
        assert_eq!(links[1].id, "subscription:g1:1");
        assert_eq!(links[1].raw, "trojan://pw@b.com:443#two");
    }

    #[test]
    fn test_keyword_filter_matches_derived_name() {
        let payload = "trojan://pw@a.com:443#%E5%89%A9%E4%BD%99%20100GB\ntrojan://pw@b.com:443#keep";
        // empty keyword list -> defaults, which include 剩余
        let links = payload_to_links(payload, "g", &[]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name.as_deref(), Some("keep"));
    }

    #[test]
    fn test_keyword_filter_matches_raw_text() {
        let payload = "trojan://pw@marketing-host.com:443#fine\ntrojan://pw@b.com:443#ok";
        let links = payload_to_links(payload, "g", &strings(&["marketing"]));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name.as_deref(), Some("ok"));
    }

    #[test]
    fn test_keyword_filter_is_case_sensitive() {
        let payload = "trojan://pw@a.com:443#Quota";
        let links = payload_to_links(payload, "g", &strings(&["quota"]));
        assert_eq!(links.len(), 1);
    }

    // ------------------------------------------------------------------------
    // Resolve (no-network paths)
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_resolve_without_record() {
        let manager = SubscriptionManager::new();
        let resolution = manager.resolve(None, true).await;
        assert!(resolution.links.is_empty());
        assert!(resolution.metadata.is_none());
        assert!(!resolution.refreshed);
    }

    #[tokio::test]
    async fn test_resolve_fresh_record_skips_fetch_and_uses_cache() {
        let manager = SubscriptionManager::new();
        let mut record = SubscriptionRecord::new("g", "http://127.0.0.1:1/unreachable");
        record.cached_payload = Some("trojan://pw@a.com:443#one".to_string());
        record.cached_node_count = 1;
        record.last_fetched_at = Some(unix_now());

        let resolution = manager.resolve(Some(record), false).await;
        assert!(!resolution.refreshed);
        assert_eq!(resolution.links.len(), 1);
        let metadata = resolution.metadata.unwrap();
        assert!(metadata.last_error.is_none());
    }

    #[tokio::test]
    async fn test_resolve_count_drift_corrected_from_cache() {
        let manager = SubscriptionManager::new();
        let mut record = SubscriptionRecord::new("g", "http://127.0.0.1:1/unreachable");
        record.cached_payload =
            Some("trojan://pw@a.com:443#one\ntrojan://pw@b.com:443#two".to_string());
        record.cached_node_count = 5;
        record.last_fetched_at = Some(unix_now());

        let resolution = manager.resolve(Some(record), false).await;
        assert_eq!(resolution.metadata.unwrap().cached_node_count, 2);
    }
}
