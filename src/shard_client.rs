//! Shard endpoint client
//!
//! This module fetches one batch of records from one named shard for a given
//! query, normalizing every expected failure mode into data rather than
//! errors: a transport failure, a non-2xx response and a malformed body all
//! degrade to a synthetic batch of placeholder `Error` records spanning the
//! batch's expected identifier range. Downstream merge and failure
//! accounting then treat "shard unreachable" uniformly with "shard returned
//! explicit per-record errors".
//!
//! Only an unexpected engine fault (a shard key with no configured endpoint)
//! propagates past this boundary.

use crate::config::AggregatorConfig;
use crate::error::RosterexError;
use crate::exam::Query;
use crate::identifiers::ShardKey;
use crate::records::{ExamRecord, ShardBatch};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Seam between the orchestrator and the shard backends
///
/// Expected failures never surface as `Err`; they arrive as degraded
/// batches. `Err` is reserved for unexpected faults only.
#[async_trait]
pub trait ShardFetch: Send + Sync {
    /// Fetch one batch of records from one shard for the given query
    async fn fetch(&self, key: ShardKey, query: &Query) -> Result<ShardBatch>;
}

/// HTTP-backed shard client
pub struct HttpShardClient {
    http: reqwest::Client,
    config: AggregatorConfig,
}

impl HttpShardClient {
    /// Build a client over the configured endpoints
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RosterexError::Internal(format!("http client construction failed: {}", e)))?;
        Ok(Self { http, config })
    }

    async fn try_fetch(&self, endpoint: &str, key: ShardKey, query: &Query) -> std::result::Result<Vec<ExamRecord>, String> {
        let response = self
            .http
            .get(endpoint)
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| format!("shard {} request failed: {}", key, e))?;

        let status = response.status();
        if !status.is_success() {
            let fallback = format!("shard {} request failed: {}", key, status.as_u16());
            let reason = match response.json::<Value>().await {
                Ok(body) => extract_reason(&body).unwrap_or(fallback),
                Err(_) => fallback,
            };
            return Err(reason);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("shard {} returned unreadable body: {}", key, e))?;
        match body {
            Value::Array(_) => serde_json::from_value(body)
                .map_err(|e| format!("shard {} returned invalid record format: {}", key, e)),
            _ => Err(format!("shard {} returned invalid data format", key)),
        }
    }
}

#[async_trait]
impl ShardFetch for HttpShardClient {
    async fn fetch(&self, key: ShardKey, query: &Query) -> Result<ShardBatch> {
        let endpoint = self.config.endpoint(key)?;
        debug!(shard = %key, registration = %query.registration, "fetching shard batch");

        match self.try_fetch(endpoint, key, query).await {
            Ok(records) => {
                debug!(shard = %key, count = records.len(), "shard batch received");
                Ok(ShardBatch::fetched(key, records))
            }
            Err(reason) => {
                warn!(shard = %key, %reason, "shard fetch degraded to placeholder batch");
                Ok(ShardBatch::degraded(
                    key,
                    &query.registration,
                    self.config.batch_size,
                    &reason,
                ))
            }
        }
    }
}

/// Wire query parameters for a shard request
pub(crate) fn query_params(query: &Query) -> [(&'static str, String); 4] {
    [
        ("reg_no", query.registration.as_str().to_string()),
        ("year", query.year.to_string()),
        ("semester", query.semester.as_roman().to_string()),
        ("exam_held", query.exam_session.clone()),
    ]
}

/// Pull a structured failure reason out of an error response body
///
/// Accepts either an object carrying an `error` field or an array whose
/// first element carries a `reason`, matching what the shard workers emit.
fn extract_reason(body: &Value) -> Option<String> {
    if let Some(reason) = body.get("error").and_then(Value::as_str) {
        return Some(reason.to_string());
    }
    body.as_array()?
        .first()?
        .get("reason")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::{ExamDescriptor, Semester};
    use serde_json::json;

    fn query() -> Query {
        let exam = ExamDescriptor {
            batch_year: 2022,
            semester: Semester::new(4).unwrap(),
            exam_session: "Nov/Dec 2024".to_string(),
            publish_date: None,
        };
        Query::new("22104134070", &exam).unwrap()
    }

    #[test]
    fn test_query_params_use_roman_semester() {
        let params = query_params(&query());
        assert_eq!(params[0], ("reg_no", "22104134070".to_string()));
        assert_eq!(params[1], ("year", "2022".to_string()));
        assert_eq!(params[2], ("semester", "IV".to_string()));
        assert_eq!(params[3], ("exam_held", "Nov/Dec 2024".to_string()));
    }

    #[test]
    fn test_extract_reason_from_object() {
        let body = json!({"error": "registration window closed"});
        assert_eq!(extract_reason(&body).as_deref(), Some("registration window closed"));
    }

    #[test]
    fn test_extract_reason_from_array() {
        let body = json!([{"regNo": "22104134070", "status": "Error", "reason": "backend busy"}]);
        assert_eq!(extract_reason(&body).as_deref(), Some("backend busy"));
    }

    #[test]
    fn test_extract_reason_absent() {
        assert_eq!(extract_reason(&json!({"message": "nope"})), None);
        assert_eq!(extract_reason(&json!([])), None);
        assert_eq!(extract_reason(&json!(42)), None);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_unexpected_fault() {
        let client = HttpShardClient::new(AggregatorConfig::new()).unwrap();
        let err = client.fetch(ShardKey::User, &query()).await.unwrap_err();
        assert!(matches!(err, RosterexError::ShardKey(_)));
    }
}
