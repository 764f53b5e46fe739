//! Text-classification client.
//!
//! The external classifier suggests a responsible service for free text. A
//! missing suggestion is a normal result; only transport and protocol
//! failures are errors.

use std::sync::Arc;
use std::time::Duration;

use appeals_common::{AppError, AppResult, config::ClassificationConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An alternative label the classifier considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub service: String,
    pub confidence: f64,
}

/// Classifier verdict for one text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    /// Suggested service name; empty when there is no suggestion
    pub label: String,
    pub confidence: f64,
    pub needs_moderation: bool,
    pub alternatives: Vec<Alternative>,
}

impl Classification {
    /// No suggestion at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the suggestion clears `threshold`. Equal confidence is accepted.
    #[must_use]
    pub fn accepts(&self, threshold: f64) -> bool {
        !self.label.trim().is_empty() && self.confidence >= threshold
    }
}

/// Trait for text classifiers.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `text`.
    async fn classify(&self, text: &str) -> AppResult<Classification>;
}

/// Shared classifier handle.
pub type ClassifierService = Arc<dyn Classifier>;

/// Classifier that never suggests anything.
pub struct NoOpClassifier;

#[async_trait]
impl Classifier for NoOpClassifier {
    async fn classify(&self, _text: &str) -> AppResult<Classification> {
        Ok(Classification::none())
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    service: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    needs_moderation: bool,
    #[serde(default)]
    top_alternatives: Vec<Alternative>,
}

/// HTTP client for the classification service (`POST {url}/classify`).
#[derive(Clone)]
pub struct HttpClassifier {
    http_client: reqwest::Client,
    service_url: String,
    enabled: bool,
}

impl HttpClassifier {
    /// Build a client with the configured timeout.
    pub fn new(config: &ClassificationConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            enabled: config.enabled,
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> AppResult<Classification> {
        if !self.enabled || self.service_url.is_empty() {
            return Ok(Classification::none());
        }

        let response = self
            .http_client
            .post(format!("{}/classify", self.service_url))
            .json(&ClassifyRequest { text })
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Classification request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Classification service error: {status} - {body}"
            )));
        }

        let parsed: ClassifyResponse = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse classification response: {e}"))
        })?;

        debug!(
            label = %parsed.service,
            confidence = parsed.confidence,
            "Classification received"
        );

        Ok(Classification {
            label: parsed.service,
            confidence: parsed.confidence,
            needs_moderation: parsed.needs_moderation,
            alternatives: parsed.top_alternatives,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn verdict(label: &str, confidence: f64) -> Classification {
        Classification {
            label: label.to_string(),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(verdict("Roads", 0.8).accepts(0.8));
        assert!(!verdict("Roads", 0.79).accepts(0.8));
    }

    #[test]
    fn test_empty_label_never_accepted() {
        assert!(!verdict("", 0.99).accepts(0.5));
        assert!(!verdict("   ", 0.99).accepts(0.5));
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let parsed: ClassifyResponse = serde_json::from_str(r#"{"service":"Roads"}"#).unwrap();
        assert_eq!(parsed.service, "Roads");
        assert!(parsed.top_alternatives.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_client_returns_no_suggestion() {
        let client = HttpClassifier::new(&ClassificationConfig {
            enabled: false,
            service_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let result = client.classify("Pothole on Main St").await.unwrap();
        assert_eq!(result, Classification::none());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_external_error() {
        let client = HttpClassifier::new(&ClassificationConfig {
            enabled: true,
            service_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let result = client.classify("Pothole on Main St").await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }
}
