use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::config::AnalysisConfig;

/// Result of running an image through the captioning service.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub description: String,
    pub labels: Vec<String>,
    pub confidence: f64,
}

/// External image-captioning collaborator. One attempt per image, bounded
/// timeout; callers degrade failures instead of retrying.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image: &Bytes, content_type: &str) -> anyhow::Result<ImageAnalysis>;
}

pub struct HttpAnalyzer {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalyzer {
    pub fn new(cfg: &AnalysisConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build analysis http client")?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
        })
    }
}

/// The interrogator API is loose about field names; accept the spellings it
/// is known to emit.
#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default, alias = "caption", alias = "prompt")]
    description: String,
    #[serde(default, alias = "tags")]
    labels: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

#[async_trait]
impl ImageAnalyzer for HttpAnalyzer {
    async fn analyze(&self, image: &Bytes, content_type: &str) -> anyhow::Result<ImageAnalysis> {
        let payload = serde_json::json!({
            "image": format!("data:{};base64,{}", content_type, BASE64.encode(image)),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("analysis request")?
            .error_for_status()
            .context("analysis response status")?;

        let body: AnalyzeResponse = response.json().await.context("analysis response body")?;
        debug!(
            labels = body.labels.len(),
            confidence = body.confidence,
            "image analysis complete"
        );
        Ok(ImageAnalysis {
            description: body.description,
            labels: body.labels,
            confidence: body.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_accepts_canonical_field_names() {
        let body: AnalyzeResponse = serde_json::from_str(
            r#"{"description": "a jammed printer", "labels": ["printer", "paper"], "confidence": 0.87}"#,
        )
        .unwrap();
        assert_eq!(body.description, "a jammed printer");
        assert_eq!(body.labels, vec!["printer", "paper"]);
        assert!((body.confidence - 0.87).abs() < f64::EPSILON);
    }

    #[test]
    fn response_accepts_interrogator_aliases() {
        let body: AnalyzeResponse =
            serde_json::from_str(r#"{"caption": "a desk", "tags": ["desk"]}"#).unwrap();
        assert_eq!(body.description, "a desk");
        assert_eq!(body.labels, vec!["desk"]);
        assert_eq!(body.confidence, 0.0);
    }

    #[test]
    fn response_tolerates_empty_payload() {
        let body: AnalyzeResponse = serde_json::from_str("{}").unwrap();
        assert!(body.description.is_empty());
        assert!(body.labels.is_empty());
        assert_eq!(body.confidence, 0.0);
    }
}
