//! Remote face comparison over HTTP.
//!
//! The request mirrors the usual cloud compare-faces shape: a base64 source
//! image and either a base64 target image or a reference to a stored object,
//! plus the similarity threshold. The response lists the matches found.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use garagepi_core::{CapabilityError, FaceComparator, FaceMatch, FaceReference};
use serde::{Deserialize, Serialize};

/// Default request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct CompareRequest<'a> {
    source_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_object: Option<TargetObject<'a>>,
    similarity_threshold: f32,
}

#[derive(Debug, Serialize)]
struct TargetObject<'a> {
    collection: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    face_matches: Vec<MatchRecord>,
}

#[derive(Debug, Deserialize)]
struct MatchRecord {
    similarity: f32,
}

impl<'a> CompareRequest<'a> {
    fn new(source: &[u8], reference: FaceReference<'a>, threshold: f32) -> Self {
        let (target_image, target_object) = match reference {
            FaceReference::Image(bytes) => (Some(STANDARD.encode(bytes)), None),
            FaceReference::RemoteObject { collection, object } => {
                (None, Some(TargetObject { collection, name: object }))
            },
        };
        Self {
            source_image: STANDARD.encode(source),
            target_image,
            target_object,
            similarity_threshold: threshold,
        }
    }
}

fn parse_response(body: &[u8]) -> Result<Vec<FaceMatch>, CapabilityError> {
    let response: CompareResponse = serde_json::from_slice(body)
        .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;
    Ok(response
        .face_matches
        .into_iter()
        .map(|record| FaceMatch { similarity: record.similarity })
        .collect())
}

/// Face comparator backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpComparator {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpComparator {
    /// Comparator posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::Unreachable(e.to_string()))?;
        Ok(Self { endpoint: endpoint.into(), http })
    }
}

#[async_trait]
impl FaceComparator for HttpComparator {
    async fn compare(
        &self,
        source: &[u8],
        reference: FaceReference<'_>,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, CapabilityError> {
        let request = CompareRequest::new(source, reference, threshold);

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| CapabilityError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(CapabilityError::Rejected {
                status: status.as_u16(),
                reason: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_reference_request_carries_both_images() {
        let request = CompareRequest::new(b"src", FaceReference::Image(b"ref"), 80.0);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["source_image"], "c3Jj");
        assert_eq!(json["target_image"], "cmVm");
        assert!(json.get("target_object").is_none());
        assert_eq!(json["similarity_threshold"], 80.0);
    }

    #[test]
    fn remote_reference_request_names_object() {
        let reference = FaceReference::RemoteObject { collection: "garage", object: "owner.jpg" };
        let request = CompareRequest::new(b"src", reference, 80.0);
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("target_image").is_none());
        assert_eq!(json["target_object"]["collection"], "garage");
        assert_eq!(json["target_object"]["name"], "owner.jpg");
    }

    #[test]
    fn response_matches_are_parsed() {
        let body = br#"{"face_matches":[{"similarity":98.5},{"similarity":81.0}]}"#;
        let matches = parse_response(body).unwrap();

        assert_eq!(matches, vec![FaceMatch { similarity: 98.5 }, FaceMatch { similarity: 81.0 }]);
    }

    #[test]
    fn response_without_matches_is_empty() {
        assert!(parse_response(b"{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_response_is_invalid() {
        assert!(matches!(parse_response(b"<html>"), Err(CapabilityError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_capability_error() {
        let comparator =
            HttpComparator::new("http://127.0.0.1:9/compare", Duration::from_secs(2)).unwrap();

        let result = comparator.compare(b"src", FaceReference::Image(b"ref"), 80.0).await;

        assert!(matches!(result, Err(CapabilityError::Unreachable(_))));
    }
}
