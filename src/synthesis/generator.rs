//! Test body generator port and its HTTP client.
//!
//! The generator is a best-effort collaborator: every failure is a
//! [`SynthesisError`] that makes the caller fall back to template tests for
//! the affected target.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::frameworks::Framework;
use super::targets::TargetMetadata;
use super::{TestCase, TestSource, TestType};
use crate::error::SynthesisError;
use crate::language::Language;

/// Per-request generation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Upper bound on tests returned per target.
    pub max_tests: usize,
    pub include_edge_cases: bool,
    pub model: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tests: 5,
            include_edge_cases: true,
            model: None,
        }
    }
}

/// Produces candidate tests for one target.
#[async_trait]
pub trait TestBodyGenerator: Send + Sync {
    /// Whether calls should be attempted at all.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        snippet: &str,
        language: Language,
        framework: Framework,
        target: &TargetMetadata,
        options: &GenerateOptions,
    ) -> Result<Vec<TestCase>, SynthesisError>;
}

/// Generator used when no AI endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl TestBodyGenerator for DisabledGenerator {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _snippet: &str,
        _language: Language,
        _framework: Framework,
        _target: &TargetMetadata,
        _options: &GenerateOptions,
    ) -> Result<Vec<TestCase>, SynthesisError> {
        Err(SynthesisError::Disabled)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    snippet: &'a str,
    language: Language,
    framework: Framework,
    target: &'a TargetMetadata,
    options: &'a GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    tests: Vec<GeneratedBody>,
}

#[derive(Deserialize)]
struct GeneratedBody {
    name: String,
    #[serde(rename = "type", default)]
    test_type: Option<String>,
    body: String,
}

/// Posts generation requests as JSON to an HTTP endpoint.
pub struct HttpTestGenerator {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpTestGenerator {
    /// Build a client for `endpoint`. The bearer token, if any, is read
    /// from the environment variable `token_env`.
    pub fn new(endpoint: &str, token_env: Option<&str>, timeout: Duration) -> Result<Self, SynthesisError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("testsynth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SynthesisError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        let token = token_env
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.trim().is_empty());

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            token,
            timeout,
        })
    }
}

#[async_trait]
impl TestBodyGenerator for HttpTestGenerator {
    async fn generate(
        &self,
        snippet: &str,
        language: Language,
        framework: Framework,
        target: &TargetMetadata,
        options: &GenerateOptions,
    ) -> Result<Vec<TestCase>, SynthesisError> {
        let body = GenerateRequest {
            snippet,
            language,
            framework,
            target,
            options,
        };

        let mut request = self.http.post(&self.endpoint).timeout(self.timeout).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SynthesisError::Timeout(self.timeout)
            } else {
                SynthesisError::from(e)
            }
        })?;

        match response.status().as_u16() {
            200..=299 => {}
            429 => return Err(SynthesisError::RateLimited),
            status => return Err(SynthesisError::Unavailable(format!("HTTP {}", status))),
        }

        let parsed: GenerateResponse = response.json().await?;
        let tests = convert(parsed, &target.name, framework, options.max_tests);
        debug!(name = %target.name, count = tests.len(), "generator returned tests");
        Ok(tests)
    }
}

/// Turn a generator response into test cases, dropping blank entries.
fn convert(response: GenerateResponse, target: &str, framework: Framework, max_tests: usize) -> Vec<TestCase> {
    response
        .tests
        .into_iter()
        .filter(|t| !t.name.trim().is_empty() && !t.body.trim().is_empty())
        .take(max_tests)
        .map(|t| TestCase {
            id: String::new(),
            name: t.name.trim().to_string(),
            test_type: t
                .test_type
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(TestType::Unit),
            target: target.to_string(),
            framework: framework.to_string(),
            body: t.body.trim_end().to_string(),
            source: TestSource::Ai,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::TargetKind;

    fn metadata() -> TargetMetadata {
        TargetMetadata {
            name: "add".to_string(),
            owner: None,
            kind: TargetKind::Function,
            parameters: Vec::new(),
            return_type: None,
            complexity: 1,
            is_async: false,
            dependencies: Vec::new(),
            integration: false,
            test_candidates: Vec::new(),
        }
    }

    #[test]
    fn test_convert_response() {
        let json = r#"{"tests": [
            {"name": "adds numbers", "type": "unit", "body": "expect(add(1, 2)).toBe(3);\n"},
            {"name": "handles NaN", "type": "edge-case", "body": "expect(add(NaN, 1)).toBeNaN();"},
            {"name": "mystery", "type": "fuzz", "body": "add();"},
            {"name": " ", "body": "ignored"}
        ]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        let tests = convert(response, "add", Framework::Jest, 10);

        assert_eq!(tests.len(), 3);
        assert_eq!(tests[0].body, "expect(add(1, 2)).toBe(3);");
        assert_eq!(tests[1].test_type, TestType::EdgeCase);
        assert_eq!(tests[2].test_type, TestType::Unit, "unknown types default to unit");
        assert!(tests.iter().all(|t| t.source == TestSource::Ai && t.target == "add"));
    }

    #[test]
    fn test_convert_respects_max_tests() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"tests": [{"name": "a", "body": "x"}, {"name": "b", "body": "y"}]}"#).unwrap();
        assert_eq!(convert(response, "f", Framework::Pytest, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_generator() {
        let generator = DisabledGenerator;
        assert!(!generator.is_enabled());
        let result = generator
            .generate("", Language::Python, Framework::Pytest, &metadata(), &GenerateOptions::default())
            .await;
        assert_eq!(result, Err(SynthesisError::Disabled));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let generator =
            HttpTestGenerator::new("http://127.0.0.1:9/generate", None, Duration::from_secs(2)).unwrap();
        let result = generator
            .generate("def f(): pass", Language::Python, Framework::Pytest, &metadata(), &GenerateOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(SynthesisError::Unavailable(_)) | Err(SynthesisError::Timeout(_))
        ));
    }
}
