use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::credentials::Credential;

// --- Model trait ---

pub trait GenerativeModel: Send + Sync {
    fn generate(&self, credential: &Credential, prompt: &str) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub model_id: String,
    pub short_name: String,
}

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (model_id, short_name) = match name {
        "gemini-1.5-pro" | "pro" => ("gemini-1.5-pro", "pro"),
        "gemini-1.5-flash" | "flash" => ("gemini-1.5-flash", "flash"),
        "gemini-2.0-flash" | "flash-2" => ("gemini-2.0-flash", "flash-2"),
        "gemini-2.5-pro" | "pro-2.5" => ("gemini-2.5-pro", "pro-2.5"),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: pro (default, gemini-1.5-pro), flash, flash-2, pro-2.5",
                name
            ));
        }
    };
    Ok(ModelSpec {
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    })
}

// --- Gemini provider ---

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug)]
pub struct GeminiProvider {
    endpoint: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl GeminiProvider {
    pub fn new(spec: &ModelSpec, endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model_id: spec.model_id.clone(),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model_id)
    }
}

impl GenerativeModel for GeminiProvider {
    fn generate(&self, credential: &Credential, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", credential.expose())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Gemini API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: GeminiResponse = response
            .json()
            .context("Failed to parse Gemini API response")?;

        response_text(api_response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

fn response_text(response: GeminiResponse) -> Result<String> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .ok_or_else(|| anyhow!("No candidates in Gemini API response"))?;

    Ok(content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join(""))
}
