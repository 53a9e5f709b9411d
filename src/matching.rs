use log::{debug, error, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

use crate::ai::GenerativeModel;
use crate::credentials::CredentialStore;
use crate::models::{Analysis, AnalysisResult};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Please provide a resume before analyzing")]
    MissingInput,
    #[error("API key not found")]
    MissingCredential,
    #[error("Failed to analyze match. Please try again.")]
    RequestFailed(#[source] anyhow::Error),
    #[error("Invalid response format")]
    InvalidResponseFormat(#[source] serde_json::Error),
    #[error("Invalid analysis result received")]
    InvalidResponseShape(String),
}

pub struct MatchAnalyzer {
    credentials: CredentialStore,
    model: Arc<dyn GenerativeModel>,
}

impl MatchAnalyzer {
    pub fn new(credentials: CredentialStore, model: Arc<dyn GenerativeModel>) -> Self {
        Self { credentials, model }
    }

    /// Scores a resume against a job description with one model request.
    ///
    /// The job description may be empty. Nothing is sent when the resume is
    /// empty or no credential is stored. A failed request is not retried.
    pub fn analyze(&self, resume: &str, job_description: &str) -> Result<AnalysisResult, AnalysisError> {
        if resume.trim().is_empty() {
            return Err(AnalysisError::MissingInput);
        }
        let credential = self
            .credentials
            .get()
            .ok_or(AnalysisError::MissingCredential)?;

        if job_description.trim().is_empty() {
            warn!("analyzing without a job description");
        }

        let prompt = build_prompt(resume, job_description);
        info!(
            "requesting match analysis from {} (resume {} chars, job {} chars)",
            self.model.model_name(),
            resume.len(),
            job_description.len()
        );

        let text = self.model.generate(&credential, &prompt).map_err(|e| {
            error!("analysis request failed: {:#}", e);
            AnalysisError::RequestFailed(e)
        })?;
        debug!("raw model response: {}", text);

        let result = decode_response(&text)?;
        info!("match analysis complete: {}%", result.match_percentage);
        Ok(result)
    }
}

pub fn build_prompt(resume: &str, job_description: &str) -> String {
    format!(
        "Analyze how well this resume matches the job description.\n\
        Respond with ONLY a valid JSON object: no prose, no backticks, no markdown formatting.\n\n\
        Format:\n\
        {{\n\
          \"matchPercentage\": (number between 0-100),\n\
          \"analysis\": {{\n\
            \"skills\": {{\n\
              \"matching\": [],\n\
              \"missing\": []\n\
            }},\n\
            \"experience\": {{\n\
              \"analysis\": \"\"\n\
            }}\n\
          }},\n\
          \"suggestions\": []\n\
        }}\n\n\
        Resume: {}\n\
        Job Description: {}\n",
        resume, job_description
    )
}

// A fence opens or closes the whole reply, or sits on a line of its own.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\A\s*```[\w+-]*|^[ \t]*```[\w+-]*[ \t]*$|```\s*\z").unwrap());

/// Removes Markdown code-fence markers, with or without a language tag.
/// Backticks inside the JSON itself are left alone.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysisResult {
    match_percentage: f64,
    analysis: Option<Analysis>,
    suggestions: Option<Vec<String>>,
}

/// The single decoding boundary between model output and the rest of the app.
///
/// `matchPercentage` must be a number in [0, 100]. Missing nested fields
/// default to empty; nested fields of the wrong type are rejected.
pub fn decode_response(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let cleaned = strip_code_fences(text);

    let value: serde_json::Value = serde_json::from_str(&cleaned).map_err(|e| {
        error!("failed to parse analysis: {}", e);
        AnalysisError::InvalidResponseFormat(e)
    })?;

    if !value.is_object() {
        return Err(AnalysisError::InvalidResponseShape(
            "response is not a JSON object".to_string(),
        ));
    }

    let raw: RawAnalysisResult = serde_json::from_value(value).map_err(|e| {
        error!("analysis has unexpected shape: {}", e);
        AnalysisError::InvalidResponseShape(e.to_string())
    })?;

    if !(0.0..=100.0).contains(&raw.match_percentage) {
        return Err(AnalysisError::InvalidResponseShape(format!(
            "matchPercentage {} outside 0-100",
            raw.match_percentage
        )));
    }

    Ok(AnalysisResult {
        match_percentage: raw.match_percentage.round() as u8,
        analysis: raw.analysis.unwrap_or_default(),
        suggestions: raw.suggestions.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;
    use crate::db::Database;
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct FakeModel {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl GenerativeModel for FakeModel {
        fn generate(&self, _credential: &Credential, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow!(e))
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn analyzer(model: Arc<FakeModel>, with_key: bool) -> MatchAnalyzer {
        let credentials = CredentialStore::new(Arc::new(Database::open_in_memory().unwrap()));
        if with_key {
            credentials.set("test-key").unwrap();
        }
        MatchAnalyzer::new(credentials, model)
    }

    const FULL_RESPONSE: &str = r#"{
        "matchPercentage": 72,
        "analysis": {
            "skills": {"matching": ["Rust", "SQL"], "missing": ["Kubernetes"]},
            "experience": {"analysis": "Solid backend background."}
        },
        "suggestions": ["Mention container work"]
    }"#;

    #[test]
    fn test_analyze_empty_resume_is_missing_input_without_request() {
        let model = FakeModel::replying(FULL_RESPONSE);
        let analyzer = analyzer(model.clone(), true);

        let result = analyzer.analyze("", "any job text");
        assert!(matches!(result, Err(AnalysisError::MissingInput)));

        let result = analyzer.analyze("  \n ", "any job text");
        assert!(matches!(result, Err(AnalysisError::MissingInput)));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_analyze_without_credential_is_missing_credential_without_request() {
        let model = FakeModel::replying(FULL_RESPONSE);
        let analyzer = analyzer(model.clone(), false);

        let result = analyzer.analyze("Rust engineer", "Backend role");
        assert!(matches!(result, Err(AnalysisError::MissingCredential)));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_analyze_returns_decoded_result_and_embeds_inputs() {
        let model = FakeModel::replying(FULL_RESPONSE);
        let analyzer = analyzer(model.clone(), true);

        let result = analyzer.analyze("Jane: Rust, SQL", "Needs Rust and Kubernetes").unwrap();
        assert_eq!(result.match_percentage, 72);
        assert_eq!(result.analysis.skills.matching, vec!["Rust", "SQL"]);
        assert_eq!(result.analysis.skills.missing, vec!["Kubernetes"]);
        assert_eq!(result.analysis.experience.analysis, "Solid backend background.");
        assert_eq!(result.suggestions, vec!["Mention container work"]);

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Resume: Jane: Rust, SQL"));
        assert!(prompts[0].contains("Job Description: Needs Rust and Kubernetes"));
        assert!(prompts[0].contains("ONLY a valid JSON object"));
    }

    #[test]
    fn test_analyze_accepts_empty_job_description() {
        let model = FakeModel::replying(r#"{"matchPercentage": 10}"#);
        let analyzer = analyzer(model.clone(), true);

        let result = analyzer.analyze("Rust engineer", "").unwrap();
        assert_eq!(result.match_percentage, 10);
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_analyze_request_failure_is_uniform() {
        let model = FakeModel::failing("status 429 Too Many Requests");
        let analyzer = analyzer(model.clone(), true);

        let err = analyzer.analyze("Rust engineer", "Backend role").unwrap_err();
        assert!(matches!(err, AnalysisError::RequestFailed(_)));
        assert_eq!(err.to_string(), "Failed to analyze match. Please try again.");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_analyze_prose_response_is_invalid_format() {
        let model = FakeModel::replying("Sure! The candidate is a great fit.");
        let analyzer = analyzer(model, true);

        let err = analyzer.analyze("Rust engineer", "Backend role").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseFormat(_)));
    }

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let text = "```json\n{\"matchPercentage\":80}\n```";
        assert_eq!(strip_code_fences(text), "{\"matchPercentage\":80}");
        assert_eq!(decode_response(text).unwrap().match_percentage, 80);
    }

    #[test]
    fn test_strip_code_fences_without_language_tag() {
        let text = "```\n{\"matchPercentage\": 55, \"suggestions\": [\"a\"]}\n```\n";
        let result = decode_response(text).unwrap();
        assert_eq!(result.match_percentage, 55);
        assert_eq!(result.suggestions, vec!["a"]);
    }

    #[test]
    fn test_backticks_inside_json_strings_survive() {
        let text = "```json\n{\"matchPercentage\": 70, \"suggestions\": [\"Wrap samples in ```rust blocks\"]}\n```";
        let result = decode_response(text).unwrap();
        assert_eq!(result.suggestions, vec!["Wrap samples in ```rust blocks"]);
    }

    #[test]
    fn test_fences_on_a_single_line_are_stripped() {
        assert_eq!(strip_code_fences("```json{\"matchPercentage\": 5}```"), "{\"matchPercentage\": 5}");
    }

    #[test]
    fn test_unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_missing_match_percentage_is_invalid_shape() {
        let err = decode_response(r#"{"analysis": {}, "suggestions": []}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseShape(_)));
    }

    #[test]
    fn test_non_numeric_match_percentage_is_invalid_shape() {
        let err = decode_response(r#"{"matchPercentage": "80"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseShape(_)));

        let err = decode_response(r#"{"matchPercentage": null}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseShape(_)));
    }

    #[test]
    fn test_out_of_range_match_percentage_is_invalid_shape() {
        assert!(matches!(
            decode_response(r#"{"matchPercentage": 130}"#),
            Err(AnalysisError::InvalidResponseShape(_))
        ));
        assert!(matches!(
            decode_response(r#"{"matchPercentage": -1}"#),
            Err(AnalysisError::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn test_fractional_match_percentage_is_rounded() {
        assert_eq!(decode_response(r#"{"matchPercentage": 79.6}"#).unwrap().match_percentage, 80);
        assert_eq!(decode_response(r#"{"matchPercentage": 100.0}"#).unwrap().match_percentage, 100);
    }

    #[test]
    fn test_non_object_response_is_invalid_shape() {
        assert!(matches!(
            decode_response("[80]"),
            Err(AnalysisError::InvalidResponseShape(_))
        ));
        assert!(matches!(
            decode_response("80"),
            Err(AnalysisError::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn test_missing_nested_fields_default_to_empty() {
        let result = decode_response(r#"{"matchPercentage": 40, "analysis": {"skills": {"matching": ["Go"]}}}"#).unwrap();
        assert_eq!(result.analysis.skills.matching, vec!["Go"]);
        assert!(result.analysis.skills.missing.is_empty());
        assert_eq!(result.analysis.experience.analysis, "");
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_null_fields_default_to_empty_at_any_depth() {
        let text = r#"{"matchPercentage": 40, "suggestions": null,
            "analysis": {"skills": {"matching": null, "missing": ["Go"]}, "experience": {"analysis": null}}}"#;
        let result = decode_response(text).unwrap();
        assert!(result.suggestions.is_empty());
        assert!(result.analysis.skills.matching.is_empty());
        assert_eq!(result.analysis.skills.missing, vec!["Go"]);
        assert_eq!(result.analysis.experience.analysis, "");

        let result = decode_response(r#"{"matchPercentage": 40, "analysis": {"skills": null, "experience": null}}"#).unwrap();
        assert_eq!(result.analysis, Analysis::default());
    }

    #[test]
    fn test_wrongly_typed_nested_field_is_invalid_shape() {
        let err = decode_response(r#"{"matchPercentage": 40, "suggestions": "learn k8s"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseShape(_)));

        let err = decode_response(r#"{"matchPercentage": 40, "analysis": {"skills": {"matching": "Go"}}}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseShape(_)));
    }
}
