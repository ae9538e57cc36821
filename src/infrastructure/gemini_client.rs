use crate::infrastructure::config::SummarizerConfig;
use crate::infrastructure::error::{InfraError, SummarizeError};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

pub const SUMMARY_FAILED_FALLBACK: &str = "<div>AI failed to summarize.</div>";
pub const REQUEST_FAILED_FALLBACK: &str = "<div>AI request failed.</div>";

const MINIMAL_PROMPT: &str = "\
You are an assistant that extracts and summarizes the most important content from a web page for focus mode.

Given the following HTML, do the following:
- Identify and keep the main content, headings, essential navigation, and ALL important interactive elements (such as primary action buttons like \"Buy\", \"Add to Cart\", \"Checkout\", and any other buttons or links necessary for the main functionality of the page).
- Analyze all images on the page. Sort them by their importance or relevance to the main content.
- Include only the most important images (with their alt text or captions if available) in the minimal HTML output.
- Remove ads, sidebars, popups, and non-essential elements that are not related to the main content or main actions.
- Respond ONLY with the minimal HTML structure (headings, paragraphs, important images, and interactive elements) needed for the main content.
- Do NOT include any <html>, <head>, <body>, or <style> tags.
- Do NOT include any CSS or inline styles.
- The output will be styled by the extension, so only return the content elements.
";

const CONTENT_ONLY_PROMPT: &str = "Summarize the main content of this page in plain, simple HTML. No extras, no navigation, no images, no buttons, just the core text and headings.\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Minimal HTML keeping images and interactive elements.
    Minimal,
    /// Core text and headings only.
    ContentOnly,
}

impl PromptVariant {
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Minimal => MINIMAL_PROMPT,
            Self::ContentOnly => CONTENT_ONLY_PROMPT,
        }
    }

    pub fn build_prompt(self, fragment: &str) -> String {
        format!("{}\nHTML:\n{fragment}\n", self.instruction())
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, fragment: &str, variant: PromptVariant) -> Result<String, SummarizeError>;
}

/// Single best-effort summarization; failures become the fixed fallback markup.
pub async fn summarize_or_fallback<S>(summarizer: &S, fragment: &str, variant: PromptVariant) -> String
where
    S: Summarizer + ?Sized,
{
    match summarizer.summarize(fragment, variant).await {
        Ok(text) => text,
        Err(error) => {
            tracing::warn!(kind = error.kind(), %error, "summarization fell back");
            match error {
                SummarizeError::EmptyResponse => SUMMARY_FAILED_FALLBACK.to_string(),
                SummarizeError::Transport(_) => REQUEST_FAILED_FALLBACK.to_string(),
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestGeminiClient {
    client: Client,
    endpoint: Url,
}

impl ReqwestGeminiClient {
    pub fn new(endpoint_base: &str, model: &str, api_key: &str) -> Result<Self, InfraError> {
        if api_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "summarizer api key must not be empty".to_string(),
            ));
        }
        let raw = format!(
            "{}/models/{}:generateContent",
            endpoint_base.trim_end_matches('/'),
            model.trim()
        );
        let mut endpoint = Url::parse(&raw).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid summarizer endpoint '{raw}': {error}"))
        })?;
        endpoint.query_pairs_mut().append_pair("key", api_key.trim());

        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    /// Reads the key from the environment variable the config names.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, InfraError> {
        Self::from_config_with_lookup(config, |name| std::env::var(name).ok())
    }

    fn from_config_with_lookup<F>(config: &SummarizerConfig, lookup: F) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(&config.api_key_env)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::InvalidConfig(format!(
                    "summarizer api key is missing; set {}",
                    config.api_key_env
                ))
            })?;
        Self::new(&config.endpoint, &config.model, &api_key)
    }
}

#[async_trait]
impl Summarizer for ReqwestGeminiClient {
    async fn summarize(&self, fragment: &str, variant: PromptVariant) -> Result<String, SummarizeError> {
        let prompt = variant.build_prompt(fragment);
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                SummarizeError::Transport(format!("network error while summarizing: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            SummarizeError::Transport(format!("failed reading summarize response: {error}"))
        })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "summarizer returned an error status");
        }

        // An error reply that still parses as JSON has no candidates and
        // counts as an empty summary, not a transport failure.
        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            SummarizeError::Transport(format!(
                "invalid summarize payload (http {}): {error}",
                status.as_u16()
            ))
        })?;
        parsed.first_text().ok_or(SummarizeError::EmptyResponse)
    }
}
