//! Vision-model analysis of captured pages
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint that accepts
//! image data URLs and `response_format = json_object`.

use crate::config::AnalysisConfig;
use crate::error::{NewsError, Result};
use crate::schema::Analysis;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

/// Turns a base64 PNG into structured fields
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, image_base64: &str) -> Result<Analysis>;
}

/// OpenAI chat-completions client
pub struct OpenAiAnalyzer {
    http: Client,
    api_key: String,
    config: AnalysisConfig,
}

impl OpenAiAnalyzer {
    pub fn new(http: Client, api_key: impl Into<String>, config: AnalysisConfig) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            config,
        }
    }

    fn request_body(&self, image_base64: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "You are a Helpful Assistant with the following characteristics: {}. \
                         Your task is to analyze the given website and provide a JSON response.",
                        self.config.system_prompt
                    ),
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": format!("{} Respond in JSON format.", self.config.user_prompt),
                        },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/png;base64,{}", image_base64) },
                        },
                    ],
                },
            ],
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" },
        })
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    #[instrument(level = "info", skip_all, fields(model = %self.config.model))]
    async fn analyze(&self, image_base64: &str) -> Result<Analysis> {
        info!(image_bytes = image_base64.len(), "Sending screenshot for analysis");

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.config.api_base.trim_end_matches('/')
            ))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.request_body(image_base64))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(status = status.as_u16(), "Analysis request failed");
            return Err(NewsError::Analysis {
                status: status.as_u16(),
                body,
            });
        }

        let analysis = parse_completion(&body)?;
        debug!(title = %analysis.title, "Analysis parsed");
        Ok(analysis)
    }
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Pull the first choice's content and decode it as an [`Analysis`]
pub fn parse_completion(body: &str) -> Result<Analysis> {
    let completion: Completion = serde_json::from_str(body)
        .map_err(|e| NewsError::MalformedAnalysis(format!("Unexpected response shape: {}", e)))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| NewsError::MalformedAnalysis("Response has no content".to_string()))?;

    parse_analysis(&content)
}

/// Decode the model's JSON object; non-string `date` values are kept as text
pub fn parse_analysis(content: &str) -> Result<Analysis> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| NewsError::MalformedAnalysis(format!("Content is not JSON: {}", e)))?;

    let field = |name: &str| -> Result<String> {
        match value.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) | None => Err(NewsError::MalformedAnalysis(format!(
                "Missing field `{}`",
                name
            ))),
            Some(other) => Ok(other.to_string()),
        }
    };

    Ok(Analysis {
        title: field("title")?,
        date: field("date")?,
        text: field("text")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    #[test]
    fn test_parse_completion() {
        let body = completion(r#"{"title":"Listing","date":"Nov 20, 2024","text":"Body"}"#);
        let analysis = parse_completion(&body).unwrap();
        assert_eq!(analysis.title, "Listing");
        assert_eq!(analysis.date, "Nov 20, 2024");
        assert_eq!(analysis.text, "Body");
    }

    #[test]
    fn test_content_not_json() {
        let body = completion("Sure! Here is the title: Listing");
        assert!(matches!(
            parse_completion(&body),
            Err(NewsError::MalformedAnalysis(_))
        ));
    }

    #[test]
    fn test_missing_field() {
        let body = completion(r#"{"title":"Listing","text":"Body"}"#);
        let err = parse_completion(&body).unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn test_no_choices() {
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let analyzer = OpenAiAnalyzer::new(Client::new(), "key", AnalysisConfig::default());
        let body = analyzer.request_body("QUJD");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 10000);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }
}
