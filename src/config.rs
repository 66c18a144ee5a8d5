//! Runtime configuration
//!
//! Built once at startup (defaults, optionally overridden by a YAML file)
//! and passed by reference into every component.

use crate::error::{NewsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an intelligent assistant capable of analyzing visual content from website screenshots. \
Your role is to extract meaningful and structured information such as titles, dates, and text content from the provided visual input. \
Focus on providing accurate results while maintaining the original structure and details visible in the image.";

pub const DEFAULT_USER_PROMPT: &str = "Analyze the provided screenshot and extract the following information: \
1. Title: The title of the page or article, as shown in the screenshot; \
2. Date: The date of publication, exactly as it appears in the screenshot; \
3. Text: The complete text content of the publication, without paraphrasing or modifying the original text. \
Ensure that the extracted information matches the screenshot accurately and is clearly formatted in JSON with fields: \
'title': str, 'date': str, 'text': str.";

/// Upper bound for the pause between listing pages
pub const MAX_DELAY_SECS: f64 = 300.0;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix joined with relative article links
    pub base_url: String,
    /// Page scanned for pagination controls
    pub listing_url: String,
    /// Paginated listing URL; `{page}` is replaced by the page number
    pub page_url_template: String,
    /// CSS selector for one listing item
    pub item_selector: String,
    /// CSS selector for pagination links
    pub pagination_selector: String,
    pub max_scrolls: u32,
    /// Skip pagination discovery and fetch exactly this many pages
    pub max_pages: Option<u32>,
    pub viewport: ViewportSize,
    pub navigation_timeout_ms: u64,
    pub delay: DelayRange,
    pub analysis: AnalysisConfig,
}

/// Browser viewport in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Random pause between listing page fetches, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.okx.com".to_string(),
            listing_url: "https://www.okx.com/help/category/announcements".to_string(),
            page_url_template:
                "https://www.okx.com/help/section/announcements-latest-announcements/page/{page}"
                    .to_string(),
            item_selector: ".index_articleItem__d-8iK".to_string(),
            pagination_selector: "a".to_string(),
            max_scrolls: 10,
            max_pages: None,
            viewport: ViewportSize::default(),
            navigation_timeout_ms: 30000,
            delay: DelayRange::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1800,
            height: 1200,
        }
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_secs: 0.1,
            max_secs: 2.0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 10000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load from an optional YAML file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_scrolls == 0 {
            return Err(NewsError::InvalidConfig(
                "max_scrolls must be at least 1".to_string(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(NewsError::InvalidConfig(
                "max_pages must be at least 1".to_string(),
            ));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(NewsError::InvalidConfig(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        let delay = self.delay;
        if !delay.min_secs.is_finite()
            || !delay.max_secs.is_finite()
            || delay.min_secs < 0.0
            || delay.max_secs < delay.min_secs
            || delay.max_secs > MAX_DELAY_SECS
        {
            return Err(NewsError::InvalidConfig(format!(
                "delay range [{}, {}] is invalid",
                delay.min_secs, delay.max_secs
            )));
        }
        Ok(())
    }

    /// URL of listing page `page` (1-based)
    pub fn page_url(&self, page: u32) -> String {
        if self.page_url_template.contains("{page}") {
            self.page_url_template.replace("{page}", &page.to_string())
        } else {
            format!("{}{}", self.page_url_template, page)
        }
    }
}

/// Read the analysis API key from the environment
pub fn api_key_from_env() -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| NewsError::InvalidConfig("OPENAI_API_KEY is not set".to_string()))
}
