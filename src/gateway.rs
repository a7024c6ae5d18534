//! Prompt construction and the outbound AI gateway call backing the
//! analysis endpoint. Stateless: one request in, one completion out.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::{error, info};

pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Returned when the provider response shape carries no text content.
pub const FALLBACK_ANALYSIS: &str = "Unable to analyze image";

/// Wire shape of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_url: String,
    pub analysis_type: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeErrorResponse {
    pub error: String,
}

/// Client-visible failure of one analysis request, carrying the HTTP
/// status the endpoint responds with.
#[derive(Debug)]
pub enum GatewayError {
    RateLimited,
    CreditsExhausted,
    Upstream(u16),
    Request(String),
    MissingKey,
}

impl GatewayError {
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::RateLimited => 429,
            GatewayError::CreditsExhausted => 402,
            GatewayError::Upstream(_) | GatewayError::Request(_) | GatewayError::MissingKey => 500,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GatewayError::RateLimited => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            GatewayError::CreditsExhausted => {
                "Credits exhausted. Please add credits to continue.".to_string()
            }
            GatewayError::Upstream(status) => format!("AI gateway error: {}", status),
            GatewayError::Request(msg) => msg.clone(),
            GatewayError::MissingKey => "AI gateway API key is not configured".to_string(),
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            429 => GatewayError::RateLimited,
            402 => GatewayError::CreditsExhausted,
            other => GatewayError::Upstream(other),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for GatewayError {}

/// Language directive appended to every system prompt, asking the model
/// to answer in the farmer's language. Unknown codes fall back to English.
pub fn language_directive(language: &str) -> &'static str {
    match language {
        "hi" => "हिंदी में जवाब दें",
        "te" => "తెలుగులో సమాధానం ఇవ్వండి",
        "ta" => "தமிழில் பதிலளிக்கவும்",
        "kn" => "ಕನ್ನಡದಲ್ಲಿ ಉತ್ತರಿಸಿ",
        "ml" => "മലയാളത്തിൽ മറുപടി നൽകുക",
        "mr" => "मराठीत उत्तर द्या",
        "gu" => "ગુજરાતીમાં જવાબ આપો",
        "bn" => "বাংলায় উত্তর দিন",
        "pa" => "ਪੰਜਾਬੀ ਵਿੱਚ ਜਵਾਬ ਦਿਓ",
        "or" => "ଓଡ଼ିଆରେ ଉତ୍ତର ଦିଅନ୍ତୁ",
        _ => "Respond in English",
    }
}

/// Build the role-specific system prompt for one analysis request.
pub fn system_prompt(analysis_type: &str, language: &str) -> String {
    let directive = language_directive(language);

    let body = match analysis_type {
        "pest" => {
            "You are an expert agricultural entomologist and pest management specialist helping Indian farmers.\n\
             Analyze the image and identify any pests, insects, or pest damage visible.\n\
             Provide:\n\
             1. Pest identification (name and type)\n\
             2. Severity assessment (mild/moderate/severe)\n\
             3. Damage caused to crops\n\
             4. Organic control methods\n\
             5. Chemical control methods (with safety precautions)\n\
             6. Preventive measures for future"
        }
        "soil" => {
            "You are an expert soil scientist and agronomist helping Indian farmers.\n\
             Analyze the image of the soil sample and provide:\n\
             1. Soil type identification (clay, sandy, loamy, etc.)\n\
             2. Visual health indicators\n\
             3. Potential nutrient deficiencies based on color/texture\n\
             4. Recommended crops suitable for this soil\n\
             5. Soil improvement suggestions (organic methods preferred)\n\
             6. Irrigation and drainage recommendations"
        }
        "disease" => {
            "You are an expert plant pathologist helping Indian farmers identify and treat crop diseases.\n\
             Analyze the image and identify any plant diseases or health issues visible.\n\
             Provide:\n\
             1. Disease identification (name and cause - fungal/bacterial/viral)\n\
             2. Affected plant part and severity\n\
             3. How it spreads\n\
             4. Organic treatment options\n\
             5. Chemical treatment options (with safety precautions)\n\
             6. Prevention strategies"
        }
        _ => {
            "You are an expert agricultural advisor helping Indian farmers.\n\
             Analyze the image and provide helpful insights about what you see."
        }
    };

    format!(
        "{}\n\nBe friendly, empathetic, and speak like a trusted farming friend.\n{}",
        body, directive
    )
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Client for the external multimodal chat-completion provider.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    url: String,
    model: String,
    api_key: String,
}

impl GatewayClient {
    pub fn new(url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Forward one analysis request to the provider and extract the first
    /// completion's text.
    pub async fn analyze(&self, req: &AnalyzeRequest) -> Result<String, GatewayError> {
        info!(
            analysis_type = %req.analysis_type,
            language = %req.language,
            "Forwarding analysis request to AI gateway"
        );

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": system_prompt(&req.analysis_type, &req.language),
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": "Please analyze this image and provide detailed agricultural guidance.",
                        },
                        {
                            "type": "image_url",
                            "image_url": { "url": req.image_url },
                        },
                    ],
                },
            ],
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            error!(status, body = %text, "AI gateway error");
            return Err(GatewayError::from_status(status));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let analysis = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_else(|| FALLBACK_ANALYSIS.to_string());

        info!("Analysis completed successfully");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pest_prompt_in_hindi_carries_directive_and_pest_block() {
        let prompt = system_prompt("pest", "hi");
        assert!(prompt.contains("हिंदी में जवाब दें"));
        assert!(prompt.contains("pest management specialist"));
        assert!(prompt.contains("Organic control methods"));
    }

    #[test]
    fn unknown_language_falls_back_to_english_directive() {
        let prompt = system_prompt("soil", "fr");
        assert!(prompt.contains("Respond in English"));
        assert!(prompt.contains("soil scientist"));
    }

    #[test]
    fn unknown_analysis_type_uses_general_advisor_prompt() {
        let prompt = system_prompt("weather", "en");
        assert!(prompt.contains("expert agricultural advisor"));
        assert!(!prompt.contains("plant pathologist"));
    }

    #[test]
    fn status_mapping_distinguishes_rate_limit_from_generic() {
        let rate_limited = GatewayError::from_status(429);
        let generic = GatewayError::from_status(503);

        assert_eq!(rate_limited.status(), 429);
        assert_eq!(generic.status(), 500);
        assert_ne!(rate_limited.message(), generic.message());
        assert!(rate_limited.message().contains("Rate limit"));
    }

    #[test]
    fn credits_exhausted_maps_to_402() {
        let err = GatewayError::from_status(402);
        assert_eq!(err.status(), 402);
        assert!(err.message().contains("Credits exhausted"));
    }

    #[test]
    fn analyze_request_uses_camel_case_on_the_wire() {
        let req = AnalyzeRequest {
            image_url: "https://example.com/leaf.jpg".to_string(),
            analysis_type: "pest".to_string(),
            language: "hi".to_string(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("imageUrl").is_some());
        assert!(value.get("analysisType").is_some());
    }
}
