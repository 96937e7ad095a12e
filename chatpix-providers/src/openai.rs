//! OpenAI-compatible HTTP client implementation

use async_trait::async_trait;
use chatpix_core::{Message, Role};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::base::{
    GeneratedImage, ImageProvider, ImageRequest, ImageResponse, LLMProvider, LLMResponse,
    ProviderError, ProviderResult,
};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

/// Image generation response body
#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

/// Error envelope returned by OpenAI-compatible APIs
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// OpenAI-compatible provider client
pub struct OpenAIClient {
    client: Client,
    api_base: String,
    api_key: String,
    extra_headers: HashMap<String, String>,
}

impl OpenAIClient {
    /// Create a new client
    ///
    /// A blank API key is rejected up front instead of sending
    /// unauthenticated requests.
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        extra_headers: Option<HashMap<String, String>>,
    ) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::ConfigError("API key is empty".to_string()));
        }

        let api_base = api_base
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            client: Client::builder()
                .http1_only() // Force HTTP/1.1 to avoid issues with some local servers
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base,
            api_key,
            extra_headers: extra_headers.unwrap_or_default(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req_builder = req_builder.header("Authorization", format!("Bearer {}", self.api_key));

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    /// Send a JSON POST and decode a successful body, mapping error statuses
    async fn post_json<B, R>(&self, path: &str, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_base, path);
        let response = self
            .apply_headers(self.client.post(&url).json(body))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn parse_chat_response(response: ChatCompletionResponse) -> ProviderResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        let mut usage = HashMap::new();
        usage.insert("prompt_tokens".to_string(), response.usage.prompt_tokens);
        usage.insert(
            "completion_tokens".to_string(),
            response.usage.completion_tokens,
        );
        usage.insert("total_tokens".to_string(), response.usage.total_tokens);

        Ok(LLMResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }

    fn parse_image_response(response: ImageGenerationResponse) -> ProviderResult<ImageResponse> {
        let images: Vec<GeneratedImage> = response
            .data
            .into_iter()
            .filter_map(|item| {
                item.url.map(|url| GeneratedImage {
                    url,
                    revised_prompt: item.revised_prompt,
                })
            })
            .collect();

        if images.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No image URL in response".to_string(),
            ));
        }
        Ok(ImageResponse { images })
    }
}

/// Build an `ApiError` from a non-success response body
fn parse_api_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope
                .error
                .code
                .and_then(|code| match code {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                })
                .or(envelope.error.error_type);
            let message = if envelope.error.message.is_empty() {
                format!("HTTP {}", status)
            } else {
                envelope.error.message
            };
            ProviderError::ApiError {
                status,
                code,
                message,
            }
        }
        Err(_) => ProviderError::ApiError {
            status,
            code: None,
            message: if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn chat(&self, messages: &[Message], model: &str) -> ProviderResult<LLMResponse> {
        let request = ChatCompletionRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
        };

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            self.api_base,
            request.model,
            request.messages.len()
        );

        let response: ChatCompletionResponse =
            self.post_json("chat/completions", &request).await?;
        Self::parse_chat_response(response)
    }
}

#[async_trait]
impl ImageProvider for OpenAIClient {
    async fn generate_image(&self, request: ImageRequest) -> ProviderResult<ImageResponse> {
        debug!(
            "Sending image request to {} with model {} (size {}, n {})",
            self.api_base, request.model, request.size, request.n
        );

        let response: ImageGenerationResponse =
            self.post_json("images/generations", &request).await?;
        Self::parse_image_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> OpenAIClient {
        OpenAIClient::new("sk-test", Some(server.url()), None).unwrap()
    }

    #[test]
    fn test_new_rejects_blank_key() {
        let result = OpenAIClient::new("  ", None, None);
        assert!(matches!(result, Err(ProviderError::ConfigError(_))));
    }

    #[test]
    fn test_new_normalizes_api_base() {
        let client = OpenAIClient::new(
            "sk-test",
            Some("http://localhost:8080/v1/".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(client.api_base(), "http://localhost:8080/v1");

        let client =
            OpenAIClient::new("sk-test", Some(" ".to_string()), None).unwrap();
        assert_eq!(client.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_parse_api_error_envelope() {
        let body = r#"{"error":{"message":"Your request was rejected as a result of our safety system.","type":"invalid_request_error","code":"content_policy_violation"}}"#;
        match parse_api_error(400, body) {
            ProviderError::ApiError {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("content_policy_violation"));
                assert!(message.contains("safety system"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_api_error_falls_back_to_type_and_raw_body() {
        let body = r#"{"error":{"message":"bad key","type":"invalid_api_key","code":null}}"#;
        match parse_api_error(401, body) {
            ProviderError::ApiError { code, .. } => {
                assert_eq!(code.as_deref(), Some("invalid_api_key"))
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match parse_api_error(502, "<html>Bad Gateway</html>") {
            ProviderError::ApiError {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert_eq!(message, "<html>Bad Gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_sends_ordered_context() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "What is 2+2?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"4"},"finish_reason":"stop"}],"usage":{"prompt_tokens":12,"completion_tokens":1,"total_tokens":13}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let messages = vec![Message::system("sys"), Message::user("What is 2+2?")];
        let response = client.chat(&messages, "gpt-4o").await.unwrap();

        assert_eq!(response.content.as_deref(), Some("4"));
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.get("total_tokens"), Some(&13));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_uses_requested_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4o-mini"})))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"hi"},"finish_reason":null}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .chat(&[Message::user("hi")], "gpt-4o-mini")
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("hi"));
        assert_eq!(response.finish_reason, "stop");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_without_choices_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.chat(&[Message::user("hi")], "gpt-4o").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_chat_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.chat(&[Message::user("hi")], "gpt-4o").await.unwrap_err();
        match err {
            ProviderError::ApiError { status, code, .. } => {
                assert_eq!(status, 429);
                assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_image_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/images/generations")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({
                "model": "dall-e-3",
                "prompt": "Generate an image of a sunset",
                "n": 1,
                "size": "1024x1024"
            })))
            .with_status(200)
            .with_body(
                r#"{"created":1700000000,"data":[{"url":"https://images.example/sunset.png","revised_prompt":"A sunset"}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .generate_image(ImageRequest {
                model: "dall-e-3".to_string(),
                prompt: "Generate an image of a sunset".to_string(),
                n: 1,
                size: "1024x1024".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.first_url(), Some("https://images.example/sunset.png"));
        assert_eq!(response.images[0].revised_prompt.as_deref(), Some("A sunset"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_image_without_url_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(r#"{"data":[{"b64_json":"aGVsbG8="}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image(ImageRequest {
                model: "dall-e-3".to_string(),
                prompt: "draw a cat picture".to_string(),
                n: 1,
                size: "1024x1024".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image(ImageRequest {
                model: "dall-e-3".to_string(),
                prompt: "make art".to_string(),
                n: 1,
                size: "1024x1024".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::JsonError(_)));
    }
}
