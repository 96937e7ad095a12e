//! Router: sends each submission to chat completion or image generation

use chatpix_core::config::Config;
use chatpix_core::utils::truncate;
use chatpix_core::Conversation;
use chatpix_providers::{ImageProvider, ImageRequest, LLMProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::intent::{classify, Intent};
use crate::turn::{FailureKind, Reply, Turn, TurnFailure};

/// Fixed parameters for image generation calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    pub model: String,
    pub size: String,
    pub count: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            count: 1,
        }
    }
}

/// Model selection for both branches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    pub chat_model: String,
    pub image: ImageSettings,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o".to_string(),
            image: ImageSettings::default(),
        }
    }
}

impl From<&Config> for RouterSettings {
    fn from(config: &Config) -> Self {
        Self {
            chat_model: config.chat.model.clone(),
            image: ImageSettings {
                model: config.image.model.clone(),
                size: config.image.size.clone(),
                count: config.image.count,
            },
        }
    }
}

/// Routes user submissions and keeps the conversation up to date
///
/// The router holds no conversation state itself; the caller owns the
/// [`Conversation`] and lends it for the length of one turn.
pub struct Router {
    chat_provider: Arc<dyn LLMProvider>,
    image_provider: Arc<dyn ImageProvider>,
    settings: RouterSettings,
}

impl Router {
    /// Create a new router
    pub fn new(
        chat: Arc<dyn LLMProvider>,
        images: Arc<dyn ImageProvider>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            chat_provider: chat,
            image_provider: images,
            settings,
        }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Route one user submission
    ///
    /// Returns `None` for blank input, leaving the conversation untouched.
    /// Image turns never touch the conversation; chat turns append the user
    /// message before the call and the assistant reply after a success.
    pub async fn route(&self, conversation: &mut Conversation, text: &str) -> Option<Turn> {
        let input = text.trim();
        if input.is_empty() {
            return None;
        }

        let intent = classify(input);
        info!("Routing {} request: {}", intent, truncate(input, 120));

        let outcome = match intent {
            Intent::Image => self.generate_image(input).await,
            Intent::Chat => self.complete_chat(conversation, input).await,
        };

        Some(Turn {
            input: input.to_string(),
            intent,
            outcome,
        })
    }

    async fn generate_image(&self, prompt: &str) -> Result<Reply, TurnFailure> {
        let request = ImageRequest {
            model: self.settings.image.model.clone(),
            prompt: prompt.to_string(),
            n: self.settings.image.count,
            size: self.settings.image.size.clone(),
        };

        match self.image_provider.generate_image(request).await {
            Ok(response) => match response.first_url() {
                Some(url) => {
                    debug!("Image generated: {}", url);
                    Ok(Reply::Image {
                        url: url.to_string(),
                    })
                }
                None => {
                    warn!("Image generation returned no images");
                    Err(TurnFailure::new(
                        FailureKind::Malformed,
                        "No image in response",
                    ))
                }
            },
            Err(e) => {
                let failure = TurnFailure::from(e);
                warn!("Image generation failed: {}", failure);
                Err(failure)
            }
        }
    }

    async fn complete_chat(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<Reply, TurnFailure> {
        conversation.append_user(input);

        let response = self
            .chat_provider
            .chat(conversation.snapshot(), &self.settings.chat_model)
            .await
            .map_err(|e| {
                let failure = TurnFailure::from(e);
                warn!("Chat completion failed: {}", failure);
                failure
            })?;

        let reply = response.content.ok_or_else(|| {
            warn!("Chat completion returned no content");
            TurnFailure::new(FailureKind::Malformed, "No content in response")
        })?;

        info!(
            "Chat reply ({} messages in context): {}",
            conversation.len(),
            truncate(&reply, 120)
        );
        conversation.append_assistant(reply.clone());
        Ok(Reply::Chat(reply))
    }
}
