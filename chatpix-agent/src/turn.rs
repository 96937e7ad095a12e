//! Typed results of a routed user submission

use chatpix_providers::ProviderError;
use std::fmt;

use crate::intent::Intent;

/// Shown first when an image request fails for any reason
pub const IMAGE_FAILURE_APOLOGY: &str =
    "AI: Sorry, I can't generate that image due to policy or an error.";
/// Shown after the apology with safe subjects to try instead
pub const IMAGE_FAILURE_SUGGESTION: &str =
    "AI: How about an image of a peaceful landscape, sunset, or cute animals instead?";

/// Successful outcome of a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Assistant text from the chat branch
    Chat(String),
    /// Generated image from the image branch
    Image { url: String },
}

/// Broad reason a turn failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected by the provider's content policy
    Policy,
    /// Missing, invalid or unauthorized credentials
    Auth,
    RateLimited,
    /// Could not reach the provider
    Network,
    /// The provider answered with something unusable
    Malformed,
    /// Any other error status from the provider
    Api,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Policy => "policy",
            FailureKind::Auth => "auth",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Network => "network",
            FailureKind::Malformed => "malformed",
            FailureKind::Api => "api",
        };
        f.write_str(name)
    }
}

impl From<&ProviderError> for FailureKind {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::HttpError(e) if e.is_decode() => FailureKind::Malformed,
            ProviderError::HttpError(_) => FailureKind::Network,
            ProviderError::JsonError(_) | ProviderError::InvalidResponse(_) => {
                FailureKind::Malformed
            }
            ProviderError::ConfigError(_) => FailureKind::Auth,
            ProviderError::ApiError {
                status,
                code,
                message,
            } => {
                let policy_code = code
                    .as_deref()
                    .is_some_and(|c| c.contains("content_policy") || c.contains("safety"));
                let policy_message = *status == 400 && message.contains("safety system");
                if policy_code || policy_message {
                    FailureKind::Policy
                } else {
                    match status {
                        401 | 403 => FailureKind::Auth,
                        429 => FailureKind::RateLimited,
                        _ => FailureKind::Api,
                    }
                }
            }
        }
    }
}

/// Why a turn did not produce a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TurnFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ProviderError> for TurnFailure {
    fn from(err: ProviderError) -> Self {
        Self::new(FailureKind::from(&err), err.to_string())
    }
}

impl fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.message)
    }
}

/// One routed submission and its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Trimmed user text
    pub input: String,
    pub intent: Intent,
    pub outcome: Result<Reply, TurnFailure>,
}

impl Turn {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Echo of the user's own text, always shown first
    pub fn echo(&self) -> DisplayEvent {
        DisplayEvent::user(&self.input)
    }

    /// Events describing the outcome, without the echo
    pub fn reply_events(&self) -> Vec<DisplayEvent> {
        match (&self.outcome, self.intent) {
            (Ok(Reply::Chat(text)), _) => vec![DisplayEvent::assistant(text)],
            (Ok(Reply::Image { url }), _) => vec![DisplayEvent::image(url)],
            (Err(_), Intent::Image) => vec![
                DisplayEvent::new(DisplayKind::Notice, IMAGE_FAILURE_APOLOGY),
                DisplayEvent::new(DisplayKind::Notice, IMAGE_FAILURE_SUGGESTION),
            ],
            (Err(failure), Intent::Chat) => vec![DisplayEvent::new(
                DisplayKind::Error,
                format!("AI: Sorry, something went wrong ({}).", failure),
            )],
        }
    }

    /// Full ordered list of events for this turn
    pub fn display_events(&self) -> Vec<DisplayEvent> {
        let mut events = vec![self.echo()];
        events.extend(self.reply_events());
        events
    }
}

/// What kind of line a display event is, for styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    User,
    Assistant,
    Image,
    Notice,
    Error,
}

/// A unit of text pushed to the output area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEvent {
    pub kind: DisplayKind,
    pub text: String,
}

impl DisplayEvent {
    pub fn new(kind: DisplayKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn user(text: impl AsRef<str>) -> Self {
        Self::new(DisplayKind::User, format!("You: {}", text.as_ref()))
    }

    pub fn assistant(text: impl AsRef<str>) -> Self {
        Self::new(DisplayKind::Assistant, format!("AI: {}", text.as_ref()))
    }

    pub fn image(url: impl AsRef<str>) -> Self {
        Self::new(DisplayKind::Image, format!("AI (Image URL): {}", url.as_ref()))
    }
}

impl fmt::Display for DisplayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
