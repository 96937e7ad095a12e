//! Keyword heuristic for spotting image requests

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A creation verb followed, anywhere later on the same line, by an image noun.
///
/// This is a plain substring scan: "create a chart" matches because "chart"
/// contains "art". "genrate" is a deliberate misspelling users type often.
static IMAGE_REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(generate|genrate|create|make|draw).*?(image|picture|photo|art|drawing)")
        .unwrap()
});

/// Where a user submission gets sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Image,
    Chat,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Image => f.write_str("image"),
            Intent::Chat => f.write_str("chat"),
        }
    }
}

/// Classify a user submission
pub fn classify(text: &str) -> Intent {
    if IMAGE_REQUEST.is_match(text) {
        Intent::Image
    } else {
        Intent::Chat
    }
}
