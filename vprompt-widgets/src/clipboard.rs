//! Copy-to-clipboard with ordered fallbacks

use thiserror::Error;
use vprompt_data::{messages, LocalizedText};

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One way of putting text on the system clipboard
pub trait ClipboardStrategy {
    fn name(&self) -> &'static str;

    fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { strategy: &'static str },
    /// Every strategy failed; the user has to copy by hand
    ManualCopy,
    /// There was nothing to copy
    Nothing,
}

impl CopyOutcome {
    /// Feedback for the triggering button
    pub fn message(&self) -> Option<LocalizedText> {
        match self {
            CopyOutcome::Copied { .. } => Some(messages::copied()),
            CopyOutcome::ManualCopy => Some(messages::manual_copy()),
            CopyOutcome::Nothing => None,
        }
    }
}

pub fn copy_with_fallback(text: &str, strategies: &[&dyn ClipboardStrategy]) -> CopyOutcome {
    if text.is_empty() {
        return CopyOutcome::Nothing;
    }
    for strategy in strategies {
        match strategy.copy(text) {
            Ok(()) => {
                log::debug!("Copied {} bytes via {}", text.len(), strategy.name());
                return CopyOutcome::Copied {
                    strategy: strategy.name(),
                };
            }
            Err(e) => log::warn!("Clipboard strategy {} failed: {}", strategy.name(), e),
        }
    }
    log::warn!("All clipboard strategies failed");
    CopyOutcome::ManualCopy
}
