//! System and terminal clipboard strategies

use base64::Engine;
use std::cell::RefCell;
use std::io::{IsTerminal, Write};
use vprompt_widgets::{copy_with_fallback, ClipboardError, ClipboardStrategy, CopyOutcome};

/// OSC 52: ask the terminal emulator to set the clipboard
pub struct Osc52<W: Write> {
    out: RefCell<W>,
    is_terminal: bool,
}

impl Osc52<std::io::Stdout> {
    pub fn stdout() -> Self {
        let out = std::io::stdout();
        let is_terminal = out.is_terminal();
        Self {
            out: RefCell::new(out),
            is_terminal,
        }
    }
}

impl<W: Write> Osc52<W> {
    pub fn new(out: W, is_terminal: bool) -> Self {
        Self {
            out: RefCell::new(out),
            is_terminal,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

pub fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x07")
}

impl<W: Write> ClipboardStrategy for Osc52<W> {
    fn name(&self) -> &'static str {
        "osc52"
    }

    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        if !self.is_terminal {
            return Err(ClipboardError::Unavailable(
                "stdout is not a terminal".to_string(),
            ));
        }
        let mut out = self.out.borrow_mut();
        out.write_all(osc52_sequence(text).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// The system clipboard through `arboard`
pub struct ArboardClipboard;

impl ClipboardStrategy for ArboardClipboard {
    fn name(&self) -> &'static str {
        "arboard"
    }

    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text))
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))
    }
}

/// System clipboard first, then the terminal
pub fn copy_text(text: &str) -> CopyOutcome {
    let osc = Osc52::stdout();
    copy_with_fallback(text, &[&ArboardClipboard, &osc])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osc52_sequence() {
        assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x07");
    }

    #[test]
    fn test_osc52_writes_to_terminal() {
        let osc = Osc52::new(Vec::new(), true);
        osc.copy("hi").unwrap();
        assert_eq!(osc.into_inner(), b"\x1b]52;c;aGk=\x07");
    }

    #[test]
    fn test_osc52_refuses_non_terminal() {
        let osc = Osc52::new(Vec::new(), false);
        assert!(osc.copy("hi").is_err());
        assert!(osc.into_inner().is_empty());
    }

    #[test]
    fn test_system_clipboard_falls_back_to_terminal() {
        // Without a display arboard fails and OSC 52 takes over
        let osc = Osc52::new(Vec::new(), true);
        let outcome = copy_with_fallback("prompt", &[&ArboardClipboard, &osc]);
        match outcome {
            CopyOutcome::Copied { strategy: "arboard" } => {}
            CopyOutcome::Copied { strategy: "osc52" } => {
                assert_eq!(osc.into_inner(), osc52_sequence("prompt").as_bytes());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_empty_text_copies_nothing() {
        assert_eq!(copy_text(""), CopyOutcome::Nothing);
    }
}
