pub mod theme;
pub mod components;
pub mod clipboard;
pub mod document;
pub mod i18n;
pub mod page_view;
pub mod screen_state;
pub mod toast;
pub mod viewer;

pub use clipboard::{copy_with_fallback, ClipboardError, ClipboardStrategy, CopyOutcome};
pub use components::toast_level;
pub use document::{
    audio_sources, control_id, html_to_text, image_sources, Document, Element, ResultCategory,
};
pub use i18n::{apply_language, LanguageToggle};
pub use page_view::PageView;
pub use screen_state::ScreenState;
pub use toast::{Toast, Toasts};
pub use viewer::{ImageRect, ImageViewer};

use makepad_widgets::Cx;

/// Register the shared theme and components with Makepad.
///
/// Call from `LiveRegister::live_register` after `makepad_widgets::live_design`.
/// The theme goes first because the components use its fonts and colors.
pub fn live_design(cx: &mut Cx) {
    theme::live_design(cx);
    components::live_design(cx);
}
