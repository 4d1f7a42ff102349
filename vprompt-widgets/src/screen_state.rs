//! # ScreenState - What the window shows
//!
//! A comparable snapshot of the [`Document`] and the toast queue. The desktop
//! shell captures one per tick and only touches widgets when it changed.

use std::collections::{BTreeMap, BTreeSet};
use vprompt_data::Language;

use crate::document::{Document, ResultCategory};
use crate::toast::Toast;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScreenState {
    pub language: Language,
    pub title: String,
    /// Visible text of every element with an id
    pub texts: BTreeMap<String, String>,
    pub placeholders: BTreeMap<String, String>,
    pub disabled: BTreeSet<String>,
    pub hidden: BTreeSet<String>,
    pub results: String,
    pub sections: BTreeMap<ResultCategory, String>,
    pub progress: BTreeMap<ResultCategory, u8>,
    pub toast: Option<Toast>,
    pub scroll_locked: bool,
}

impl ScreenState {
    pub fn capture(doc: &Document, toast: Option<Toast>) -> Self {
        let mut state = Self {
            language: doc.language(),
            title: doc.title.clone(),
            results: doc.results_container().to_string(),
            toast,
            scroll_locked: doc.scroll_locked(),
            ..Default::default()
        };

        for element in doc.elements() {
            let Some(id) = &element.id else { continue };
            state.texts.insert(id.clone(), element.text.clone());
            if let Some(placeholder) = &element.placeholder {
                state.placeholders.insert(id.clone(), placeholder.clone());
            }
            if element.disabled {
                state.disabled.insert(id.clone());
            }
            if element.hidden {
                state.hidden.insert(id.clone());
            }
        }

        for category in [ResultCategory::GeneratedImages, ResultCategory::GeneratedAudio] {
            if let Some(html) = doc.section(category) {
                state.sections.insert(category, html.to_string());
            }
            if let Some(progress) = doc.progress(category) {
                state.progress.insert(category, progress);
            }
        }
        state
    }

    pub fn text(&self, id: &str) -> &str {
        self.texts.get(id).map(String::as_str).unwrap_or_default()
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        !self.disabled.contains(id)
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden.contains(id)
    }

    pub fn section(&self, category: ResultCategory) -> Option<&str> {
        self.sections.get(&category).map(String::as_str)
    }

    pub fn progress(&self, category: ResultCategory) -> Option<u8> {
        self.progress.get(&category).copied()
    }

    /// Progress as the 0.0..=1.0 fraction the progress bar shader takes
    pub fn progress_fraction(&self, category: ResultCategory) -> Option<f64> {
        self.progress(category).map(|p| f64::from(p) / 100.0)
    }
}
