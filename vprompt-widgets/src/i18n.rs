//! English / Traditional Chinese switching for a [`Document`]

use vprompt_data::{Language, Preferences};

use crate::document::{Document, LANG_TOGGLE};

const ICON_BUTTON_CLASS: &str = "icon-btn";

/// Label on the toggle: it names the language a click switches to
pub fn toggle_label(lang: Language) -> &'static str {
    match lang {
        Language::Zh => "🇺🇸 EN",
        Language::En => "🇹🇼 中文",
    }
}

/// Relabel the whole document for `lang`. Elements without text for `lang`
/// keep what they show.
pub fn apply_language(doc: &mut Document, lang: Language) {
    let code = lang.code();
    let text_attr = format!("data-{code}");
    let placeholder_attr = format!("data-{code}-placeholder");

    doc.set_html_attr("data-lang", code);

    let mut title = None;
    for element in doc.elements_mut() {
        if element.tag == "title" {
            title = element.attr(&text_attr).map(str::to_string);
        }
        if element.has_class(ICON_BUTTON_CLASS) {
            continue;
        }
        if let Some(text) = element.attrs.get(&text_attr) {
            element.text = text.clone();
        }
        if let Some(placeholder) = element.attrs.get(&placeholder_attr) {
            element.placeholder = Some(placeholder.clone());
        }
    }
    if let Some(title) = title {
        doc.title = title;
    }

    doc.set_text(LANG_TOGGLE, toggle_label(lang));
    doc.set_html_attr("lang", lang.html_lang());
    log::debug!("Applied language {}", code);
}

/// The language toggle button, backed by persisted preferences
pub struct LanguageToggle {
    preferences: Preferences,
}

impl LanguageToggle {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }

    /// Apply the saved language, English when none is saved
    pub fn init(&self, doc: &mut Document) -> Language {
        let lang = self.preferences.language();
        apply_language(doc, lang);
        lang
    }

    /// Switch to the other language and remember the choice
    pub fn toggle(&mut self, doc: &mut Document) -> Language {
        let lang = doc.language().toggled();
        apply_language(doc, lang);
        self.preferences.set_language(lang);
        log::info!("Language switched to {}", lang.code());
        lang
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Element, SEED_INPUT};

    #[test]
    fn test_apply_zh() {
        let mut doc = Document::generator_page();
        apply_language(&mut doc, Language::Zh);

        assert_eq!(doc.html_attr("data-lang"), Some("zh"));
        assert_eq!(doc.html_attr("lang"), Some("zh-Hant"));
        assert_eq!(doc.title, "VPrompt 故事生成器");
        assert_eq!(doc.element(LANG_TOGGLE).unwrap().text, "🇺🇸 EN");
        assert_eq!(
            doc.element(SEED_INPUT).unwrap().placeholder.as_deref(),
            Some("隨機種子（可選）")
        );
        assert_eq!(doc.element("regenerateBtn").unwrap().text, "生成圖片");
    }

    #[test]
    fn test_icon_buttons_stay_text_free() {
        let mut doc = Document::generator_page();
        apply_language(&mut doc, Language::Zh);
        apply_language(&mut doc, Language::En);
        assert_eq!(doc.element("copyTextBtn").unwrap().text, "");
    }

    #[test]
    fn test_missing_translation_keeps_text() {
        let mut doc = Document::new();
        doc.push(
            Element::new("p")
                .with_id("onlyEn")
                .with_attr("data-en", "Hello")
                .with_text("Hello"),
        );
        apply_language(&mut doc, Language::Zh);
        assert_eq!(doc.element("onlyEn").unwrap().text, "Hello");
    }

    #[test]
    fn test_toggle_round_trip_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let mut doc = Document::generator_page();

        let mut toggle = LanguageToggle::new(Preferences::load_from(&path));
        assert_eq!(toggle.init(&mut doc), Language::En);
        assert_eq!(doc.element(LANG_TOGGLE).unwrap().text, "🇹🇼 中文");

        assert_eq!(toggle.toggle(&mut doc), Language::Zh);
        assert_eq!(Preferences::load_from(&path).language(), Language::Zh);

        // A fresh page picks the saved language up
        let mut reloaded = Document::generator_page();
        LanguageToggle::new(Preferences::load_from(&path)).init(&mut reloaded);
        assert_eq!(reloaded.html_attr("lang"), Some("zh-Hant"));

        assert_eq!(toggle.toggle(&mut doc), Language::En);
        assert_eq!(doc.html_attr("lang"), Some("en"));
        assert_eq!(doc.title, "VPrompt Story Generator");
    }
}
