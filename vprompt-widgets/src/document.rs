//! # Document - Headless Page Model
//!
//! The page the client drives: a flat list of addressable elements, the root
//! `<html>` attributes, the results container filled by the prompt form, and
//! one results section per [`ResultCategory`].
//!
//! ## Element attributes
//! - `data-en` / `data-zh`: localized text
//! - `data-en-placeholder` / `data-zh-placeholder`: localized placeholder
//! - class `icon-btn`: text-free button, never relabelled

use std::collections::BTreeMap;
use vprompt_data::{JobKind, Language};

/// Button that starts an image job
pub const REGENERATE_BUTTON: &str = "regenerateBtn";
/// Button that starts a voice job
pub const VOICE_BUTTON: &str = "voiceGenerateBtn";
pub const LANG_TOGGLE: &str = "langToggle";
pub const SEED_INPUT: &str = "regenerateSeed";
pub const LAST_SEED: &str = "lastSeed";
pub const TIME_INPUT: &str = "timeInput";
pub const HEADING: &str = "pageHeading";
pub const SCENE_LABEL: &str = "sceneLabel";
pub const SCENE_INPUT: &str = "sceneInput";
pub const CHARACTER_LABEL: &str = "characterLabel";
pub const CHARACTER_INPUT: &str = "characterInput";
pub const EXTRA_INPUT: &str = "extraDesc";
pub const UPLOAD_INPUT: &str = "imagePath";
pub const BYPASS_TIME_TOGGLE: &str = "bypassTime";
pub const PREVIEW_BUTTON: &str = "previewBtn";
/// Label shared by the buttons that cancel a running job
pub const CANCEL_BUTTON: &str = "cancelBtn";
pub const SUBMIT_BUTTON: &str = "submitBtn";
pub const COPY_BUTTON: &str = "copyTextBtn";
pub const PROMPT_JSON_INPUT: &str = "promptJson";
pub const VOICE_TEXT_INPUT: &str = "voiceText";
pub const VOICE_SAMPLE_INPUT: &str = "voiceSample";

/// Id of the control that starts a job of `kind`
pub fn control_id(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Image => REGENERATE_BUTTON,
        JobKind::Voice => VOICE_BUTTON,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub id: Option<String>,
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub placeholder: Option<String>,
    pub disabled: bool,
    pub hidden: bool,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Shorthand for the `data-en` / `data-zh` pair, with the English text shown
    pub fn localized(self, en: &str, zh: &str) -> Self {
        self.with_attr("data-en", en)
            .with_attr("data-zh", zh)
            .with_text(en)
    }

    pub fn localized_placeholder(mut self, en: &str, zh: &str) -> Self {
        self.placeholder = Some(en.to_string());
        self.with_attr("data-en-placeholder", en)
            .with_attr("data-zh-placeholder", zh)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Results sections a job can fill
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultCategory {
    GeneratedImages,
    GeneratedAudio,
}

impl From<JobKind> for ResultCategory {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Image => ResultCategory::GeneratedImages,
            JobKind::Voice => ResultCategory::GeneratedAudio,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Document {
    pub title: String,
    html_attrs: BTreeMap<String, String>,
    elements: Vec<Element>,
    results_container: String,
    sections: BTreeMap<ResultCategory, String>,
    progress: BTreeMap<ResultCategory, u8>,
    scroll_locked: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generator page: story form, prompt results and generation controls
    pub fn generator_page() -> Self {
        let mut doc = Self::new();
        doc.push(Element::new("title").localized("VPrompt Story Generator", "VPrompt 故事生成器"));
        doc.push(
            Element::new("button")
                .with_id(LANG_TOGGLE)
                .with_text("🇹🇼 中文"),
        );
        doc.push(
            Element::new("h1")
                .with_id(HEADING)
                .localized("Story Prompt Generator", "故事提示詞生成器"),
        );
        doc.push(
            Element::new("label")
                .with_id(SCENE_LABEL)
                .localized("Scene", "場景"),
        );
        doc.push(
            Element::new("input")
                .with_id(SCENE_INPUT)
                .localized_placeholder("Forest, city, seaside...", "森林、城市、海邊……"),
        );
        doc.push(
            Element::new("label")
                .with_id(CHARACTER_LABEL)
                .localized("Character", "角色"),
        );
        doc.push(
            Element::new("input")
                .with_id(CHARACTER_INPUT)
                .localized_placeholder("Who is in the story", "故事裡的人物"),
        );
        doc.push(
            Element::new("input")
                .with_id(TIME_INPUT)
                .localized_placeholder("Time of day", "時間"),
        );
        doc.push(
            Element::new("label")
                .with_id(BYPASS_TIME_TOGGLE)
                .localized("Skip time of day", "略過時間"),
        );
        doc.push(
            Element::new("textarea")
                .with_id(EXTRA_INPUT)
                .localized_placeholder("Extra description", "額外描述"),
        );
        doc.push(
            Element::new("input")
                .with_id(UPLOAD_INPUT)
                .localized_placeholder("Reference photo path (optional)", "參考照片路徑（可選）"),
        );
        doc.push(
            Element::new("button")
                .with_id(PREVIEW_BUTTON)
                .localized("Preview", "預覽"),
        );
        doc.push(
            Element::new("button")
                .with_id(SUBMIT_BUTTON)
                .localized("Generate Prompt", "生成提示詞"),
        );
        doc.push(
            Element::new("button")
                .with_id(COPY_BUTTON)
                .with_class("icon-btn")
                .with_attr("data-en", "Copy")
                .with_attr("data-zh", "複製"),
        );
        doc.push(
            Element::new("textarea")
                .with_id(PROMPT_JSON_INPUT)
                .localized_placeholder("Prompt JSON", "提示詞 JSON"),
        );
        doc.push(
            Element::new("input")
                .with_id(SEED_INPUT)
                .localized_placeholder("Random seed (optional)", "隨機種子（可選）"),
        );
        doc.push(Element::new("span").with_id(LAST_SEED));
        doc.push(
            Element::new("button")
                .with_id(REGENERATE_BUTTON)
                .localized("Generate Image", "生成圖片"),
        );
        doc.push(
            Element::new("textarea")
                .with_id(VOICE_TEXT_INPUT)
                .localized_placeholder("Text to narrate", "要朗讀的文字"),
        );
        doc.push(
            Element::new("input")
                .with_id(VOICE_SAMPLE_INPUT)
                .localized_placeholder("Voice sample", "語音樣本"),
        );
        doc.push(
            Element::new("button")
                .with_id(VOICE_BUTTON)
                .localized("Generate Voice", "生成語音"),
        );
        doc.push(
            Element::new("button")
                .with_id(CANCEL_BUTTON)
                .localized("Cancel", "取消"),
        );
        doc.title = "VPrompt Story Generator".to_string();
        doc
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.elements.iter_mut()
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id.as_deref() == Some(id))
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id.as_deref() == Some(id))
    }

    pub fn first_by_tag(&self, tag: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.tag == tag)
    }

    pub fn html_attr(&self, name: &str) -> Option<&str> {
        self.html_attrs.get(name).map(String::as_str)
    }

    pub fn set_html_attr(&mut self, name: &str, value: &str) {
        self.html_attrs.insert(name.to_string(), value.to_string());
    }

    /// Current UI language from `data-lang`, English when unset
    pub fn language(&self) -> Language {
        self.html_attr("data-lang")
            .and_then(Language::from_code)
            .unwrap_or_default()
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(element) = self.element_mut(id) {
            element.disabled = !enabled;
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.element(id).is_some_and(|e| !e.disabled)
    }

    pub fn set_hidden(&mut self, id: &str, hidden: bool) {
        if let Some(element) = self.element_mut(id) {
            element.hidden = hidden;
        }
    }

    pub fn set_text(&mut self, id: &str, text: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.text = text.into();
        }
    }

    pub fn results_container(&self) -> &str {
        &self.results_container
    }

    /// Replaces the prompt results. Job sections belong to the old prompt and go too.
    pub fn set_results(&mut self, html: impl Into<String>) {
        self.results_container = html.into();
        self.sections.clear();
    }

    /// Replace any existing section of `category`
    pub fn replace_section(&mut self, category: ResultCategory, html: impl Into<String>) {
        self.sections.insert(category, html.into());
    }

    pub fn section(&self, category: ResultCategory) -> Option<&str> {
        self.sections.get(&category).map(String::as_str)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn set_progress(&mut self, category: ResultCategory, progress: Option<u8>) {
        match progress {
            Some(p) => {
                self.progress.insert(category, p.min(100));
            }
            None => {
                self.progress.remove(&category);
            }
        }
    }

    pub fn progress(&self, category: ResultCategory) -> Option<u8> {
        self.progress.get(&category).copied()
    }

    pub fn set_scroll_locked(&mut self, locked: bool) {
        self.scroll_locked = locked;
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }
}

/// `src` values of the `<img>` tags in a results fragment, in order
pub fn image_sources(html: &str) -> Vec<String> {
    media_sources(html, "img")
}

/// `src` values of the `<audio>` tags in a results fragment, in order
pub fn audio_sources(html: &str) -> Vec<String> {
    media_sources(html, "audio")
}

fn media_sources(html: &str, tag_name: &str) -> Vec<String> {
    let open = format!("<{tag_name}");
    let mut sources = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(&open) {
        rest = &rest[start + open.len()..];
        if !rest.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
            continue;
        }
        let tag_end = rest.find('>').unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if let Some(src) = attr_value(tag, "src") {
            if !src.is_empty() {
                sources.push(src.to_string());
            }
        }
        rest = &rest[tag_end..];
    }
    sources
}

/// Readable text of a results fragment: tags dropped, block ends turned
/// into paragraph breaks and the common entities decoded
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            rest = &rest[start..];
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        let closes_block = tag.starts_with('/')
            && matches!(name, "p" | "div" | "li" | "h1" | "h2" | "h3" | "h4" | "pre" | "tr");
        if name == "br" || closes_block {
            text.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    text.push_str(rest);

    let decoded = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = tag;
    loop {
        let at = search.find(name)?;
        let before = search[..at].chars().next_back();
        let after = search[at + name.len()..].trim_start();
        search = &search[at + name.len()..];
        if !matches!(before, Some(c) if c.is_whitespace()) {
            continue;
        }
        let Some(value) = after.strip_prefix('=') else { continue };
        let value = value.trim_start();
        let quote = value.chars().next()?;
        if quote == '"' || quote == '\'' {
            let body = &value[1..];
            return body.find(quote).map(|end| &body[..end]);
        }
        let end = value.find(char::is_whitespace).unwrap_or(value.len());
        return Some(&value[..end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_page_controls() {
        let doc = Document::generator_page();
        assert!(doc.is_enabled(REGENERATE_BUTTON));
        assert!(doc.is_enabled(VOICE_BUTTON));
        assert_eq!(doc.language(), Language::En);
        assert!(doc.element(COPY_BUTTON).unwrap().has_class("icon-btn"));
        assert!(!doc.is_enabled("missing"));
        for id in [SCENE_INPUT, CHARACTER_INPUT, PROMPT_JSON_INPUT, VOICE_TEXT_INPUT] {
            assert!(doc.element(id).unwrap().placeholder.is_some(), "{id}");
        }
        assert_eq!(doc.element(HEADING).unwrap().text, "Story Prompt Generator");
    }

    #[test]
    fn test_html_to_text() {
        let html = "<div class=\"result\"><h3>Prompt</h3>\n  <p>A fox &amp; a crow<br>at dawn</p>\
                    <pre>{&quot;scene&quot;: &lt;forest&gt;}</pre></div>";
        assert_eq!(
            html_to_text(html),
            "Prompt\n\nA fox & a crow\n\nat dawn\n\n{\"scene\": <forest>}"
        );
        assert_eq!(html_to_text("plain text"), "plain text");
        assert_eq!(html_to_text("broken <b"), "broken <b");
    }

    #[test]
    fn test_image_sources() {
        let html = r#"<div class="gallery">
            <img src="/static/generated/a.png" alt="a">
            <img class='thumb' data-src="skip" src='/static/generated/b.jpg'/>
            <img alt="no source">
            <img src=/static/generated/c.gif>
        </div>"#;
        assert_eq!(
            image_sources(html),
            [
                "/static/generated/a.png",
                "/static/generated/b.jpg",
                "/static/generated/c.gif"
            ]
        );
        assert!(image_sources("<p>no images</p>").is_empty());
        assert!(image_sources("<imgur src=\"/x.png\">").is_empty());
    }

    #[test]
    fn test_audio_sources_from_voice_section() {
        let html = crate::page_view::audio_section(&[vprompt_data::AudioFile {
            filename: "take 1.wav".to_string(),
            url: "/static/audio/take_1.wav".to_string(),
        }]);
        assert_eq!(audio_sources(&html), ["/static/audio/take_1.wav"]);
        assert!(image_sources(&html).is_empty());
    }

    #[test]
    fn test_replace_section_keeps_last() {
        let mut doc = Document::new();
        doc.replace_section(ResultCategory::GeneratedImages, "<div>first</div>");
        doc.replace_section(ResultCategory::GeneratedImages, "<div>second</div>");
        assert_eq!(doc.section_count(), 1);
        assert_eq!(
            doc.section(ResultCategory::GeneratedImages),
            Some("<div>second</div>")
        );
    }

    #[test]
    fn test_new_results_drop_job_sections() {
        let mut doc = Document::new();
        doc.replace_section(ResultCategory::GeneratedAudio, "<audio></audio>");
        doc.set_results("<div id=\"prompt\"></div>");
        assert_eq!(doc.section_count(), 0);
        assert_eq!(doc.results_container(), "<div id=\"prompt\"></div>");
    }

    #[test]
    fn test_control_ids() {
        assert_eq!(control_id(JobKind::Image), REGENERATE_BUTTON);
        assert_eq!(ResultCategory::from(JobKind::Voice), ResultCategory::GeneratedAudio);
    }
}
