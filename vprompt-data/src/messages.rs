//! Bilingual message catalog
//!
//! Every user-visible notice is built here as a [`LocalizedText`] carrying both
//! the English and Traditional-Chinese variant. Views resolve it against the
//! page's current [`Language`] when the notice is shown.

use serde::{Deserialize, Serialize};

use crate::jobs::JobKind;

/// UI language
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    /// Value for the document's `lang` attribute
    pub fn html_lang(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh-Hant",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Language::En => Language::Zh,
            Language::Zh => Language::En,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            _ => None,
        }
    }
}

/// A string carried in both UI languages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalizedText {
    pub en: String,
    pub zh: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, zh: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            zh: zh.into(),
        }
    }

    pub fn get(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.en,
            Language::Zh => &self.zh,
        }
    }
}

/// Severity of a notice, mirrored by the toast style
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, localized message for the notification surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: LocalizedText,
}

impl Notice {
    pub fn info(text: LocalizedText) -> Self {
        Self { level: NoticeLevel::Info, text }
    }

    pub fn success(text: LocalizedText) -> Self {
        Self { level: NoticeLevel::Success, text }
    }

    pub fn warning(text: LocalizedText) -> Self {
        Self { level: NoticeLevel::Warning, text }
    }

    pub fn error(text: LocalizedText) -> Self {
        Self { level: NoticeLevel::Error, text }
    }
}

// ─── Job notices ──────────────────────────────────────────────────────────────

pub fn already_in_progress(kind: JobKind) -> Notice {
    match kind {
        JobKind::Image => Notice::info(LocalizedText::new(
            "Generation already in progress",
            "生成進行中",
        )),
        JobKind::Voice => Notice::info(LocalizedText::new(
            "Voice generation already in progress",
            "語音生成進行中",
        )),
    }
}

pub fn invalid_json() -> Notice {
    Notice::error(LocalizedText::new(
        "Invalid JSON format. Please check the syntax.",
        "JSON 格式錯誤，請檢查語法。",
    ))
}

pub fn invalid_seed() -> Notice {
    Notice::warning(LocalizedText::new(
        "Invalid seed value. Please enter a number between 0 and 4294967295.",
        "種子值無效。請輸入 0 到 4294967295 之間的數字。",
    ))
}

pub fn missing_voice_sample() -> Notice {
    Notice::warning(LocalizedText::new(
        "Please select a voice sample first.",
        "請先選擇語音樣本。",
    ))
}

pub fn missing_voice_text() -> Notice {
    Notice::warning(LocalizedText::new(
        "There is no text to synthesize.",
        "沒有可合成的文字。",
    ))
}

pub fn submission_failed(kind: JobKind, detail: &str) -> Notice {
    match kind {
        JobKind::Image => Notice::error(LocalizedText::new(
            format!("Failed to start image generation: {detail}"),
            format!("無法開始圖片生成：{detail}"),
        )),
        JobKind::Voice => Notice::error(LocalizedText::new(
            format!("Failed to start voice generation: {detail}"),
            format!("無法開始語音生成：{detail}"),
        )),
    }
}

pub fn generation_failed(kind: JobKind, detail: Option<&str>) -> Notice {
    let (en, zh) = match kind {
        JobKind::Image => ("Generation failed", "生成失敗"),
        JobKind::Voice => ("Voice generation failed", "語音生成失敗"),
    };
    match detail {
        Some(detail) => Notice::error(LocalizedText::new(
            format!("{en}: {detail}"),
            format!("{zh}：{detail}"),
        )),
        None => Notice::error(LocalizedText::new(en, zh)),
    }
}

pub fn polling_failed(detail: &str) -> Notice {
    Notice::error(LocalizedText::new(
        format!("Generation polling failed: {detail}"),
        format!("生成輪詢失敗: {detail}"),
    ))
}

pub fn results_unavailable() -> Notice {
    Notice::error(LocalizedText::new(
        "❌ Failed to load regenerated images after multiple attempts",
        "❌ 多次嘗試後仍無法載入重新生成的圖片",
    ))
}

pub fn no_audio_produced() -> Notice {
    Notice::error(LocalizedText::new(
        "Voice generation finished without producing audio",
        "語音生成完成但沒有產生音訊",
    ))
}

pub fn generation_succeeded(kind: JobKind) -> Notice {
    match kind {
        JobKind::Image => Notice::success(LocalizedText::new(
            "✅ Image regeneration completed successfully!",
            "✅ 圖片重新生成完成！",
        )),
        JobKind::Voice => Notice::success(LocalizedText::new(
            "✅ Voice generation completed!",
            "✅ 語音生成完成！",
        )),
    }
}

pub fn generation_cancelled() -> Notice {
    Notice::info(LocalizedText::new("Generation cancelled", "已取消生成"))
}

// ─── Form, upload and clipboard notices ───────────────────────────────────────

pub fn prompt_failed() -> Notice {
    Notice::error(LocalizedText::new(
        "Failed to generate prompt",
        "生成提示詞失敗",
    ))
}

pub fn unsupported_format() -> LocalizedText {
    LocalizedText::new(
        "Please select a supported image format (PNG, JPG, JPEG, GIF, HEIC)!",
        "請選擇支援的圖片文件格式（PNG、JPG、JPEG、GIF、HEIC）！",
    )
}

pub fn file_too_large() -> LocalizedText {
    LocalizedText::new(
        "Image file size cannot exceed 16MB!",
        "圖片文件大小不能超過 16MB！",
    )
}

pub fn copied() -> LocalizedText {
    LocalizedText::new("Copied!", "已複製！")
}

pub fn manual_copy() -> LocalizedText {
    LocalizedText::new(
        "Auto-copy failed, text is selected. Please press Ctrl+C (Windows) or Cmd+C (Mac) to copy manually",
        "自動複製失敗，文本已選中，請按 Ctrl+C (Windows) 或 Cmd+C (Mac) 手動複製",
    )
}

pub fn preview_pending_server() -> LocalizedText {
    LocalizedText::new(
        "Ready, will be processed server-side",
        "已就緒，將由伺服器處理",
    )
}

pub fn preview_failed() -> LocalizedText {
    LocalizedText::new(
        "Preview unavailable, the file will still be uploaded",
        "無法預覽，檔案仍會上傳",
    )
}
