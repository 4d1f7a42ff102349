//! # PageView - JobView over the page model
//!
//! Binds the job core to a shared [`Document`] and its [`Toasts`]. The shell
//! and the job tasks hold clones of the same view.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;
use vprompt_data::{messages, AudioFile, JobKind, JobResult, JobView, Notice};

use crate::document::{control_id, Document, ResultCategory, LAST_SEED};
use crate::toast::{Toast, Toasts};

#[derive(Clone, Default)]
pub struct PageView {
    doc: Arc<Mutex<Document>>,
    toasts: Arc<Mutex<Toasts>>,
}

impl PageView {
    pub fn new(doc: Document, toasts: Toasts) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
            toasts: Arc::new(Mutex::new(toasts)),
        }
    }

    pub fn document(&self) -> MutexGuard<'_, Document> {
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn toasts(&self) -> MutexGuard<'_, Toasts> {
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install the fragment returned by the prompt form
    pub fn show_prompt_results(&self, html: &str) {
        self.document().set_results(html);
    }

    pub fn prompt_failed(&self) {
        self.notify(messages::prompt_failed());
    }

    /// Toasts still alive now; expired ones are dropped
    pub fn active_toasts(&self) -> Vec<Toast> {
        self.active_toasts_at(Utc::now())
    }

    pub fn active_toasts_at(&self, now: DateTime<Utc>) -> Vec<Toast> {
        let mut toasts = self.toasts();
        let expired = toasts.prune(now);
        if expired > 0 {
            log::debug!("Dismissed {} expired toasts", expired);
        }
        toasts.active().to_vec()
    }

    /// Newest toast still alive, for a single-toast surface
    pub fn latest_toast(&self) -> Option<Toast> {
        self.latest_toast_at(Utc::now())
    }

    /// Newest toast still alive at `now`
    pub fn latest_toast_at(&self, now: DateTime<Utc>) -> Option<Toast> {
        let mut toasts = self.toasts();
        toasts.prune(now);
        toasts.latest().cloned()
    }

    pub fn dismiss_toast(&self, id: Uuid) -> bool {
        self.toasts().dismiss(id)
    }

    pub fn take_toasts(&self) -> Vec<Toast> {
        self.toasts().drain()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Players for a finished voice job
pub fn audio_section(files: &[AudioFile]) -> String {
    let mut html = String::from(
        "<div class=\"voice-results\"><h2 data-en=\"Generated Audio\" data-zh=\"生成的語音\">Generated Audio</h2>",
    );
    for file in files {
        html.push_str(&format!(
            "<div class=\"audio-item\"><span>{}</span><audio controls src=\"{}\"></audio></div>",
            escape_html(&file.filename),
            escape_html(&file.url)
        ));
    }
    html.push_str("</div>");
    html
}

impl JobView for PageView {
    fn set_busy(&self, kind: JobKind, busy: bool) {
        let mut doc = self.document();
        doc.set_enabled(control_id(kind), !busy);
        doc.set_progress(kind.into(), busy.then_some(0));
    }

    fn show_progress(&self, kind: JobKind, progress: u8) {
        self.document().set_progress(kind.into(), Some(progress));
    }

    fn show_seed(&self, seed: u32) {
        self.document().set_text(LAST_SEED, seed.to_string());
    }

    fn apply_result(&self, kind: JobKind, result: &JobResult) {
        let html = match result {
            JobResult::Html(html) => html.clone(),
            JobResult::Audio(files) => audio_section(files),
        };
        self.document()
            .replace_section(ResultCategory::from(kind), html);
    }

    fn notify(&self, notice: Notice) {
        let lang = self.document().language();
        let text = notice.text.get(lang);
        log::info!("[{:?}] {}", notice.level, text);
        self.toasts().push(&notice, lang);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{REGENERATE_BUTTON, VOICE_BUTTON};
    use crate::i18n::apply_language;
    use vprompt_data::api::{
        JobStatusResponse, StartImageRequest, StartJobResponse, StartVoiceRequest,
    };
    use vprompt_data::{
        AppConfig, Backend, ClientError, ImageJobRequest, JobController, Language, NoticeLevel,
        StatusEndpoint,
    };

    fn view() -> PageView {
        PageView::new(Document::generator_page(), Toasts::default())
    }

    #[test]
    fn test_busy_disables_only_its_control() {
        let view = view();
        view.set_busy(JobKind::Image, true);
        {
            let doc = view.document();
            assert!(!doc.is_enabled(REGENERATE_BUTTON));
            assert!(doc.is_enabled(VOICE_BUTTON));
            assert_eq!(doc.progress(ResultCategory::GeneratedImages), Some(0));
        }

        view.show_progress(JobKind::Image, 55);
        assert_eq!(
            view.document().progress(ResultCategory::GeneratedImages),
            Some(55)
        );

        view.set_busy(JobKind::Image, false);
        let doc = view.document();
        assert!(doc.is_enabled(REGENERATE_BUTTON));
        assert_eq!(doc.progress(ResultCategory::GeneratedImages), None);
    }

    #[test]
    fn test_results_replace_per_category() {
        let view = view();
        view.apply_result(JobKind::Image, &JobResult::Html("<div>one</div>".to_string()));
        view.apply_result(JobKind::Image, &JobResult::Html("<div>two</div>".to_string()));
        view.apply_result(
            JobKind::Voice,
            &JobResult::Audio(vec![AudioFile {
                filename: "a<b>.wav".to_string(),
                url: "/static/audio/a.wav".to_string(),
            }]),
        );

        let doc = view.document();
        assert_eq!(doc.section_count(), 2);
        assert_eq!(
            doc.section(ResultCategory::GeneratedImages),
            Some("<div>two</div>")
        );
        let audio = doc.section(ResultCategory::GeneratedAudio).unwrap();
        assert!(audio.contains("a&lt;b&gt;.wav"));
        assert!(audio.contains("src=\"/static/audio/a.wav\""));
    }

    #[test]
    fn test_notices_follow_page_language() {
        let view = view();
        apply_language(&mut view.document(), Language::Zh);
        view.notify(messages::generation_succeeded(JobKind::Image));

        let toasts = view.active_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, NoticeLevel::Success);
        assert_eq!(toasts[0].text, "✅ 圖片重新生成完成！");
    }

    #[test]
    fn test_toasts_expire_and_dismiss() {
        let view = PageView::new(
            Document::generator_page(),
            Toasts::new(chrono::Duration::seconds(3)),
        );
        view.notify(messages::invalid_json());
        view.notify(messages::generation_succeeded(JobKind::Image));

        let now = Utc::now();
        let latest = view.latest_toast_at(now).unwrap();
        assert_eq!(latest.level, NoticeLevel::Success);
        assert!(view.dismiss_toast(latest.id));
        assert_eq!(view.active_toasts_at(now).len(), 1);

        assert!(view.active_toasts_at(now + chrono::Duration::seconds(4)).is_empty());
        assert!(view.latest_toast_at(now).is_none());
    }

    #[test]
    fn test_seed_is_shown() {
        let view = view();
        view.show_seed(42);
        assert_eq!(view.document().element(LAST_SEED).unwrap().text, "42");
    }

    /// Starts, reports `done` on the first poll and serves one gallery
    struct DoneBackend;

    impl Backend for DoneBackend {
        async fn start_generation(
            &self,
            _request: &StartImageRequest,
        ) -> Result<StartJobResponse, ClientError> {
            Ok(StartJobResponse {
                job_id: Some("job-1".to_string()),
                seed: Some(7),
                ..Default::default()
            })
        }

        async fn start_voice_generation(
            &self,
            _request: &StartVoiceRequest,
        ) -> Result<StartJobResponse, ClientError> {
            Err(ClientError::Backend("voice is not scripted".to_string()))
        }

        async fn job_status(
            &self,
            _endpoint: StatusEndpoint,
            _job_id: &str,
        ) -> Result<JobStatusResponse, ClientError> {
            Ok(JobStatusResponse {
                status: "done".to_string(),
                progress: Some(100.0),
                ..Default::default()
            })
        }

        async fn regeneration_result(&self, _job_id: &str) -> Result<String, ClientError> {
            Ok("<div class=\"generated-images\"><img src=\"/g/1.png\"></div>".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_job_updates_page_once() {
        let view = view();
        let controller = JobController::new(DoneBackend, view.clone(), AppConfig::default());

        for _ in 0..2 {
            let outcome = controller
                .run_image(ImageJobRequest::new(r#"{"scene":"forest"}"#))
                .await
                .unwrap();
            assert_eq!(outcome.seed, Some(7));

            {
                let doc = view.document();
                assert_eq!(doc.section_count(), 1);
                assert!(doc
                    .section(ResultCategory::GeneratedImages)
                    .unwrap()
                    .contains("/g/1.png"));
                assert!(doc.is_enabled(REGENERATE_BUTTON));
                assert_eq!(doc.progress(ResultCategory::GeneratedImages), None);
                assert_eq!(doc.element(LAST_SEED).unwrap().text, "7");
            }

            let successes: Vec<_> = view
                .take_toasts()
                .into_iter()
                .filter(|t| t.level == NoticeLevel::Success)
                .collect();
            assert_eq!(successes.len(), 1);
            assert_eq!(successes[0].text, "✅ Image regeneration completed successfully!");
        }
    }
}
