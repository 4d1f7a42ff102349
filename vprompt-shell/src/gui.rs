//! The desktop window
//!
//! Renders the shared page model with Makepad. Button handlers mutate the
//! model or start work on a tokio runtime; a 100 ms interval drains finished
//! background work and redraws whatever the model changed.

use makepad_widgets::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use vprompt_data::{
    build_pipeline, decode_data_url, first_success, messages, texture_bytes, upload, AppConfig,
    ImageJobRequest, JobController, JobKind, JobView, Language, Notice, Preferences, Preview,
    PromptForm, TextureFormat, TextureImage, UploadFile, VPromptClient, VoiceJobRequest,
    VoiceSample,
};
use vprompt_widgets::document::{
    BYPASS_TIME_TOGGLE, CANCEL_BUTTON, CHARACTER_INPUT, CHARACTER_LABEL, COPY_BUTTON,
    EXTRA_INPUT, HEADING, LANG_TOGGLE, LAST_SEED, PREVIEW_BUTTON, PROMPT_JSON_INPUT,
    REGENERATE_BUTTON, SCENE_INPUT, SCENE_LABEL, SEED_INPUT, SUBMIT_BUTTON, TIME_INPUT,
    UPLOAD_INPUT, VOICE_BUTTON, VOICE_SAMPLE_INPUT, VOICE_TEXT_INPUT,
};
use vprompt_widgets::{
    audio_sources, html_to_text, image_sources, toast_level, CopyOutcome, Document,
    ImageViewer, LanguageToggle, PageView, ResultCategory, ScreenState, Toasts,
};

use crate::clipboard;

/// Result images shown as thumbnails
const THUMB_SLOTS: usize = 4;

/// Trimmed contents of the text input at a widget path
macro_rules! input_text {
    ($ui:expr, $($path:tt)+) => {
        $ui.text_input(ids!($($path)+)).text().trim().to_string()
    };
}

live_design! {
    use link::theme::*;
    use link::shaders::*;
    use link::widgets::*;
    use vprompt_widgets::theme::*;
    use vprompt_widgets::components::*;

    App = {{App}} {
        ui: <Window> {
            window: { title: "VPrompt Story Generator", inner_size: vec2(1100, 900) }
            pass: {
                clear_color: (PAGE_BG)
            }

            body = <View> {
                width: Fill, height: Fill
                flow: Overlay

                page = <View> {
                    width: Fill, height: Fill
                    flow: Down
                    show_bg: true
                    draw_bg: { color: (PAGE_BG) }

                    header = <View> {
                        width: Fill, height: 64
                        flow: Right
                        align: {y: 0.5}
                        padding: {left: 24, right: 24}
                        show_bg: true
                        draw_bg: { color: (WHITE) }

                        title_label = <Label> {
                            text: "VPrompt Story Generator"
                            draw_text: {
                                color: (TEXT_PRIMARY)
                                text_style: <FONT_SEMIBOLD>{ font_size: 20.0 }
                            }
                        }

                        <View> { width: Fill } // Spacer

                        lang_toggle = <LangToggleButton> {}
                    }

                    content = <ScrollYView> {
                        width: Fill, height: Fill
                        flow: Down
                        padding: {left: 24, right: 24, top: 16, bottom: 24}

                        story_card = <PanelCard> {
                            heading = <SectionTitle> { text: "Story Prompt Generator" }

                            scene_label = <FieldLabel> { text: "Scene" }
                            scene_input = <FormInput> {}
                            scene_hint = <HintText> {}

                            character_label = <FieldLabel> { text: "Character" }
                            character_input = <FormInput> {}
                            character_hint = <HintText> {}

                            time_row = <View> {
                                width: Fill, height: Fit
                                flow: Down
                                time_input = <FormInput> { margin: {top: 8} }
                                time_hint = <HintText> {}
                            }
                            bypass_time_btn = <SecondaryButton> { text: "Skip time of day" }

                            extra_input = <FormTextArea> { margin: {top: 8} }
                            extra_hint = <HintText> {}

                            upload_row = <View> {
                                width: Fill, height: Fit
                                flow: Right
                                spacing: 8
                                align: {y: 0.5}
                                upload_input = <FormInput> {}
                                preview_btn = <SecondaryButton> { text: "Preview" }
                            }
                            upload_hint = <HintText> {}

                            preview_row = <View> {
                                width: Fill, height: Fit
                                flow: Right
                                spacing: 12
                                align: {y: 0.5}
                                preview_image = <Image> {
                                    width: 120, height: 120
                                    fit: Smallest
                                    visible: false
                                }
                                preview_label = <HintText> {}
                            }

                            actions = <View> {
                                width: Fill, height: Fit
                                flow: Right
                                spacing: 8
                                margin: {top: 12}
                                submit_btn = <PrimaryButton> { text: "Generate Prompt" }
                                copy_btn = <SecondaryButton> { text: "Copy" }
                            }

                            results_text = <Markdown> {
                                width: Fill, height: Fit
                                margin: {top: 12}
                                font_size: 12.0
                                font_color: (GRAY_700)
                                paragraph_spacing: 8
                                draw_normal: {
                                    text_style: <FONT_REGULAR>{ font_size: 12.0 }
                                }
                            }
                        }

                        image_card = <PanelCard> {
                            prompt_json_input = <FormTextArea> {}
                            prompt_json_hint = <HintText> {}

                            seed_row = <View> {
                                width: Fill, height: Fit
                                flow: Right
                                spacing: 8
                                align: {y: 0.5}
                                seed_input = <FormInput> { width: 240 }
                                regenerate_btn = <PrimaryButton> { text: "Generate Image" }
                                cancel_image_btn = <SecondaryButton> { text: "Cancel" }
                                last_seed = <HintText> {}
                            }
                            seed_hint = <HintText> {}

                            image_progress = <ProgressBar> {}

                            thumbs = <View> {
                                width: Fill, height: Fit
                                flow: Right
                                thumb_0 = <ResultThumb> {}
                                thumb_1 = <ResultThumb> {}
                                thumb_2 = <ResultThumb> {}
                                thumb_3 = <ResultThumb> {}
                            }
                        }

                        voice_card = <PanelCard> {
                            voice_text_input = <FormTextArea> {}
                            voice_text_hint = <HintText> {}

                            voice_row = <View> {
                                width: Fill, height: Fit
                                flow: Right
                                spacing: 8
                                align: {y: 0.5}
                                voice_sample_input = <FormInput> { width: 240 }
                                voice_btn = <PrimaryButton> { text: "Generate Voice" }
                                cancel_voice_btn = <SecondaryButton> { text: "Cancel" }
                            }
                            voice_sample_hint = <HintText> {}

                            voice_progress = <ProgressBar> {}

                            audio_text = <Markdown> {
                                width: Fill, height: Fit
                                margin: {top: 8}
                                font_size: 11.0
                                font_color: (GRAY_700)
                                paragraph_spacing: 6
                                draw_normal: {
                                    text_style: <FONT_REGULAR>{ font_size: 11.0 }
                                }
                            }
                        }
                    }
                }

                // Toast notification (top center overlay)
                toast_overlay = <View> {
                    width: Fill, height: Fit
                    align: {x: 0.5, y: 0.0}
                    padding: {top: 80}

                    toast = <Toast> {}
                }

                image_viewer = <ImageViewerModal> {}
            }
        }
    }
}

/// Work finished off the UI thread
enum UiEvent {
    PromptDone(Result<String, String>),
    Preview(Preview),
    Thumb {
        slot: usize,
        src: String,
        texture: TextureImage,
    },
    ViewerImage {
        src: String,
        texture: TextureImage,
    },
    Samples(Vec<VoiceSample>),
}

#[derive(Live)]
pub struct App {
    #[live]
    ui: WidgetRef,
    #[rust]
    config: AppConfig,
    #[rust]
    preferences: Preferences,
    #[rust]
    client: Option<VPromptClient>,
    #[rust]
    view: PageView,
    #[rust]
    controller: Option<Arc<JobController<VPromptClient, PageView>>>,
    #[rust]
    runtime: Option<tokio::runtime::Runtime>,
    #[rust]
    events_tx: Option<Sender<UiEvent>>,
    #[rust]
    events_rx: Option<Receiver<UiEvent>>,
    /// Drives background polling and model-to-widget sync
    #[rust]
    update_timer: Timer,
    /// What the widgets currently show
    #[rust]
    last_state: Option<ScreenState>,
    /// Image sources behind the thumbnail slots
    #[rust]
    thumb_sources: Vec<String>,
    #[rust]
    viewer: ImageViewer,
    /// Natural size and bytes of the image in the viewer
    #[rust]
    viewer_image: Option<TextureImage>,
    #[rust]
    drag_last: Option<DVec2>,
    #[rust]
    initialized: bool,
}

impl LiveHook for App {
    fn after_new_from_doc(&mut self, _cx: &mut Cx) {
        if self.initialized {
            return;
        }
        self.config = AppConfig::load();
        self.preferences = Preferences::load();
        let client = VPromptClient::new(&self.config);

        let mut doc = Document::generator_page();
        LanguageToggle::new(self.preferences.clone()).init(&mut doc);
        doc.set_hidden(TIME_INPUT, self.preferences.bypass_time());
        self.view = PageView::new(doc, Toasts::with_lifetime(self.config.toast_lifetime()));
        self.controller = Some(Arc::new(JobController::new(
            client.clone(),
            self.view.clone(),
            self.config.clone(),
        )));
        self.client = Some(client);
        self.viewer = ImageViewer::new();

        match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => self.runtime = Some(runtime),
            Err(e) => ::log::error!("Failed to start async runtime: {}", e),
        }
        let (tx, rx) = channel();
        self.events_tx = Some(tx);
        self.events_rx = Some(rx);

        self.initialized = true;
        ::log::info!("App initialized, backend at {}", self.config.base_url);
    }
}

impl LiveRegister for App {
    fn live_register(cx: &mut Cx) {
        makepad_widgets::live_design(cx);
        vprompt_widgets::live_design(cx);
    }
}

impl MatchEvent for App {
    fn handle_startup(&mut self, cx: &mut Cx) {
        self.update_timer = cx.start_interval(0.1);
        if let Some(sample) = self.preferences.voice.sample.clone() {
            self.ui
                .text_input(ids!(voice_card.voice_row.voice_sample_input))
                .set_text(cx, &sample);
        }
        self.load_voice_samples();
        self.sync_screen(cx);
    }

    fn handle_actions(&mut self, cx: &mut Cx, actions: &Actions) {
        if self.ui.button(ids!(page.header.lang_toggle)).clicked(actions) {
            let mut toggle = LanguageToggle::new(self.preferences.clone());
            toggle.toggle(&mut self.view.document());
            self.preferences = toggle.preferences().clone();
        }

        if self.ui.button(ids!(story_card.bypass_time_btn)).clicked(actions) {
            let bypass = !self.preferences.bypass_time();
            self.preferences.set_bypass_time(bypass);
            self.view.document().set_hidden(TIME_INPUT, bypass);
        }
        if self.ui.button(ids!(story_card.upload_row.preview_btn)).clicked(actions) {
            self.start_preview();
        }
        if self.ui.button(ids!(story_card.actions.submit_btn)).clicked(actions) {
            self.submit_prompt();
        }
        if self.ui.button(ids!(story_card.actions.copy_btn)).clicked(actions) {
            self.copy_results();
        }

        if self.ui.button(ids!(image_card.seed_row.regenerate_btn)).clicked(actions) {
            self.start_image_job();
        }
        if self.ui.button(ids!(image_card.seed_row.cancel_image_btn)).clicked(actions) {
            self.cancel_job(JobKind::Image);
        }
        if self.ui.button(ids!(voice_card.voice_row.voice_btn)).clicked(actions) {
            self.start_voice_job();
        }
        if self.ui.button(ids!(voice_card.voice_row.cancel_voice_btn)).clicked(actions) {
            self.cancel_job(JobKind::Voice);
        }

        for slot in 0..THUMB_SLOTS {
            if self.thumb(slot).finger_down(actions).is_some() {
                if let Some(src) = self.thumb_sources.get(slot).cloned() {
                    self.open_viewer(cx, src);
                }
            }
        }

        if self.ui.view(ids!(toast_overlay.toast)).finger_down(actions).is_some() {
            if let Some(toast) = self.view.latest_toast() {
                self.view.dismiss_toast(toast.id);
            }
        }

        if self.ui.button(ids!(image_viewer.toolbar.close_btn)).clicked(actions) {
            self.close_viewer(cx);
        }
        if self.ui.button(ids!(image_viewer.toolbar.download_btn)).clicked(actions) {
            self.download_viewer_image();
        }

        self.sync_screen(cx);
    }
}

impl AppMain for App {
    fn handle_event(&mut self, cx: &mut Cx, event: &Event) {
        if self.update_timer.is_event(event).is_some() {
            self.drain_events(cx);
            self.sync_screen(cx);
        }

        if self.viewer.is_open() {
            self.handle_viewer_input(cx, event);
        }

        // ui.handle_event must run before match_event: it produces the actions
        self.ui.handle_event(cx, event, &mut Scope::empty());
        self.match_event(cx, event);
    }
}

impl App {
    fn thumb(&self, slot: usize) -> ViewRef {
        match slot {
            0 => self.ui.view(ids!(image_card.thumbs.thumb_0)),
            1 => self.ui.view(ids!(image_card.thumbs.thumb_1)),
            2 => self.ui.view(ids!(image_card.thumbs.thumb_2)),
            _ => self.ui.view(ids!(image_card.thumbs.thumb_3)),
        }
    }

    fn thumb_image(&self, slot: usize) -> ImageRef {
        match slot {
            0 => self.ui.image(ids!(image_card.thumbs.thumb_0.thumb_image)),
            1 => self.ui.image(ids!(image_card.thumbs.thumb_1.thumb_image)),
            2 => self.ui.image(ids!(image_card.thumbs.thumb_2.thumb_image)),
            _ => self.ui.image(ids!(image_card.thumbs.thumb_3.thumb_image)),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match &self.runtime {
            Some(runtime) => {
                runtime.spawn(task);
            }
            None => ::log::error!("No async runtime, background task dropped"),
        }
    }

    fn notify(&self, notice: Notice) {
        self.view.notify(notice);
    }

    // ─── Story form ──────────────────────────────────────────────────────────

    fn submit_prompt(&mut self) {
        let (Some(client), Some(tx)) = (self.client.clone(), self.events_tx.clone()) else {
            return;
        };
        let lang = self.view.document().language();
        let fields = prompt_fields(
            lang,
            &[
                ("time", input_text!(self.ui, story_card.time_row.time_input)),
                ("scene", input_text!(self.ui, story_card.scene_input)),
                ("character", input_text!(self.ui, story_card.character_input)),
                ("extra_desc", input_text!(self.ui, story_card.extra_input)),
            ],
        );
        let mut form = PromptForm {
            fields,
            ..Default::default()
        }
        .with_bypass_time(self.preferences.bypass_time());

        let image_path = input_text!(self.ui, story_card.upload_row.upload_input);
        if !image_path.is_empty() {
            match read_upload(Path::new(&image_path)) {
                Ok(file) => form = form.with_image(file),
                Err(notice) => {
                    self.notify(notice);
                    return;
                }
            }
        }

        self.spawn(async move {
            let result = client
                .submit_prompt_form(&form)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(UiEvent::PromptDone(result));
        });
    }

    fn start_preview(&mut self) {
        let (Some(client), Some(tx)) = (self.client.clone(), self.events_tx.clone()) else {
            return;
        };
        let path = input_text!(self.ui, story_card.upload_row.upload_input);
        if path.is_empty() {
            return;
        }
        let file = match read_upload(Path::new(&path)) {
            Ok(file) => file,
            Err(notice) => {
                self.notify(notice);
                return;
            }
        };
        self.spawn(async move {
            let pipeline = build_pipeline(&file, Some(&client), None, None);
            let preview = first_success(&pipeline, &file).await;
            let _ = tx.send(UiEvent::Preview(preview));
        });
    }

    fn show_preview(&mut self, cx: &mut Cx, preview: Preview) {
        let lang = self.view.document().language();
        let image = self.ui.image(ids!(story_card.preview_row.preview_image));
        let image_widget = self.ui.widget(ids!(story_card.preview_row.preview_image));
        let label = self.ui.label(ids!(story_card.preview_row.preview_label));
        match preview {
            Preview::Image {
                data_url,
                width,
                height,
                source,
            } => {
                let loaded = decode_data_url(&data_url)
                    .and_then(|bytes| texture_bytes(&bytes))
                    .map(|texture| load_texture(cx, &image, &texture));
                match loaded {
                    Ok(true) => {
                        image_widget.set_visible(cx, true);
                        label.set_text(cx, &format!("{width}x{height} ({source:?})"));
                    }
                    Ok(false) | Err(_) => {
                        image_widget.set_visible(cx, false);
                        label.set_text(cx, messages::preview_failed().get(lang));
                    }
                }
            }
            Preview::Placeholder {
                filename,
                size_label,
                dimensions,
                message,
            } => {
                image_widget.set_visible(cx, false);
                let details = match dimensions {
                    Some((w, h)) => format!("{filename} ({size_label}, {w}x{h})"),
                    None => format!("{filename} ({size_label})"),
                };
                label.set_text(cx, &format!("{details}\n{}", message.get(lang)));
            }
        }
    }

    fn copy_results(&self) {
        let text = html_to_text(self.view.document().results_container());
        match clipboard::copy_text(&text) {
            CopyOutcome::Copied { .. } => self.notify(Notice::success(messages::copied())),
            CopyOutcome::ManualCopy => self.notify(Notice::warning(messages::manual_copy())),
            CopyOutcome::Nothing => {}
        }
    }

    // ─── Jobs ────────────────────────────────────────────────────────────────

    fn start_image_job(&mut self) {
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let seed = input_text!(self.ui, image_card.seed_row.seed_input);
        let request = ImageJobRequest {
            json_text: self.ui.text_input(ids!(image_card.prompt_json_input)).text(),
            seed_text: (!seed.is_empty()).then_some(seed),
            modified_text: None,
        };
        self.spawn(async move {
            if let Err(e) = controller.run_image(request).await {
                ::log::warn!("Image job ended without a result: {}", e);
            }
        });
    }

    fn start_voice_job(&mut self) {
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let mut settings = self.preferences.voice.clone();
        let sample = input_text!(self.ui, voice_card.voice_row.voice_sample_input);
        if !sample.is_empty() {
            settings.sample = Some(sample);
        }
        if settings != self.preferences.voice {
            self.preferences.set_voice_settings(settings.clone());
        }
        let request = VoiceJobRequest {
            text: self.ui.text_input(ids!(voice_card.voice_text_input)).text(),
            settings,
        };
        self.spawn(async move {
            if let Err(e) = controller.run_voice(request).await {
                ::log::warn!("Voice job ended without a result: {}", e);
            }
        });
    }

    fn cancel_job(&self, kind: JobKind) {
        if let Some(controller) = &self.controller {
            if controller.cancel(kind) {
                ::log::info!("Cancelled {} job", kind.label());
            }
        }
    }

    fn load_voice_samples(&self) {
        let (Some(client), Some(tx)) = (self.client.clone(), self.events_tx.clone()) else {
            return;
        };
        self.spawn(async move {
            match client.list_voice_samples().await {
                Ok(samples) => {
                    let _ = tx.send(UiEvent::Samples(samples));
                }
                Err(e) => ::log::warn!("Could not list voice samples: {}", e),
            }
        });
    }

    // ─── Background results ──────────────────────────────────────────────────

    fn drain_events(&mut self, cx: &mut Cx) {
        let Some(rx) = &self.events_rx else { return };
        let events: Vec<UiEvent> = rx.try_iter().collect();
        for event in events {
            match event {
                UiEvent::PromptDone(Ok(html)) => self.view.show_prompt_results(&html),
                UiEvent::PromptDone(Err(e)) => {
                    ::log::error!("Prompt form failed: {}", e);
                    self.view.prompt_failed();
                }
                UiEvent::Preview(preview) => self.show_preview(cx, preview),
                UiEvent::Thumb { slot, src, texture } => {
                    if self.thumb_sources.get(slot) == Some(&src) {
                        let loaded = load_texture(cx, &self.thumb_image(slot), &texture);
                        self.thumb(slot).set_visible(cx, loaded);
                    }
                }
                UiEvent::ViewerImage { src, texture } => {
                    if self.viewer.download_target().map(|(url, _)| url) == Some(src.as_str()) {
                        let image = self.ui.image(ids!(image_viewer.stage.viewer_frame.viewer_image));
                        if load_texture(cx, &image, &texture) {
                            self.viewer_image = Some(texture);
                            self.layout_viewer(cx);
                        }
                    }
                }
                UiEvent::Samples(samples) => {
                    let mut voice = self.preferences.voice.clone();
                    voice.reconcile_samples(&samples);
                    if voice != self.preferences.voice {
                        self.preferences.set_voice_settings(voice);
                    }
                    let names: Vec<&str> = samples.iter().map(|s| s.filename.as_str()).collect();
                    self.ui
                        .label(ids!(voice_card.voice_sample_hint))
                        .set_text(cx, &names.join(", "));
                }
            }
        }
    }

    fn fetch_thumbnails(&mut self, cx: &mut Cx, html: Option<&str>) {
        let sources = html.map(image_sources).unwrap_or_default();
        self.thumb_sources = sources.into_iter().take(THUMB_SLOTS).collect();
        for slot in 0..THUMB_SLOTS {
            self.thumb(slot).set_visible(cx, false);
        }
        let (Some(client), Some(tx)) = (self.client.clone(), self.events_tx.clone()) else {
            return;
        };
        for (slot, src) in self.thumb_sources.iter().cloned().enumerate() {
            let client = client.clone();
            let tx = tx.clone();
            self.spawn(async move {
                match client.fetch_asset(&src).await {
                    Ok(bytes) => match texture_bytes(&bytes) {
                        Ok(texture) => {
                            let _ = tx.send(UiEvent::Thumb { slot, src, texture });
                        }
                        Err(e) => ::log::warn!("Result image {} is not displayable: {}", src, e),
                    },
                    Err(e) => ::log::warn!("Could not fetch result image {}: {}", src, e),
                }
            });
        }
    }

    // ─── Image viewer ────────────────────────────────────────────────────────

    fn open_viewer(&mut self, cx: &mut Cx, src: String) {
        let filename = src
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("image.png")
            .to_string();
        self.viewer.open(&mut self.view.document(), src.clone(), filename);
        self.viewer_image = None;
        self.ui
            .label(ids!(image_viewer.toolbar.caption))
            .set_text(cx, self.viewer.caption());
        self.ui.view(ids!(image_viewer)).set_visible(cx, true);
        self.layout_viewer(cx);

        let (Some(client), Some(tx)) = (self.client.clone(), self.events_tx.clone()) else {
            return;
        };
        self.spawn(async move {
            match client.fetch_asset(&src).await {
                Ok(bytes) => match texture_bytes(&bytes) {
                    Ok(texture) => {
                        let _ = tx.send(UiEvent::ViewerImage { src, texture });
                    }
                    Err(e) => ::log::warn!("Image {} is not displayable: {}", src, e),
                },
                Err(e) => ::log::warn!("Could not fetch image {}: {}", src, e),
            }
        });
    }

    fn close_viewer(&mut self, cx: &mut Cx) {
        self.viewer.close(&mut self.view.document());
        self.drag_last = None;
        self.ui.view(ids!(image_viewer)).set_visible(cx, false);
        self.ui.redraw(cx);
    }

    fn handle_viewer_input(&mut self, cx: &mut Cx, event: &Event) {
        if let Event::KeyDown(ke) = event {
            if ke.key_code == KeyCode::Escape
                && self.viewer.key(&mut self.view.document(), "Escape")
            {
                self.drag_last = None;
                self.ui.view(ids!(image_viewer)).set_visible(cx, false);
                self.ui.redraw(cx);
                return;
            }
        }

        let stage = self.ui.view(ids!(image_viewer.stage)).area();
        match event.hits(cx, stage) {
            Hit::FingerScroll(fs) => self.viewer.wheel(fs.scroll.y),
            Hit::FingerDown(fe) => self.drag_last = Some(fe.abs),
            Hit::FingerMove(fe) => {
                if let Some(last) = self.drag_last {
                    self.viewer.pan(fe.abs.x - last.x, fe.abs.y - last.y);
                }
                self.drag_last = Some(fe.abs);
            }
            Hit::FingerUp(fe) => {
                self.drag_last = None;
                if fe.was_tap() {
                    if fe.tap_count >= 2 {
                        self.viewer.double_click();
                    } else {
                        self.viewer.click();
                    }
                }
            }
            _ => return,
        }
        self.layout_viewer(cx);
    }

    fn layout_viewer(&mut self, cx: &mut Cx) {
        let size = self.ui.view(ids!(image_viewer.stage)).area().rect(cx).size;
        let natural = self
            .viewer_image
            .as_ref()
            .map(|t| (f64::from(t.width), f64::from(t.height)))
            .unwrap_or((0.0, 0.0));
        let rect = self.viewer.layout(natural, (size.x, size.y));
        self.ui
            .view(ids!(image_viewer.stage.viewer_frame))
            .apply_over(cx, live! {
                margin: { left: (rect.x), top: (rect.y) }
                width: (rect.width), height: (rect.height)
            });
        self.ui.redraw(cx);
    }

    fn download_viewer_image(&self) {
        let (Some((_, filename)), Some(texture)) =
            (self.viewer.download_target(), self.viewer_image.as_ref())
        else {
            return;
        };
        let dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(filename);
        match std::fs::write(&path, &texture.bytes) {
            Ok(()) => {
                ::log::info!("Saved {}", path.display());
                self.notify(Notice::success(vprompt_data::LocalizedText::new(
                    format!("Saved to {}", path.display()),
                    format!("已儲存至 {}", path.display()),
                )));
            }
            Err(e) => {
                ::log::error!("Failed to save {}: {}", path.display(), e);
                self.notify(Notice::error(vprompt_data::LocalizedText::new(
                    format!("Could not save {filename}: {e}"),
                    format!("無法儲存 {filename}：{e}"),
                )));
            }
        }
    }

    // ─── Model to widgets ────────────────────────────────────────────────────

    fn sync_screen(&mut self, cx: &mut Cx) {
        let state = ScreenState::capture(&self.view.document(), self.view.latest_toast());
        if self.last_state.as_ref() == Some(&state) {
            return;
        }
        let previous = self.last_state.take().unwrap_or_default();
        self.apply_state(cx, &state, &previous);
        self.last_state = Some(state);
        self.ui.redraw(cx);
    }

    fn apply_state(&mut self, cx: &mut Cx, state: &ScreenState, previous: &ScreenState) {
        if state.language != previous.language || previous.texts.is_empty() {
            self.apply_texts(cx, state);
        }

        self.ui
            .view(ids!(story_card.time_row))
            .set_visible(cx, !state.is_hidden(TIME_INPUT));
        let bypass_mark = if state.is_hidden(TIME_INPUT) { "☑" } else { "☐" };
        self.ui
            .button(ids!(story_card.bypass_time_btn))
            .set_text(cx, &format!("{bypass_mark} {}", state.text(BYPASS_TIME_TOGGLE)));

        macro_rules! set_disabled {
            ($id:expr, $($path:tt)+) => {
                let disabled = if state.is_enabled($id) { 0.0 } else { 1.0 };
                self.ui
                    .button(ids!($($path)+))
                    .apply_over(cx, live! { draw_bg: { disabled: (disabled) } });
            };
        }
        set_disabled!(REGENERATE_BUTTON, image_card.seed_row.regenerate_btn);
        set_disabled!(VOICE_BUTTON, voice_card.voice_row.voice_btn);
        self.ui
            .label(ids!(image_card.seed_row.last_seed))
            .set_text(cx, state.text(LAST_SEED));

        macro_rules! set_progress {
            ($category:expr, $($path:tt)+) => {
                let bar = self.ui.view(ids!($($path)+));
                match state.progress_fraction($category) {
                    Some(progress) => {
                        bar.set_visible(cx, true);
                        bar.apply_over(cx, live! { draw_bg: { progress: (progress) } });
                    }
                    None => bar.set_visible(cx, false),
                }
            };
        }
        set_progress!(ResultCategory::GeneratedImages, image_card.image_progress);
        set_progress!(ResultCategory::GeneratedAudio, voice_card.voice_progress);

        if state.results != previous.results {
            self.ui
                .markdown(ids!(story_card.results_text))
                .set_text(cx, &html_to_text(&state.results));
        }

        let images = state.section(ResultCategory::GeneratedImages);
        if images != previous.section(ResultCategory::GeneratedImages) {
            self.fetch_thumbnails(cx, images);
        }

        let audio = state.section(ResultCategory::GeneratedAudio);
        if audio != previous.section(ResultCategory::GeneratedAudio) {
            let text = audio
                .map(|html| {
                    let mut lines = vec![html_to_text(html)];
                    lines.extend(audio_sources(html));
                    lines.join("\n\n")
                })
                .unwrap_or_default();
            self.ui
                .markdown(ids!(voice_card.audio_text))
                .set_text(cx, &text);
        }

        if state.toast != previous.toast {
            let toast_view = self.ui.view(ids!(toast_overlay.toast));
            match &state.toast {
                Some(toast) => {
                    self.ui
                        .label(ids!(toast_overlay.toast.toast_label))
                        .set_text(cx, &toast.text);
                    let level = toast_level(toast.level);
                    toast_view.apply_over(cx, live! { draw_bg: { level: (level) } });
                    toast_view.set_visible(cx, true);
                }
                None => toast_view.set_visible(cx, false),
            }
        }
    }

    /// Labels, button captions and hints for the current language
    fn apply_texts(&mut self, cx: &mut Cx, state: &ScreenState) {
        self.ui
            .label(ids!(page.header.title_label))
            .set_text(cx, &state.title);
        self.ui
            .button(ids!(page.header.lang_toggle))
            .set_text(cx, state.text(LANG_TOGGLE));

        macro_rules! set_label {
            ($id:expr, $($path:tt)+) => {
                self.ui.label(ids!($($path)+)).set_text(cx, state.text($id));
            };
        }
        set_label!(HEADING, story_card.heading);
        set_label!(SCENE_LABEL, story_card.scene_label);
        set_label!(CHARACTER_LABEL, story_card.character_label);

        macro_rules! set_caption {
            ($id:expr, $($path:tt)+) => {
                self.ui.button(ids!($($path)+)).set_text(cx, state.text($id));
            };
        }
        set_caption!(PREVIEW_BUTTON, story_card.upload_row.preview_btn);
        set_caption!(SUBMIT_BUTTON, story_card.actions.submit_btn);
        set_caption!(REGENERATE_BUTTON, image_card.seed_row.regenerate_btn);
        set_caption!(CANCEL_BUTTON, image_card.seed_row.cancel_image_btn);
        set_caption!(VOICE_BUTTON, voice_card.voice_row.voice_btn);
        set_caption!(CANCEL_BUTTON, voice_card.voice_row.cancel_voice_btn);

        // Icon button: keeps its caption across languages
        let copy_caption = self
            .view
            .document()
            .element(COPY_BUTTON)
            .and_then(|e| e.attr("data-en"))
            .unwrap_or("Copy")
            .to_string();
        self.ui
            .button(ids!(story_card.actions.copy_btn))
            .set_text(cx, &copy_caption);

        macro_rules! set_hint {
            ($id:expr, $($path:tt)+) => {
                let hint = state.placeholders.get($id).map(String::as_str).unwrap_or_default();
                self.ui.label(ids!($($path)+)).set_text(cx, hint);
            };
        }
        set_hint!(SCENE_INPUT, story_card.scene_hint);
        set_hint!(CHARACTER_INPUT, story_card.character_hint);
        set_hint!(TIME_INPUT, story_card.time_row.time_hint);
        set_hint!(EXTRA_INPUT, story_card.extra_hint);
        set_hint!(UPLOAD_INPUT, story_card.upload_hint);
        set_hint!(PROMPT_JSON_INPUT, image_card.prompt_json_hint);
        set_hint!(SEED_INPUT, image_card.seed_hint);
        set_hint!(VOICE_TEXT_INPUT, voice_card.voice_text_hint);
        if self.preferences.voice.sample.is_none() {
            set_hint!(VOICE_SAMPLE_INPUT, voice_card.voice_sample_hint);
        }
    }
}

/// Story form fields with blank entries left out
fn prompt_fields(lang: Language, inputs: &[(&str, String)]) -> Vec<(String, String)> {
    let output_lang = match lang {
        Language::En => "en",
        Language::Zh => "zh-tw",
    };
    let mut fields = vec![
        ("prompt_type".to_string(), "story".to_string()),
        ("output_lang".to_string(), output_lang.to_string()),
    ];
    fields.extend(
        inputs
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.to_string(), value.clone())),
    );
    fields
}

fn read_upload(path: &Path) -> Result<UploadFile, Notice> {
    let file = UploadFile::read(path).map_err(|e| {
        ::log::warn!("Failed to read {}: {}", path.display(), e);
        Notice::error(vprompt_data::LocalizedText::new(
            format!("Could not read {}", path.display()),
            format!("無法讀取 {}", path.display()),
        ))
    })?;
    upload::validate(&file.candidate()).map_err(|e| Notice::error(e.message()))?;
    Ok(file)
}

/// Returns false when the image widget rejected the bytes
fn load_texture(cx: &mut Cx, image: &ImageRef, texture: &TextureImage) -> bool {
    let result = match texture.format {
        TextureFormat::Png => image.load_png_from_data(cx, &texture.bytes),
        TextureFormat::Jpeg => image.load_jpg_from_data(cx, &texture.bytes),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            ::log::warn!("Failed to load image texture: {:?}", e);
            false
        }
    }
}

app_main!(App);
