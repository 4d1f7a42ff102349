//! The `vprompt` commands
//!
//! Each command loads config and preferences, drives the headless page
//! through the data layer, then prints the page's toasts.

use anyhow::{anyhow, bail, Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use vprompt_data::{
    build_pipeline, first_success, upload, AppConfig, ImageJobRequest, JobController, JobError,
    JobKind, JobOutcome, JobResult, JobView, Preferences, Preview, PromptForm, UploadFile,
    VPromptClient, VoiceJobRequest,
};
use vprompt_widgets::{CopyOutcome, Document, LanguageToggle, PageView, Toasts};

use crate::clipboard;

pub struct App {
    config: AppConfig,
    preferences: Preferences,
    client: VPromptClient,
    view: PageView,
}

impl App {
    pub fn load() -> Self {
        let config = AppConfig::load();
        let preferences = Preferences::load();
        let client = VPromptClient::new(&config);

        let mut doc = Document::generator_page();
        LanguageToggle::new(preferences.clone()).init(&mut doc);
        let view = PageView::new(doc, Toasts::with_lifetime(config.toast_lifetime()));

        log::info!("Using backend at {}", client.base_url());
        Self {
            config,
            preferences,
            client,
            view,
        }
    }

    fn controller(&self) -> JobController<VPromptClient, PageView> {
        JobController::new(self.client.clone(), self.view.clone(), self.config.clone())
    }

    /// Print and clear the notices raised so far
    pub fn flush_toasts(&self) {
        for toast in self.view.take_toasts() {
            eprintln!("[{:?}] {}", toast.level, toast.text);
        }
    }

    pub async fn prompt(
        &mut self,
        fields: Vec<(String, String)>,
        image: Option<PathBuf>,
        bypass_time: Option<bool>,
        copy: bool,
    ) -> Result<()> {
        if let Some(bypass) = bypass_time {
            self.preferences.set_bypass_time(bypass);
        }
        let bypass = self.preferences.bypass_time();
        self.view
            .document()
            .set_hidden(vprompt_widgets::document::TIME_INPUT, bypass);

        let mut form = PromptForm {
            fields,
            ..Default::default()
        }
        .with_bypass_time(bypass);
        if let Some(path) = image {
            form = form.with_image(read_upload(&path)?);
        }

        match self.client.submit_prompt_form(&form).await {
            Ok(html) => {
                self.view.show_prompt_results(&html);
                println!("{html}");
                if copy {
                    self.copy(&html);
                }
                Ok(())
            }
            Err(e) => {
                log::error!("Prompt form failed: {}", e);
                self.view.prompt_failed();
                Err(e).context("prompt generation failed")
            }
        }
    }

    pub async fn regenerate(
        &self,
        json_file: &Path,
        seed: Option<String>,
        modified_text: Option<String>,
    ) -> Result<()> {
        let json_text = if json_file == Path::new("-") {
            std::io::read_to_string(std::io::stdin()).context("failed to read JSON from stdin")?
        } else {
            std::fs::read_to_string(json_file)
                .with_context(|| format!("failed to read {}", json_file.display()))?
        };
        let request = ImageJobRequest {
            json_text,
            seed_text: seed,
            modified_text,
        };

        let controller = self.controller();
        let outcome = run_cancellable(&controller, JobKind::Image, controller.run_image(request))
            .await?;
        if let Some(seed) = outcome.seed {
            println!("seed: {seed}");
        }
        print_result(&outcome);
        Ok(())
    }

    pub async fn voice(
        &mut self,
        text: String,
        sample: Option<String>,
        description: Option<String>,
        emotions: Vec<(String, f32)>,
    ) -> Result<()> {
        let mut settings = self.preferences.voice.clone();
        if let Some(sample) = sample {
            settings.sample = Some(sample);
        }
        if let Some(description) = description {
            settings.emotion_description = description;
        }
        for (name, value) in emotions {
            if !settings.emotions.set(&name, value) {
                bail!("unknown emotion {name:?}");
            }
        }
        match self.client.list_voice_samples().await {
            Ok(samples) => settings.reconcile_samples(&samples),
            Err(e) => log::warn!("Could not list voice samples: {}", e),
        }
        self.preferences.set_voice_settings(settings.clone());

        let controller = self.controller();
        let request = VoiceJobRequest { text, settings };
        let outcome = run_cancellable(&controller, JobKind::Voice, controller.run_voice(request))
            .await?;
        print_result(&outcome);
        Ok(())
    }

    pub async fn voices(&mut self) -> Result<()> {
        let samples = self
            .client
            .list_voice_samples()
            .await
            .context("failed to list voice samples")?;
        for sample in &samples {
            let marker = if self.preferences.voice.sample.as_deref() == Some(&sample.filename) {
                "*"
            } else {
                " "
            };
            println!("{marker} {:<32} {}", sample.filename, sample.display_name);
        }

        let mut voice = self.preferences.voice.clone();
        voice.reconcile_samples(&samples);
        if voice != self.preferences.voice {
            self.preferences.set_voice_settings(voice);
        }
        Ok(())
    }

    pub async fn preview(&self, path: &Path, server: bool, stored: Option<String>) -> Result<()> {
        let file = read_upload(path)?;
        let info = match stored {
            Some(name) => match self.client.heic_info(&name).await {
                Ok(info) => Some(info),
                Err(e) => {
                    log::warn!("No HEIC info for {}: {}", name, e);
                    None
                }
            },
            None => None,
        };

        let client = server.then_some(&self.client);
        let pipeline = build_pipeline(&file, client, None, info);
        let lang = self.view.document().language();
        match first_success(&pipeline, &file).await {
            Preview::Image {
                data_url,
                width,
                height,
                source,
            } => {
                println!("{} {}x{} via {:?}", file.name, width, height, source);
                println!("{data_url}");
            }
            Preview::Placeholder {
                filename,
                size_label,
                dimensions,
                message,
            } => {
                match dimensions {
                    Some((w, h)) => println!("{filename} ({size_label}, {w}x{h})"),
                    None => println!("{filename} ({size_label})"),
                }
                println!("{}", message.get(lang));
            }
        }
        Ok(())
    }

    pub fn lang(&mut self, toggle: bool) -> Result<()> {
        let mut toggler = LanguageToggle::new(self.preferences.clone());
        let mut doc = self.view.document();
        let lang = if toggle {
            toggler.toggle(&mut doc)
        } else {
            doc.language()
        };
        self.preferences = toggler.preferences().clone();
        println!("{} ({})", lang.code(), doc.title);
        for element in doc.elements() {
            if let Some(id) = &element.id {
                if !element.text.is_empty() {
                    println!("  {id}: {}", element.text);
                }
            }
        }
        Ok(())
    }

    pub fn copy(&self, text: &str) -> CopyOutcome {
        let outcome = clipboard::copy_text(text);
        if let Some(message) = outcome.message() {
            let lang = self.view.document().language();
            eprintln!("{}", message.get(lang));
        }
        outcome
    }
}

/// Run a job, cancelling it on Ctrl-C
async fn run_cancellable<V: JobView>(
    controller: &JobController<VPromptClient, V>,
    kind: JobKind,
    run: impl Future<Output = Result<JobOutcome, JobError>>,
) -> Result<JobOutcome> {
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            controller.cancel(kind);
            run.await
        }
    };
    result.map_err(|e| anyhow!(e)).with_context(|| format!("{} job failed", kind.label()))
}

fn read_upload(path: &Path) -> Result<UploadFile> {
    let file = UploadFile::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    upload::validate(&file.candidate()).map_err(|e| anyhow!(e.message().en))?;
    Ok(file)
}

fn print_result(outcome: &JobOutcome) {
    println!("job: {}", outcome.job_id);
    match &outcome.result {
        JobResult::Html(html) => println!("{html}"),
        JobResult::Audio(files) => {
            for file in files {
                println!("{}  {}", file.filename, file.url);
            }
        }
    }
}

/// `name=value`
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty name in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// `emotion=level` with a numeric level
pub fn parse_emotion(s: &str) -> Result<(String, f32), String> {
    let (name, value) = parse_key_val(s)?;
    let level = value
        .parse::<f32>()
        .map_err(|e| format!("invalid level for {name}: {e}"))?;
    Ok((name, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("scene=forest=dark"),
            Ok(("scene".to_string(), "forest=dark".to_string()))
        );
        assert_eq!(
            parse_key_val("time="),
            Ok(("time".to_string(), String::new()))
        );
        assert!(parse_key_val("scene").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_parse_emotion() {
        assert_eq!(parse_emotion("happy=0.8"), Ok(("happy".to_string(), 0.8)));
        assert!(parse_emotion("happy=lots").is_err());
    }

    #[test]
    fn test_read_upload_rejects_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bmp");
        std::fs::write(&path, b"BM").unwrap();
        let err = read_upload(&path).unwrap_err();
        assert!(err.to_string().contains("supported image format"));
    }
}
