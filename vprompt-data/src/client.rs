//! HTTP client for the VPrompt backend
//!
//! [`VPromptClient`] is the [`Backend`] the job core runs against, plus the
//! endpoints outside the job flow: the prompt form, voice sample listing, and
//! the HEIC conversion helpers.

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{
    HeicInfo, JobStatusResponse, StartImageRequest, StartJobResponse, StartVoiceRequest,
    VoiceSample, VoiceSamplesResponse,
};
use crate::config::{AppConfig, StatusEndpoint};
use crate::error::ClientError;
use crate::jobs::Backend;
use crate::upload::UploadFile;

/// Form field dropped when the user bypasses the time selection
const TIME_FIELD: &str = "time";

/// The story parameters form, submitted as `POST /`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptForm {
    /// Text fields in form order (`prompt_type`, `output_lang`, `time`, ...)
    pub fields: Vec<(String, String)>,
    pub image: Option<UploadFile>,
    pub bypass_time: bool,
}

impl PromptForm {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_image(mut self, image: UploadFile) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_bypass_time(mut self, bypass: bool) -> Self {
        self.bypass_time = bypass;
        self
    }

    /// Text fields as they go on the wire
    pub fn wire_fields(&self) -> impl Iterator<Item = &(String, String)> {
        self.fields
            .iter()
            .filter(move |(name, _)| !(self.bypass_time && name == TIME_FIELD))
    }
}

#[derive(Clone, Debug)]
pub struct VPromptClient {
    base_url: String,
    client: reqwest::Client,
}

impl VPromptClient {
    pub fn new(config: &AppConfig) -> Self {
        let mut base_url = config.base_url.trim().to_string();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/{segment}/{filename}` with the filename percent-encoded
    fn file_url(&self, segment: &str, filename: &str) -> Result<String, ClientError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ClientError::format(&self.base_url, e))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::format(&self.base_url, "base URL cannot carry a path"))?
            .pop_if_empty()
            .push(segment)
            .push(filename);
        Ok(url.into())
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: url.to_string(),
                code: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn text(&self, url: &str, request: reqwest::RequestBuilder) -> Result<String, ClientError> {
        self.send(url, request)
            .await?
            .text()
            .await
            .map_err(|e| ClientError::network(url, e))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let text = self.text(url, request).await?;
        serde_json::from_str(&text).map_err(|e| ClientError::format(url, e))
    }

    /// `POST /` with the story parameters; returns the results fragment
    pub async fn submit_prompt_form(&self, form: &PromptForm) -> Result<String, ClientError> {
        let url = self.url("/");
        let mut multipart = Form::new();
        for (name, value) in form.wire_fields() {
            multipart = multipart.text(name.clone(), value.clone());
        }
        if let Some(image) = &form.image {
            multipart = multipart.part("image", file_part(&url, image)?);
        }
        log::debug!(
            "Submitting prompt form to {} (bypass_time: {})",
            url,
            form.bypass_time
        );

        let request = self
            .client
            .post(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .multipart(multipart);
        self.text(&url, request).await
    }

    /// `GET /list_voice_samples`
    pub async fn list_voice_samples(&self) -> Result<Vec<VoiceSample>, ClientError> {
        let url = self.url("/list_voice_samples");
        let response: VoiceSamplesResponse = self.json(&url, self.client.get(&url)).await?;
        log::debug!("Server lists {} voice samples", response.voice_samples.len());
        Ok(response.voice_samples)
    }

    /// `POST /convert_heic_preview`; returns the converted image bytes
    pub async fn convert_heic_preview(&self, file: &UploadFile) -> Result<Vec<u8>, ClientError> {
        let url = self.url("/convert_heic_preview");
        let form = Form::new().part("file", file_part(&url, file)?);
        let response = self.send(&url, self.client.post(&url).multipart(form)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(&url, e))?;
        Ok(bytes.to_vec())
    }

    /// `GET /convert_heic/{filename}` for a file already stored on the server
    pub async fn convert_heic(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.file_url("convert_heic", filename)?;
        let response = self.send(&url, self.client.get(&url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(&url, e))?;
        Ok(bytes.to_vec())
    }

    /// Bytes behind a URL from a results fragment, either absolute or relative to the backend
    pub async fn fetch_asset(&self, src: &str) -> Result<Vec<u8>, ClientError> {
        let url = if src.starts_with("http://") || src.starts_with("https://") {
            src.to_string()
        } else if src.starts_with('/') {
            self.url(src)
        } else {
            self.url(&format!("/{src}"))
        };
        let response = self.send(&url, self.client.get(&url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(&url, e))?;
        Ok(bytes.to_vec())
    }

    /// `GET /heic_info/{filename}`
    pub async fn heic_info(&self, filename: &str) -> Result<HeicInfo, ClientError> {
        let url = self.file_url("heic_info", filename)?;
        let info: HeicInfo = self.json(&url, self.client.get(&url)).await?;
        match info.error {
            Some(error) => Err(ClientError::Backend(error)),
            None => Ok(info),
        }
    }
}

fn file_part(url: &str, file: &UploadFile) -> Result<Part, ClientError> {
    Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| ClientError::format(url, e))
}

impl Backend for VPromptClient {
    async fn start_generation(
        &self,
        request: &StartImageRequest,
    ) -> Result<StartJobResponse, ClientError> {
        let url = self.url("/start_generation");
        let mut form = Form::new().text("json_data", request.json_data.clone());
        if let Some(seed) = request.seed {
            form = form.text("seed", seed.to_string());
        }
        if let Some(text) = &request.modified_text {
            form = form.text("modified_text", text.clone());
        }
        self.json(&url, self.client.post(&url).multipart(form)).await
    }

    async fn start_voice_generation(
        &self,
        request: &StartVoiceRequest,
    ) -> Result<StartJobResponse, ClientError> {
        let url = self.url("/start_voice_generation");
        self.json(&url, self.client.post(&url).json(request)).await
    }

    async fn job_status(
        &self,
        endpoint: StatusEndpoint,
        job_id: &str,
    ) -> Result<JobStatusResponse, ClientError> {
        let url = self.url(&endpoint.path(job_id));
        self.json(&url, self.client.get(&url)).await
    }

    async fn regeneration_result(&self, job_id: &str) -> Result<String, ClientError> {
        let url = self.url(&format!("/regeneration_result/{job_id}"));
        self.text(&url, self.client.get(&url)).await
    }
}
