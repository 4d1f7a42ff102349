//! Wire types for the VPrompt backend endpoints.
//!
//!   POST /start_generation           → StartJobResponse
//!   POST /start_voice_generation     → StartJobResponse
//!   GET  /generation_status/{id}     → JobStatusResponse
//!   GET  /job_status/{id}            → JobStatusResponse (legacy)
//!   GET  /regeneration_result/{id}   → HTML fragment, or {"error": ...}
//!   GET  /list_voice_samples         → VoiceSamplesResponse
//!   GET  /heic_info/{filename}       → HeicInfo

use serde::{Deserialize, Serialize};

/// Response to either job-start endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartJobResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub seed: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Multipart fields of `POST /start_generation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartImageRequest {
    /// Compact re-serialization of the validated prompt JSON
    pub json_data: String,
    pub seed: Option<u32>,
    pub modified_text: Option<String>,
}

/// One generated audio file reported by a finished voice job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    pub filename: String,
    pub url: String,
}

/// Response to the status endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub audio_files: Option<Vec<AudioFile>>,
}

/// Body of `POST /start_voice_generation`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartVoiceRequest {
    pub text: String,
    pub voice_sample: String,
    pub emotion_description: String,
    pub angry: f32,
    pub sad: f32,
    pub happy: f32,
    pub afraid: f32,
    pub disgust: f32,
    pub melancholic: f32,
    pub surprised: f32,
    pub calm: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSample {
    pub filename: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceSamplesResponse {
    #[serde(default)]
    pub voice_samples: Vec<VoiceSample>,
}

/// Metadata the server extracts from a stored HEIC file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeicInfo {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Checks a result body the way the gallery endpoint reports failures:
/// HTML is a success, a JSON body is inspected for an `error` field.
pub fn result_body_error(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("error")
            .filter(|e| !e.is_null() && e.as_str() != Some(""))
            .map(|e| e.as_str().map(String::from).unwrap_or_else(|| e.to_string())),
        Err(e) => Some(format!("Malformed JSON result: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_partial_fields() {
        let s: JobStatusResponse =
            serde_json::from_str(r#"{"status":"in-progress","progress":40}"#).unwrap();
        assert_eq!(s.status, "in-progress");
        assert_eq!(s.progress, Some(40.0));
        assert!(s.audio_files.is_none());
    }

    #[test]
    fn test_status_response_with_audio() {
        let s: JobStatusResponse = serde_json::from_str(
            r#"{"status":"done","audio_files":[{"filename":"a.wav","url":"/audio/a.wav"}]}"#,
        )
        .unwrap();
        assert_eq!(s.audio_files.unwrap()[0].filename, "a.wav");
    }

    #[test]
    fn test_result_body_error() {
        assert_eq!(result_body_error("<div><h2>Generated Images</h2></div>"), None);
        assert_eq!(
            result_body_error(r#"  {"error": "not ready"}"#),
            Some("not ready".to_string())
        );
        assert_eq!(result_body_error(r#"{"ok": true}"#), None);
        assert_eq!(result_body_error(r#"{"error": ""}"#), None);
        assert_eq!(result_body_error(r#"{"error": null}"#), None);
        assert!(result_body_error("{not json").is_some());
    }
}
