//! Upload preview pipeline
//!
//! A preview is produced by the first [`PreviewStrategy`] that succeeds. HEIC
//! files go through client conversion, server conversion, native rendering
//! and finally a placeholder; other images are rendered natively or fall back
//! to an error placeholder. Strategies never panic and never fail the upload:
//! the bytes sent to the server are always the original file.

use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io::Cursor;
use thiserror::Error;

use crate::api::HeicInfo;
use crate::client::VPromptClient;
use crate::error::ClientError;
use crate::messages::{self, LocalizedText};
use crate::upload::{format_file_size, UploadFile};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("no converter for {0}")]
    Unsupported(String),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Which stage produced a rendered preview
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewSource {
    ClientConversion,
    ServerConversion,
    Native,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Preview {
    /// A displayable image as a `data:` URL
    Image {
        data_url: String,
        width: u32,
        height: u32,
        source: PreviewSource,
    },
    Placeholder {
        filename: String,
        size_label: String,
        dimensions: Option<(u32, u32)>,
        message: LocalizedText,
    },
}

impl Preview {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Preview::Placeholder { .. })
    }
}

/// One way of turning an upload into a preview
pub trait PreviewStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn render<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Preview, PreviewError>>;
}

/// Client-side HEIC decoder. None ships by default.
pub trait HeicConverter: Send + Sync {
    fn convert<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Vec<u8>, PreviewError>>;
}

/// Run `strategies` in order and return the first preview produced
pub async fn first_success(
    strategies: &[Box<dyn PreviewStrategy>],
    file: &UploadFile,
) -> Preview {
    for strategy in strategies {
        match strategy.render(file).await {
            Ok(preview) => {
                log::debug!("Preview of {} produced by {}", file.name, strategy.name());
                return preview;
            }
            Err(e) => log::warn!(
                "Preview strategy {} failed for {}: {}",
                strategy.name(),
                file.name,
                e
            ),
        }
    }
    placeholder(file, None, messages::preview_failed())
}

/// Strategy order for `file`. The server stage is skipped without a client.
pub fn build_pipeline(
    file: &UploadFile,
    client: Option<&VPromptClient>,
    converter: Option<Box<dyn HeicConverter>>,
    info: Option<HeicInfo>,
) -> Vec<Box<dyn PreviewStrategy>> {
    let mut strategies: Vec<Box<dyn PreviewStrategy>> = Vec::new();
    if file.is_heic() {
        if let Some(converter) = converter {
            strategies.push(Box::new(ClientConversion(converter)));
        }
        if let Some(client) = client {
            strategies.push(Box::new(ServerConversion(client.clone())));
        }
        strategies.push(Box::new(NativeRender));
        strategies.push(Box::new(HeicPlaceholder(info)));
    } else {
        strategies.push(Box::new(NativeRender));
        strategies.push(Box::new(ErrorPlaceholder));
    }
    strategies
}

/// Decode just enough of `bytes` to know their format and size, then wrap
/// them in a `data:` URL
pub fn render_data_url(bytes: &[u8], source: PreviewSource) -> Result<Preview, PreviewError> {
    let format = image::guess_format(bytes).map_err(|e| PreviewError::Decode(e.to_string()))?;
    let (width, height) = image::ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| PreviewError::Decode(e.to_string()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(Preview::Image {
        data_url: format!("data:{};base64,{}", format.to_mime_type(), encoded),
        width,
        height,
        source,
    })
}

/// Bytes behind a `data:...;base64,` URL
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, PreviewError> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| PreviewError::Decode("not a data URL".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(PreviewError::Decode(format!(
            "unsupported data URL encoding {header:?}"
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| PreviewError::Decode(e.to_string()))
}

/// Encodings a texture can be loaded from directly
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Png,
    Jpeg,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    pub format: TextureFormat,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// PNG and JPEG pass through; any other decodable image is re-encoded as PNG
pub fn texture_bytes(bytes: &[u8]) -> Result<TextureImage, PreviewError> {
    let format = image::guess_format(bytes).map_err(|e| PreviewError::Decode(e.to_string()))?;
    let texture = match format {
        image::ImageFormat::Png | image::ImageFormat::Jpeg => bytes.to_vec(),
        other => {
            let decoded = image::load_from_memory_with_format(bytes, other)
                .map_err(|e| PreviewError::Decode(e.to_string()))?;
            let mut png = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| PreviewError::Decode(e.to_string()))?;
            log::debug!("Re-encoded {:?} image as PNG for display", other);
            png
        }
    };
    let texture_format = if format == image::ImageFormat::Jpeg {
        TextureFormat::Jpeg
    } else {
        TextureFormat::Png
    };
    let (width, height) = image::ImageReader::new(Cursor::new(&texture))
        .with_guessed_format()
        .map_err(|e| PreviewError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| PreviewError::Decode(e.to_string()))?;
    Ok(TextureImage {
        format: texture_format,
        bytes: texture,
        width,
        height,
    })
}

/// HEIF boxes are only searched this far into the file
const HEIC_SCAN_LIMIT: usize = 64 * 1024;
const HEIC_MAX_DEPTH: u8 = 4;

/// Width and height from the `ispe` (image spatial extents) property of a
/// HEIF file, found under `meta/iprp/ipco` within the first 64 KiB
pub fn heic_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let window = &bytes[..bytes.len().min(HEIC_SCAN_LIMIT)];
    find_ispe(window, 0)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn find_ispe(bytes: &[u8], depth: u8) -> Option<(u32, u32)> {
    let mut offset = 0usize;
    while offset + 8 <= bytes.len() {
        let size = read_u32(bytes, offset)? as usize;
        // 0 runs to end of file, 1 is a 64-bit size; neither is expected this early
        if size < 8 {
            break;
        }
        let end = offset.saturating_add(size).min(bytes.len());
        let kind = &bytes[offset + 4..offset + 8];
        let body = &bytes[offset + 8..end];

        let found = match kind {
            // Full box: version and flags come first
            b"ispe" => read_u32(body, 4)
                .zip(read_u32(body, 8))
                .filter(|&(w, h)| w > 0 && h > 0),
            b"meta" if depth < HEIC_MAX_DEPTH => {
                body.get(4..).and_then(|inner| find_ispe(inner, depth + 1))
            }
            b"iprp" | b"ipco" if depth < HEIC_MAX_DEPTH => find_ispe(body, depth + 1),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
        offset = match offset.checked_add(size) {
            Some(next) => next,
            None => break,
        };
    }
    None
}

fn placeholder(file: &UploadFile, dimensions: Option<(u32, u32)>, message: LocalizedText) -> Preview {
    Preview::Placeholder {
        filename: file.name.clone(),
        size_label: format_file_size(file.bytes.len() as u64),
        dimensions,
        message,
    }
}

pub struct ClientConversion(pub Box<dyn HeicConverter>);

impl PreviewStrategy for ClientConversion {
    fn name(&self) -> &'static str {
        "client-conversion"
    }

    fn render<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Preview, PreviewError>> {
        async move {
            let bytes = self.0.convert(file).await?;
            render_data_url(&bytes, PreviewSource::ClientConversion)
        }
        .boxed()
    }
}

/// `POST /convert_heic_preview`
pub struct ServerConversion(pub VPromptClient);

impl PreviewStrategy for ServerConversion {
    fn name(&self) -> &'static str {
        "server-conversion"
    }

    fn render<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Preview, PreviewError>> {
        async move {
            let bytes = self.0.convert_heic_preview(file).await?;
            render_data_url(&bytes, PreviewSource::ServerConversion)
        }
        .boxed()
    }
}

/// Formats the `image` crate can read (PNG, JPEG, GIF)
pub struct NativeRender;

impl PreviewStrategy for NativeRender {
    fn name(&self) -> &'static str {
        "native"
    }

    fn render<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Preview, PreviewError>> {
        async move { render_data_url(&file.bytes, PreviewSource::Native) }.boxed()
    }
}

/// Last HEIC stage: the file is accepted and converted after upload
pub struct HeicPlaceholder(pub Option<HeicInfo>);

impl PreviewStrategy for HeicPlaceholder {
    fn name(&self) -> &'static str {
        "heic-placeholder"
    }

    fn render<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Preview, PreviewError>> {
        let dimensions = self
            .0
            .as_ref()
            .and_then(|info| info.width.zip(info.height))
            .or_else(|| heic_dimensions(&file.bytes));
        async move { Ok(placeholder(file, dimensions, messages::preview_pending_server())) }
            .boxed()
    }
}

pub struct ErrorPlaceholder;

impl PreviewStrategy for ErrorPlaceholder {
    fn name(&self) -> &'static str {
        "error-placeholder"
    }

    fn render<'a>(&'a self, file: &'a UploadFile) -> BoxFuture<'a, Result<Preview, PreviewError>> {
        async move { Ok(placeholder(file, None, messages::preview_failed())) }.boxed()
    }
}
