//! Background image decoding.
//!
//! The background is kept as a data URL (so it can be persisted as-is) next to
//! the native pixel dimensions that define the document canvas.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageReader;

use crate::error::{EditorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

impl BackgroundImage {
    /// Decode raw image file bytes (PNG or JPEG).
    pub async fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        decode_off_thread(move || {
            let reader = ImageReader::new(Cursor::new(&bytes))
                .with_guessed_format()
                .map_err(|e| EditorError::InvalidImage(e.to_string()))?;
            let mime = reader
                .format()
                .map(|format| format.to_mime_type())
                .ok_or_else(|| EditorError::InvalidImage("unrecognized image format".to_string()))?;
            let (width, height) = reader
                .into_dimensions()
                .map_err(|e| EditorError::InvalidImage(e.to_string()))?;
            let data_url = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
            Ok(Self { data_url, width, height })
        })
        .await
    }

    /// Decode a `data:<mime>;base64,<payload>` URL.
    pub async fn from_data_url(data_url: String) -> Result<Self> {
        decode_off_thread(move || {
            let bytes = decode_data_url(&data_url)?;
            let (width, height) = ImageReader::new(Cursor::new(&bytes))
                .with_guessed_format()
                .map_err(|e| EditorError::InvalidImage(e.to_string()))?
                .into_dimensions()
                .map_err(|e| EditorError::InvalidImage(e.to_string()))?;
            Ok(Self { data_url, width, height })
        })
        .await
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let payload = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| EditorError::InvalidImage("not a base64 data URL".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| EditorError::InvalidImage(e.to_string()))
}

async fn decode_off_thread<F>(decode: F) -> Result<BackgroundImage>
where
    F: FnOnce() -> Result<BackgroundImage> + Send + 'static,
{
    tokio::task::spawn_blocking(decode)
        .await
        .map_err(|e| EditorError::InvalidImage(format!("decoder task failed: {e}")))?
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbaImage::new(width, height)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
