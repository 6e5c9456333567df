use anyhow::{Context, Result};
use bytes::Bytes;
use image::{imageops::FilterType, RgbImage};

pub const PHOTO_SIZE: u32 = 300;

/// Source of customer profile photos
#[async_trait::async_trait]
pub trait PhotoSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

pub struct HttpPhotoSource {
    client: reqwest::Client,
}

impl HttpPhotoSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpPhotoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PhotoSource for HttpPhotoSource {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("download photo {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download photo from {}: HTTP {}", url, response.status());
        }

        let bytes = response.bytes().await?;
        log::debug!("💾 Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

/// Decode remote bytes, normalise to RGB and resize to a fixed square.
pub fn decode_and_resize(bytes: &[u8]) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes).context("decode customer photo")?;
    let rgb = decoded.to_rgb8();
    Ok(image::imageops::resize(&rgb, PHOTO_SIZE, PHOTO_SIZE, FilterType::Triangle))
}
