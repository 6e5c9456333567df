use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::models::FoodPrediction;

/// Trait for food image classifiers (the ML inference endpoint)
#[async_trait::async_trait]
pub trait FoodClassifier: Send + Sync {
    async fn predict(&self, image_bytes: Vec<u8>) -> Result<FoodPrediction>;
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(alias = "label", alias = "class")]
    food_name: String,
    #[serde(default)]
    confidence: f64,
}

pub struct MlClient {
    base_url: String,
    client: reqwest::Client,
}

impl MlClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build ML http client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }

    fn parse_response(body: &str) -> Result<FoodPrediction> {
        let parsed: PredictionResponse =
            serde_json::from_str(body).context("parse prediction response")?;

        let label = parsed.food_name.trim().to_string();
        if label.is_empty() {
            anyhow::bail!("Prediction response contained an empty food name");
        }

        Ok(FoodPrediction {
            label,
            confidence: parsed.confidence,
        })
    }
}

#[async_trait::async_trait]
impl FoodClassifier for MlClient {
    async fn predict(&self, image_bytes: Vec<u8>) -> Result<FoodPrediction> {
        log::debug!("📸 Sending {} bytes to classifier at {}", image_bytes.len(), self.predict_url());

        let part = reqwest::multipart::Part::bytes(image_bytes)
            .file_name("capture.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.predict_url())
            .multipart(form)
            .send()
            .await
            .context("send prediction request")?;

        let status = response.status();
        log::debug!("📥 Classifier response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Classifier error response ({}): {}", status, error_text);
            anyhow::bail!("ML API error ({}): {}", status, error_text);
        }

        let body = response.text().await?;
        let prediction = Self::parse_response(&body)?;
        log::info!("🤖 Predicted '{}' (confidence {:.3})", prediction.label, prediction.confidence);

        Ok(prediction)
    }
}
