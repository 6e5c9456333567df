use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;

use crate::models::{NutritionResult, RecommendedValues, SessionState};
use crate::services::{FoodClassifier, NutritionStore};

pub const NO_IMAGE_MESSAGE: &str = "No image captured";

pub struct FoodProcessor {
    classifier: Arc<dyn FoodClassifier>,
    store: Arc<dyn NutritionStore>,
}

impl FoodProcessor {
    pub fn new(classifier: Arc<dyn FoodClassifier>, store: Arc<dyn NutritionStore>) -> Self {
        Self { classifier, store }
    }

    /// Classify a captured image and look up its nutrition facts.
    ///
    /// Consumption is recorded only for an active session and a successful
    /// lookup. Never fails: errors come back in `NutritionResult::error`.
    pub async fn get_nutritional_info(
        &self,
        image: Option<&DynamicImage>,
        session: &SessionState,
    ) -> NutritionResult {
        let Some(image) = image else {
            return NutritionResult::failure(NO_IMAGE_MESSAGE, 0.0);
        };

        match self.lookup_food(image, session).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("❌ Food lookup failed: {:#}", e);
                NutritionResult::failure(format!("Error: {:#}", e), 0.0)
            }
        }
    }

    async fn lookup_food(&self, image: &DynamicImage, session: &SessionState) -> Result<NutritionResult> {
        let image_bytes = encode_jpeg(image)?;
        let prediction = self.classifier.predict(image_bytes).await?;

        let mut conn = self.store.connect().await?;
        let food_info = conn.get_food_info(&prediction.label).await?;

        if let (Some(food), Some(customer_id)) = (&food_info, session.customer_id()) {
            match conn.record_food_consumption(customer_id, food.food_id).await {
                Ok(true) => {
                    log::info!("🍽️ Recorded food_id {} for customer {}", food.food_id, customer_id);
                }
                Ok(false) => {
                    log::warn!("⚠️ Failed to record food consumption for food_id: {}", food.food_id);
                }
                Err(e) => {
                    log::warn!("⚠️ Failed to record food consumption for food_id: {}: {:#}", food.food_id, e);
                }
            }
        }
        drop(conn);

        let result = match food_info {
            Some(food) => NutritionResult::found(food, prediction.confidence),
            None => NutritionResult::failure(
                format!("No nutritional information found for {}.", prediction.label),
                prediction.confidence,
            ),
        };

        Ok(result)
    }

    pub async fn get_recommended_values(&self, session: &SessionState) -> Option<RecommendedValues> {
        if !session.is_active() {
            log::info!("ℹ️ No active customer session");
            return None;
        }

        match self.fetch_recommended(session).await {
            Ok(values) => values,
            Err(e) => {
                log::error!("❌ Error getting recommended values: {:#}", e);
                None
            }
        }
    }

    async fn fetch_recommended(&self, session: &SessionState) -> Result<Option<RecommendedValues>> {
        let customer_id = session.customer_id().context("session has no customer")?;
        let mut conn = self.store.connect().await?;
        let recommended = conn.get_recommended_nutrition(customer_id).await?;
        Ok(recommended.as_ref().map(RecommendedValues::from))
    }
}

/// JPEG needs an alpha-free buffer, so frames are flattened to RGB first.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut buf, ImageFormat::Jpeg)
        .context("encode captured image")?;
    Ok(buf.into_inner())
}
