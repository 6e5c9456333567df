//! In-memory collaborators for processor tests.

use anyhow::Result;
use bytes::Bytes;
use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{
    CustomerInfo, CustomerNutritionInfo, DailyNutrition, FoodInfo, FoodPrediction, Gender,
    NutrientRange, RecommendedNutrition,
};
use crate::services::database::StoreConnection;
use crate::services::{FoodClassifier, NutritionStore, PhotoSource};

pub fn sample_food() -> FoodInfo {
    FoodInfo {
        food_id: 42,
        food_name: "Bibimbap".to_string(),
        serving_size_g: 400.0,
        calories: 560.0,
        carbohydrates: 85.0,
        protein: 20.0,
        fat: 14.0,
        fiber: 6.0,
        sodium: 900.0,
    }
}

pub fn sample_customer() -> CustomerInfo {
    CustomerInfo {
        customer_id: 7,
        name: "김민수".to_string(),
        gender: Gender::Male,
        age: 81,
        height: 168.5,
        weight: 62.0,
        notes: "당뇨 관리 중".to_string(),
        photo_url: "http://photos.local/customers/7.jpg".to_string(),
    }
}

pub fn sample_recommended() -> RecommendedNutrition {
    let r = NutrientRange::new;
    RecommendedNutrition {
        calories: r(1800.0, 2200.0),
        carbohydrates: r(250.0, 325.0),
        protein: r(50.0, 70.0),
        fat: r(40.0, 65.0),
        fiber: r(20.0, 30.0),
        sodium: r(1500.0, 2000.0),
    }
}

pub fn sample_day(day: u32, calories: f64) -> DailyNutrition {
    DailyNutrition {
        date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        total_calories: calories,
        total_carbohydrates: 300.0,
        total_protein: 60.0,
        total_fat: 50.0,
        total_fiber: 25.0,
        total_sodium: 1800.0,
    }
}

pub fn jpeg_photo(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 140, 210]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

pub struct FakeClassifier {
    result: std::result::Result<FoodPrediction, String>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn predicting(label: &str, confidence: f64) -> Self {
        Self {
            result: Ok(FoodPrediction {
                label: label.to_string(),
                confidence,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl FoodClassifier for FakeClassifier {
    async fn predict(&self, _image_bytes: Vec<u8>) -> Result<FoodPrediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

#[derive(Default)]
pub struct StoreCounters {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub range_lookups: AtomicUsize,
    pub customer_lookups: Mutex<Vec<String>>,
    pub consumption: Mutex<Vec<(i64, i64)>>,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    pub foods: Vec<FoodInfo>,
    pub customers: Vec<(String, CustomerInfo)>,
    pub recommended: Option<RecommendedNutrition>,
    pub history: Vec<DailyNutrition>,
    pub connect_fails: bool,
    pub record_fails: bool,
    pub record_error: bool,
    pub ranges_fail: bool,
    pub history_fails: bool,
    pub counters: Arc<StoreCounters>,
}

#[async_trait::async_trait]
impl NutritionStore for FakeStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        if self.connect_fails {
            anyhow::bail!("connection refused");
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection { store: self.clone() }))
    }
}

pub struct FakeConnection {
    store: FakeStore,
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.store.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl StoreConnection for FakeConnection {
    async fn get_food_info(&mut self, food_name: &str) -> Result<Option<FoodInfo>> {
        Ok(self
            .store
            .foods
            .iter()
            .find(|f| f.food_name.eq_ignore_ascii_case(food_name))
            .cloned())
    }

    async fn record_food_consumption(&mut self, customer_id: i64, food_id: i64) -> Result<bool> {
        self.store
            .counters
            .consumption
            .lock()
            .unwrap()
            .push((customer_id, food_id));
        if self.store.record_error {
            anyhow::bail!("insert violates foreign key constraint");
        }
        Ok(!self.store.record_fails)
    }

    async fn get_recommended_nutrition(&mut self, _customer_id: i64) -> Result<Option<RecommendedNutrition>> {
        self.store.counters.range_lookups.fetch_add(1, Ordering::SeqCst);
        if self.store.ranges_fail {
            anyhow::bail!("relation \"recommended_nutrition\" does not exist");
        }
        Ok(self.store.recommended)
    }

    async fn get_customer_basic_info(&mut self, combined_code: &str) -> Result<Option<CustomerInfo>> {
        self.store
            .counters
            .customer_lookups
            .lock()
            .unwrap()
            .push(combined_code.to_string());
        Ok(self
            .store
            .customers
            .iter()
            .find(|(code, _)| code == combined_code)
            .map(|(_, c)| c.clone()))
    }

    async fn get_customer_nutrition_info(&mut self, _customer_id: i64) -> Result<CustomerNutritionInfo> {
        if self.store.history_fails {
            anyhow::bail!("history query failed");
        }
        let recommended_nutrition = self
            .store
            .recommended
            .ok_or_else(|| anyhow::anyhow!("No recommended nutrition"))?;
        Ok(CustomerNutritionInfo {
            recent_nutrition: self.store.history.clone(),
            recommended_nutrition,
        })
    }
}

pub struct FakePhotoSource {
    bytes: Option<Vec<u8>>,
    pub calls: AtomicUsize,
}

impl FakePhotoSource {
    pub fn serving(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            bytes: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl PhotoSource for FakePhotoSource {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.bytes {
            Some(bytes) => Ok(Bytes::from(bytes.clone())),
            None => anyhow::bail!("Failed to download photo from {}: HTTP 404 Not Found", url),
        }
    }
}
