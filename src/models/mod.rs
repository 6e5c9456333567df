use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-interaction context. Inactive until a customer has been resolved.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    customer: Option<CustomerInfo>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.customer.is_some()
    }

    pub fn customer_id(&self) -> Option<i64> {
        self.customer.as_ref().map(|c| c.customer_id)
    }

    pub fn set_customer(&mut self, customer: CustomerInfo) {
        log::info!("👤 Session customer set: {} (id: {})", customer.name, customer.customer_id);
        self.customer = Some(customer);
    }

    pub fn clear(&mut self) {
        self.customer = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodInfo {
    pub food_id: i64,
    pub food_name: String,
    pub serving_size_g: f64,
    pub calories: f64,      // kcal
    pub carbohydrates: f64, // g
    pub protein: f64,       // g
    pub fat: f64,           // g
    pub fiber: f64,         // g
    pub sodium: f64,        // mg
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodPrediction {
    pub label: String,
    pub confidence: f64,
}

/// Combined result of one food capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionResult {
    pub error: Option<String>,
    pub food_info: Option<FoodInfo>,
    pub confidence: f64,
}

impl NutritionResult {
    pub fn failure(error: impl Into<String>, confidence: f64) -> Self {
        Self {
            error: Some(error.into()),
            food_info: None,
            confidence,
        }
    }

    pub fn found(food_info: FoodInfo, confidence: f64) -> Self {
        Self {
            error: None,
            food_info: Some(food_info),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    Below,
    Within,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutrientRange {
    pub min: f64,
    pub max: f64,
}

impl NutrientRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Bounds are inclusive.
    pub fn classify(&self, value: f64) -> RangePosition {
        if value < self.min {
            RangePosition::Below
        } else if value > self.max {
            RangePosition::Above
        } else {
            RangePosition::Within
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nutrient {
    Calories,
    Carbohydrates,
    Protein,
    Fat,
    Fiber,
    Sodium,
}

impl Nutrient {
    pub fn key(&self) -> &'static str {
        match self {
            Nutrient::Calories => "calories",
            Nutrient::Carbohydrates => "carbohydrates",
            Nutrient::Protein => "protein",
            Nutrient::Fat => "fat",
            Nutrient::Fiber => "fiber",
            Nutrient::Sodium => "sodium",
        }
    }
}

/// Target ranges for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedNutrition {
    pub calories: NutrientRange,
    pub carbohydrates: NutrientRange,
    pub protein: NutrientRange,
    pub fat: NutrientRange,
    pub fiber: NutrientRange,
    pub sodium: NutrientRange,
}

impl RecommendedNutrition {
    pub fn range(&self, nutrient: Nutrient) -> NutrientRange {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Carbohydrates => self.carbohydrates,
            Nutrient::Protein => self.protein,
            Nutrient::Fat => self.fat,
            Nutrient::Fiber => self.fiber,
            Nutrient::Sodium => self.sodium,
        }
    }
}

/// Daily ceilings shown next to a captured dish (upper bound of each range).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedValues {
    pub calories: f64,
    pub carbohydrates: f64,
    pub protein: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sodium: f64,
}

impl From<&RecommendedNutrition> for RecommendedValues {
    fn from(r: &RecommendedNutrition) -> Self {
        Self {
            calories: r.calories.max,
            carbohydrates: r.carbohydrates.max,
            protein: r.protein.max,
            fat: r.fat.max,
            fiber: r.fiber.max,
            sodium: r.sodium.max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Anything other than `M` is treated as female.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "M" => Gender::Male,
            _ => Gender::Female,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gender::Male => "남성",
            Gender::Female => "여성",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub customer_id: i64,
    pub name: String,
    pub gender: Gender,
    pub age: i32,
    pub height: f64, // cm
    pub weight: f64, // kg
    pub notes: String,
    pub photo_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNutrition {
    pub date: NaiveDate,
    pub total_calories: f64,
    pub total_carbohydrates: f64,
    pub total_protein: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub total_sodium: f64,
}

impl DailyNutrition {
    pub fn total(&self, nutrient: Nutrient) -> f64 {
        match nutrient {
            Nutrient::Calories => self.total_calories,
            Nutrient::Carbohydrates => self.total_carbohydrates,
            Nutrient::Protein => self.total_protein,
            Nutrient::Fat => self.total_fat,
            Nutrient::Fiber => self.total_fiber,
            Nutrient::Sodium => self.total_sodium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerNutritionInfo {
    /// Most recent day first.
    pub recent_nutrition: Vec<DailyNutrition>,
    pub recommended_nutrition: RecommendedNutrition,
}
