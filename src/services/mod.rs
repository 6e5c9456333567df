pub mod chart;
pub mod classifier; // ML inference endpoint
pub mod database;
pub mod photo; // Customer profile photos

pub use classifier::{FoodClassifier, MlClient};
pub use database::{Database, NutritionStore};
pub use photo::{HttpPhotoSource, PhotoSource};
