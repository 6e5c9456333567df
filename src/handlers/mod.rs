pub mod customer_processor;
pub mod food_processor;

pub use customer_processor::{CustomerProcessor, CustomerView};
pub use food_processor::FoodProcessor;
