use anyhow::Result;
use image::RgbImage;
use std::sync::Arc;

use crate::models::{CustomerInfo, CustomerNutritionInfo, SessionState};
use crate::services::chart::NutritionChart;
use crate::services::photo::decode_and_resize;
use crate::services::{NutritionStore, PhotoSource};

pub const MISSING_CODES_MESSAGE: &str = "고객 코드 또는 보호자 코드를 확인해주세요.";
pub const NOT_FOUND_MESSAGE: &str = "고객 정보를 찾을 수 없습니다.";

/// Photo, detail block (or a message) and the nutrition chart.
#[derive(Debug, Clone)]
pub struct CustomerView {
    pub photo: Option<RgbImage>,
    pub message: String,
    pub chart: Option<NutritionChart>,
}

impl CustomerView {
    fn message_only(message: impl Into<String>) -> Self {
        Self {
            photo: None,
            message: message.into(),
            chart: None,
        }
    }
}

pub struct CustomerProcessor {
    store: Arc<dyn NutritionStore>,
    photos: Arc<dyn PhotoSource>,
}

impl CustomerProcessor {
    pub fn new(store: Arc<dyn NutritionStore>, photos: Arc<dyn PhotoSource>) -> Self {
        Self { store, photos }
    }

    pub async fn get_customer_info(
        &self,
        customer_code: &str,
        guardian_code: &str,
        session: &mut SessionState,
    ) -> CustomerView {
        let customer_code = customer_code.trim();
        let guardian_code = guardian_code.trim();
        if customer_code.is_empty() || guardian_code.is_empty() {
            return CustomerView::message_only(MISSING_CODES_MESSAGE);
        }

        match self.load_customer(customer_code, guardian_code, session).await {
            Ok(Some(view)) => view,
            Ok(None) => {
                log::info!("🔍 No customer for code {}", combined_code(customer_code, guardian_code));
                CustomerView::message_only(NOT_FOUND_MESSAGE)
            }
            Err(e) => {
                log::error!("❌ Customer lookup failed: {:#}", e);
                CustomerView::message_only(format!("오류가 발생했습니다: {:#}", e))
            }
        }
    }

    /// One connection serves both lookups and is released when `conn` drops.
    async fn load_customer(
        &self,
        customer_code: &str,
        guardian_code: &str,
        session: &mut SessionState,
    ) -> Result<Option<CustomerView>> {
        let mut conn = self.store.connect().await?;

        let code = combined_code(customer_code, guardian_code);
        let Some(customer) = conn.get_customer_basic_info(&code).await? else {
            return Ok(None);
        };

        let photo = self.process_customer_photo(&customer.photo_url).await?;
        let detail = create_customer_detail_text(&customer);
        let customer_id = customer.customer_id;
        session.set_customer(customer);

        let nutrition = conn.get_customer_nutrition_info(customer_id).await?;
        let chart = create_nutrition_plot(&nutrition);

        Ok(Some(CustomerView {
            photo: Some(photo),
            message: detail,
            chart: Some(chart),
        }))
    }

    async fn process_customer_photo(&self, photo_url: &str) -> Result<RgbImage> {
        let bytes = self.photos.fetch(photo_url).await?;
        decode_and_resize(&bytes)
    }
}

pub fn combined_code(customer_code: &str, guardian_code: &str) -> String {
    format!("{}-{}", customer_code, guardian_code)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Whole numbers keep one decimal (`168.0`), fractions print as stored.
fn format_measure(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

pub fn create_customer_detail_text(customer: &CustomerInfo) -> String {
    let mut text = String::from("<div style='border: 1px solid #ccc; padding: 10px; border-radius: 5px;'>");
    text.push_str("<strong>고객 상세 정보</strong><br><br>");
    text.push_str("<table style='width:100%;'>");

    let rows = [
        ("성함", escape_html(&customer.name)),
        ("성별", customer.gender.to_string()),
        ("나이", format!("{}세", customer.age)),
        ("키", format!("{} cm", format_measure(customer.height))),
        ("몸무게", format!("{} kg", format_measure(customer.weight))),
        ("특이사항", escape_html(&customer.notes)),
    ];
    for (label, value) in rows {
        text.push_str(&format!("<tr><td><strong>{}</strong></td><td>{}</td></tr>", label, value));
    }

    text.push_str("</table>");
    text.push_str("</div>");
    text
}

pub fn create_nutrition_plot(nutrition: &CustomerNutritionInfo) -> NutritionChart {
    NutritionChart::build(nutrition)
}
