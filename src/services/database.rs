use anyhow::{Context, Result};
use sqlx::{pool::PoolConnection, postgres::PgPoolOptions, postgres::PgRow, PgPool, Postgres, Row};

use crate::models::{
    CustomerInfo, CustomerNutritionInfo, DailyNutrition, FoodInfo, Gender, NutrientRange,
    RecommendedNutrition,
};

/// Connection factory for the nutrition database
#[async_trait::async_trait]
pub trait NutritionStore: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>>;
}

/// One open connection. Dropping it releases the connection.
#[async_trait::async_trait]
pub trait StoreConnection: Send {
    async fn get_food_info(&mut self, food_name: &str) -> Result<Option<FoodInfo>>;

    /// Returns `false` when nothing was written.
    async fn record_food_consumption(&mut self, customer_id: i64, food_id: i64) -> Result<bool>;

    async fn get_recommended_nutrition(&mut self, customer_id: i64) -> Result<Option<RecommendedNutrition>>;

    async fn get_customer_basic_info(&mut self, combined_code: &str) -> Result<Option<CustomerInfo>>;

    async fn get_customer_nutrition_info(&mut self, customer_id: i64) -> Result<CustomerNutritionInfo>;
}

pub struct Database {
    pool: PgPool,
    history_days: i64,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32, history_days: i64) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;

        let db = Database { pool, history_days };
        db.init_tables().await?;
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS foods (
                food_id BIGSERIAL PRIMARY KEY,
                food_name TEXT NOT NULL UNIQUE,
                serving_size_g DOUBLE PRECISION NOT NULL DEFAULT 100,
                calories DOUBLE PRECISION NOT NULL DEFAULT 0,
                carbohydrates DOUBLE PRECISION NOT NULL DEFAULT 0,
                protein DOUBLE PRECISION NOT NULL DEFAULT 0,
                fat DOUBLE PRECISION NOT NULL DEFAULT 0,
                fiber DOUBLE PRECISION NOT NULL DEFAULT 0,
                sodium DOUBLE PRECISION NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                customer_id BIGSERIAL PRIMARY KEY,
                combined_code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                gender TEXT NOT NULL,
                age INTEGER NOT NULL,
                height DOUBLE PRECISION NOT NULL,
                weight DOUBLE PRECISION NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                photo_url TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recommended_nutrition (
                customer_id BIGINT PRIMARY KEY REFERENCES customers(customer_id),
                energy_min DOUBLE PRECISION NOT NULL,
                energy_max DOUBLE PRECISION NOT NULL,
                carbohydrates_min DOUBLE PRECISION NOT NULL,
                carbohydrates_max DOUBLE PRECISION NOT NULL,
                protein_min DOUBLE PRECISION NOT NULL,
                protein_max DOUBLE PRECISION NOT NULL,
                fat_min DOUBLE PRECISION NOT NULL,
                fat_max DOUBLE PRECISION NOT NULL,
                dietary_fiber_min DOUBLE PRECISION NOT NULL,
                dietary_fiber_max DOUBLE PRECISION NOT NULL,
                sodium_min DOUBLE PRECISION NOT NULL,
                sodium_max DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS food_consumption (
                id BIGSERIAL PRIMARY KEY,
                customer_id BIGINT NOT NULL REFERENCES customers(customer_id),
                food_id BIGINT NOT NULL REFERENCES foods(food_id),
                consumed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_food_consumption_customer ON food_consumption (customer_id, consumed_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl NutritionStore for Database {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        let conn = self.pool.acquire().await.context("acquire database connection")?;
        log::debug!("🔌 Database connection acquired");
        Ok(Box::new(PgStoreConnection {
            conn,
            history_days: self.history_days,
        }))
    }
}

pub struct PgStoreConnection {
    conn: PoolConnection<Postgres>,
    history_days: i64,
}

impl Drop for PgStoreConnection {
    fn drop(&mut self) {
        log::debug!("🔌 Database connection released");
    }
}

fn range_from_row(row: &PgRow, prefix: &str) -> Result<NutrientRange> {
    let min: f64 = row.try_get(format!("{}_min", prefix).as_str())?;
    let max: f64 = row.try_get(format!("{}_max", prefix).as_str())?;
    Ok(NutrientRange::new(min, max))
}

fn recommended_from_row(row: &PgRow) -> Result<RecommendedNutrition> {
    Ok(RecommendedNutrition {
        calories: range_from_row(row, "energy")?,
        carbohydrates: range_from_row(row, "carbohydrates")?,
        protein: range_from_row(row, "protein")?,
        fat: range_from_row(row, "fat")?,
        fiber: range_from_row(row, "dietary_fiber")?,
        sodium: range_from_row(row, "sodium")?,
    })
}

const RECOMMENDED_QUERY: &str = r#"
    SELECT energy_min, energy_max, carbohydrates_min, carbohydrates_max,
           protein_min, protein_max, fat_min, fat_max,
           dietary_fiber_min, dietary_fiber_max, sodium_min, sodium_max
    FROM recommended_nutrition
    WHERE customer_id = $1
"#;

#[async_trait::async_trait]
impl StoreConnection for PgStoreConnection {
    async fn get_food_info(&mut self, food_name: &str) -> Result<Option<FoodInfo>> {
        let row = sqlx::query(
            r#"
            SELECT food_id, food_name, serving_size_g, calories, carbohydrates,
                   protein, fat, fiber, sodium
            FROM foods
            WHERE LOWER(food_name) = LOWER($1)
            "#,
        )
        .bind(food_name)
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(row) = row else {
            log::debug!("🔍 No food row for '{}'", food_name);
            return Ok(None);
        };

        Ok(Some(FoodInfo {
            food_id: row.try_get(0)?,
            food_name: row.try_get(1)?,
            serving_size_g: row.try_get(2)?,
            calories: row.try_get(3)?,
            carbohydrates: row.try_get(4)?,
            protein: row.try_get(5)?,
            fat: row.try_get(6)?,
            fiber: row.try_get(7)?,
            sodium: row.try_get(8)?,
        }))
    }

    async fn record_food_consumption(&mut self, customer_id: i64, food_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO food_consumption (customer_id, food_id, consumed_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(customer_id)
        .bind(food_id)
        .bind(chrono::Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_recommended_nutrition(&mut self, customer_id: i64) -> Result<Option<RecommendedNutrition>> {
        let row = sqlx::query(RECOMMENDED_QUERY)
            .bind(customer_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.as_ref().map(recommended_from_row).transpose()
    }

    async fn get_customer_basic_info(&mut self, combined_code: &str) -> Result<Option<CustomerInfo>> {
        let row = sqlx::query(
            r#"
            SELECT customer_id, name, gender, age, height, weight, notes, photo_url
            FROM customers
            WHERE combined_code = $1
            "#,
        )
        .bind(combined_code)
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let gender: String = row.try_get(2)?;
        Ok(Some(CustomerInfo {
            customer_id: row.try_get(0)?,
            name: row.try_get(1)?,
            gender: Gender::from_code(&gender),
            age: row.try_get(3)?,
            height: row.try_get(4)?,
            weight: row.try_get(5)?,
            notes: row.try_get(6)?,
            photo_url: row.try_get(7)?,
        }))
    }

    async fn get_customer_nutrition_info(&mut self, customer_id: i64) -> Result<CustomerNutritionInfo> {
        // Per-day totals, most recent first
        let rows = sqlx::query(
            r#"
            SELECT (fc.consumed_at AT TIME ZONE 'UTC')::DATE AS day,
                   SUM(f.calories) AS total_calories,
                   SUM(f.carbohydrates) AS total_carbohydrates,
                   SUM(f.protein) AS total_protein,
                   SUM(f.fat) AS total_fat,
                   SUM(f.fiber) AS total_fiber,
                   SUM(f.sodium) AS total_sodium
            FROM food_consumption fc
            JOIN foods f ON f.food_id = fc.food_id
            WHERE fc.customer_id = $1
            GROUP BY day
            ORDER BY day DESC
            LIMIT $2
            "#,
        )
        .bind(customer_id)
        .bind(self.history_days)
        .fetch_all(&mut *self.conn)
        .await?;

        let recent_nutrition = rows
            .iter()
            .map(|row| -> Result<DailyNutrition> {
                Ok(DailyNutrition {
                    date: row.try_get("day")?,
                    total_calories: row.try_get("total_calories")?,
                    total_carbohydrates: row.try_get("total_carbohydrates")?,
                    total_protein: row.try_get("total_protein")?,
                    total_fat: row.try_get("total_fat")?,
                    total_fiber: row.try_get("total_fiber")?,
                    total_sodium: row.try_get("total_sodium")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let recommended_nutrition = self
            .get_recommended_nutrition(customer_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No recommended nutrition for customer {}", customer_id))?;

        log::debug!("📊 Loaded {} days of nutrition history for customer {}", recent_nutrition.len(), customer_id);

        Ok(CustomerNutritionInfo {
            recent_nutrition,
            recommended_nutrition,
        })
    }
}
