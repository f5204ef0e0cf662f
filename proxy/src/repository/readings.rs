use super::{ReadingRepository, StoreError};
use aculink::{SensorReading, reading::timestamp_format};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

pub struct SqliteReadingRepository {
    pool: Pool<Sqlite>,
}

impl SqliteReadingRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingRepository for SqliteReadingRepository {
    async fn exists(&self, uuid: &Uuid) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM data WHERE uuid = $1")
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn insert(&self, reading: &SensorReading) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO data (
                uuid, timestamp, bridge_id, sensor, mt, battery, signal_rssi,
                temperature_c, humidity, wind_kmh, wind_direction, rainfall_mm, pressure_pa
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(reading.uuid().to_string())
        .bind(timestamp_format::to_string(&reading.timestamp()))
        .bind(reading.bridge_id())
        .bind(reading.sensor())
        .bind(reading.mt())
        .bind(reading.battery())
        .bind(reading.signal_rssi())
        .bind(reading.temperature_c())
        .bind(reading.humidity())
        .bind(reading.wind_kmh())
        .bind(reading.wind_direction())
        .bind(reading.rainfall_mm())
        .bind(reading.pressure_pa())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
