//! Postgres implementation of the warehouse sink.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::keys::{Dimension, SurrogateKeys};
use crate::rows::{DimensionUpsert, FactRow};
use crate::sink::WarehouseSink;
use crate::WarehouseError;

/// Warehouse sink writing to the star schema created by the workspace
/// migrations. Dimension upserts use `ON CONFLICT .. DO NOTHING` on the
/// natural key, so replaying a batch after a partial failure never clobbers
/// a committed mapping.
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load every committed dimension row into `keys`, so surrogate-key
    /// allocation continues past existing keys after a process restart.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlx`] if any dimension table cannot be read.
    pub async fn load_existing_keys(&self, keys: &SurrogateKeys) -> Result<(), WarehouseError> {
        for dim in Dimension::ALL {
            let sql = format!(
                "SELECT {key}, {natural}::text FROM {table}",
                key = dim.key_column(),
                natural = dim.natural_column(),
                table = dim.table(),
            );
            let rows: Vec<(i64, String)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
            let count = rows.len();
            for (key, natural) in rows {
                keys.preload(dim, &natural, key);
            }
            tracing::debug!(dimension = dim.table(), count, "preloaded surrogate keys");
        }
        Ok(())
    }

    /// Row counts per table, for the `status` CLI command: six dimension
    /// counts in [`Dimension::ALL`] order, then the fact count.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlx`] if any count query fails.
    pub async fn table_counts(&self) -> Result<Vec<(String, i64)>, WarehouseError> {
        let mut counts = Vec::with_capacity(7);
        for dim in Dimension::ALL {
            let sql = format!("SELECT COUNT(*) FROM {}", dim.table());
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
            counts.push((dim.table().to_string(), count));
        }
        let facts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fact_discussion")
            .fetch_one(&self.pool)
            .await?;
        counts.push(("fact_discussion".to_string(), facts));
        Ok(counts)
    }

    /// Post-commit join check: the number of fact rows whose foreign keys do
    /// NOT all resolve. Zero on a healthy warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlx`] if the query fails.
    pub async fn dangling_fact_count(&self) -> Result<i64, WarehouseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fact_discussion f \
             WHERE NOT EXISTS (SELECT 1 FROM dim_date d WHERE d.date_key = f.date_key) \
                OR NOT EXISTS (SELECT 1 FROM dim_community c WHERE c.community_key = f.community_key) \
                OR NOT EXISTS (SELECT 1 FROM dim_ai_model m WHERE m.ai_model_key = f.ai_model_key) \
                OR NOT EXISTS (SELECT 1 FROM dim_sentiment s WHERE s.sentiment_key = f.sentiment_key) \
                OR NOT EXISTS (SELECT 1 FROM dim_topic t WHERE t.topic_key = f.topic_key) \
                OR NOT EXISTS (SELECT 1 FROM dim_author a WHERE a.author_key = f.author_key)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// `NUMERIC(6,3)` columns hold three decimal places.
fn score_decimal(value: f32) -> Decimal {
    Decimal::from_f32(value).unwrap_or(Decimal::ZERO).round_dp(3)
}

fn engagement_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(3)
}

#[async_trait]
impl WarehouseSink for PgSink {
    async fn upsert_dimensions(&self, rows: &[DimensionUpsert]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let sql = format!(
                "INSERT INTO {table} ({key}, {natural}) VALUES ($1, $2) \
                 ON CONFLICT ({natural}) DO NOTHING",
                table = row.dimension.table(),
                key = row.dimension.key_column(),
                natural = row.dimension.natural_column(),
            );
            let query = sqlx::query(&sql).bind(row.surrogate_key);
            let query = if row.dimension == Dimension::Date {
                let date = NaiveDate::parse_from_str(&row.natural_key, "%Y-%m-%d")
                    .map_err(|_| WarehouseError::InvalidDateKey(row.natural_key.clone()))?;
                query.bind(date)
            } else {
                query.bind(row.natural_key.clone())
            };
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_facts(&self, rows: &[FactRow]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO fact_discussion \
                     (mention_id, date_key, community_key, ai_model_key, sentiment_key, \
                      topic_key, author_key, sentiment_score, polarity, subjectivity, \
                      engagement_score, parent_type, topics, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            )
            .bind(&row.mention_id)
            .bind(row.date_key)
            .bind(row.community_key)
            .bind(row.ai_model_key)
            .bind(row.sentiment_key)
            .bind(row.topic_key)
            .bind(row.author_key)
            .bind(score_decimal(row.sentiment_score))
            .bind(score_decimal(row.polarity))
            .bind(score_decimal(row.subjectivity))
            .bind(engagement_decimal(row.engagement_score))
            .bind(&row.parent_type)
            .bind(serde_json::to_value(&row.topics)?)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_decimal_rounds_to_three_places() {
        assert_eq!(score_decimal(0.123_456), Decimal::new(123, 3));
        assert_eq!(score_decimal(-0.999_9), Decimal::new(-1000, 3));
        assert_eq!(score_decimal(0.0), Decimal::ZERO);
    }

    #[test]
    fn engagement_decimal_handles_large_values() {
        assert_eq!(engagement_decimal(12_345.678_9), Decimal::new(12_345_679, 3));
    }

    #[test]
    fn non_finite_scores_degrade_to_zero() {
        assert_eq!(score_decimal(f32::NAN), Decimal::ZERO);
        assert_eq!(engagement_decimal(f64::INFINITY), Decimal::ZERO);
    }
}
