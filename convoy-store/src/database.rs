use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Merge overrides from the `business_rules` table over the file defaults.
    /// Rows are `{"value": <number>}`; anything else is skipped.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_overrides(defaults, rows.into_iter().map(|r| (r.rule_key, r.rule_value))))
    }
}

fn apply_overrides(mut rules: BusinessRules, rows: impl IntoIterator<Item = (String, Value)>) -> BusinessRules {
    for (key, value) in rows {
        let Some(v) = value.get("value") else {
            warn!(rule_key = %key, "business rule row has no `value`, skipped");
            continue;
        };

        match key.as_str() {
            "booking_limit" => {
                if let Some(u) = v.as_u64() {
                    rules.booking_limit = u as usize;
                }
            }
            "time_conflict_window_minutes" => {
                if let Some(i) = v.as_i64() {
                    rules.time_conflict_window_minutes = i;
                }
            }
            "claim_retry_attempts" => {
                if let Some(u) = v.as_u64() {
                    rules.claim_retry_attempts = u32::try_from(u).unwrap_or(u32::MAX);
                }
            }
            _ => {}
        }
    }
    rules
}
