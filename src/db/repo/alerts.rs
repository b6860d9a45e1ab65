//! Alert rule and trigger operations for the repository.

use crate::domain::{AlertKind, AlertRule, AlertTrigger, Coin, NewAlertRule, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{RepoError, Repository};

const RULE_COLUMNS: &str = "id, symbol, kind, threshold, cooldown_secs, message, active, armed, \
                            baseline_price, last_fired_ms, created_at";

impl Repository {
    // =========================================================================
    // Alert rule operations
    // =========================================================================

    /// Validate and persist a new alert rule. The rule starts armed without a baseline.
    ///
    /// # Errors
    /// Returns `RepoError::Validation` for an unknown kind, bad symbol or bad threshold.
    pub async fn insert_alert_rule(&self, input: &NewAlertRule) -> Result<AlertRule, RepoError> {
        let (symbol, kind) = input.validate()?;
        let created_at = TimeMs::now();
        let message = input
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let result = sqlx::query(
            r#"
            INSERT INTO alert_rules (
                symbol, kind, threshold, cooldown_secs, message, active, armed, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(symbol.as_str())
        .bind(kind.as_str())
        .bind(input.threshold)
        .bind(input.cooldown_secs)
        .bind(message.as_deref())
        .bind(input.active)
        .bind(created_at.as_ms())
        .execute(self.pool())
        .await?;

        Ok(AlertRule {
            id: result.last_insert_rowid(),
            symbol,
            kind,
            threshold: input.threshold,
            cooldown_secs: input.cooldown_secs,
            message,
            active: input.active,
            armed: true,
            baseline_price: None,
            last_fired_at: None,
            created_at,
        })
    }

    pub async fn get_alert_rule(&self, id: i64) -> Result<Option<AlertRule>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().and_then(rule_from_row))
    }

    /// All rules, oldest first.
    pub async fn list_alert_rules(&self) -> Result<Vec<AlertRule>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM alert_rules ORDER BY id ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().filter_map(rule_from_row).collect())
    }

    pub async fn list_active_alert_rules(&self) -> Result<Vec<AlertRule>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM alert_rules WHERE active = 1 ORDER BY id ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().filter_map(rule_from_row).collect())
    }

    /// Flip a rule's `active` flag. Returns the updated rule, `None` when absent.
    pub async fn toggle_alert_rule(&self, id: i64) -> Result<Option<AlertRule>, sqlx::Error> {
        let result = sqlx::query("UPDATE alert_rules SET active = NOT active WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_alert_rule(id).await
    }

    /// Delete a rule. Its triggers are kept.
    pub async fn delete_alert_rule(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alert_rules WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the evaluator-owned state of a rule (armed flag and baseline).
    pub async fn save_alert_rule_state(&self, rule: &AlertRule) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE alert_rules
            SET armed = ?, baseline_price = ?, last_fired_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(rule.armed)
        .bind(rule.baseline_price)
        .bind(rule.last_fired_at.map(|t| t.as_ms()))
        .bind(rule.id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    // =========================================================================
    // Trigger operations
    // =========================================================================

    /// Record a fire: append an unread trigger and store the rule's new state
    /// in one database transaction.
    pub async fn record_alert_fire(
        &self,
        rule: &AlertRule,
        observed_price: f64,
        fired_at: TimeMs,
    ) -> Result<AlertTrigger, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO alert_triggers (rule_id, symbol, threshold, observed_price, fired_ms, read)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(rule.id)
        .bind(rule.symbol.as_str())
        .bind(rule.threshold)
        .bind(observed_price)
        .bind(fired_at.as_ms())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE alert_rules
            SET armed = ?, baseline_price = ?, last_fired_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(rule.armed)
        .bind(rule.baseline_price)
        .bind(fired_at.as_ms())
        .bind(rule.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AlertTrigger {
            id: result.last_insert_rowid(),
            rule_id: rule.id,
            symbol: rule.symbol.clone(),
            threshold: rule.threshold,
            observed_price,
            fired_at,
            read: false,
        })
    }

    /// Triggers newest first, optionally only unread ones.
    pub async fn list_alert_triggers(
        &self,
        unread_only: bool,
    ) -> Result<Vec<AlertTrigger>, sqlx::Error> {
        let sql = if unread_only {
            "SELECT id, rule_id, symbol, threshold, observed_price, fired_ms, read \
             FROM alert_triggers WHERE read = 0 ORDER BY fired_ms DESC, id DESC"
        } else {
            "SELECT id, rule_id, symbol, threshold, observed_price, fired_ms, read \
             FROM alert_triggers ORDER BY fired_ms DESC, id DESC"
        };
        let rows = sqlx::query(sql).fetch_all(self.pool()).await?;
        Ok(rows.iter().filter_map(trigger_from_row).collect())
    }

    pub async fn mark_alert_trigger_read(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE alert_triggers SET read = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns the number of triggers that changed state.
    pub async fn mark_all_alert_triggers_read(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE alert_triggers SET read = 1 WHERE read = 0")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

fn rule_from_row(row: &SqliteRow) -> Option<AlertRule> {
    let id: i64 = row.get("id");
    let symbol_str: String = row.get("symbol");
    let kind_str: String = row.get("kind");

    let symbol = Coin::new(&symbol_str)
        .map_err(|e| warn!(rule_id = id, symbol = %symbol_str, error = %e, "Skipping alert rule with invalid symbol"))
        .ok()?;
    let kind = AlertKind::from_str(&kind_str)
        .map_err(|e| warn!(rule_id = id, kind = %kind_str, error = %e, "Skipping alert rule with unknown kind"))
        .ok()?;

    Some(AlertRule {
        id,
        symbol,
        kind,
        threshold: row.get("threshold"),
        cooldown_secs: row.get("cooldown_secs"),
        message: row.get("message"),
        active: row.get("active"),
        armed: row.get("armed"),
        baseline_price: row.get("baseline_price"),
        last_fired_at: row.get::<Option<i64>, _>("last_fired_ms").map(TimeMs::new),
        created_at: TimeMs::new(row.get("created_at")),
    })
}

fn trigger_from_row(row: &SqliteRow) -> Option<AlertTrigger> {
    let id: i64 = row.get("id");
    let symbol_str: String = row.get("symbol");
    let symbol = Coin::new(&symbol_str)
        .map_err(|e| warn!(trigger_id = id, symbol = %symbol_str, error = %e, "Skipping trigger with invalid symbol"))
        .ok()?;

    Some(AlertTrigger {
        id,
        rule_id: row.get("rule_id"),
        symbol,
        threshold: row.get("threshold"),
        observed_price: row.get("observed_price"),
        fired_at: TimeMs::new(row.get("fired_ms")),
        read: row.get("read"),
    })
}
