use crate::db::{RepoError, Repository};
use crate::domain::{AlertRule, AlertTrigger, Coin, NewAlertRule, TimeMs};
use crate::engine::{evaluate_rule, RuleDecision};
use crate::pricing::PriceAggregator;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Result of a non-blocking evaluator tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Another evaluation held the lock.
    Skipped,
    Completed(Vec<AlertTrigger>),
}

/// Evaluates active alert rules against aggregated prices.
///
/// One lock serializes evaluations and rule mutations. Scheduled ticks use
/// `try_lock` and skip when busy; everything else waits.
#[derive(Clone)]
pub struct AlertEvaluator {
    repo: Arc<Repository>,
    aggregator: Arc<PriceAggregator>,
    quote: String,
    lock: Arc<Mutex<()>>,
}

impl AlertEvaluator {
    pub fn new(repo: Arc<Repository>, aggregator: Arc<PriceAggregator>, quote: impl Into<String>) -> Self {
        Self {
            repo,
            aggregator,
            quote: quote.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Scheduled tick: evaluate unless an evaluation is already in flight.
    pub async fn tick(&self) -> Result<TickOutcome, sqlx::Error> {
        self.tick_at(TimeMs::now()).await
    }

    pub async fn tick_at(&self, now: TimeMs) -> Result<TickOutcome, sqlx::Error> {
        let Ok(_guard) = self.lock.try_lock() else {
            debug!("Alert evaluation in flight, skipping tick");
            return Ok(TickOutcome::Skipped);
        };
        let triggers = self.evaluate_locked(now).await?;

        let swept = self.aggregator.cache().sweep_expired_at(now);
        if swept > 0 {
            debug!(swept, "Swept expired prices");
        }
        Ok(TickOutcome::Completed(triggers))
    }

    /// Evaluate all active rules once, waiting for any in-flight evaluation.
    ///
    /// Returns the triggers created by this run.
    pub async fn evaluate_once(&self) -> Result<Vec<AlertTrigger>, sqlx::Error> {
        self.evaluate_at(TimeMs::now()).await
    }

    pub async fn evaluate_at(&self, now: TimeMs) -> Result<Vec<AlertTrigger>, sqlx::Error> {
        let _guard = self.lock.lock().await;
        self.evaluate_locked(now).await
    }

    async fn evaluate_locked(&self, now: TimeMs) -> Result<Vec<AlertTrigger>, sqlx::Error> {
        let rules = self.repo.list_active_alert_rules().await?;
        if rules.is_empty() {
            return Ok(Vec::new());
        }

        let symbols: Vec<Coin> = rules
            .iter()
            .map(|r| r.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let prices = self.aggregator.get_prices_at(&symbols, &self.quote, now).await;

        let mut triggers = Vec::new();
        for rule in rules {
            let Some(price) = prices.get(&rule.symbol).map(|p| p.price) else {
                debug!(rule_id = rule.id, symbol = %rule.symbol, "No price for alert rule");
                continue;
            };

            let rule_id = rule.id;
            match self.apply_observation(rule, price, now).await {
                Ok(Some(trigger)) => triggers.push(trigger),
                Ok(None) => {}
                Err(e) => {
                    // Triggers recorded so far stay stored but are not returned.
                    warn!(
                        rule_id,
                        fired = triggers.len(),
                        error = %e,
                        "Alert evaluation aborted"
                    );
                    return Err(e);
                }
            }
        }

        Ok(triggers)
    }

    /// Persist the outcome of one rule against `price`; returns the trigger when it fired.
    async fn apply_observation(
        &self,
        mut rule: AlertRule,
        price: f64,
        now: TimeMs,
    ) -> Result<Option<AlertTrigger>, sqlx::Error> {
        let update = evaluate_rule(&rule, price, now);
        match update.decision {
            RuleDecision::Fire => {
                update.apply(&mut rule, now);
                let trigger = self.repo.record_alert_fire(&rule, price, now).await?;
                info!(
                    rule_id = rule.id,
                    trigger_id = trigger.id,
                    symbol = %rule.symbol,
                    kind = %rule.kind,
                    threshold = rule.threshold,
                    observed_price = price,
                    "Alert fired"
                );
                Ok(Some(trigger))
            }
            RuleDecision::Suppressed | RuleDecision::Idle => {
                if update.decision == RuleDecision::Suppressed {
                    debug!(rule_id = rule.id, symbol = %rule.symbol, "Alert suppressed by cooldown");
                }
                if update.changes(&rule) {
                    update.apply(&mut rule, now);
                    self.repo.save_alert_rule_state(&rule).await?;
                }
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Rule mutations (serialized with evaluation)
    // =========================================================================

    pub async fn create_rule(&self, input: &NewAlertRule) -> Result<AlertRule, RepoError> {
        let _guard = self.lock.lock().await;
        self.repo.insert_alert_rule(input).await
    }

    pub async fn toggle_rule(&self, id: i64) -> Result<Option<AlertRule>, sqlx::Error> {
        let _guard = self.lock.lock().await;
        self.repo.toggle_alert_rule(id).await
    }

    pub async fn delete_rule(&self, id: i64) -> Result<bool, sqlx::Error> {
        let _guard = self.lock.lock().await;
        self.repo.delete_alert_rule(id).await
    }

    /// Run [`AlertEvaluator::tick`] every `period` until the task is aborted.
    pub fn spawn_loop(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match self.tick().await {
                    Ok(TickOutcome::Completed(triggers)) if !triggers.is_empty() => {
                        info!(count = triggers.len(), "Alert tick produced triggers");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Alert evaluation failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{MockPriceSource, PriceSource};
    use crate::db::init_db;
    use crate::domain::AlertKind;
    use crate::pricing::{AggregatorConfig, PriceCache};
    use tempfile::TempDir;

    async fn setup(source: MockPriceSource) -> (TempDir, Arc<Repository>, AlertEvaluator) {
        // Zero TTL so every evaluation sees the mock's current price.
        setup_with_ttl(source, Duration::ZERO).await
    }

    async fn setup_with_ttl(
        source: MockPriceSource,
        ttl: Duration,
    ) -> (TempDir, Arc<Repository>, AlertEvaluator) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let repo = Arc::new(Repository::new(init_db(&db_path).await.unwrap()));
        let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(source)];
        let aggregator = Arc::new(PriceAggregator::new(
            sources,
            PriceCache::new(ttl),
            AggregatorConfig::default(),
        ));
        let evaluator = AlertEvaluator::new(repo.clone(), aggregator, "USD");
        (temp_dir, repo, evaluator)
    }

    #[tokio::test]
    async fn test_tick_skips_while_locked() {
        let (_dir, _repo, evaluator) = setup(MockPriceSource::new("mock")).await;
        let guard = evaluator.lock.lock().await;
        assert_eq!(evaluator.tick().await.unwrap(), TickOutcome::Skipped);
        drop(guard);
        assert_eq!(
            evaluator.tick().await.unwrap(),
            TickOutcome::Completed(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_rule_without_price_is_left_alone() {
        let (_dir, repo, evaluator) = setup(MockPriceSource::new("mock")).await;
        let rule = evaluator
            .create_rule(&NewAlertRule::new("NOPE", AlertKind::PriceAbove, 1.0, 0))
            .await
            .unwrap();
        assert!(evaluator.evaluate_once().await.unwrap().is_empty());
        let stored = repo.get_alert_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(stored, rule);
    }

    #[tokio::test]
    async fn test_inactive_rules_are_not_evaluated() {
        let source = MockPriceSource::new("mock").with_price("BTC", 60000.0);
        let (_dir, _repo, evaluator) = setup(source).await;
        let rule = evaluator
            .create_rule(&NewAlertRule::new("BTC", AlertKind::PriceAbove, 50000.0, 0))
            .await
            .unwrap();
        evaluator.toggle_rule(rule.id).await.unwrap();
        assert!(evaluator.evaluate_once().await.unwrap().is_empty());

        evaluator.toggle_rule(rule.id).await.unwrap();
        assert_eq!(evaluator.evaluate_once().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_sweeps_expired_prices() {
        let source = MockPriceSource::new("mock")
            .with_price("BTC", 60000.0)
            .with_price("ETH", 3000.0);
        let (_dir, _repo, evaluator) = setup_with_ttl(source, Duration::from_secs(60)).await;
        evaluator
            .create_rule(&NewAlertRule::new("BTC", AlertKind::PriceAbove, 50000.0, 0))
            .await
            .unwrap();

        let t0 = TimeMs::new(1_700_000_000_000);
        let cache = evaluator.aggregator.cache();
        evaluator
            .aggregator
            .get_aggregated_price_at("ETH", "USD", t0)
            .await
            .unwrap();
        evaluator.tick_at(t0).await.unwrap();
        assert_eq!(cache.len(), 2);

        // BTC is refreshed by the evaluation; the stale ETH entry is swept.
        evaluator.tick_at(t0.saturating_add_ms(120_000)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.stats().evictions >= 1);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_earlier_triggers() {
        let source = MockPriceSource::new("mock").with_price("BTC", 60000.0);
        let (_dir, repo, evaluator) = setup(source).await;
        evaluator
            .create_rule(&NewAlertRule::new("BTC", AlertKind::PriceAbove, 50000.0, 0))
            .await
            .unwrap();
        let second = evaluator
            .create_rule(&NewAlertRule::new("BTC", AlertKind::PriceAbove, 55000.0, 0))
            .await
            .unwrap();

        sqlx::query(&format!(
            "CREATE TRIGGER reject_second BEFORE INSERT ON alert_triggers \
             WHEN NEW.rule_id = {} BEGIN SELECT RAISE(ABORT, 'rejected'); END",
            second.id
        ))
        .execute(repo.pool())
        .await
        .unwrap();

        assert!(evaluator.evaluate_once().await.is_err());
        let stored = repo.list_alert_triggers(false).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].rule_id, second.id);
    }
}
