//! Edge-triggered alert rule evaluation.

use crate::domain::{AlertKind, AlertRule, TimeMs};

/// What a single observation did to a rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleDecision {
    /// Condition met while armed and outside cooldown.
    Fire,
    /// Condition met while armed but inside cooldown; the rule stays armed.
    Suppressed,
    /// Nothing to report.
    Idle,
}

/// Outcome of evaluating one rule against one observed price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleUpdate {
    pub decision: RuleDecision,
    pub armed: bool,
    pub baseline_price: Option<f64>,
}

impl RuleUpdate {
    /// Whether the rule's persisted state differs from `rule`.
    pub fn changes(&self, rule: &AlertRule) -> bool {
        self.armed != rule.armed || self.baseline_price != rule.baseline_price
    }

    /// Copy the new state onto `rule`, stamping `last_fired_at` on fire.
    pub fn apply(&self, rule: &mut AlertRule, now: TimeMs) {
        rule.armed = self.armed;
        rule.baseline_price = self.baseline_price;
        if self.decision == RuleDecision::Fire {
            rule.last_fired_at = Some(now);
        }
    }
}

/// True while `now` is closer than the rule's cooldown to its last fire.
pub fn in_cooldown(rule: &AlertRule, now: TimeMs) -> bool {
    match rule.last_fired_at {
        Some(last) => now.as_ms().saturating_sub(last.as_ms()) < rule.cooldown_ms(),
        None => false,
    }
}

/// Evaluate `rule` against `price` observed at `now`.
///
/// Threshold rules fire once per crossing: they disarm on fire and re-arm only
/// after the condition is observed false. `change_pct` rules take their first
/// observation as baseline and move it to the firing price on every fire.
pub fn evaluate_rule(rule: &AlertRule, price: f64, now: TimeMs) -> RuleUpdate {
    let idle = |armed: bool, baseline_price: Option<f64>| RuleUpdate {
        decision: RuleDecision::Idle,
        armed,
        baseline_price,
    };

    match rule.kind {
        AlertKind::PriceAbove | AlertKind::PriceBelow => {
            let condition = match rule.kind {
                AlertKind::PriceAbove => price >= rule.threshold,
                _ => price <= rule.threshold,
            };
            if !condition {
                return idle(true, rule.baseline_price);
            }
            if !rule.armed {
                return idle(false, rule.baseline_price);
            }
            if in_cooldown(rule, now) {
                return RuleUpdate {
                    decision: RuleDecision::Suppressed,
                    armed: true,
                    baseline_price: rule.baseline_price,
                };
            }
            RuleUpdate {
                decision: RuleDecision::Fire,
                armed: false,
                baseline_price: rule.baseline_price,
            }
        }
        AlertKind::ChangePct => {
            let baseline = match rule.baseline_price {
                Some(b) if b > 0.0 => b,
                _ => return idle(true, Some(price)),
            };
            let change_pct = ((price - baseline) / baseline).abs() * 100.0;
            if change_pct < rule.threshold {
                return idle(true, Some(baseline));
            }
            if in_cooldown(rule, now) {
                return RuleUpdate {
                    decision: RuleDecision::Suppressed,
                    armed: true,
                    baseline_price: Some(baseline),
                };
            }
            RuleUpdate {
                decision: RuleDecision::Fire,
                armed: true,
                baseline_price: Some(price),
            }
        }
    }
}
