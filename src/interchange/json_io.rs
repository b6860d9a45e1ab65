//! Full-portfolio JSON export and tolerant import.

use crate::db::{RepoError, Repository};
use crate::domain::decimal::round_money;
use crate::domain::{AlertRule, Coin, NewAlertRule, NewTransaction, TimeMs, Transaction, TransactionDraft};
use crate::engine::{positions_fifo, EPSILON};
use crate::orchestration::AlertEvaluator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::{ImportIssue, ImportReport, InterchangeError};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub version: String,
    pub export_date: String,
    pub description: String,
}

/// Price-free summary of the replayed ledger at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub coins: Vec<Coin>,
    pub open_positions: usize,
    pub total_cost_basis: f64,
    pub total_realized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub total_transactions: usize,
    pub export_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioExport {
    pub export_info: ExportInfo,
    pub transactions: Vec<Transaction>,
    pub portfolio_stats: PortfolioStats,
    /// Distinct venue/wallet labels used by the transactions.
    pub sources: Vec<String>,
    pub price_alerts: Vec<AlertRule>,
    pub metadata: ExportMetadata,
}

/// Assemble an export document from the stored log and rules.
pub fn build_export(transactions: Vec<Transaction>, alerts: Vec<AlertRule>, at: TimeMs) -> PortfolioExport {
    let report = positions_fifo(&transactions);
    let open: Vec<_> = report
        .positions
        .iter()
        .filter(|p| p.quantity > EPSILON)
        .collect();

    let portfolio_stats = PortfolioStats {
        coins: transactions
            .iter()
            .map(|t| t.coin.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        open_positions: open.len(),
        total_cost_basis: round_money(open.iter().map(|p| p.cost_basis).sum()),
        total_realized: round_money(report.total_realized()),
    };

    let sources = transactions
        .iter()
        .filter_map(|t| t.source.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let stamp = at.to_rfc3339();
    PortfolioExport {
        export_info: ExportInfo {
            version: EXPORT_FORMAT_VERSION.to_string(),
            export_date: stamp.clone(),
            description: "Portfolio transactions and price alerts".to_string(),
        },
        metadata: ExportMetadata {
            total_transactions: transactions.len(),
            export_timestamp: stamp,
        },
        transactions,
        portfolio_stats,
        sources,
        price_alerts: alerts,
    }
}

/// Read the full log and every alert rule into an export document.
pub async fn export_portfolio_json(repo: &Repository, at: TimeMs) -> Result<PortfolioExport, sqlx::Error> {
    let transactions = repo.list_transactions_asc().await?;
    let alerts = repo.list_alert_rules().await?;
    Ok(build_export(transactions, alerts, at))
}

/// Importable content of a JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonImport {
    pub drafts: Vec<TransactionDraft>,
    pub alert_rules: Vec<NewAlertRule>,
    pub errors: Vec<ImportIssue>,
}

fn parse_section<T, F>(
    root: &serde_json::Map<String, Value>,
    section: &str,
    errors: &mut Vec<ImportIssue>,
    mut convert: F,
) -> Vec<T>
where
    F: FnMut(&Value) -> Result<T, String>,
{
    let items = match root.get(section) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!(section, "Import section is not an array");
            errors.push(ImportIssue::new(section, 0, "expected an array"));
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match convert(item) {
            Ok(value) => out.push(value),
            Err(message) => {
                warn!(section, index, error = %message, "Skipping import entry");
                errors.push(ImportIssue::new(section, index, message));
            }
        }
    }
    out
}

/// Parse an export document. Only a non-object root is fatal; bad entries
/// and malformed sections are reported and skipped.
pub fn parse_portfolio_json(bytes: &[u8], now: TimeMs) -> Result<JsonImport, InterchangeError> {
    let root: Value = serde_json::from_slice(bytes).map_err(|e| InterchangeError::Json(e.to_string()))?;
    let Value::Object(root) = root else {
        return Err(InterchangeError::Json("top level must be an object".to_string()));
    };

    let mut errors = Vec::new();
    let drafts = parse_section(&root, "transactions", &mut errors, |item| {
        let input: NewTransaction = serde_json::from_value(item.clone()).map_err(|e| e.to_string())?;
        input.validate(now).map_err(|e| e.to_string())
    });
    let alert_rules = parse_section(&root, "price_alerts", &mut errors, |item| {
        let input: NewAlertRule = serde_json::from_value(item.clone()).map_err(|e| e.to_string())?;
        input.validate().map_err(|e| e.to_string())?;
        Ok(input)
    });

    Ok(JsonImport {
        drafts,
        alert_rules,
        errors,
    })
}

/// Parse and persist a JSON document.
///
/// Transactions are inserted in one batch. Alert rules go through the
/// evaluator so they serialize with any running evaluation.
pub async fn import_json(
    repo: &Repository,
    alerts: &AlertEvaluator,
    bytes: &[u8],
) -> Result<ImportReport, InterchangeError> {
    let parsed = parse_portfolio_json(bytes, TimeMs::now())?;
    let ids = repo.insert_drafts_batch(&parsed.drafts).await?;

    let mut errors = parsed.errors;
    let mut alerts_imported = 0;
    for (index, rule) in parsed.alert_rules.iter().enumerate() {
        match alerts.create_rule(rule).await {
            Ok(_) => alerts_imported += 1,
            Err(RepoError::Validation(e)) => {
                errors.push(ImportIssue::new("price_alerts", index, e.to_string()));
            }
            Err(RepoError::Db(e)) => return Err(e.into()),
        }
    }

    info!(
        transactions = ids.len(),
        alerts = alerts_imported,
        skipped = errors.len(),
        "JSON import finished"
    );
    Ok(ImportReport {
        transactions_imported: ids.len(),
        transaction_ids: ids,
        alerts_imported,
        errors,
    })
}
