//! Transaction CSV import and export.

use crate::db::Repository;
use crate::domain::{
    NewTransaction, TimeMs, Transaction, TransactionDraft, TxKind, ValidationError,
};
use std::str::FromStr;
use tracing::warn;

use super::{ImportIssue, ImportReport, InterchangeError};

/// Export header; import accepts any subset containing `Coin`, `Quantity`, `Price`.
pub const CSV_HEADERS: [&str; 9] = [
    "ID", "Created", "Coin", "Type", "Strategy", "Quantity", "Price", "Source", "Notes",
];

/// Validated rows of a CSV document plus the rows that were rejected.
#[derive(Debug, Clone, Default)]
pub struct CsvImport {
    pub drafts: Vec<TransactionDraft>,
    pub errors: Vec<ImportIssue>,
}

#[derive(Debug, Default)]
struct Columns {
    coin: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
    kind: Option<usize>,
    strategy: Option<usize>,
    source: Option<usize>,
    notes: Option<usize>,
    created: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, InterchangeError> {
        let mut cols = Columns::default();
        for (idx, name) in headers.iter().enumerate() {
            let slot = match name.trim().to_ascii_lowercase().as_str() {
                "coin" => &mut cols.coin,
                "quantity" => &mut cols.quantity,
                "price" => &mut cols.price,
                "type" => &mut cols.kind,
                "strategy" => &mut cols.strategy,
                "source" => &mut cols.source,
                "notes" => &mut cols.notes,
                "created" => &mut cols.created,
                _ => continue,
            };
            slot.get_or_insert(idx);
        }
        if cols.coin.is_none() {
            return Err(InterchangeError::MissingColumn("Coin"));
        }
        if cols.quantity.is_none() {
            return Err(InterchangeError::MissingColumn("Quantity"));
        }
        if cols.price.is_none() {
            return Err(InterchangeError::MissingColumn("Price"));
        }
        Ok(cols)
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_number(raw: Option<&str>, name: &'static str) -> Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("{} is empty", name))?;
    raw.replace(',', "")
        .parse::<f64>()
        .map_err(|e| format!("invalid {} '{}': {}", name, raw, e))
}

/// Zero price is only meaningful for income received for free and pure fee deductions.
fn zero_price_allowed(kind: &str) -> bool {
    TxKind::from_str(kind)
        .map(|k| {
            matches!(
                k,
                TxKind::IncomeStaking
                    | TxKind::IncomeAirdrop
                    | TxKind::IncomeOther
                    | TxKind::ExpenseFee
            )
        })
        .unwrap_or(false)
}

fn parse_row(
    record: &csv::StringRecord,
    cols: &Columns,
    now: TimeMs,
) -> Result<TransactionDraft, String> {
    let coin = field(record, cols.coin).unwrap_or_default().to_string();
    let quantity = parse_number(field(record, cols.quantity), "Quantity")?;
    let price = parse_number(field(record, cols.price), "Price")?;
    let kind = field(record, cols.kind)
        .unwrap_or(TxKind::TradeBuy.as_str())
        .to_string();

    if price <= 0.0 && !(price == 0.0 && zero_price_allowed(&kind)) {
        return Err(ValidationError::NonPositivePrice(price).to_string());
    }

    let input = NewTransaction {
        coin,
        kind,
        quantity,
        price,
        ts_utc: field(record, cols.created).map(str::to_string),
        strategy: field(record, cols.strategy).map(str::to_string),
        source: field(record, cols.source).map(str::to_string),
        notes: field(record, cols.notes).map(str::to_string),
    };
    input.validate(now).map_err(|e| e.to_string())
}

/// Parse a CSV document into validated drafts.
///
/// A missing required column or unreadable header fails the whole document;
/// bad rows are collected in `errors` with their line number.
pub fn parse_transactions_csv(bytes: &[u8], now: TimeMs) -> Result<CsvImport, InterchangeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| InterchangeError::Csv(e.to_string()))?
        .clone();
    let cols = Columns::from_headers(&headers)?;

    let mut out = CsvImport::default();
    for (i, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let result = record
            .map_err(|e| e.to_string())
            .and_then(|r| parse_row(&r, &cols, now));
        match result {
            Ok(draft) => out.drafts.push(draft),
            Err(message) => {
                warn!(line, error = %message, "Skipping CSV row");
                out.errors.push(ImportIssue::new("csv", line, message));
            }
        }
    }
    Ok(out)
}

/// Parse and persist a CSV document. Valid rows are inserted in one transaction.
pub async fn import_csv(repo: &Repository, bytes: &[u8]) -> Result<ImportReport, InterchangeError> {
    let parsed = parse_transactions_csv(bytes, TimeMs::now())?;
    let ids = repo.insert_drafts_batch(&parsed.drafts).await?;
    Ok(ImportReport {
        transactions_imported: ids.len(),
        transaction_ids: ids,
        alerts_imported: 0,
        errors: parsed.errors,
    })
}

/// Render transactions as CSV with [`CSV_HEADERS`].
pub fn export_transactions_csv(transactions: &[Transaction]) -> Result<Vec<u8>, InterchangeError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| InterchangeError::Csv(e.to_string()))?;

    for tx in transactions {
        writer
            .write_record([
                tx.id.to_string(),
                tx.ts_utc.to_rfc3339(),
                tx.coin.to_string(),
                tx.kind.to_string(),
                tx.strategy.to_string(),
                tx.quantity.to_string(),
                tx.price.to_string(),
                tx.source.clone().unwrap_or_default(),
                tx.notes.clone().unwrap_or_default(),
            ])
            .map_err(|e| InterchangeError::Csv(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| InterchangeError::Csv(e.to_string()))
}
