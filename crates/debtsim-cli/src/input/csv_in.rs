use std::collections::BTreeMap;
use std::io;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use debtsim_core::contract::{AmortizationSystem, Category, ContractRecord, RateIndex};
use debtsim_core::types::Currency;
use debtsim_core::DebtSimError;

/// Columns a contract table must carry. Matching is case-insensitive and
/// order does not matter; extra columns are ignored.
const REQUIRED_COLUMNS: [&str; 13] = [
    "id",
    "category",
    "description",
    "currency",
    "principal",
    "term",
    "grace",
    "period_months",
    "system",
    "index",
    "spread",
    "factor",
    "start_date",
];

/// Read a contract table from a CSV file.
pub fn read_contracts(path: &str) -> Result<Vec<ContractRecord>, Box<dyn std::error::Error>> {
    let canonical = crate::input::file::resolve_path(path)?;
    let file = std::fs::File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_contracts(file)
}

/// Parse a contract table from any reader. The header row is validated
/// before any contract row is touched, so a malformed table fails with one
/// error listing every missing column.
pub fn parse_contracts<R: io::Read>(
    reader: R,
) -> Result<Vec<ContractRecord>, Box<dyn std::error::Error>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns: BTreeMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_lowercase(), i))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Box::new(DebtSimError::MissingColumns(missing)));
    }

    let mut contracts = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let record = result?;
        // Header is line 1, first contract row is line 2.
        contracts.push(parse_row(&record, &columns, row + 2)?);
    }
    Ok(contracts)
}

fn get<'a>(
    record: &'a csv::StringRecord,
    columns: &BTreeMap<String, usize>,
    name: &str,
) -> &'a str {
    columns
        .get(name)
        .and_then(|&i| record.get(i))
        .unwrap_or("")
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &BTreeMap<String, usize>,
    line: usize,
) -> Result<ContractRecord, Box<dyn std::error::Error>> {
    let category_raw = get(record, columns, "category");
    let category = Category::parse(category_raw).ok_or_else(|| {
        format!(
            "line {line}: unknown category '{category_raw}' \
             (expected Existing/Antigo or Proposed/Novo)"
        )
    })?;

    let start_raw = get(record, columns, "start_date");
    let start_date = NaiveDate::parse_from_str(start_raw, "%Y-%m-%d").map_err(|e| {
        DebtSimError::DateError(format!(
            "line {line}: invalid start_date '{start_raw}': {e}"
        ))
    })?;

    Ok(ContractRecord {
        id: get(record, columns, "id").to_string(),
        category,
        description: get(record, columns, "description").to_string(),
        currency: Currency::parse(get(record, columns, "currency")),
        principal: parse_decimal(get(record, columns, "principal"), "principal", line)?,
        term: parse_u32(get(record, columns, "term"), "term", line)?,
        grace: parse_u32(get(record, columns, "grace"), "grace", line)?,
        period_months: parse_u32(get(record, columns, "period_months"), "period_months", line)?,
        system: AmortizationSystem::parse(get(record, columns, "system")),
        index: RateIndex::parse(get(record, columns, "index")),
        spread: parse_decimal(get(record, columns, "spread"), "spread", line)?,
        index_factor: parse_decimal(get(record, columns, "factor"), "factor", line)?,
        start_date,
    })
}

fn parse_decimal(raw: &str, name: &str, line: usize) -> Result<Decimal, Box<dyn std::error::Error>> {
    raw.parse::<Decimal>()
        .map_err(|e| format!("line {line}: invalid {name} '{raw}': {e}").into())
}

fn parse_u32(raw: &str, name: &str, line: usize) -> Result<u32, Box<dyn std::error::Error>> {
    raw.parse::<u32>()
        .map_err(|e| format!("line {line}: invalid {name} '{raw}': {e}").into())
}
