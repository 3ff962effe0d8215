use chrono::NaiveDateTime;
use recon_config::GatewayFileConfig;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::IngestError;
use crate::error::IngestResult;
use crate::table::RawTable;

const NULL_SENTINELS: [&str; 4] = ["", "none", "null", "nan"];
const NA: &str = "NA";

/// One canonicalized row: `Date, Reference, Details, Debit, Credit` (spec.md §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub date: Option<NaiveDateTime>,
    pub reference: String,
    pub details: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    pub rows: Vec<NormalizedRow>,
}

/// Runs the eight-step normalization pipeline against a raw table for one gateway
/// side. Pure with respect to `config` and `table`: identical inputs always produce
/// an identical `NormalizedTable` (spec.md §4.3 closing note).
pub fn normalize(mut table: RawTable, config: &GatewayFileConfig, filename: &str) -> IngestResult<NormalizedTable> {
    validate_required_columns(&table, config, filename)?;

    table.drop_leading_columns(config.leading_spacer_columns);

    if let Some(signal) = &config.end_of_data_signal {
        table.truncate_before_marker(signal);
    }

    let reference_column = resolve_reference_column(&table, config);

    let mut rows = Vec::with_capacity(table.rows.len());
    for raw_row in &table.rows {
        let date = table
            .cell(raw_row, &config.date_column)
            .and_then(|value| parse_date(&value, &config.date_format));

        let mut reference = table
            .cell(raw_row, reference_column)
            .map(|value| normalize_string(&value))
            .unwrap_or_else(|| NA.to_string());
        if reference == NA {
            reference = synthetic_reference(&config.name);
        }

        let details = table
            .cell(raw_row, &config.narrative_column)
            .map(|value| normalize_string(&value))
            .unwrap_or_else(|| NA.to_string());

        let debit = table
            .cell(raw_row, &config.debit_column)
            .map(|value| normalize_numeric(&value))
            .unwrap_or(Decimal::ZERO);
        let credit = table
            .cell(raw_row, &config.credit_column)
            .map(|value| normalize_numeric(&value))
            .unwrap_or(Decimal::ZERO);

        rows.push(NormalizedRow {
            date,
            reference,
            details,
            debit,
            credit,
        });
    }

    Ok(NormalizedTable { rows })
}

fn validate_required_columns(table: &RawTable, config: &GatewayFileConfig, filename: &str) -> IngestResult<()> {
    let missing: Vec<String> = config
        .required_columns
        .iter()
        .filter(|column| !table.has_column(column))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::ColumnValidation {
            filename: filename.to_string(),
            missing,
        })
    }
}

/// Falls back to the configured fallback column when the reference column itself is
/// absent from the raw data (spec.md §4.3 step 7).
fn resolve_reference_column<'a>(table: &RawTable, config: &'a GatewayFileConfig) -> &'a str {
    if table.has_column(&config.reference_column) {
        &config.reference_column
    } else {
        config
            .reference_fallback_column
            .as_deref()
            .unwrap_or(&config.narrative_column)
    }
}

fn parse_date(value: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(trimmed, format)
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(trimmed, format)
                .ok()
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
}

/// SPEC_FULL.md C.1: strip whitespace, empty → "0", strip non-digit/dot/minus, strip
/// leading minus, parse, NaN → 0, absolute value.
fn normalize_numeric(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    let source = if trimmed.is_empty() { "0" } else { trimmed };
    let filtered: String = source
        .chars()
        .filter(|character| character.is_ascii_digit() || *character == '.' || *character == '-')
        .collect();
    let unsigned = filtered.trim_start_matches('-');
    unsigned.parse::<Decimal>().unwrap_or(Decimal::ZERO).abs()
}

/// SPEC_FULL.md C.2: `{"", "none", "null", "nan"}`, case-insensitively, map to `"NA"`.
fn normalize_string(raw: &str) -> String {
    let trimmed = raw.trim();
    if NULL_SENTINELS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        NA.to_string()
    } else {
        trimmed.to_string()
    }
}

fn synthetic_reference(gateway_name: &str) -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!("{gateway_name}-random_ref-{}", &short[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_coercion_strips_noise_and_takes_absolute_value() {
        assert_eq!(normalize_numeric(" KES 1,234.50 "), Decimal::new(123450, 2));
        assert_eq!(normalize_numeric("-50"), Decimal::new(50, 0));
        assert_eq!(normalize_numeric(""), Decimal::ZERO);
        assert_eq!(normalize_numeric("not a number"), Decimal::ZERO);
    }

    #[test]
    fn string_normalization_maps_null_sentinels() {
        assert_eq!(normalize_string("  "), "NA");
        assert_eq!(normalize_string("None"), "NA");
        assert_eq!(normalize_string("NULL"), "NA");
        assert_eq!(normalize_string("TXN001"), "TXN001");
    }

    #[test]
    fn synthetic_reference_is_gateway_prefixed() {
        let reference = synthetic_reference("equity");
        assert!(reference.starts_with("equity-random_ref-"));
        assert_eq!(reference.len(), "equity-random_ref-".len() + 8);
    }
}
