use std::collections::HashMap;

use recon_store::Transaction;
use recon_store::TransactionType;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// `normalize(R)` (spec.md §3.2): trim, uppercase, strip a trailing `.0`.
#[must_use]
pub fn normalize_reference(reference: &str) -> String {
    let upper = reference.trim().to_ascii_uppercase();
    upper.strip_suffix(".0").map_or(upper.clone(), str::to_string)
}

/// `whole(A)` (spec.md §3.2): the absolute integer part of the amount.
#[must_use]
pub fn whole(amount: Decimal) -> i64 {
    amount.abs().trunc().to_i64().unwrap_or(0)
}

/// The amount a row's key is derived from: credit for deposits, debit for every other
/// reconcilable/auto-reconciled type (spec.md §3.2 "Amount source").
#[must_use]
pub fn amount_for_key(transaction: &Transaction) -> Decimal {
    match transaction.transaction_type {
        TransactionType::Deposit => transaction.credit.unwrap_or(Decimal::ZERO),
        _ => transaction.debit.unwrap_or(Decimal::ZERO),
    }
}

/// Base key `{normalize(R)}|{whole(A)}|{G}`.
#[must_use]
pub fn base_key(reference: &str, amount: Decimal, base_gateway: &str) -> String {
    format!("{}|{}|{base_gateway}", normalize_reference(reference), whole(amount))
}

fn date_suffix(date: Option<chrono::NaiveDateTime>) -> String {
    date.map_or_else(|| "nodate".to_string(), |value| value.format("%Y%m%d").to_string())
}

/// Assigns date-suffixed keys to every row, then in-run-deduplicates by appending
/// `|1`, `|2`, … to the 2nd, 3rd, … occurrence of an identical key — used only for
/// the auto-reconciled partitions (deposits, charges) per spec.md §3.2.
pub fn assign_date_suffixed_keys(rows: &mut [Transaction], base_gateway: &str) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for row in rows.iter_mut() {
        let key = format!(
            "{}|{}",
            base_key(&row.transaction_id, amount_for_key(row), base_gateway),
            date_suffix(row.date)
        );
        row.reconciliation_key = Some(dedup_suffix(&mut seen, key));
    }
}

/// Assigns plain (non-date-suffixed) keys without in-run dedup suffixing — used for
/// the reconcilable partitions (`E_debits`, `I_payouts`), which are instead validated
/// for collisions by [`crate::validate_no_duplicate_keys`].
pub fn assign_plain_keys(rows: &mut [Transaction], base_gateway: &str) {
    for row in rows.iter_mut() {
        row.reconciliation_key = Some(base_key(&row.transaction_id, amount_for_key(row), base_gateway));
    }
}

fn dedup_suffix(seen: &mut HashMap<String, usize>, key: String) -> String {
    let occurrence = seen.entry(key.clone()).or_insert(0);
    let suffixed = if *occurrence == 0 { key } else { format!("{key}|{occurrence}") };
    *occurrence += 1;
    suffixed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_reference_strips_trailing_float_suffix() {
        assert_eq!(normalize_reference(" txn001.0 "), "TXN001");
        assert_eq!(normalize_reference("txn002"), "TXN002");
    }

    #[test]
    fn whole_truncates_toward_zero() {
        assert_eq!(whole(Decimal::new(150049, 2)), 1500);
        assert_eq!(whole(Decimal::new(-150049, 2)), 1500);
    }

    #[test]
    fn in_run_dedup_suffixes_repeated_keys() {
        let mut seen = HashMap::new();
        assert_eq!(dedup_suffix(&mut seen, "K".to_string()), "K");
        assert_eq!(dedup_suffix(&mut seen, "K".to_string()), "K|1");
        assert_eq!(dedup_suffix(&mut seen, "K".to_string()), "K|2");
    }
}
