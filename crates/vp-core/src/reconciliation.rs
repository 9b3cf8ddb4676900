//! Square point-of-sale reconciliation against a manually entered shift
//! report.

use crate::types::{
    Differences, Discrepancy, ReconciledField, ReconciliationResult, ShiftReport,
    SquareDailySummary,
};

#[allow(clippy::cast_precision_loss)]
pub fn reconcile(square: &SquareDailySummary, report: &ShiftReport) -> ReconciliationResult {
    let differences = Differences {
        transactions: square.card_transactions - report.credit_transactions,
        sales: cents_difference(square.card_sales, report.total_credit_sales),
        tips: cents_difference(square.tips, report.cc_tips),
    };

    let mut discrepancies = Vec::new();
    if differences.transactions != 0 {
        discrepancies.push(Discrepancy {
            field: ReconciledField::CreditTransactions,
            square_value: square.card_transactions as f64,
            report_value: report.credit_transactions as f64,
            difference: differences.transactions as f64,
            message: format!(
                "Credit transaction count differs: Square shows {}, shift report shows {} ({:+})",
                square.card_transactions, report.credit_transactions, differences.transactions
            ),
        });
    }
    if differences.sales != 0.0 {
        discrepancies.push(currency_discrepancy(
            ReconciledField::TotalCreditSales,
            "Credit sales",
            square.card_sales,
            report.total_credit_sales,
        ));
    }
    if differences.tips != 0.0 {
        discrepancies.push(currency_discrepancy(
            ReconciledField::CcTips,
            "Credit card tips",
            square.tips,
            report.cc_tips,
        ));
    }

    ReconciliationResult {
        matches: discrepancies.is_empty(),
        differences,
        discrepancies,
    }
}

fn currency_discrepancy(
    field: ReconciledField,
    label: &str,
    square: f64,
    report: f64,
) -> Discrepancy {
    let difference = cents_difference(square, report);
    Discrepancy {
        field,
        square_value: square,
        report_value: report,
        difference,
        message: format!(
            "{label} differ: Square shows ${square:.2}, shift report shows ${report:.2} ({}${:.2})",
            if difference < 0.0 { "-" } else { "+" },
            difference.abs()
        ),
    }
}

/// Amounts are compared in whole cents so the verdict always agrees with the
/// reported difference.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn cents_difference(square: f64, report: f64) -> f64 {
    let cents = |amount: f64| (amount * 100.0).round() as i64;
    (cents(square) - cents(report)) as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn square() -> SquareDailySummary {
        SquareDailySummary {
            card_transactions: 10,
            card_sales: 150.00,
            tips: 20.00,
        }
    }

    fn shift() -> ShiftReport {
        ShiftReport {
            location: "Harbor Grill".to_string(),
            shift_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            credit_transactions: 10,
            total_credit_sales: 150.00,
            cc_tips: 20.00,
        }
    }

    #[test]
    fn identical_totals_match() {
        let result = reconcile(&square(), &shift());
        assert!(result.matches);
        assert!(result.discrepancies.is_empty());
        assert_eq!(result.differences.transactions, 0);
    }

    #[test]
    fn sub_cent_noise_is_ignored() {
        let mut report = shift();
        report.total_credit_sales = 150.004;
        report.cc_tips = 19.996;
        assert!(reconcile(&square(), &report).matches);
    }

    #[test]
    fn one_cent_counts_regardless_of_magnitude() {
        for (sales, tips) in [(150.01, 20.00), (150.00, 20.01), (9_999.99, 20.00)] {
            let report = ShiftReport {
                total_credit_sales: sales,
                cc_tips: tips,
                ..shift()
            };
            let square = SquareDailySummary {
                card_sales: if sales > 1_000.0 { 10_000.00 } else { 150.00 },
                ..square()
            };
            let result = reconcile(&square, &report);
            assert!(!result.matches, "{sales} / {tips} should not match");
            assert_eq!(result.discrepancies.len(), 1);
            let moved = result.differences.sales.abs() + result.differences.tips.abs();
            assert!((moved - 0.01).abs() < 1e-9);
        }
    }

    #[test]
    fn one_transaction_off_is_a_discrepancy() {
        let mut report = shift();
        report.credit_transactions = 11;
        let result = reconcile(&square(), &report);
        assert!(!result.matches);
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(
            result.discrepancies[0].field,
            ReconciledField::CreditTransactions
        );
        assert_eq!(result.differences.transactions, -1);
    }

    #[test]
    fn each_currency_field_is_named() {
        let mut report = shift();
        report.total_credit_sales = 150.02;
        let result = reconcile(&square(), &report);
        assert!(!result.matches);
        assert_eq!(
            result.discrepancies[0].field,
            ReconciledField::TotalCreditSales
        );
        assert!(result.discrepancies[0].message.contains("-$0.02"));

        let mut report = shift();
        report.cc_tips = 25.0;
        let result = reconcile(&square(), &report);
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].field, ReconciledField::CcTips);
        assert!((result.differences.tips + 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn every_mismatch_is_reported() {
        let report = ShiftReport {
            credit_transactions: 7,
            total_credit_sales: 99.0,
            cc_tips: 1.0,
            ..shift()
        };
        let result = reconcile(&square(), &report);
        let fields: Vec<_> = result.discrepancies.iter().map(|d| d.field).collect();
        assert_eq!(
            fields,
            vec![
                ReconciledField::CreditTransactions,
                ReconciledField::TotalCreditSales,
                ReconciledField::CcTips
            ]
        );
    }

    #[test]
    fn result_serializes_match_key() {
        let value = serde_json::to_value(reconcile(&square(), &shift())).unwrap();
        assert_eq!(value["match"], true);
        assert!(value["discrepancies"].as_array().unwrap().is_empty());
    }
}
