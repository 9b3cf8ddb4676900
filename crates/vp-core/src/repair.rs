//! Strict repair pass for historical report payloads.
//!
//! Older clients stored some payloads double-encoded: the column holds a JSON
//! string whose contents are the real JSON object. Every row is parsed,
//! unwrapped at most [`MAX_ENCODING_DEPTH`] times and validated against its
//! report kind. Rows that still fail are dead-lettered with the reason.

use crate::reports::RawReportRow;
use crate::types::ReportKind;
use crate::validation::validate_report_payload;
use serde::Serialize;
use serde_json::Value;

pub const MAX_ENCODING_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    Unchanged,
    Repaired { payload: String },
    DeadLetter { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    pub scanned: usize,
    pub unchanged: usize,
    pub repaired: usize,
    pub dead_lettered: usize,
}

impl RepairSummary {
    pub fn record(&mut self, outcome: &RepairOutcome) {
        self.scanned += 1;
        match outcome {
            RepairOutcome::Unchanged => self.unchanged += 1,
            RepairOutcome::Repaired { .. } => self.repaired += 1,
            RepairOutcome::DeadLetter { .. } => self.dead_lettered += 1,
        }
    }
}

pub fn repair_row(row: &RawReportRow) -> RepairOutcome {
    let kind: ReportKind = match serde_json::from_value(Value::String(row.kind.clone())) {
        Ok(kind) => kind,
        Err(_) => {
            return RepairOutcome::DeadLetter {
                reason: format!("unknown report kind {:?}", row.kind),
            };
        }
    };

    let mut value: Value = match serde_json::from_str(&row.payload) {
        Ok(value) => value,
        Err(err) => {
            return RepairOutcome::DeadLetter {
                reason: format!("payload is not JSON: {err}"),
            };
        }
    };

    let mut unwrapped = 0;
    while let Value::String(inner) = &value {
        if unwrapped == MAX_ENCODING_DEPTH {
            return RepairOutcome::DeadLetter {
                reason: format!("payload still a string after {MAX_ENCODING_DEPTH} decodes"),
            };
        }
        value = match serde_json::from_str(inner) {
            Ok(value) => value,
            Err(err) => {
                return RepairOutcome::DeadLetter {
                    reason: format!("encoded payload is not JSON: {err}"),
                };
            }
        };
        unwrapped += 1;
    }

    if let Err(err) = validate_report_payload(kind, &value) {
        return RepairOutcome::DeadLetter {
            reason: err.to_string(),
        };
    }

    if unwrapped == 0 {
        return RepairOutcome::Unchanged;
    }
    match serde_json::to_string(&value) {
        Ok(payload) => RepairOutcome::Repaired { payload },
        Err(err) => RepairOutcome::DeadLetter {
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(kind: &str, payload: String) -> RawReportRow {
        RawReportRow {
            id: "rpt_legacy".to_string(),
            kind: kind.to_string(),
            payload,
        }
    }

    fn shift_payload() -> Value {
        json!({
            "location": "Harbor Grill",
            "shiftDate": "2026-10-16",
            "creditTransactions": 4,
            "totalCreditSales": 80.5,
            "ccTips": 12.0
        })
    }

    #[test]
    fn clean_rows_are_left_alone() {
        let outcome = repair_row(&row("shift-report", shift_payload().to_string()));
        assert_eq!(outcome, RepairOutcome::Unchanged);
    }

    #[test]
    fn double_encoded_rows_are_unwrapped() {
        let once = serde_json::to_string(&shift_payload().to_string()).unwrap();
        let twice = serde_json::to_string(&once).unwrap();
        for payload in [once, twice] {
            let RepairOutcome::Repaired { payload } = repair_row(&row("shift-report", payload))
            else {
                panic!("expected repair");
            };
            let value: Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value, shift_payload());
        }
    }

    #[test]
    fn garbage_is_dead_lettered() {
        let cases = [
            row("shift-report", "{location: Harbor".to_string()),
            row("shift-report", "\"{not json\"".to_string()),
            row("shift-report", json!({ "location": "x" }).to_string()),
            row("payroll", json!({}).to_string()),
            row("incident-report", "42".to_string()),
        ];
        for case in cases {
            assert!(
                matches!(repair_row(&case), RepairOutcome::DeadLetter { .. }),
                "{case:?}"
            );
        }
    }

    #[test]
    fn unwrap_depth_is_bounded() {
        let mut payload = json!({ "note": "x" }).to_string();
        for _ in 0..=MAX_ENCODING_DEPTH {
            payload = serde_json::to_string(&payload).unwrap();
        }
        assert!(matches!(
            repair_row(&row("incident-report", payload)),
            RepairOutcome::DeadLetter { .. }
        ));
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RepairSummary::default();
        summary.record(&RepairOutcome::Unchanged);
        summary.record(&RepairOutcome::Repaired {
            payload: "{}".to_string(),
        });
        summary.record(&RepairOutcome::DeadLetter {
            reason: "bad".to_string(),
        });
        assert_eq!(
            summary,
            RepairSummary {
                scanned: 3,
                unchanged: 1,
                repaired: 1,
                dead_lettered: 1,
            }
        );
    }
}
