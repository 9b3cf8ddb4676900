use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ReconciledField {
    #[serde(rename = "creditTransactions")]
    CreditTransactions,
    #[serde(rename = "totalCreditSales")]
    TotalCreditSales,
    #[serde(rename = "ccTips")]
    CcTips,
}

impl fmt::Display for ReconciledField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreditTransactions => "creditTransactions",
            Self::TotalCreditSales => "totalCreditSales",
            Self::CcTips => "ccTips",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub field: ReconciledField,
    pub square_value: f64,
    pub report_value: f64,
    pub difference: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Differences {
    pub transactions: i64,
    pub sales: f64,
    pub tips: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    #[serde(rename = "match")]
    pub matches: bool,
    pub differences: Differences,
    pub discrepancies: Vec<Discrepancy>,
}
