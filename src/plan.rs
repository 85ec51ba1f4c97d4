//! Plan configuration: the user's loans, income profile and windfalls.
//!
//! A plan file is JSON:
//!
//! ```json
//! {
//!   "loans": [{"lender_name": "Card A", "interest_rate": "19.0", "balance": "2000",
//!              "min_monthly_payment": "50", "loan_type": 0}],
//!   "user": {"tax_bracket": "25", "budget_savings": "100", "raises": "0"},
//!   "windfalls": [{"amount": "500", "date": "04/15/2027"}]
//! }
//! ```
//!
//! Amounts and rates stay as the text the user wrote; both integration
//! paths submit text and the browser path checks the typed text verbatim.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Wire and configuration date format.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Kind of debt, as offered by the calculator's loan-type question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeOrLabel")]
pub enum LoanType {
    CreditCard,
    Vehicle,
    HomeEquity,
    Mortgage,
    Other,
}

impl LoanType {
    pub const ALL: [LoanType; 5] = [
        LoanType::CreditCard,
        LoanType::Vehicle,
        LoanType::HomeEquity,
        LoanType::Mortgage,
        LoanType::Other,
    ];

    pub fn code(self) -> u8 {
        match self {
            LoanType::CreditCard => 0,
            LoanType::Vehicle => 1,
            LoanType::HomeEquity => 2,
            LoanType::Mortgage => 3,
            LoanType::Other => 4,
        }
    }

    /// Label shown in the calculator's loan-type dropdown.
    pub fn label(self) -> &'static str {
        match self {
            LoanType::CreditCard => "Credit card or retailer charge card",
            LoanType::Vehicle => "Car, truck, motorcycle, or boat loan",
            LoanType::HomeEquity => "Home equity loan",
            LoanType::Mortgage => "Mortgage",
            LoanType::Other => "Other kind of loan",
        }
    }
}

impl TryFrom<CodeOrLabel> for LoanType {
    type Error = String;

    fn try_from(raw: CodeOrLabel) -> std::result::Result<Self, Self::Error> {
        LoanType::ALL
            .into_iter()
            .find(|t| raw.matches(t.code(), t.label()))
            .ok_or_else(|| format!("unknown loan type {raw}"))
    }
}

/// Promotion attached to a credit card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeOrLabel")]
pub enum PromoType {
    RateIncreasesLater,
    PaymentsDeferred,
    NoPromotion,
}

impl PromoType {
    pub const ALL: [PromoType; 3] = [
        PromoType::RateIncreasesLater,
        PromoType::PaymentsDeferred,
        PromoType::NoPromotion,
    ];

    pub fn code(self) -> u8 {
        match self {
            PromoType::RateIncreasesLater => 0,
            PromoType::PaymentsDeferred => 1,
            PromoType::NoPromotion => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PromoType::RateIncreasesLater => {
                "A low introductory interest rate that will increase at a later date"
            }
            PromoType::PaymentsDeferred => "No payments are due until a later date",
            PromoType::NoPromotion => "No special promotion on this card",
        }
    }
}

impl TryFrom<CodeOrLabel> for PromoType {
    type Error = String;

    fn try_from(raw: CodeOrLabel) -> std::result::Result<Self, Self::Error> {
        PromoType::ALL
            .into_iter()
            .find(|t| raw.matches(t.code(), t.label()))
            .ok_or_else(|| format!("unknown promotion type {raw}"))
    }
}

/// Enum values may be written as their numeric code or their label.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeOrLabel {
    Code(u8),
    Label(String),
}

impl CodeOrLabel {
    fn matches(&self, code: u8, label: &str) -> bool {
        match self {
            CodeOrLabel::Code(c) => *c == code,
            CodeOrLabel::Label(l) => l == label || l.parse::<u8>().ok() == Some(code),
        }
    }
}

impl fmt::Display for CodeOrLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeOrLabel::Code(c) => write!(f, "{c}"),
            CodeOrLabel::Label(l) => write!(f, "{l:?}"),
        }
    }
}

/// Credit card promotion details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    #[serde(deserialize_with = "text")]
    pub regular_rate: String,
    #[serde(deserialize_with = "text")]
    pub promo_rate: String,
    #[serde(with = "mdy")]
    pub end_date: NaiveDate,
    #[serde(deserialize_with = "text")]
    pub minimum_monthly_payment: String,
    pub promo_type: PromoType,
}

/// A loan or credit card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub lender_name: String,
    #[serde(deserialize_with = "text")]
    pub interest_rate: String,
    #[serde(deserialize_with = "text")]
    pub balance: String,
    #[serde(deserialize_with = "text")]
    pub min_monthly_payment: String,
    pub loan_type: LoanType,
    /// `null` or `{}` both mean the card has no promotion.
    #[serde(default, deserialize_with = "promotion")]
    pub promo: Option<Promotion>,
    #[serde(default = "deductible_default", deserialize_with = "flag")]
    pub deductible: bool,
}

impl Loan {
    pub fn promo_details(&self) -> Option<&Promotion> {
        self.promo.as_ref()
    }
}

fn deductible_default() -> bool {
    true
}

/// One-time cash event that can be applied to the debts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Windfall {
    #[serde(deserialize_with = "text")]
    pub amount: String,
    #[serde(with = "mdy")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "text")]
    pub tax_bracket: String,
    #[serde(deserialize_with = "text")]
    pub budget_savings: String,
    #[serde(deserialize_with = "count")]
    pub raises: u32,
}

/// Ordered view over the raw loan records of a plan.
///
/// Iterating builds a fresh [`Loan`] from each record on every pass.
#[derive(Debug, Clone, Default)]
pub struct Loans {
    records: Vec<Value>,
}

impl Loans {
    /// Wraps raw records, rejecting any record that does not describe a loan.
    pub fn from_records(records: Vec<Value>) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            Loan::deserialize(record)
                .map_err(|e| Error::InvalidConfig(format!("loan #{index}: {e}")))?;
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Loan>> + '_ {
        self.records
            .iter()
            .map(|record| Loan::deserialize(record).map_err(Error::from))
    }
}

/// A whole plan file.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub loans: Loans,
    pub user: UserProfile,
    pub windfalls: Vec<Windfall>,
}

#[derive(Deserialize)]
struct RawPlan {
    loans: Vec<Value>,
    user: UserProfile,
    #[serde(default)]
    windfalls: Option<Vec<Windfall>>,
}

impl PlanConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawPlan =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self {
            loans: Loans::from_records(raw.loans)?,
            user: raw.user,
            windfalls: raw.windfalls.unwrap_or_default(),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json).map_err(|e| match e {
            Error::InvalidConfig(msg) => Error::InvalidConfig(format!("{}: {msg}", path.display())),
            other => other,
        })
    }
}

/// Plan name used for the results file: the config file stem.
pub fn plan_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string())
}

/// Every `*.json` plan file in `dir`, sorted by name.
pub fn plan_configs_in(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut plans = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            plans.push(path);
        }
    }
    plans.sort();
    Ok(plans)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| Error::InvalidDate(raw.to_string()))
}

mod mdy {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

/// Accepts `"19.0"` as well as `19.0`.
fn text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Text(s) => Ok(s),
        Scalar::Number(n) => Ok(n.to_string()),
        Scalar::Bool(_) => Err(serde::de::Error::custom("expected text or number")),
    }
}

fn promotion<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<Promotion>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(fields)) if fields.is_empty() => Ok(None),
        Some(raw) => Promotion::deserialize(raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn count<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    let raw = text(d)?;
    raw.trim()
        .parse()
        .map_err(|_| serde::de::Error::custom(format!("expected a count, got {raw:?}")))
}

/// Accepts `true`, `"1"`, `1` and their negatives.
fn flag<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Number(n) => Ok(n.as_f64() != Some(0.0)),
        Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected a flag, got {other:?}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_PLAN: &str = r#"{
        "loans": [{"lender_name": "Card A", "interest_rate": "19.0", "balance": "2000",
                   "min_monthly_payment": "50", "loan_type": 0}],
        "user": {"tax_bracket": "25", "budget_savings": "100", "raises": "0"},
        "windfalls": []
    }"#;

    #[test]
    fn loads_card_plan() {
        let plan = PlanConfig::from_json_str(CARD_PLAN).unwrap();
        assert_eq!(plan.loans.len(), 1);
        assert_eq!(plan.user.raises, 0);
        assert!(plan.windfalls.is_empty());

        let card = plan.loans.iter().next().unwrap().unwrap();
        assert_eq!(card.lender_name, "Card A");
        assert_eq!(card.interest_rate, "19.0");
        assert_eq!(card.loan_type, LoanType::CreditCard);
        assert!(card.deductible);
        assert!(card.promo_details().is_none());
    }

    #[test]
    fn loan_type_by_label_or_code() {
        let by_label: LoanType = serde_json::from_str(r#""Other kind of loan""#).unwrap();
        let by_code: LoanType = serde_json::from_str("4").unwrap();
        let by_text_code: LoanType = serde_json::from_str(r#""4""#).unwrap();
        assert_eq!(by_label, LoanType::Other);
        assert_eq!(by_code, LoanType::Other);
        assert_eq!(by_text_code, LoanType::Other);
        assert!(serde_json::from_str::<LoanType>("9").is_err());
    }

    #[test]
    fn promotion_and_flags() {
        let loan: Loan = serde_json::from_value(serde_json::json!({
            "lender_name": "Store card",
            "interest_rate": 24.99,
            "balance": "800",
            "min_monthly_payment": "25",
            "loan_type": "Credit card or retailer charge card",
            "deductible": "0",
            "promo": {
                "regular_rate": "24.99",
                "promo_rate": "0",
                "end_date": "03/01/2027",
                "minimum_monthly_payment": "15",
                "promo_type": "A low introductory interest rate that will increase at a later date"
            }
        }))
        .unwrap();
        assert!(!loan.deductible);
        assert_eq!(loan.interest_rate, "24.99");
        let promo = loan.promo_details().unwrap();
        assert_eq!(promo.promo_type, PromoType::RateIncreasesLater);
        assert_eq!(promo.end_date, NaiveDate::from_ymd_opt(2027, 3, 1).unwrap());
        assert_eq!(format_date(promo.end_date), "03/01/2027");
    }

    #[test]
    fn empty_or_null_promo_means_none() {
        for promo in [serde_json::json!({}), serde_json::Value::Null] {
            let plan = PlanConfig::from_json_str(
                &serde_json::json!({
                    "loans": [{"lender_name": "Card B", "interest_rate": "17.5", "balance": "600",
                               "min_monthly_payment": "25", "loan_type": 0, "promo": promo}],
                    "user": {"tax_bracket": "25", "budget_savings": "0", "raises": 0}
                })
                .to_string(),
            )
            .unwrap();
            let card = plan.loans.iter().next().unwrap().unwrap();
            assert!(card.promo_details().is_none());
        }
    }

    #[test]
    fn partial_promo_is_rejected() {
        let err = PlanConfig::from_json_str(
            r#"{"loans": [{"lender_name": "Card C", "interest_rate": "17.5", "balance": "600",
                           "min_monthly_payment": "25", "loan_type": 0,
                           "promo": {"promo_rate": "0"}}],
                "user": {"tax_bracket": "25", "budget_savings": "0", "raises": 0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("regular_rate")));
    }

    #[test]
    fn rejects_bad_records_at_load() {
        let err = PlanConfig::from_json_str(
            r#"{"loans": [{"lender_name": "X"}],
                "user": {"tax_bracket": "25", "budget_savings": "0", "raises": 0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("loan #0")));
    }

    #[test]
    fn bad_date() {
        assert!(matches!(parse_date("2027-03-01"), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn missing_windfalls_means_none() {
        let plan = PlanConfig::from_json_str(
            r#"{"loans": [], "user": {"tax_bracket": "10", "budget_savings": "0", "raises": 0}}"#,
        )
        .unwrap();
        assert!(plan.windfalls.is_empty());
        assert!(plan.loans.is_empty());
    }

    #[test]
    fn bundled_example_plan() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("plan_configs/example-plan.json");
        let plan = PlanConfig::from_path(&path).unwrap();
        assert_eq!(plan_name(&path), "example-plan");
        assert_eq!(plan.loans.len(), 3);
        assert_eq!(plan.windfalls.len(), 1);

        let types: Vec<LoanType> = plan.loans.iter().map(|l| l.unwrap().loan_type).collect();
        assert_eq!(types, vec![LoanType::CreditCard, LoanType::CreditCard, LoanType::Other]);
    }

    #[test]
    fn plan_files_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), CARD_PLAN).unwrap();
        std::fs::write(dir.path().join("a.json"), CARD_PLAN).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let plans = plan_configs_in(dir.path()).unwrap();
        let names: Vec<String> = plans.iter().map(|p| plan_name(p)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
