use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    #[default]
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
}

impl FilingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FilingStatus::Single => "single",
            FilingStatus::MarriedFilingJointly => "married_filing_jointly",
            FilingStatus::MarriedFilingSeparately => "married_filing_separately",
            FilingStatus::HeadOfHousehold => "head_of_household",
        }
    }
}

/// Income and filing situation of one user. Absent fields deserialize to
/// zero / false so a sparse payload is still a valid profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxProfile {
    pub salary: f64,
    pub rsu: f64,
    pub dividends: f64,
    pub capital_gains: f64,
    pub other_income: f64,
    pub total_compensation: f64,
    pub filing_status: FilingStatus,
    pub age: u32,
    pub has_dependents: bool,
    pub homeowner: bool,
    pub state_of_residence: String,
    #[serde(rename = "retirement401k")]
    pub retirement_401k: f64,
    pub itemized_deductions: f64,
}

impl Default for TaxProfile {
    fn default() -> Self {
        Self {
            salary: 0.0,
            rsu: 0.0,
            dividends: 0.0,
            capital_gains: 0.0,
            other_income: 0.0,
            total_compensation: 0.0,
            filing_status: FilingStatus::Single,
            age: 18,
            has_dependents: false,
            homeowner: false,
            state_of_residence: String::new(),
            retirement_401k: 0.0,
            itemized_deductions: 0.0,
        }
    }
}

/// Bounds of a strategy's estimated tax reduction, in whole dollars.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct SavingsRange {
    pub min: f64,
    pub max: f64,
}

impl SavingsRange {
    /// Rounds `max` and derives `min` as a fraction of the unrounded value.
    pub(crate) fn from_max(raw_max: f64, min_fraction: f64) -> Self {
        let raw_max = raw_max.max(0.0);
        Self::new(raw_max * min_fraction.clamp(0.0, 1.0), raw_max)
    }

    pub(crate) fn new(raw_min: f64, raw_max: f64) -> Self {
        let max = raw_max.max(0.0).round();
        let min = raw_min.max(0.0).round().min(max);
        Self { min, max }
    }
}

pub const STATE_CODES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

pub fn is_known_state(code: &str) -> bool {
    STATE_CODES
        .iter()
        .any(|state| state.eq_ignore_ascii_case(code.trim()))
}
