use super::types::{FilingStatus, TaxProfile};

/// Lower bound (exclusive) and marginal rate in percent, highest first.
/// Income at or below the last threshold is taxed at `BASE_RATE_PCT`.
type BracketTable = [(f64, u32); 6];

const SINGLE_BRACKETS: BracketTable = [
    (578_125.0, 37),
    (231_250.0, 35),
    (182_100.0, 32),
    (95_375.0, 24),
    (44_725.0, 22),
    (11_000.0, 12),
];

const MARRIED_JOINT_BRACKETS: BracketTable = [
    (693_750.0, 37),
    (462_500.0, 35),
    (364_200.0, 32),
    (190_750.0, 24),
    (89_450.0, 22),
    (22_000.0, 12),
];

const BASE_RATE_PCT: u32 = 10;
const UNMODELED_BRACKET_PCT: u32 = 24;

const SENIOR_AGE: u32 = 65;
const SENIOR_EXTRA_JOINT: f64 = 1_500.0;
const SENIOR_EXTRA_OTHER: f64 = 1_850.0;

fn bracket_table(status: FilingStatus) -> Option<&'static BracketTable> {
    match status {
        FilingStatus::Single => Some(&SINGLE_BRACKETS),
        FilingStatus::MarriedFilingJointly => Some(&MARRIED_JOINT_BRACKETS),
        FilingStatus::MarriedFilingSeparately | FilingStatus::HeadOfHousehold => None,
    }
}

fn rate(pct: u32) -> f64 {
    f64::from(pct) / 100.0
}

pub fn total_income(profile: &TaxProfile) -> f64 {
    profile.salary + profile.rsu + profile.dividends + profile.capital_gains + profile.other_income
}

/// Standard deduction for the filing status, including the 65+ addition.
pub fn standard_deduction(profile: &TaxProfile) -> f64 {
    let base = match profile.filing_status {
        FilingStatus::Single | FilingStatus::MarriedFilingSeparately => 13_850.0,
        FilingStatus::MarriedFilingJointly => 27_700.0,
        FilingStatus::HeadOfHousehold => 20_800.0,
    };

    if profile.age < SENIOR_AGE {
        return base;
    }
    match profile.filing_status {
        FilingStatus::MarriedFilingJointly => base + SENIOR_EXTRA_JOINT,
        _ => base + SENIOR_EXTRA_OTHER,
    }
}

pub fn estimate_taxable_income(profile: &TaxProfile) -> f64 {
    let deductions =
        standard_deduction(profile).max(profile.itemized_deductions) + profile.retirement_401k;
    (total_income(profile) - deductions).max(0.0)
}

/// Progressive federal tax on the profile's taxable income, rounded to whole
/// dollars. Statuses without a bracket table yield zero.
pub fn estimate_federal_tax(profile: &TaxProfile) -> f64 {
    let Some(table) = bracket_table(profile.filing_status) else {
        return 0.0;
    };
    progressive_tax(estimate_taxable_income(profile), table).round()
}

fn progressive_tax(taxable_income: f64, table: &BracketTable) -> f64 {
    let mut remaining = taxable_income.max(0.0);
    let mut tax = 0.0;
    for &(threshold, pct) in table {
        if remaining > threshold {
            tax += (remaining - threshold) * rate(pct);
            remaining = threshold;
        }
    }
    tax + remaining * rate(BASE_RATE_PCT)
}

/// Marginal bracket in percent, looked up from total compensation rather
/// than taxable income. Used only to parametrize strategy savings.
pub fn marginal_bracket(profile: &TaxProfile) -> u32 {
    let Some(table) = bracket_table(profile.filing_status) else {
        return UNMODELED_BRACKET_PCT;
    };
    table
        .iter()
        .find(|(threshold, _)| profile.total_compensation > *threshold)
        .map(|&(_, pct)| pct)
        .unwrap_or(BASE_RATE_PCT)
}

/// `marginal_bracket` as a fraction.
pub fn marginal_rate(profile: &TaxProfile) -> f64 {
    rate(marginal_bracket(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn salaried(salary: f64, status: FilingStatus) -> TaxProfile {
        TaxProfile {
            salary,
            total_compensation: salary,
            filing_status: status,
            age: 30,
            ..TaxProfile::default()
        }
    }

    #[test]
    fn total_income_sums_all_sources() {
        let profile = TaxProfile {
            salary: 100_000.0,
            rsu: 20_000.0,
            dividends: 3_000.0,
            capital_gains: 5_000.0,
            other_income: 2_000.0,
            ..TaxProfile::default()
        };
        assert_approx(total_income(&profile), 130_000.0);
    }

    #[test]
    fn standard_deduction_by_status() {
        let mut profile = TaxProfile::default();
        profile.age = 40;
        for (status, expected) in [
            (FilingStatus::Single, 13_850.0),
            (FilingStatus::MarriedFilingJointly, 27_700.0),
            (FilingStatus::MarriedFilingSeparately, 13_850.0),
            (FilingStatus::HeadOfHousehold, 20_800.0),
        ] {
            profile.filing_status = status;
            assert_approx(standard_deduction(&profile), expected);
        }
    }

    #[test]
    fn standard_deduction_adds_senior_amount_at_65() {
        let mut profile = salaried(50_000.0, FilingStatus::MarriedFilingJointly);
        profile.age = 64;
        assert_approx(standard_deduction(&profile), 27_700.0);
        profile.age = 65;
        assert_approx(standard_deduction(&profile), 29_200.0);

        profile.filing_status = FilingStatus::HeadOfHousehold;
        assert_approx(standard_deduction(&profile), 22_650.0);
    }

    #[test]
    fn taxable_income_subtracts_standard_deduction() {
        let profile = salaried(100_000.0, FilingStatus::Single);
        assert_approx(estimate_taxable_income(&profile), 86_150.0);
    }

    #[test]
    fn taxable_income_prefers_larger_itemized_and_subtracts_401k() {
        let mut profile = salaried(100_000.0, FilingStatus::Single);
        profile.itemized_deductions = 20_000.0;
        profile.retirement_401k = 10_000.0;
        assert_approx(estimate_taxable_income(&profile), 70_000.0);

        profile.itemized_deductions = 5_000.0;
        assert_approx(estimate_taxable_income(&profile), 76_150.0);
    }

    #[test]
    fn taxable_income_floors_at_zero() {
        let mut profile = salaried(10_000.0, FilingStatus::MarriedFilingJointly);
        profile.retirement_401k = 22_500.0;
        assert_approx(estimate_taxable_income(&profile), 0.0);
    }

    #[test]
    fn federal_tax_single_worked_example() {
        let profile = salaried(100_000.0, FilingStatus::Single);
        // 33_725 * 12% + 41_425 * 22% + 11_000 * 10% = 14_260.5
        assert_approx(estimate_federal_tax(&profile), 14_261.0);
    }

    #[test]
    fn federal_tax_married_joint_uses_joint_table() {
        let profile = salaried(127_700.0, FilingStatus::MarriedFilingJointly);
        // taxable 100_000: 22_000 * 10% + 67_450 * 12% + 10_550 * 22%
        assert_approx(estimate_federal_tax(&profile), 12_615.0);
    }

    #[test]
    fn federal_tax_is_zero_for_married_filing_separately() {
        let profile = salaried(250_000.0, FilingStatus::MarriedFilingSeparately);
        assert!(estimate_taxable_income(&profile) > 0.0);
        assert_approx(estimate_federal_tax(&profile), 0.0);
    }

    #[test]
    fn federal_tax_is_zero_for_head_of_household() {
        let profile = salaried(90_000.0, FilingStatus::HeadOfHousehold);
        assert_approx(estimate_federal_tax(&profile), 0.0);
    }

    #[test]
    fn progressive_tax_at_thresholds() {
        assert_approx(progressive_tax(0.0, &SINGLE_BRACKETS), 0.0);
        assert_approx(progressive_tax(11_000.0, &SINGLE_BRACKETS), 1_100.0);
        assert_approx(progressive_tax(44_725.0, &SINGLE_BRACKETS), 5_147.0);
        assert_approx(progressive_tax(44_725.0, &MARRIED_JOINT_BRACKETS), 4_927.0);
    }

    #[test]
    fn marginal_bracket_uses_total_compensation() {
        let mut profile = salaried(100_000.0, FilingStatus::Single);
        assert_eq!(marginal_bracket(&profile), 24);

        // A large 401k lowers taxable income but not the classifier's input.
        profile.retirement_401k = 22_500.0;
        assert_eq!(marginal_bracket(&profile), 24);

        profile.total_compensation = 11_000.0;
        assert_eq!(marginal_bracket(&profile), 10);
        profile.total_compensation = 11_001.0;
        assert_eq!(marginal_bracket(&profile), 12);
        profile.total_compensation = 600_000.0;
        assert_eq!(marginal_bracket(&profile), 37);
    }

    #[test]
    fn marginal_bracket_married_joint_table() {
        let profile = salaried(200_000.0, FilingStatus::MarriedFilingJointly);
        assert_eq!(marginal_bracket(&profile), 24);
    }

    #[test]
    fn marginal_bracket_defaults_for_unmodeled_status() {
        let profile = salaried(1_000_000.0, FilingStatus::HeadOfHousehold);
        assert_eq!(marginal_bracket(&profile), 24);
        let profile = salaried(5_000.0, FilingStatus::MarriedFilingSeparately);
        assert_eq!(marginal_bracket(&profile), 24);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn prop_taxable_income_is_never_negative(
            salary in 0u32..2_000_000,
            rsu in 0u32..500_000,
            other in 0u32..300_000,
            itemized in 0u32..200_000,
            retirement in 0u32..30_000,
            age in 18u32..90,
            status_idx in 0usize..4
        ) {
            let statuses = [
                FilingStatus::Single,
                FilingStatus::MarriedFilingJointly,
                FilingStatus::MarriedFilingSeparately,
                FilingStatus::HeadOfHousehold,
            ];
            let profile = TaxProfile {
                salary: salary as f64,
                rsu: rsu as f64,
                other_income: other as f64,
                itemized_deductions: itemized as f64,
                retirement_401k: retirement as f64,
                age,
                filing_status: statuses[status_idx],
                ..TaxProfile::default()
            };
            prop_assert!(estimate_taxable_income(&profile) >= 0.0);
            prop_assert!(estimate_federal_tax(&profile) >= 0.0);
        }

        #[test]
        fn prop_federal_tax_is_monotone_in_taxable_income(
            base in 0u32..1_000_000,
            delta in 0u32..100_000,
            joint in proptest::bool::ANY
        ) {
            let table = if joint { &MARRIED_JOINT_BRACKETS } else { &SINGLE_BRACKETS };
            let lower = progressive_tax(base as f64, table);
            let upper = progressive_tax(base as f64 + delta as f64, table);
            prop_assert!(upper + EPS >= lower);
        }
    }

    #[test]
    fn federal_tax_is_continuous_at_each_threshold() {
        for table in [&SINGLE_BRACKETS, &MARRIED_JOINT_BRACKETS] {
            for &(threshold, _) in table.iter() {
                let at = progressive_tax(threshold, table);
                let above = progressive_tax(threshold + 0.01, table);
                assert!(above >= at);
                assert!(above - at < 0.01, "jump at {threshold}: {at} -> {above}");
            }
        }
    }
}
