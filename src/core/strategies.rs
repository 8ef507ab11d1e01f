use serde::Serialize;

use super::tax::marginal_rate;
use super::types::{FilingStatus, SavingsRange, TaxProfile};

const K401_LIMIT: f64 = 22_500.0;
const K401_CATCH_UP_LIMIT: f64 = 30_000.0;
const K401_CATCH_UP_AGE: u32 = 50;
const K401_MIN_RATE: f64 = 0.22;

const HSA_SELF_LIMIT: f64 = 3_850.0;
const HSA_FAMILY_LIMIT: f64 = 7_750.0;

const SECTION_179_CAP: f64 = 1_080_000.0;
const LLC_EXPENSE_CAP: f64 = 50_000.0;
const SEP_IRA_CAP: f64 = 66_000.0;

const LTCG_TOP_RATE_THRESHOLD: f64 = 459_750.0;
const CAPITAL_LOSS_ORDINARY_OFFSET: f64 = 3_000.0;

/// Deduction a donation has to clear before it lowers taxable income. Only
/// the joint return gets the larger base; age additions are ignored.
fn charitable_baseline(status: FilingStatus) -> f64 {
    match status {
        FilingStatus::MarriedFilingJointly => 27_700.0,
        _ => 13_850.0,
    }
}

/// Home / property value modeled as a multiple of total compensation.
const PROPERTY_VALUE_MULTIPLE: f64 = 2.0;

/// Employee 401(k) deferral limit, including the catch-up amount at 50+.
pub fn annual_401k_limit(age: u32) -> f64 {
    if age >= K401_CATCH_UP_AGE {
        K401_CATCH_UP_LIMIT
    } else {
        K401_LIMIT
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum StrategyKind {
    #[serde(rename = "401k_contribution")]
    Contribution401k,
    #[serde(rename = "hsa_contributions")]
    HsaContributions,
    #[serde(rename = "section_179")]
    Section179,
    #[serde(rename = "charitable_contributions")]
    CharitableContributions,
    #[serde(rename = "tax_loss_harvesting")]
    TaxLossHarvesting,
    #[serde(rename = "form_llc_section_179")]
    FormLlcSection179,
    #[serde(rename = "real_estate_investment")]
    RealEstateInvestment,
    #[serde(rename = "sep_ira_solo_401k")]
    SepIraSolo401k,
    #[serde(rename = "home_office_deduction")]
    HomeOfficeDeduction,
}

impl StrategyKind {
    pub fn id(self) -> &'static str {
        match self {
            StrategyKind::Contribution401k => "401k_contribution",
            StrategyKind::HsaContributions => "hsa_contributions",
            StrategyKind::Section179 => "section_179",
            StrategyKind::CharitableContributions => "charitable_contributions",
            StrategyKind::TaxLossHarvesting => "tax_loss_harvesting",
            StrategyKind::FormLlcSection179 => "form_llc_section_179",
            StrategyKind::RealEstateInvestment => "real_estate_investment",
            StrategyKind::SepIraSolo401k => "sep_ira_solo_401k",
            StrategyKind::HomeOfficeDeduction => "home_office_deduction",
        }
    }

    pub fn is_eligible(self, p: &TaxProfile) -> bool {
        match self {
            StrategyKind::Contribution401k => p.salary > 0.0,
            StrategyKind::HsaContributions => true,
            StrategyKind::Section179 => p.other_income > 20_000.0,
            StrategyKind::CharitableContributions => {
                p.itemized_deductions > 0.0 || p.total_compensation > 150_000.0
            }
            StrategyKind::TaxLossHarvesting => p.capital_gains > 0.0 || p.dividends > 5_000.0,
            StrategyKind::FormLlcSection179 => p.salary > 50_000.0,
            StrategyKind::RealEstateInvestment => {
                p.total_compensation > 100_000.0 || p.itemized_deductions > 10_000.0
            }
            StrategyKind::SepIraSolo401k => p.other_income > 5_000.0 || p.salary > 75_000.0,
            StrategyKind::HomeOfficeDeduction => {
                p.homeowner && (p.other_income > 0.0 || p.salary > 50_000.0)
            }
        }
    }

    pub fn potential_savings(self, p: &TaxProfile) -> SavingsRange {
        let rate = marginal_rate(p);
        match self {
            StrategyKind::Contribution401k => {
                let room = (annual_401k_limit(p.age) - p.retirement_401k).max(0.0);
                SavingsRange::new(room * rate.min(K401_MIN_RATE), room * rate)
            }
            StrategyKind::HsaContributions => {
                let limit = match p.filing_status {
                    FilingStatus::Single => HSA_SELF_LIMIT,
                    _ => HSA_FAMILY_LIMIT,
                };
                SavingsRange::from_max(limit * rate, 0.8)
            }
            StrategyKind::Section179 => {
                let expensed = (p.other_income * 0.3).min(SECTION_179_CAP);
                SavingsRange::from_max(expensed * rate, 0.5)
            }
            StrategyKind::CharitableContributions => {
                let donation = (p.total_compensation * 0.05).max(0.0);
                let baseline = charitable_baseline(p.filing_status);
                let incremental = if p.itemized_deductions > baseline {
                    donation
                } else {
                    (p.itemized_deductions + donation - baseline).max(0.0)
                };
                SavingsRange::new(incremental * rate * 0.5, donation * rate)
            }
            StrategyKind::TaxLossHarvesting => {
                let (offset, offset_rate) = if p.capital_gains > 0.0 {
                    let cg_rate = if p.total_compensation > LTCG_TOP_RATE_THRESHOLD {
                        0.20
                    } else {
                        0.15
                    };
                    (p.capital_gains, cg_rate)
                } else {
                    (CAPITAL_LOSS_ORDINARY_OFFSET, rate)
                };
                let max = offset * offset_rate;
                SavingsRange::new((CAPITAL_LOSS_ORDINARY_OFFSET * rate).min(max), max)
            }
            StrategyKind::FormLlcSection179 => {
                let expensed = (p.total_compensation * 0.1).min(LLC_EXPENSE_CAP);
                SavingsRange::from_max(expensed * rate, 0.5)
            }
            StrategyKind::RealEstateInvestment => {
                let property_value = p.total_compensation * PROPERTY_VALUE_MULTIPLE;
                let depreciation = property_value * 0.02;
                let mortgage_interest = property_value * 0.03;
                let expenses = property_value * 0.01;
                let deductible = depreciation + mortgage_interest + expenses;
                SavingsRange::from_max(deductible * rate, 0.5)
            }
            StrategyKind::SepIraSolo401k => {
                let business_income = if p.other_income > 0.0 {
                    p.other_income
                } else {
                    p.salary * 0.2
                };
                let contribution = (business_income * 0.25).min(SEP_IRA_CAP);
                SavingsRange::from_max(contribution * rate, 0.6)
            }
            StrategyKind::HomeOfficeDeduction => {
                let home_value = p.total_compensation * PROPERTY_VALUE_MULTIPLE;
                let home_costs = home_value * 0.05;
                let office_share = home_costs * 0.1;
                SavingsRange::from_max(office_share * rate, 0.5)
            }
        }
    }
}

/// Static catalog entry. Text fields are display-only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    #[serde(rename = "id")]
    pub kind: StrategyKind,
    pub name: &'static str,
    pub description: &'static str,
    pub eligibility_criteria: &'static [&'static str],
    pub implementation_steps: &'static [&'static str],
    pub savings_description: &'static str,
    pub min_effort_hours: u32,
}

impl Strategy {
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn is_eligible(&self, profile: &TaxProfile) -> bool {
        self.kind.is_eligible(profile)
    }

    pub fn potential_savings(&self, profile: &TaxProfile) -> SavingsRange {
        self.kind.potential_savings(profile)
    }
}

pub fn catalog() -> &'static [Strategy] {
    &CATALOG
}

pub fn find_strategy(id: &str) -> Option<&'static Strategy> {
    CATALOG.iter().find(|strategy| strategy.id() == id)
}

static CATALOG: [Strategy; 9] = [
    Strategy {
        kind: StrategyKind::Contribution401k,
        name: "Maximize 401(k) Contributions",
        description: "Increase pre-tax contributions to your employer 401(k) up to the annual limit to lower taxable wages.",
        eligibility_criteria: &[
            "Has W-2 salary income",
            "Employer offers a 401(k) plan",
            "Not already contributing the annual maximum",
        ],
        implementation_steps: &[
            "Log in to your employer's benefits portal",
            "Raise your pre-tax contribution percentage",
            "Confirm the change on your next pay stub",
            "Revisit the election each January when limits change",
        ],
        savings_description: "Each pre-tax dollar contributed avoids tax at your marginal rate.",
        min_effort_hours: 1,
    },
    Strategy {
        kind: StrategyKind::HsaContributions,
        name: "Health Savings Account Contributions",
        description: "Fund an HSA alongside a high-deductible health plan for deductible contributions and tax-free qualified withdrawals.",
        eligibility_criteria: &[
            "Enrolled in an HSA-eligible high-deductible health plan",
            "Not enrolled in Medicare",
            "Not claimed as a dependent on another return",
        ],
        implementation_steps: &[
            "Confirm your health plan is HSA-eligible",
            "Open an HSA through your employer or a custodian",
            "Set up payroll or direct contributions up to the limit",
            "Keep receipts for qualified medical expenses",
        ],
        savings_description: "Contributions up to the self-only or family limit are deducted at your marginal rate.",
        min_effort_hours: 2,
    },
    Strategy {
        kind: StrategyKind::Section179,
        name: "Section 179 Equipment Expensing",
        description: "Deduct the full cost of qualifying business equipment in the year it is placed in service instead of depreciating it.",
        eligibility_criteria: &[
            "Has self-employment or business income",
            "Purchases equipment used more than 50% for business",
            "Equipment placed in service this tax year",
        ],
        implementation_steps: &[
            "Identify equipment, vehicles or software the business needs",
            "Purchase and place the assets in service before year end",
            "Elect Section 179 on Form 4562",
            "Keep invoices and business-use records",
        ],
        savings_description: "Roughly 30% of business income expensed, subject to the annual Section 179 cap.",
        min_effort_hours: 4,
    },
    Strategy {
        kind: StrategyKind::CharitableContributions,
        name: "Strategic Charitable Giving",
        description: "Bunch donations or give appreciated assets through a donor-advised fund so gifts exceed the standard deduction.",
        eligibility_criteria: &[
            "Already itemizes deductions or has high income",
            "Donates to qualified 501(c)(3) organizations",
        ],
        implementation_steps: &[
            "Pick the charities you want to support",
            "Consider opening a donor-advised fund",
            "Donate appreciated securities instead of cash where possible",
            "Collect written acknowledgements for gifts of $250 or more",
        ],
        savings_description: "A donation of about 5% of compensation at your marginal rate; the low end counts only the part that lifts deductions above the standard deduction.",
        min_effort_hours: 2,
    },
    Strategy {
        kind: StrategyKind::TaxLossHarvesting,
        name: "Tax-Loss Harvesting",
        description: "Sell investments trading below cost basis to realize losses that offset capital gains and up to $3,000 of ordinary income.",
        eligibility_criteria: &[
            "Holds taxable brokerage investments",
            "Has realized capital gains or sizable dividend income",
        ],
        implementation_steps: &[
            "Review taxable holdings for unrealized losses",
            "Sell losing positions before year end",
            "Reinvest in similar but not substantially identical funds",
            "Avoid repurchasing within 30 days to respect wash-sale rules",
        ],
        savings_description: "Losses offset gains at the capital gains rate, or $3,000 of ordinary income at your marginal rate.",
        min_effort_hours: 3,
    },
    Strategy {
        kind: StrategyKind::FormLlcSection179,
        name: "Form an LLC for Side Business Expenses",
        description: "Formalize a side business as an LLC to deduct ordinary business expenses and expense equipment under Section 179.",
        eligibility_criteria: &[
            "Has salary income and a genuine side business activity",
            "Willing to maintain separate business books and accounts",
        ],
        implementation_steps: &[
            "Register an LLC with your state",
            "Obtain an EIN and open a business bank account",
            "Track business expenses separately",
            "Report income and deductions on Schedule C",
        ],
        savings_description: "Up to 10% of compensation in deductible business expenses, capped at $50,000.",
        min_effort_hours: 10,
    },
    Strategy {
        kind: StrategyKind::RealEstateInvestment,
        name: "Real Estate Investment",
        description: "Own rental property to deduct depreciation, mortgage interest and operating expenses against rental income.",
        eligibility_criteria: &[
            "High income or significant existing itemized deductions",
            "Capital available for a down payment",
            "Willing to manage or hire management for a rental",
        ],
        implementation_steps: &[
            "Define a budget and target market",
            "Secure financing and purchase a rental property",
            "Set up depreciation schedules with a tax professional",
            "Track rental income and expenses on Schedule E",
        ],
        savings_description: "Depreciation (2%), mortgage interest (3%) and expenses (1%) on a property worth about twice your compensation.",
        min_effort_hours: 40,
    },
    Strategy {
        kind: StrategyKind::SepIraSolo401k,
        name: "SEP-IRA or Solo 401(k)",
        description: "Shelter self-employment income in a SEP-IRA or Solo 401(k) with far higher limits than an IRA.",
        eligibility_criteria: &[
            "Has self-employment or side business income",
            "No full-time employees other than a spouse",
        ],
        implementation_steps: &[
            "Choose between a SEP-IRA and a Solo 401(k)",
            "Open the plan with a brokerage",
            "Calculate the allowed employer contribution",
            "Contribute before the tax filing deadline",
        ],
        savings_description: "Up to 25% of business income, capped at $66,000, deducted at your marginal rate.",
        min_effort_hours: 3,
    },
    Strategy {
        kind: StrategyKind::HomeOfficeDeduction,
        name: "Home Office Deduction",
        description: "Deduct the business-use share of home costs for space used regularly and exclusively for work.",
        eligibility_criteria: &[
            "Owns a home",
            "Has self-employment income or works from home",
            "Uses a dedicated space exclusively for business",
        ],
        implementation_steps: &[
            "Measure the office area and the whole home",
            "Gather mortgage interest, utilities, insurance and repair costs",
            "Choose the simplified or regular method",
            "File Form 8829 with Schedule C",
        ],
        savings_description: "About 10% of modeled home costs (5% of a home worth twice your compensation).",
        min_effort_hours: 2,
    },
];
