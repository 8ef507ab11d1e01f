mod ranking;
mod strategies;
mod tax;
mod types;

pub use ranking::{
    EvaluationResult, StrategyEvaluation, capped_savings, eligible_savings_total, evaluate,
    evaluate_strategies,
};
pub use strategies::{Strategy, StrategyKind, annual_401k_limit, catalog, find_strategy};
pub use tax::{
    estimate_federal_tax, estimate_taxable_income, marginal_bracket, marginal_rate,
    standard_deduction, total_income,
};
pub use types::{FilingStatus, STATE_CODES, SavingsRange, TaxProfile, is_known_state};
