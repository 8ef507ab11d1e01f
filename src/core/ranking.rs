use serde::Serialize;
use std::cmp::Ordering;

use super::strategies::{Strategy, catalog};
use super::tax::{estimate_federal_tax, estimate_taxable_income, marginal_bracket, total_income};
use super::types::{SavingsRange, TaxProfile};

/// Share of the estimated federal tax that combined strategies may claim.
const SAVINGS_CAP_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyEvaluation {
    pub strategy: &'static Strategy,
    pub is_eligible: bool,
    pub potential_savings: SavingsRange,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub total_income: f64,
    pub taxable_income: f64,
    pub estimated_federal_tax: f64,
    pub marginal_bracket: u32,
    pub total_potential_savings: f64,
    pub capped_savings: f64,
    pub strategies: Vec<StrategyEvaluation>,
}

fn score(profile: &TaxProfile) -> Vec<StrategyEvaluation> {
    catalog()
        .iter()
        .map(|strategy| StrategyEvaluation {
            strategy,
            is_eligible: strategy.is_eligible(profile),
            potential_savings: strategy.potential_savings(profile),
        })
        .collect()
}

fn rank(mut scored: Vec<StrategyEvaluation>, show_all: bool) -> Vec<StrategyEvaluation> {
    if !show_all {
        scored.retain(|evaluation| evaluation.is_eligible);
    }
    // sort_by is stable: equal maxima keep catalog order
    scored.sort_by(|a, b| {
        b.potential_savings
            .max
            .partial_cmp(&a.potential_savings.max)
            .unwrap_or(Ordering::Equal)
    });
    scored
}

/// Scores every catalog strategy and returns them best first. Ineligible
/// entries are kept only when `show_all` is set.
pub fn evaluate_strategies(profile: &TaxProfile, show_all: bool) -> Vec<StrategyEvaluation> {
    rank(score(profile), show_all)
}

pub fn eligible_savings_total(evaluations: &[StrategyEvaluation]) -> f64 {
    evaluations
        .iter()
        .filter(|evaluation| evaluation.is_eligible)
        .map(|evaluation| evaluation.potential_savings.max)
        .sum()
}

pub fn capped_savings(total_potential_savings: f64, estimated_federal_tax: f64) -> f64 {
    total_potential_savings.min(SAVINGS_CAP_RATIO * estimated_federal_tax)
}

pub fn evaluate(profile: &TaxProfile, show_all: bool) -> EvaluationResult {
    let scored = score(profile);
    let total_potential_savings = eligible_savings_total(&scored);
    let estimated_federal_tax = estimate_federal_tax(profile);

    EvaluationResult {
        total_income: total_income(profile),
        taxable_income: estimate_taxable_income(profile),
        estimated_federal_tax,
        marginal_bracket: marginal_bracket(profile),
        total_potential_savings,
        capped_savings: capped_savings(total_potential_savings, estimated_federal_tax),
        strategies: rank(scored, show_all),
    }
}
