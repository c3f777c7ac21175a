use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cap_table::{CapTable, PreferenceType, ShareClass};
use crate::error::WaterfallError;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::waterfall::decide_distribution;
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Input for a multi-exit waterfall analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitAnalysisInput {
    /// The cap table: one entry per share class
    pub share_classes: Vec<ShareClass>,
    /// Exit values to evaluate, one full distribution each
    pub exit_values: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Per-class detail within one exit scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDetail {
    pub name: String,
    pub preference_type: PreferenceType,
    pub shares: u64,
    /// Fraction of fully-diluted shares (decimal, not percentage)
    pub ownership: Rate,
    pub invested: Money,
    /// Contractual liquidation preference amount (0 for common)
    pub liquidation_preference: Money,
    pub payout: Money,
    /// Payout over invested capital; zero when nothing was invested
    pub realized_multiple: Multiple,
    /// Elected conversion to common treatment at this exit value
    pub converted: bool,
    /// Pinned at its participation cap at this exit value
    pub capped: bool,
}

/// One evaluated exit value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitScenario {
    pub exit_value: Money,
    /// Per-class breakdown, highest priority first
    pub classes: Vec<ClassDetail>,
    pub total_distributed: Money,
    pub converted_classes: Vec<String>,
    pub capped_classes: Vec<String>,
}

/// Complete output for the multi-exit analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitAnalysisOutput {
    pub scenarios: Vec<ExitScenario>,
    pub total_shares: u64,
    pub total_invested: Money,
}

// ---------------------------------------------------------------------------
// Main function
// ---------------------------------------------------------------------------

/// Evaluate the waterfall across a range of exit values and report, per
/// exit, the payouts together with conversion and cap events. Each exit
/// value is an independent distribution; nothing carries across scenarios.
pub fn analyze_exits(
    input: &ExitAnalysisInput,
) -> WaterfallResult<ComputationOutput<ExitAnalysisOutput>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    if input.exit_values.is_empty() {
        return Err(WaterfallError::InvalidInput {
            field: "exit_values".into(),
            reason: "At least one exit value is required".into(),
        });
    }

    let table = CapTable::new(input.share_classes.clone())?;
    let total_shares = table.total_shares();
    let total_shares_dec = Decimal::from(total_shares);

    // Display order: highest priority first, then source order
    let mut ordered: Vec<&ShareClass> = table.classes().iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut scenarios = Vec::with_capacity(input.exit_values.len());
    for &exit_value in &input.exit_values {
        let outcome = decide_distribution(&table, exit_value)?;

        let classes = ordered
            .iter()
            .map(|sc| {
                let payout = outcome.payouts.get(&sc.name).copied().unwrap_or_default();
                ClassDetail {
                    name: sc.name.clone(),
                    preference_type: sc.preference_type,
                    shares: sc.shares,
                    ownership: if total_shares_dec.is_zero() {
                        Decimal::ZERO
                    } else {
                        Decimal::from(sc.shares) / total_shares_dec
                    },
                    invested: sc.invested,
                    liquidation_preference: sc.liquidation_preference(),
                    payout,
                    realized_multiple: if sc.invested.is_zero() {
                        Decimal::ZERO
                    } else {
                        payout / sc.invested
                    },
                    converted: outcome.converted_classes.contains(&sc.name),
                    capped: outcome.capped_classes.contains(&sc.name),
                }
            })
            .collect();

        scenarios.push(ExitScenario {
            exit_value,
            classes,
            total_distributed: outcome.payouts.values().copied().sum(),
            converted_classes: outcome.converted_classes,
            capped_classes: outcome.capped_classes,
        });
    }

    let output = ExitAnalysisOutput {
        scenarios,
        total_shares,
        total_invested: table.total_invested(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multi-Exit Waterfall Analysis",
        &serde_json::json!({
            "num_share_classes": input.share_classes.len(),
            "num_exit_values": input.exit_values.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
