use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use lpw_core::analysis::{self, ExitAnalysisInput};
use lpw_core::cap_table::{CapTable, PreferenceType};
use lpw_core::waterfall::{self, DistributionInput};

use crate::input;

/// Arguments for a single-exit distribution
#[derive(Args)]
pub struct DistributeArgs {
    /// Path to a cap table file (.csv, or JSON array of share classes)
    #[arg(long)]
    pub cap_table: Option<String>,

    /// Exit value to distribute (supports 500K / 15M / 1.5B suffixes)
    #[arg(long)]
    pub exit_value: String,
}

/// Arguments for a multi-exit sweep
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to a cap table file (.csv, or JSON array of share classes)
    #[arg(long)]
    pub cap_table: Option<String>,

    /// Exit values to analyze (supports 500K / 15M / 1.5B suffixes)
    #[arg(long, num_args = 1.., default_values_t = default_exit_values())]
    pub exit_values: Vec<String>,
}

fn default_exit_values() -> Vec<String> {
    vec!["15M".into(), "25M".into(), "50M".into(), "100M".into()]
}

/// Arguments for a cap table summary
#[derive(Args)]
pub struct SummaryArgs {
    /// Path to a cap table file (.csv, or JSON array of share classes)
    #[arg(long)]
    pub cap_table: Option<String>,
}

pub fn run_distribute(args: DistributeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let table = input::cap_table::load(args.cap_table.as_deref())?;
    let exit_value = input::exit_values::parse_exit_value(&args.exit_value)?;

    let dist_input = DistributionInput {
        share_classes: table.into_classes(),
        exit_value,
    };
    let result = waterfall::calculate_distribution(&dist_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let table = input::cap_table::load(args.cap_table.as_deref())?;
    let exit_values = input::exit_values::parse_exit_values(&args.exit_values)?;

    let analysis_input = ExitAnalysisInput {
        share_classes: table.into_classes(),
        exit_values,
    };
    let result = analysis::analyze_exits(&analysis_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_summary(args: SummaryArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let table = input::cap_table::load(args.cap_table.as_deref())?;
    Ok(summarize(&table))
}

/// Build the cap table summary: per-class terms plus totals, highest
/// priority first. Purely presentational; no engine involvement.
fn summarize(table: &CapTable) -> Value {
    let total_shares = Decimal::from(table.total_shares());

    let mut ordered: Vec<_> = table.classes().iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let classes: Vec<Value> = ordered
        .iter()
        .map(|sc| {
            let price = if sc.shares > 0 && sc.invested > Decimal::ZERO {
                sc.invested / Decimal::from(sc.shares)
            } else {
                Decimal::ZERO
            };
            let ownership = if total_shares.is_zero() {
                Decimal::ZERO
            } else {
                Decimal::from(sc.shares) / total_shares
            };
            serde_json::json!({
                "name": sc.name,
                "stack_order": sc.stack_order,
                "shares": sc.shares,
                "price": price.to_string(),
                "invested": sc.invested.to_string(),
                "preference_type": type_label(sc.preference_type),
                "preference_multiple": sc.preference_multiple.to_string(),
                "participation_cap": sc.participation_cap.map(|c| format!("{c}x")),
                "convertible": sc.convertible,
                "ownership": ownership.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "classes": classes,
        "total_shares": table.total_shares(),
        "total_invested": table.total_invested().to_string(),
    })
}

fn type_label(pt: PreferenceType) -> &'static str {
    match pt {
        PreferenceType::Common => "Common",
        PreferenceType::NonParticipating => "Non Participating",
        PreferenceType::Participating => "Participating",
    }
}
