use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::cap_table::{CapTable, PreferenceType, ShareClass};
use crate::error::WaterfallError;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Input for a liquidation preference distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionInput {
    /// The cap table: one entry per share class
    pub share_classes: Vec<ShareClass>,
    /// Total sale proceeds to distribute
    pub exit_value: Money,
}

/// Full distribution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionOutput {
    /// Payout per share class; every input class has an entry
    pub payouts: BTreeMap<String, Money>,
    /// Sum of all payouts
    pub total_distributed: Money,
    /// Exit value the distribution was computed for
    pub exit_value: Money,
    /// Non-participating classes that elected conversion to common
    pub converted_classes: Vec<String>,
    /// Participating classes pinned at their participation cap
    pub capped_classes: Vec<String>,
}

/// Payouts plus the events observed while computing them. Used internally
/// and by the multi-exit analysis layer.
#[derive(Debug, Clone)]
pub struct DistributionOutcome {
    pub payouts: BTreeMap<String, Money>,
    pub converted_classes: Vec<String>,
    pub capped_classes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Waterfall scenarios
// ---------------------------------------------------------------------------

/// Residual-phase accumulator threaded through the cap-iteration rounds.
struct ResidualPool<'a> {
    members: Vec<&'a ShareClass>,
    remaining: Money,
}

/// Result of one waterfall scenario (a fixed converting set).
struct Scenario {
    payouts: BTreeMap<String, Money>,
    capped: Vec<String>,
}

/// Distribute assuming every preferred class takes its contractual
/// liquidation preference (nobody converts).
pub fn distribute_preferences_only(
    table: &CapTable,
    exit_value: Money,
) -> WaterfallResult<BTreeMap<String, Money>> {
    Ok(run_scenario(table, exit_value, &BTreeSet::new())?.payouts)
}

/// Distribute with the named classes pulled out of the preference track and
/// treated as ordinary common stock in the residual phase.
pub fn distribute_with_conversions(
    table: &CapTable,
    exit_value: Money,
    converting: &BTreeSet<String>,
) -> WaterfallResult<BTreeMap<String, Money>> {
    Ok(run_scenario(table, exit_value, converting)?.payouts)
}

fn run_scenario(
    table: &CapTable,
    exit_value: Money,
    converting: &BTreeSet<String>,
) -> WaterfallResult<Scenario> {
    let mut payouts: BTreeMap<String, Money> = BTreeMap::new();
    let mut capped: Vec<String> = Vec::new();
    let mut remaining = exit_value;

    // Preference track: non-common classes that are not electing conversion,
    // grouped by priority and paid highest rank first.
    let mut groups: BTreeMap<i32, Vec<&ShareClass>> = BTreeMap::new();
    for sc in table.classes() {
        if sc.preference_type != PreferenceType::Common && !converting.contains(&sc.name) {
            groups.entry(sc.priority).or_default().push(sc);
        }
    }

    for group in groups.values().rev() {
        let group_total: Money = group.iter().map(|sc| sc.liquidation_preference()).sum();

        if group_total <= remaining {
            for sc in group {
                let preference = sc.liquidation_preference();
                payouts.insert(sc.name.clone(), preference);
                remaining -= preference;
            }
        } else {
            // Underfunded group. A zero combined preference means nothing is
            // payable at this rank; otherwise split what remains pro-rata by
            // preference amount (not by share count) and stop the waterfall.
            if group_total.is_zero() {
                for sc in group {
                    payouts.insert(sc.name.clone(), Decimal::ZERO);
                }
                continue;
            }
            for sc in group {
                let payout = remaining * (sc.liquidation_preference() / group_total);
                payouts.insert(sc.name.clone(), payout);
            }
            remaining = Decimal::ZERO;
            break;
        }
    }

    // Residual participation phase: common, converting, and participating
    // classes share the remainder pro-rata by share count, with caps applied
    // iteratively.
    if remaining > Decimal::ZERO {
        let members: Vec<&ShareClass> = table
            .classes()
            .iter()
            .filter(|sc| {
                sc.preference_type == PreferenceType::Common
                    || converting.contains(&sc.name)
                    || sc.preference_type == PreferenceType::Participating
            })
            .collect();

        if !members.is_empty() {
            let pool = ResidualPool { members, remaining };
            distribute_residual(pool, converting, &mut payouts, &mut capped)?;
        }
    }

    // Every class gets an explicit entry, even when it received nothing.
    for sc in table.classes() {
        payouts.entry(sc.name.clone()).or_insert(Decimal::ZERO);
    }

    Ok(Scenario { payouts, capped })
}

/// Iterative cap distribution.
///
/// Each round credits every pool member its pro-rata share of the remaining
/// residual. A capped participating member that would cross
/// `invested × cap` is credited exactly up to the cap and removed; its
/// uncredited surplus stays in the residual and is redistributed over the
/// shrunken pool. Terminates within |pool| rounds because the pool strictly
/// shrinks whenever the loop repeats.
fn distribute_residual(
    mut pool: ResidualPool<'_>,
    converting: &BTreeSet<String>,
    payouts: &mut BTreeMap<String, Money>,
    capped: &mut Vec<String>,
) -> WaterfallResult<()> {
    while !pool.members.is_empty() && pool.remaining > Decimal::ZERO {
        let total_shares: Decimal = pool
            .members
            .iter()
            .map(|sc| Decimal::from(sc.shares))
            .sum();
        if total_shares.is_zero() {
            return Err(WaterfallError::DivisionByZero {
                context: "residual pool with zero total shares".into(),
            });
        }

        let mut credited_this_round = Decimal::ZERO;
        let mut capped_this_round: BTreeSet<String> = BTreeSet::new();

        for sc in &pool.members {
            let pro_rata = pool.remaining * Decimal::from(sc.shares) / total_shares;
            let current = payouts.get(&sc.name).copied().unwrap_or(Decimal::ZERO);

            // Converting classes participate as common: their cap is moot.
            let cap_limit = if converting.contains(&sc.name) {
                None
            } else {
                sc.cap_amount()
            };

            match cap_limit {
                Some(max_total) if current + pro_rata > max_total => {
                    // Pin at the cap. This holds even when the cap sits below
                    // the amount already credited (a cap below the class's own
                    // preference is honoured as stated).
                    payouts.insert(sc.name.clone(), max_total);
                    credited_this_round += max_total - current;
                    capped_this_round.insert(sc.name.clone());
                }
                _ => {
                    payouts.insert(sc.name.clone(), current + pro_rata);
                    credited_this_round += pro_rata;
                }
            }
        }

        // Only what was actually credited leaves the residual; the capped
        // surplus remains for the next round.
        pool.remaining -= credited_this_round;

        if capped_this_round.is_empty() {
            break;
        }
        capped.extend(capped_this_round.iter().cloned());
        pool.members.retain(|sc| !capped_this_round.contains(&sc.name));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Conversion decisions
// ---------------------------------------------------------------------------

/// Decide, per convertible non-participating class, whether converting to
/// common treatment beats taking its liquidation preference, then compute
/// the resulting distribution.
///
/// Each candidate is probed alone against the all-take-preference baseline.
/// This is the model's compatibility rule, not a joint equilibrium: with
/// several interacting convertible classes the independent probes can be
/// non-optimal.
pub fn decide_distribution(
    table: &CapTable,
    exit_value: Money,
) -> WaterfallResult<DistributionOutcome> {
    let baseline = run_scenario(table, exit_value, &BTreeSet::new())?;

    let mut converting: BTreeSet<String> = BTreeSet::new();
    for sc in table.classes() {
        if sc.preference_type != PreferenceType::NonParticipating || !sc.convertible {
            continue;
        }
        let probe_set = BTreeSet::from([sc.name.clone()]);
        let probe = run_scenario(table, exit_value, &probe_set)?;

        let with_preference = baseline.payouts.get(&sc.name).copied().unwrap_or_default();
        let with_conversion = probe.payouts.get(&sc.name).copied().unwrap_or_default();
        if with_conversion > with_preference {
            converting.insert(sc.name.clone());
        }
    }

    let finals = if converting.is_empty() {
        baseline
    } else {
        run_scenario(table, exit_value, &converting)?
    };

    Ok(DistributionOutcome {
        payouts: finals.payouts,
        converted_classes: converting.into_iter().collect(),
        capped_classes: finals.capped,
    })
}

// ---------------------------------------------------------------------------
// Main function
// ---------------------------------------------------------------------------

/// Calculate the distribution of exit proceeds among all share classes.
///
/// Runs the liquidation preference waterfall: tiered preferences in priority
/// order (pro-rata within an underfunded rank), residual participation with
/// iterative caps, and optimal-conversion election for convertible
/// non-participating preferred.
pub fn calculate_distribution(
    input: &DistributionInput,
) -> WaterfallResult<ComputationOutput<DistributionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let table = CapTable::new(input.share_classes.clone())?;

    if input.exit_value < Decimal::ZERO {
        warnings.push("Exit value is negative; the top priority group absorbs the shortfall pro-rata".into());
    }

    let outcome = decide_distribution(&table, input.exit_value)?;
    let total_distributed: Money = outcome.payouts.values().copied().sum();

    let output = DistributionOutput {
        payouts: outcome.payouts,
        total_distributed,
        exit_value: input.exit_value,
        converted_classes: outcome.converted_classes,
        capped_classes: outcome.capped_classes,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Liquidation Preference Waterfall: Tiered Preferences, Iterative Caps, Optimal Conversion",
        &serde_json::json!({
            "exit_value": input.exit_value.to_string(),
            "num_share_classes": input.share_classes.len(),
            "total_shares": table.total_shares(),
            "total_invested": table.total_invested().to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cap_table::AntiDilutionType;
    use crate::types::Multiple;
    use rust_decimal_macros::dec;

    const TOLERANCE: Decimal = dec!(0.000001);

    fn class(name: &str, shares: u64, invested: Money) -> ShareClass {
        ShareClass {
            name: name.to_string(),
            shares,
            invested,
            preference_type: PreferenceType::Common,
            preference_multiple: Decimal::ONE,
            participation_cap: None,
            priority: 0,
            stack_order: 0,
            convertible: true,
            anti_dilution_type: AntiDilutionType::None,
        }
    }

    fn common(name: &str, shares: u64) -> ShareClass {
        let mut sc = class(name, shares, Decimal::ZERO);
        sc.convertible = false;
        sc
    }

    fn non_participating(
        name: &str,
        shares: u64,
        invested: Money,
        multiple: Multiple,
        priority: i32,
    ) -> ShareClass {
        let mut sc = class(name, shares, invested);
        sc.preference_type = PreferenceType::NonParticipating;
        sc.preference_multiple = multiple;
        sc.priority = priority;
        sc
    }

    fn participating(
        name: &str,
        shares: u64,
        invested: Money,
        multiple: Multiple,
        cap: Option<Multiple>,
        priority: i32,
    ) -> ShareClass {
        let mut sc = class(name, shares, invested);
        sc.preference_type = PreferenceType::Participating;
        sc.preference_multiple = multiple;
        sc.participation_cap = cap;
        sc.priority = priority;
        sc
    }

    fn distribute(classes: Vec<ShareClass>, exit_value: Money) -> BTreeMap<String, Money> {
        let input = DistributionInput {
            share_classes: classes,
            exit_value,
        };
        calculate_distribution(&input).unwrap().result.payouts
    }

    fn assert_close(actual: Money, expected: Money) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    // -----------------------------------------------------------------------
    // 1. Single common class takes everything
    // -----------------------------------------------------------------------
    #[test]
    fn test_common_only() {
        let payouts = distribute(vec![common("Common", 1_000_000)], dec!(5_000_000));
        assert_eq!(payouts["Common"], dec!(5_000_000));
        assert_eq!(payouts.len(), 1);
    }

    // -----------------------------------------------------------------------
    // 2. Non-participating 1x preference ahead of common
    // -----------------------------------------------------------------------
    #[test]
    fn test_non_participating_takes_preference() {
        let payouts = distribute(
            vec![
                common("Common", 1_000_000),
                non_participating("Preferred A", 200_000, dec!(900_000), Decimal::ONE, 1),
            ],
            dec!(3_000_000),
        );
        assert_eq!(payouts["Preferred A"], dec!(900_000));
        assert_eq!(payouts["Common"], dec!(2_100_000));
    }

    // -----------------------------------------------------------------------
    // 3. Participating preferred below its cap: preference + pro-rata
    // -----------------------------------------------------------------------
    #[test]
    fn test_participating_preference_plus_pro_rata() {
        let payouts = distribute(
            vec![
                common("Common", 1_000_000),
                participating(
                    "Preferred C",
                    1_500_000,
                    dec!(15_000_000),
                    Decimal::ONE,
                    Some(dec!(2)),
                    1,
                ),
            ],
            dec!(25_000_000),
        );
        // Preference 15M, then 10M residual split 1.5M/2.5M vs 1M/2.5M
        assert_close(payouts["Preferred C"], dec!(21_000_000));
        assert_close(payouts["Common"], dec!(4_000_000));
    }

    // -----------------------------------------------------------------------
    // 4. Participation cap binds; surplus flows back to common
    // -----------------------------------------------------------------------
    #[test]
    fn test_participation_cap_binds() {
        let payouts = distribute(
            vec![
                common("Common", 1_000_000),
                participating(
                    "Preferred A",
                    200_000,
                    dec!(900_000),
                    Decimal::ONE,
                    Some(dec!(2)),
                    1,
                ),
            ],
            dec!(7_000_000),
        );
        assert_close(payouts["Preferred A"], dec!(1_800_000));
        assert_close(payouts["Common"], dec!(5_200_000));
    }

    // -----------------------------------------------------------------------
    // 5. Priority-tied preferences split pro-rata by preference amount
    // -----------------------------------------------------------------------
    #[test]
    fn test_priority_tie_pro_rata_by_preference() {
        let mut a = non_participating("Series A", 100_000, dec!(1_000_000), dec!(3), 1);
        a.convertible = false;
        let mut b = non_participating("Series B", 300_000, dec!(1_000_000), Decimal::ONE, 1);
        b.convertible = false;

        let payouts = distribute(vec![common("Common", 1_000_000), a, b], dec!(2_000_000));
        // Preferences 3M and 1M against 2M of proceeds: 75% / 25%
        assert_close(payouts["Series A"], dec!(1_500_000));
        assert_close(payouts["Series B"], dec!(500_000));
        assert_eq!(payouts["Common"], Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // 6. Conversion threshold for a convertible 10% non-participating class
    // -----------------------------------------------------------------------
    #[test]
    fn test_conversion_threshold() {
        let classes = vec![
            common("Common", 900_000),
            non_participating("Series A", 100_000, dec!(1_000_000), Decimal::ONE, 1),
        ];

        // Just below: preference ($1M) beats 10% of proceeds
        let below = distribute(classes.clone(), dec!(9_999_999));
        assert_eq!(below["Series A"], dec!(1_000_000));

        // Just above: 10% of proceeds beats the preference
        let above = distribute(classes, dec!(10_000_001));
        assert_close(above["Series A"], dec!(1_000_000.1));
        assert_close(above["Common"], dec!(9_000_000.9));
    }

    #[test]
    fn test_conversion_reported_in_output() {
        let input = DistributionInput {
            share_classes: vec![
                common("Common", 900_000),
                non_participating("Series A", 100_000, dec!(1_000_000), Decimal::ONE, 1),
            ],
            exit_value: dec!(50_000_000),
        };
        let out = calculate_distribution(&input).unwrap().result;
        assert_eq!(out.converted_classes, vec!["Series A".to_string()]);
        assert_close(out.payouts["Series A"], dec!(5_000_000));
    }

    // -----------------------------------------------------------------------
    // Stacked priorities
    // -----------------------------------------------------------------------
    #[test]
    fn test_higher_priority_paid_first() {
        let mut b = non_participating("Series B", 200_000, dec!(4_000_000), Decimal::ONE, 2);
        b.convertible = false;
        let mut a = non_participating("Series A", 200_000, dec!(2_000_000), Decimal::ONE, 1);
        a.convertible = false;

        // Only enough for Series B and half of Series A
        let payouts = distribute(vec![common("Common", 1_000_000), a, b], dec!(5_000_000));
        assert_eq!(payouts["Series B"], dec!(4_000_000));
        assert_close(payouts["Series A"], dec!(1_000_000));
        assert_eq!(payouts["Common"], Decimal::ZERO);
    }

    #[test]
    fn test_priority_respect_lower_ranks_get_zero() {
        let mut b = non_participating("Series B", 200_000, dec!(4_000_000), Decimal::ONE, 2);
        b.convertible = false;
        let mut a = non_participating("Series A", 200_000, dec!(2_000_000), Decimal::ONE, 1);
        a.convertible = false;

        // Less than Series B's preference: B takes it all
        let payouts = distribute(vec![common("Common", 1_000_000), a, b], dec!(3_000_000));
        assert_eq!(payouts["Series B"], dec!(3_000_000));
        assert_eq!(payouts["Series A"], Decimal::ZERO);
        assert_eq!(payouts["Common"], Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // Multiple capped classes, caps binding across rounds
    // -----------------------------------------------------------------------
    #[test]
    fn test_two_caps_bind_iteratively() {
        let payouts = distribute(
            vec![
                common("Common", 1_000_000),
                participating(
                    "Series A",
                    500_000,
                    dec!(1_000_000),
                    Decimal::ONE,
                    Some(dec!(2)),
                    1,
                ),
                participating(
                    "Series B",
                    500_000,
                    dec!(2_000_000),
                    Decimal::ONE,
                    Some(dec!(2)),
                    1,
                ),
            ],
            dec!(30_000_000),
        );
        // Both caps bind well before the residual is exhausted
        assert_close(payouts["Series A"], dec!(2_000_000));
        assert_close(payouts["Series B"], dec!(4_000_000));
        assert_close(payouts["Common"], dec!(24_000_000));
    }

    #[test]
    fn test_cap_below_own_preference_is_honoured() {
        // Cap of 0.5x sits below the 1x preference already credited; the
        // class ends up pinned at the cap, not at its preference.
        let payouts = distribute(
            vec![
                common("Common", 1_000_000),
                participating(
                    "Series A",
                    200_000,
                    dec!(1_000_000),
                    Decimal::ONE,
                    Some(dec!(0.5)),
                    1,
                ),
            ],
            dec!(10_000_000),
        );
        assert_close(payouts["Series A"], dec!(500_000));
        assert_close(payouts["Common"], dec!(9_500_000));
    }

    #[test]
    fn test_uncapped_participating_never_capped() {
        let input = DistributionInput {
            share_classes: vec![
                common("Common", 1_000_000),
                participating(
                    "Series A",
                    1_000_000,
                    dec!(1_000_000),
                    Decimal::ONE,
                    None,
                    1,
                ),
            ],
            exit_value: dec!(101_000_000),
        };
        let out = calculate_distribution(&input).unwrap().result;
        assert!(out.capped_classes.is_empty());
        // Preference 1M + half of the 100M residual
        assert_close(out.payouts["Series A"], dec!(51_000_000));
    }

    #[test]
    fn test_capped_classes_reported() {
        let input = DistributionInput {
            share_classes: vec![
                common("Common", 1_000_000),
                participating(
                    "Preferred A",
                    200_000,
                    dec!(900_000),
                    Decimal::ONE,
                    Some(dec!(2)),
                    1,
                ),
            ],
            exit_value: dec!(7_000_000),
        };
        let out = calculate_distribution(&input).unwrap().result;
        assert_eq!(out.capped_classes, vec!["Preferred A".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Participating preferred never elects the optional conversion
    // -----------------------------------------------------------------------
    #[test]
    fn test_participating_never_converts() {
        let mut p = participating(
            "Series P",
            500_000,
            dec!(1_000_000),
            Decimal::ONE,
            None,
            1,
        );
        p.convertible = true;

        let input = DistributionInput {
            share_classes: vec![common("Common", 500_000), p],
            exit_value: dec!(100_000_000),
        };
        let out = calculate_distribution(&input).unwrap().result;
        assert!(out.converted_classes.is_empty());
        // Preference + half the residual beats a straight 50% of proceeds
        assert_close(out.payouts["Series P"], dec!(50_500_000));
    }

    #[test]
    fn test_non_convertible_never_converts() {
        let mut a = non_participating("Series A", 500_000, dec!(100_000), Decimal::ONE, 1);
        a.convertible = false;

        // Conversion would be worth 50% of 10M, but the class cannot elect it
        let payouts = distribute(vec![common("Common", 500_000), a], dec!(10_000_000));
        assert_eq!(payouts["Series A"], dec!(100_000));
        assert_close(payouts["Common"], dec!(9_900_000));
    }

    // -----------------------------------------------------------------------
    // Edge cases
    // -----------------------------------------------------------------------
    #[test]
    fn test_empty_cap_table_yields_empty_mapping() {
        let input = DistributionInput {
            share_classes: vec![],
            exit_value: dec!(1_000_000),
        };
        let out = calculate_distribution(&input).unwrap().result;
        assert!(out.payouts.is_empty());
        assert_eq!(out.total_distributed, Decimal::ZERO);
    }

    #[test]
    fn test_zero_exit_value() {
        let payouts = distribute(
            vec![
                common("Common", 1_000_000),
                non_participating("Series A", 200_000, dec!(900_000), Decimal::ONE, 1),
            ],
            Decimal::ZERO,
        );
        assert_eq!(payouts["Common"], Decimal::ZERO);
        assert_eq!(payouts["Series A"], Decimal::ZERO);
    }

    #[test]
    fn test_negative_exit_value_warns() {
        let input = DistributionInput {
            share_classes: vec![
                common("Common", 1_000_000),
                non_participating("Series A", 200_000, dec!(900_000), Decimal::ONE, 1),
            ],
            exit_value: dec!(-1),
        };
        let result = calculate_distribution(&input).unwrap();
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_zero_preference_group_pays_zero_and_continues() {
        // A preferred class with zero invested sits alone at the top rank.
        // Its group is worth nothing; the waterfall must move on rather
        // than divide by the group total.
        let mut free = non_participating("Warrants", 50_000, Decimal::ZERO, Decimal::ONE, 2);
        free.convertible = false;
        let mut a = non_participating("Series A", 200_000, dec!(900_000), Decimal::ONE, 1);
        a.convertible = false;

        let payouts = distribute(vec![common("Common", 1_000_000), free, a], dec!(3_000_000));
        assert_eq!(payouts["Warrants"], Decimal::ZERO);
        assert_eq!(payouts["Series A"], dec!(900_000));
        assert_close(payouts["Common"], dec!(2_100_000));
    }

    #[test]
    fn test_zero_share_residual_pool_fails() {
        let table = CapTable::new(vec![common("Common", 0)]).unwrap();
        let result = distribute_preferences_only(&table, dec!(1_000_000));
        assert!(matches!(
            result,
            Err(WaterfallError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_no_residual_pool_leaves_surplus_undistributed() {
        // No common and no participating classes: once preferences are paid
        // there is nobody left to take the residual.
        let mut a = non_participating("Series A", 200_000, dec!(900_000), Decimal::ONE, 1);
        a.convertible = false;
        let table = CapTable::new(vec![a]).unwrap();
        let payouts = distribute_preferences_only(&table, dec!(5_000_000)).unwrap();
        assert_eq!(payouts["Series A"], dec!(900_000));
    }

    #[test]
    fn test_duplicate_names_rejected_at_entry() {
        let input = DistributionInput {
            share_classes: vec![common("Common", 1_000_000), common("Common", 500_000)],
            exit_value: dec!(1_000_000),
        };
        assert!(matches!(
            calculate_distribution(&input),
            Err(WaterfallError::DuplicateShareClass(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Properties: conservation, non-negativity, monotonicity, optimality
    // -----------------------------------------------------------------------

    fn fixture_table() -> Vec<ShareClass> {
        vec![
            common("Common", 1_000_000),
            common("ESOP", 150_000),
            non_participating("Series A", 200_000, dec!(900_000), Decimal::ONE, 1),
            participating(
                "Series B",
                300_000,
                dec!(3_000_000),
                Decimal::ONE,
                Some(dec!(2.5)),
                2,
            ),
            non_participating("Series C", 400_000, dec!(8_000_000), dec!(1.5), 3),
        ]
    }

    #[test]
    fn test_conservation_across_exit_values() {
        for exit in [
            Decimal::ZERO,
            dec!(1),
            dec!(500_000),
            dec!(5_000_000),
            dec!(14_900_000),
            dec!(25_000_000),
            dec!(100_000_000),
            dec!(1_000_000_000),
        ] {
            let payouts = distribute(fixture_table(), exit);
            let total: Money = payouts.values().copied().sum();
            assert!(
                (total - exit).abs() < dec!(0.01),
                "conservation failed at exit {exit}: distributed {total}"
            );
        }
    }

    #[test]
    fn test_non_negativity() {
        for exit in [Decimal::ZERO, dec!(100), dec!(7_000_000), dec!(60_000_000)] {
            let payouts = distribute(fixture_table(), exit);
            for (name, amount) in &payouts {
                assert!(
                    *amount >= Decimal::ZERO,
                    "{name} negative at exit {exit}: {amount}"
                );
            }
        }
    }

    /// A table with a single convertible class. With one candidate the
    /// conversion probe and the final distribution coincide, so every payout
    /// is monotone in the exit value.
    fn monotone_fixture() -> Vec<ShareClass> {
        let mut c = non_participating("Series C", 400_000, dec!(8_000_000), dec!(1.5), 3);
        c.convertible = false;
        vec![
            common("Common", 1_000_000),
            common("ESOP", 150_000),
            non_participating("Series A", 200_000, dec!(900_000), Decimal::ONE, 1),
            participating("Series B", 300_000, dec!(3_000_000), Decimal::ONE, None, 2),
            c,
        ]
    }

    #[test]
    fn test_monotonicity_in_exit_value() {
        let exits: Vec<Money> = (0..40).map(|i| Decimal::from(i) * dec!(2_500_000)).collect();
        let mut previous: Option<BTreeMap<String, Money>> = None;
        for exit in exits {
            let payouts = distribute(monotone_fixture(), exit);
            if let Some(prev) = &previous {
                for (name, amount) in &payouts {
                    assert!(
                        *amount >= prev[name] - TOLERANCE,
                        "{name} decreased at exit {exit}: {} -> {amount}",
                        prev[name]
                    );
                }
            }
            previous = Some(payouts);
        }
    }

    #[test]
    fn test_cap_respect() {
        for exit in [dec!(10_000_000), dec!(50_000_000), dec!(500_000_000)] {
            let payouts = distribute(fixture_table(), exit);
            // Series B cap: 2.5x on 3M invested
            assert!(
                payouts["Series B"] <= dec!(7_500_000) + TOLERANCE,
                "cap exceeded at exit {exit}: {}",
                payouts["Series B"]
            );
        }
    }

    #[test]
    fn test_conversion_never_worse_than_preference() {
        for exit in [
            dec!(1_000_000),
            dec!(9_000_000),
            dec!(20_000_000),
            dec!(80_000_000),
            dec!(400_000_000),
        ] {
            let payouts = distribute(fixture_table(), exit);
            let table = CapTable::new(fixture_table()).unwrap();
            let baseline = distribute_preferences_only(&table, exit).unwrap();
            for sc in table.classes() {
                if sc.preference_type == PreferenceType::NonParticipating && sc.convertible {
                    assert!(
                        payouts[&sc.name] >= baseline[&sc.name] - TOLERANCE,
                        "{} worse off at exit {exit}",
                        sc.name
                    );
                }
            }
        }
    }

    /// Documents the single-probe compatibility rule: each candidate is
    /// probed alone against the baseline, so when two convertible classes
    /// interact, the joint recomputation can leave one of them below the
    /// preference it was promised by its solo probe. Open question in the
    /// model; kept as-is for compatibility.
    #[test]
    fn test_joint_conversion_probes_are_not_an_equilibrium() {
        let input = DistributionInput {
            share_classes: fixture_table(),
            exit_value: dec!(57_000_000),
        };
        let out = calculate_distribution(&input).unwrap().result;

        // Both Series A and Series C probe better off converting alone...
        assert!(out.converted_classes.contains(&"Series A".to_string()));
        assert!(out.converted_classes.contains(&"Series C".to_string()));

        // ...but jointly, Series C lands below its 12M preference.
        assert!(out.payouts["Series C"] < dec!(12_000_000));
        assert!(out.payouts["Series C"] > dec!(11_000_000));
    }

    // -----------------------------------------------------------------------
    // Scenario functions directly
    // -----------------------------------------------------------------------
    #[test]
    fn test_forced_conversion_skips_preference() {
        let table = CapTable::new(vec![
            common("Common", 900_000),
            non_participating("Series A", 100_000, dec!(1_000_000), Decimal::ONE, 1),
        ])
        .unwrap();

        let converting = BTreeSet::from(["Series A".to_string()]);
        let payouts = distribute_with_conversions(&table, dec!(5_000_000), &converting).unwrap();
        // Converted: straight 10% of proceeds, preference skipped entirely
        assert_close(payouts["Series A"], dec!(500_000));
        assert_close(payouts["Common"], dec!(4_500_000));
    }

    #[test]
    fn test_envelope_carries_assumptions() {
        let input = DistributionInput {
            share_classes: fixture_table(),
            exit_value: dec!(25_000_000),
        };
        let result = calculate_distribution(&input).unwrap();
        assert_eq!(result.assumptions["num_share_classes"], 5);
        assert!(result.methodology.contains("Waterfall"));
    }
}
