use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WaterfallError;
use crate::types::{Money, Multiple};
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Liquidation preference treatment for a share class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceType {
    #[default]
    Common,
    NonParticipating,
    Participating,
}

/// Anti-dilution provision attached to a share class.
///
/// Informational only: no down-round re-pricing is modelled, so this never
/// affects distribution arithmetic. Serialised with the cap-table codes
/// (`None` / `FR` / `WA`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AntiDilutionType {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "FR")]
    FullRatchet,
    #[serde(rename = "WA")]
    WeightedAverage,
}

impl AntiDilutionType {
    /// Parse a cap-table code. Unknown codes fall back to `None`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "FR" => AntiDilutionType::FullRatchet,
            "WA" => AntiDilutionType::WeightedAverage,
            _ => AntiDilutionType::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Share class
// ---------------------------------------------------------------------------

fn default_multiple() -> Multiple {
    Decimal::ONE
}

fn default_true() -> bool {
    true
}

/// One row of the cap table: a class of shares with its liquidation terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareClass {
    /// Display name, unique within a cap table (e.g. "Series A", "Common")
    pub name: String,
    /// Number of shares outstanding
    pub shares: u64,
    /// Total amount originally invested in this class (0 for common/option pools)
    pub invested: Money,
    /// Liquidation preference treatment
    #[serde(default)]
    pub preference_type: PreferenceType,
    /// Liquidation preference multiple (1.0 = 1x). Not consulted for common.
    #[serde(default = "default_multiple")]
    pub preference_multiple: Multiple,
    /// Cap on total payout to a participating class, as a multiple of
    /// `invested`. None = uncapped; an explicit 0 is normalised to None.
    #[serde(default)]
    pub participation_cap: Option<Multiple>,
    /// Liquidation rank; higher values are paid first
    #[serde(default)]
    pub priority: i32,
    /// Original stack order from the cap-table source
    #[serde(default)]
    pub stack_order: i32,
    /// Whether the class may elect conversion to common treatment
    #[serde(default = "default_true")]
    pub convertible: bool,
    /// Anti-dilution provision (informational)
    #[serde(default)]
    pub anti_dilution_type: AntiDilutionType,
}

impl ShareClass {
    /// The contractual liquidation preference amount. Zero for common.
    pub fn liquidation_preference(&self) -> Money {
        match self.preference_type {
            PreferenceType::Common => Decimal::ZERO,
            _ => self.invested * self.preference_multiple,
        }
    }

    /// Maximum total payout for a capped participating class, if any.
    pub fn cap_amount(&self) -> Option<Money> {
        match (self.preference_type, self.participation_cap) {
            (PreferenceType::Participating, Some(cap)) if cap > Decimal::ZERO => {
                Some(self.invested * cap)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cap table
// ---------------------------------------------------------------------------

/// A validated, read-only collection of share classes.
///
/// Construction enforces the engine's preconditions: unique names,
/// non-negative monetary fields, and participation-cap normalisation
/// (an explicit 0 cap means uncapped). The engine never mutates a cap
/// table; distributions are fresh mappings created per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapTable {
    classes: Vec<ShareClass>,
}

impl CapTable {
    pub fn new(classes: Vec<ShareClass>) -> WaterfallResult<Self> {
        let mut seen: Vec<&str> = Vec::with_capacity(classes.len());
        for sc in &classes {
            if sc.name.trim().is_empty() {
                return Err(WaterfallError::InvalidInput {
                    field: "name".into(),
                    reason: "Share class name cannot be blank".into(),
                });
            }
            if seen.contains(&sc.name.as_str()) {
                return Err(WaterfallError::DuplicateShareClass(sc.name.clone()));
            }
            seen.push(&sc.name);

            if sc.invested < Decimal::ZERO {
                return Err(WaterfallError::InvalidInput {
                    field: "invested".into(),
                    reason: format!("Invested amount for {} cannot be negative", sc.name),
                });
            }
            if sc.preference_multiple < Decimal::ZERO {
                return Err(WaterfallError::InvalidInput {
                    field: "preference_multiple".into(),
                    reason: format!("Preference multiple for {} cannot be negative", sc.name),
                });
            }
            if let Some(cap) = sc.participation_cap {
                if cap < Decimal::ZERO {
                    return Err(WaterfallError::InvalidInput {
                        field: "participation_cap".into(),
                        reason: format!("Participation cap for {} cannot be negative", sc.name),
                    });
                }
            }
        }

        // Normalise explicit zero caps to uncapped
        let classes = classes
            .into_iter()
            .map(|mut sc| {
                if sc.participation_cap == Some(Decimal::ZERO) {
                    sc.participation_cap = None;
                }
                sc
            })
            .collect();

        Ok(CapTable { classes })
    }

    pub fn classes(&self) -> &[ShareClass] {
        &self.classes
    }

    pub fn into_classes(self) -> Vec<ShareClass> {
        self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn total_shares(&self) -> u64 {
        self.classes.iter().map(|sc| sc.shares).sum()
    }

    pub fn total_invested(&self) -> Money {
        self.classes.iter().map(|sc| sc.invested).sum()
    }

    /// Build a cap table from tabular loader rows.
    pub fn from_rows(rows: Vec<CapTableRow>) -> WaterfallResult<Self> {
        let classes = rows
            .into_iter()
            .filter(|row| !row.name().trim().is_empty())
            .map(CapTableRow::into_share_class)
            .collect();
        CapTable::new(classes)
    }
}

// ---------------------------------------------------------------------------
// Tabular loader record
// ---------------------------------------------------------------------------

/// Names that denote common stock / option pools in cap-table sources.
const COMMON_NAMES: [&str; 4] = ["Common", "ESOP", "ESOP/Options", "ESOP/Opts"];

/// One record of a tabular cap-table source (CSV or equivalent).
///
/// Column headings follow the current export format, with serde aliases
/// for the legacy headings (`Series`, `Order`, `Shares`, `LiqPrefMultiple`,
/// `Participating`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapTableRow {
    #[serde(rename = "Share Class", alias = "Series")]
    pub share_class: String,
    #[serde(rename = "Stack Order", alias = "Order", default)]
    pub stack_order: Option<i32>,
    #[serde(rename = "# Shares", alias = "Shares", default)]
    pub shares: Option<u64>,
    #[serde(rename = "Price", default)]
    pub price: Option<Decimal>,
    #[serde(rename = "LPMultiple", alias = "LiqPrefMultiple", default)]
    pub lp_multiple: Option<Decimal>,
    #[serde(rename = "Participation", alias = "Participating", default)]
    pub participation: Option<String>,
    #[serde(rename = "Convertible", default)]
    pub convertible: Option<String>,
    #[serde(rename = "Participation Cap", default)]
    pub participation_cap: Option<Decimal>,
    #[serde(rename = "AD Type", default)]
    pub ad_type: Option<String>,
}

/// Parse a TRUE/FALSE cell, tolerating case and surrounding whitespace.
fn parse_flag(cell: Option<&str>, default: bool) -> bool {
    match cell {
        Some(s) if !s.trim().is_empty() => s.trim().eq_ignore_ascii_case("true"),
        _ => default,
    }
}

impl CapTableRow {
    fn name(&self) -> &str {
        &self.share_class
    }

    /// Map a loader row onto the engine's data model.
    ///
    /// Invested capital is shares × price. Classes named after common stock
    /// or option pools are treated as common regardless of flags; otherwise
    /// the participation flag selects participating vs non-participating.
    /// Priority is taken from the stack order (higher = paid first).
    pub fn into_share_class(self) -> ShareClass {
        let shares = self.shares.unwrap_or(0);
        let price = self.price.unwrap_or(Decimal::ZERO);
        let invested = if price > Decimal::ZERO {
            Decimal::from(shares) * price
        } else {
            Decimal::ZERO
        };

        let participating = parse_flag(self.participation.as_deref(), false);
        let preference_type = if COMMON_NAMES.contains(&self.share_class.as_str()) {
            PreferenceType::Common
        } else if participating {
            PreferenceType::Participating
        } else {
            PreferenceType::NonParticipating
        };

        let participation_cap = self
            .participation_cap
            .filter(|cap| *cap > Decimal::ZERO);

        let stack_order = self.stack_order.unwrap_or(0);

        ShareClass {
            name: self.share_class,
            shares,
            invested,
            preference_type,
            preference_multiple: self.lp_multiple.unwrap_or(Decimal::ONE),
            participation_cap,
            priority: stack_order,
            stack_order,
            convertible: parse_flag(self.convertible.as_deref(), true),
            anti_dilution_type: AntiDilutionType::from_code(
                self.ad_type.as_deref().unwrap_or("None"),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
