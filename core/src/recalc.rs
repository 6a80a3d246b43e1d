//! Pure recalculation functions behind the plan grid: scaling a food item
//! into a row, totalling the food rows, and judging the Recommended row.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Cell, FoodItem};
use crate::modes::{NutrientMode, NutrientModes};
use crate::nutrients::{ColumnKind, ColumnSchema};

/// Compute a food-item row: per-serving values multiplied by `amount`.
///
/// Missing or unparsable per-serving values count as 0 so that incomplete
/// food data never blocks adding or editing a row.
#[must_use]
pub fn scale_row(item: &FoodItem, amount: f64, schema: &ColumnSchema) -> Vec<Cell> {
    schema
        .columns()
        .iter()
        .map(|col| match col.kind {
            ColumnKind::Name => Cell::Text(item.name.clone()),
            ColumnKind::Amount => Cell::Number(amount),
            ColumnKind::Nutrient(field) => {
                let base = item.value(field).unwrap_or_else(|| {
                    tracing::debug!(item = %item.name, field, "no usable value, using 0");
                    0.0
                });
                Cell::Number(base * amount)
            }
            ColumnKind::Unresolved => Cell::Number(0.0),
        })
        .collect()
}

/// Column totals over the given food-item rows.
///
/// Each cell contributes the 2-decimal value it displays, so the totals
/// match the visible rows and a saved plan reopens with the same totals.
/// `Name` stays blank. A total of exactly zero is also left blank, so an
/// empty plan shows no numbers at all.
#[must_use]
pub fn summation_row<'a, I>(schema: &ColumnSchema, rows: I) -> Vec<Cell>
where
    I: IntoIterator<Item = &'a [Cell]>,
{
    let mut totals = vec![0.0_f64; schema.len()];
    for row in rows {
        for (total, cell) in totals.iter_mut().zip(row) {
            *total += cell.shown_numeric_or_zero();
        }
    }
    schema
        .columns()
        .iter()
        .zip(totals)
        .map(|(col, total)| {
            if !col.kind.is_numeric() || total == 0.0 {
                Cell::Blank
            } else {
                Cell::Number(total)
            }
        })
        .collect()
}

/// Advisory verdict on one Recommended cell. Never changes stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Good nutrient, plan total below the recommendation.
    Deficient,
    /// Good nutrient, plan total above the recommendation.
    Met,
    /// Harmful nutrient, plan total below the limit.
    SafeMargin,
    /// Harmful nutrient, plan total above the limit.
    Exceeded,
    Neutral,
}

impl Classification {
    #[must_use]
    pub fn is_warning(self) -> bool {
        matches!(self, Self::Deficient | Self::Exceeded)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Deficient => "deficient",
            Self::Met => "met",
            Self::SafeMargin => "safe",
            Self::Exceeded => "exceeded",
            Self::Neutral => "",
        }
    }
}

/// Depends only on the sign of `recommended - total` and the mode.
#[must_use]
pub fn classify(recommended: f64, total: f64, mode: NutrientMode) -> Classification {
    let ord = recommended.partial_cmp(&total).unwrap_or(Ordering::Equal);
    match (mode, ord) {
        (NutrientMode::Good, Ordering::Greater) => Classification::Deficient,
        (NutrientMode::Good, Ordering::Less) => Classification::Met,
        (NutrientMode::Harmful, Ordering::Greater) => Classification::SafeMargin,
        (NutrientMode::Harmful, Ordering::Less) => Classification::Exceeded,
        _ => Classification::Neutral,
    }
}

/// Classify every nutrient column (everything except `Name` and `Amount`).
/// Blank or unparsable cells read as 0; unresolved columns are `Neutral`.
#[must_use]
pub fn classify_row(
    schema: &ColumnSchema,
    recommended: &[Cell],
    summation: &[Cell],
    modes: &NutrientModes,
) -> BTreeMap<String, Classification> {
    let value = |cells: &[Cell], i: usize| cells.get(i).map_or(0.0, Cell::numeric_or_zero);
    schema
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(i, col)| {
            let mode = match col.kind {
                ColumnKind::Nutrient(field) => modes.get(field),
                ColumnKind::Unresolved => NutrientMode::Irrelevant,
                ColumnKind::Name | ColumnKind::Amount => return None,
            };
            let class = classify(value(recommended, i), value(summation, i), mode);
            Some((col.header.clone(), class))
        })
        .collect()
}
