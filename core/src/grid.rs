use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{PlanError, PlanResult};
use crate::models::{Cell, FoodItem};
use crate::modes::NutrientModes;
use crate::nutrients::ColumnSchema;
use crate::recalc::{self, Classification};

pub const RECOMMENDED_ROW: usize = 0;
pub const SUMMATION_ROW: usize = 1;
pub const FIRST_FOOD_ROW: usize = 2;

/// Upper bound (inclusive) on the servings accepted when adding a row.
pub const MAX_SERVINGS: f64 = 100.0;

/// What a row is, and for food-item rows the base data it is computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowKind {
    Recommended,
    Summation,
    /// `source` is a snapshot of the per-serving food item taken when the
    /// row was added; later changes to the food store do not reach it.
    FoodItem { source: FoodItem, amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    kind: RowKind,
    cells: Vec<Cell>,
}

impl Row {
    #[must_use]
    pub fn kind(&self) -> &RowKind {
        &self.kind
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, col: usize) -> Option<&Cell> {
        self.cells.get(col)
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        !matches!(self.kind, RowKind::FoodItem { .. })
    }

    /// Base food item and current serving amount of a food-item row.
    #[must_use]
    pub fn source(&self) -> Option<(&FoodItem, f64)> {
        match &self.kind {
            RowKind::FoodItem { source, amount } => Some((source, *amount)),
            _ => None,
        }
    }
}

/// Result of an amount edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOutcome {
    Recomputed,
    /// The new value was not a usable number; the grid is unchanged.
    Ignored,
}

/// Check a serving count for a new row: finite, greater than 0, at most 100.
pub fn check_amount(amount: f64) -> PlanResult<f64> {
    if amount.is_finite() && amount > 0.0 && amount <= MAX_SERVINGS {
        Ok(amount)
    } else {
        Err(PlanError::InvalidAmount(amount.to_string()))
    }
}

pub fn parse_amount(raw: &str) -> PlanResult<f64> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| PlanError::InvalidAmount(raw.trim().to_string()))?;
    check_amount(amount).map_err(|_| PlanError::InvalidAmount(raw.trim().to_string()))
}

/// The derived tabular view of one plan.
///
/// Row 0 holds the recommended values, row 1 the column totals, and rows
/// from 2 on one food item each. Every public mutation leaves the Summation
/// row equal to the totals of the current food rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanGrid {
    name: String,
    schema: ColumnSchema,
    modes: NutrientModes,
    rows: Vec<Row>,
}

impl PlanGrid {
    /// A grid with only the two fixed rows. The Recommended row is padded or
    /// truncated to the schema width and its Name cell is forced blank.
    pub fn new(
        name: impl Into<String>,
        schema: ColumnSchema,
        mut recommended: Vec<Cell>,
        modes: NutrientModes,
    ) -> Self {
        let width = schema.len();
        recommended.resize(width, Cell::Blank);
        if let Some(i) = schema.name_index() {
            recommended[i] = Cell::Blank;
        }
        let rows = vec![
            Row {
                kind: RowKind::Recommended,
                cells: recommended,
            },
            Row {
                kind: RowKind::Summation,
                cells: vec![Cell::Blank; width],
            },
        ];
        let mut grid = Self {
            name: name.into(),
            schema,
            modes,
            rows,
        };
        grid.recompute_summation();
        grid
    }

    /// Re-attach a persisted food row with its reconstructed base data.
    /// Cells are kept as stored; the caller recomputes the Summation row.
    pub(crate) fn push_restored_row(&mut self, source: FoodItem, amount: f64, mut cells: Vec<Cell>) {
        cells.resize(self.schema.len(), Cell::Blank);
        self.rows.push(Row {
            kind: RowKind::FoodItem { source, amount },
            cells,
        });
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    #[must_use]
    pub fn modes(&self) -> &NutrientModes {
        &self.modes
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Never true: the two fixed rows always exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn food_row_count(&self) -> usize {
        self.rows.len() - FIRST_FOOD_ROW
    }

    pub fn food_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows[FIRST_FOOD_ROW..].iter()
    }

    #[must_use]
    pub fn recommended(&self) -> &Row {
        &self.rows[RECOMMENDED_ROW]
    }

    #[must_use]
    pub fn summation(&self) -> &Row {
        &self.rows[SUMMATION_ROW]
    }

    /// "Recommended", "Summation", then "Item 1", "Item 2", ...
    #[must_use]
    pub fn row_label(index: usize) -> String {
        match index {
            RECOMMENDED_ROW => "Recommended".to_string(),
            SUMMATION_ROW => "Summation".to_string(),
            i => format!("Item {}", i - FIRST_FOOD_ROW + 1),
        }
    }

    #[must_use]
    pub fn row_labels(&self) -> Vec<String> {
        (0..self.rows.len()).map(Self::row_label).collect()
    }

    /// Editable columns of a row: `Name` and `Amount` for food rows, none
    /// for the fixed rows.
    #[must_use]
    pub fn editable_columns(&self, index: usize) -> Vec<usize> {
        match self.rows.get(index) {
            Some(row) if !row.is_fixed() => [self.schema.name_index(), self.schema.amount_index()]
                .into_iter()
                .flatten()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn food_row_index(&self, index: usize) -> PlanResult<usize> {
        if index < FIRST_FOOD_ROW {
            return Err(PlanError::ProtectedRow(index));
        }
        if index >= self.rows.len() {
            return Err(PlanError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(index)
    }

    /// Append a row for `item` at `amount` servings and return its index.
    pub fn add_food_item_row(&mut self, item: &FoodItem, amount: f64) -> PlanResult<usize> {
        let amount = check_amount(amount)?;
        let cells = recalc::scale_row(item, amount, &self.schema);
        self.rows.push(Row {
            kind: RowKind::FoodItem {
                source: item.clone(),
                amount,
            },
            cells,
        });
        self.recompute_summation();
        let index = self.rows.len() - 1;
        tracing::debug!(plan = %self.name, item = %item.name, amount, index, "added food row");
        Ok(index)
    }

    /// Recompute a food row from its base data at a new amount.
    ///
    /// Input that is not a finite, non-negative number is ignored and the
    /// previous value stays in place.
    pub fn edit_amount(&mut self, index: usize, raw: &str) -> PlanResult<EditOutcome> {
        let index = self.food_row_index(index)?;
        let new_amount = match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => v,
            _ => {
                tracing::debug!(plan = %self.name, index, value = raw, "ignoring malformed amount");
                return Ok(EditOutcome::Ignored);
            }
        };

        let name_col = self.schema.name_index();
        let row = &mut self.rows[index];
        let RowKind::FoodItem { source, amount } = &mut row.kind else {
            return Err(PlanError::ProtectedRow(index));
        };
        let mut cells = recalc::scale_row(source, new_amount, &self.schema);
        // a renamed row keeps its name
        if let Some(i) = name_col {
            cells[i] = row.cells[i].clone();
        }
        *amount = new_amount;
        row.cells = cells;

        self.recompute_summation();
        Ok(EditOutcome::Recomputed)
    }

    /// Change the Name cell only; nutrient values are unaffected.
    pub fn edit_name(&mut self, index: usize, new_name: &str) -> PlanResult<()> {
        let index = self.food_row_index(index)?;
        if let Some(i) = self.schema.name_index() {
            self.rows[index].cells[i] = Cell::Text(new_name.trim().to_string());
        }
        Ok(())
    }

    /// Remove a food row; rows after it move up by one, carrying their base
    /// data with them.
    pub fn delete_row(&mut self, index: usize) -> PlanResult<Row> {
        let index = self.food_row_index(index)?;
        let removed = self.rows.remove(index);
        self.recompute_summation();
        Ok(removed)
    }

    pub fn recompute_summation(&mut self) {
        let totals = recalc::summation_row(
            &self.schema,
            self.rows[FIRST_FOOD_ROW..].iter().map(Row::cells),
        );
        self.rows[SUMMATION_ROW].cells = totals;
    }

    #[must_use]
    pub fn classify_recommended_row(&self) -> BTreeMap<String, Classification> {
        recalc::classify_row(
            &self.schema,
            self.recommended().cells(),
            self.summation().cells(),
            &self.modes,
        )
    }

    /// Rows as persisted: Recommended then the food rows, as displayed.
    /// The Summation row is never stored.
    #[must_use]
    pub fn to_records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .filter(|r| r.kind != RowKind::Summation)
            .map(|r| r.cells.iter().map(ToString::to_string).collect())
            .collect()
    }

    #[must_use]
    pub fn view(&self) -> PlanView {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| RowView {
                label: Self::row_label(i),
                index: i,
                cells: row.cells.iter().map(ToString::to_string).collect(),
                editable: self.editable_columns(i),
            })
            .collect();
        PlanView {
            name: self.name.clone(),
            headers: self.schema.headers().map(str::to_string).collect(),
            rows,
            classification: self.classify_recommended_row(),
        }
    }
}

/// Display-ready snapshot of a grid, for rendering and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RowView>,
    pub classification: BTreeMap<String, Classification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub label: String,
    pub index: usize,
    pub cells: Vec<String>,
    pub editable: Vec<usize>,
}
