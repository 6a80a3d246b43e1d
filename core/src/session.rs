//! The `apply → recompute → persist` pipeline for one open plan.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::PlanResult;
use crate::food_store::FoodStore;
use crate::grid::{EditOutcome, PlanGrid};
use crate::models::FoodItem;
use crate::modes::NutrientModes;
use crate::nutrients::NameMapping;
use crate::plan_store::{self, PlanLibrary};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(100);

/// Whether a mutation may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    Admitted,
    /// Another mutation has not finished yet.
    InFlight,
    /// The same action was admitted less than one cool-down ago.
    Debounced,
}

/// Allows one mutation at a time and drops repeats of the same action that
/// arrive inside the cool-down window.
#[derive(Debug, Clone)]
pub struct MutationGuard<K> {
    in_flight: bool,
    last: Option<(K, Instant)>,
    cooldown: Duration,
}

impl<K: PartialEq> MutationGuard<K> {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            in_flight: false,
            last: None,
            cooldown,
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn begin(&mut self, action: K, now: Instant) -> Admission {
        if self.in_flight {
            return Admission::InFlight;
        }
        if let Some((last, at)) = &self.last {
            if *last == action && now.saturating_duration_since(*at) < self.cooldown {
                return Admission::Debounced;
            }
        }
        self.in_flight = true;
        self.last = Some((action, now));
        Admission::Admitted
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}

impl<K: PartialEq> Default for MutationGuard<K> {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// One user action against an open plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    AddFoodItem { item: FoodItem, amount: f64 },
    EditAmount { row: usize, value: String },
    EditName { row: usize, name: String },
    DeleteRow { row: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The grid changed and was saved. `row` is the row the action touched.
    Applied { row: usize },
    /// Malformed amount edit; nothing changed, nothing saved.
    Ignored,
    /// Dropped by the mutation guard.
    Skipped { reason: Admission },
}

/// An open plan together with the file it is saved to.
#[derive(Debug)]
pub struct PlanSession {
    grid: PlanGrid,
    path: PathBuf,
    guard: MutationGuard<PlanAction>,
}

impl PlanSession {
    #[must_use]
    pub fn new(grid: PlanGrid, path: impl Into<PathBuf>, cooldown: Duration) -> Self {
        Self {
            grid,
            path: path.into(),
            guard: MutationGuard::new(cooldown),
        }
    }

    pub fn open(
        library: &PlanLibrary,
        name: &str,
        modes: NutrientModes,
        store: &FoodStore,
        mapping: &NameMapping,
        cooldown: Duration,
    ) -> PlanResult<Self> {
        let grid = library.open(name, modes, store, mapping)?;
        let path = library.path_for(grid.name())?;
        Ok(Self::new(grid, path, cooldown))
    }

    #[must_use]
    pub fn grid(&self) -> &PlanGrid {
        &self.grid
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> PlanResult<()> {
        plan_store::save_plan(&self.path, &self.grid)
    }

    pub fn apply(&mut self, action: PlanAction) -> PlanResult<ActionOutcome> {
        self.apply_at(action, Instant::now())
    }

    /// Run one action through the guard, mutate the grid, then save.
    ///
    /// A failed save is returned as an error but the in-memory change is
    /// kept; the next successful save writes it out.
    pub fn apply_at(&mut self, action: PlanAction, now: Instant) -> PlanResult<ActionOutcome> {
        match self.guard.begin(action.clone(), now) {
            Admission::Admitted => {}
            reason => {
                tracing::debug!(plan = self.grid.name(), ?reason, "mutation skipped");
                return Ok(ActionOutcome::Skipped { reason });
            }
        }
        let result = self.mutate(action);
        self.guard.finish();

        let outcome = result?;
        if let ActionOutcome::Applied { .. } = outcome {
            self.save()?;
        }
        Ok(outcome)
    }

    fn mutate(&mut self, action: PlanAction) -> PlanResult<ActionOutcome> {
        let row = match action {
            PlanAction::AddFoodItem { item, amount } => self.grid.add_food_item_row(&item, amount)?,
            PlanAction::EditAmount { row, value } => match self.grid.edit_amount(row, &value)? {
                EditOutcome::Recomputed => row,
                EditOutcome::Ignored => return Ok(ActionOutcome::Ignored),
            },
            PlanAction::EditName { row, name } => {
                self.grid.edit_name(row, &name)?;
                row
            }
            PlanAction::DeleteRow { row } => {
                self.grid.delete_row(row)?;
                row
            }
        };
        Ok(ActionOutcome::Applied { row })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::PlanError;
    use crate::grid::{FIRST_FOOD_ROW, SUMMATION_ROW};

    fn almonds() -> FoodItem {
        FoodItem::new("Almonds")
            .with_value("Amount", "1")
            .with_value("Protein", "6.00")
    }

    fn session(dir: &Path) -> PlanSession {
        let lib = PlanLibrary::new(dir.join("plans"), dir.join("plan_template.csv"));
        fs::write(lib.template(), "Name,Amount,Protein (g)\n,,50\n").unwrap();
        lib.create("Week").unwrap();
        PlanSession::open(
            &lib,
            "Week",
            NutrientModes::new(),
            &FoodStore::new(),
            &NameMapping::default(),
            DEFAULT_COOLDOWN,
        )
        .unwrap()
    }

    fn saved(s: &PlanSession) -> String {
        fs::read_to_string(s.path()).unwrap()
    }

    #[test]
    fn test_guard_in_flight() {
        let mut guard = MutationGuard::new(Duration::ZERO);
        let now = Instant::now();
        assert_eq!(guard.begin("add", now), Admission::Admitted);
        assert!(guard.is_in_flight());
        assert_eq!(guard.begin("delete", now), Admission::InFlight);
        guard.finish();
        assert_eq!(guard.begin("delete", now), Admission::Admitted);
    }

    #[test]
    fn test_guard_debounces_same_action_only() {
        let mut guard = MutationGuard::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert_eq!(guard.begin("add", t0), Admission::Admitted);
        guard.finish();
        assert_eq!(
            guard.begin("add", t0 + Duration::from_millis(50)),
            Admission::Debounced
        );
        assert_eq!(
            guard.begin("delete", t0 + Duration::from_millis(50)),
            Admission::Admitted
        );
        guard.finish();
        assert_eq!(
            guard.begin("delete", t0 + Duration::from_millis(150)),
            Admission::Admitted
        );
    }

    #[test]
    fn test_apply_persists_each_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());

        let out = s
            .apply(PlanAction::AddFoodItem {
                item: almonds(),
                amount: 2.5,
            })
            .unwrap();
        assert_eq!(out, ActionOutcome::Applied { row: FIRST_FOOD_ROW });
        assert_eq!(saved(&s), "Name,Amount,Protein (g)\n,,50\nAlmonds,2.50,15.00\n");

        s.apply(PlanAction::EditAmount {
            row: FIRST_FOOD_ROW,
            value: "5".to_string(),
        })
        .unwrap();
        assert_eq!(
            s.grid().row(SUMMATION_ROW).unwrap().cell(2).unwrap().to_string(),
            "30.00"
        );
        assert_eq!(saved(&s), "Name,Amount,Protein (g)\n,,50\nAlmonds,5.00,30.00\n");

        s.apply(PlanAction::DeleteRow { row: FIRST_FOOD_ROW }).unwrap();
        assert_eq!(saved(&s), "Name,Amount,Protein (g)\n,,50\n");
    }

    #[test]
    fn test_ignored_edit_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.apply(PlanAction::AddFoodItem {
            item: almonds(),
            amount: 1.0,
        })
        .unwrap();
        fs::write(s.path(), "sentinel").unwrap();

        let out = s
            .apply(PlanAction::EditAmount {
                row: FIRST_FOOD_ROW,
                value: "abc".to_string(),
            })
            .unwrap();
        assert_eq!(out, ActionOutcome::Ignored);
        assert_eq!(saved(&s), "sentinel");
    }

    #[test]
    fn test_rapid_duplicate_is_debounced() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let add = PlanAction::AddFoodItem {
            item: almonds(),
            amount: 1.0,
        };
        let t0 = Instant::now();
        s.apply_at(add.clone(), t0).unwrap();
        let out = s.apply_at(add.clone(), t0 + Duration::from_millis(20)).unwrap();
        assert_eq!(
            out,
            ActionOutcome::Skipped {
                reason: Admission::Debounced
            }
        );
        assert_eq!(s.grid().food_row_count(), 1);

        s.apply_at(add, t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(s.grid().food_row_count(), 2);
    }

    #[test]
    fn test_rejected_action_releases_guard() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let err = s.apply(PlanAction::DeleteRow { row: 0 }).unwrap_err();
        assert!(matches!(err, PlanError::ProtectedRow(0)));
        let out = s
            .apply(PlanAction::AddFoodItem {
                item: almonds(),
                amount: 1.0,
            })
            .unwrap();
        assert!(matches!(out, ActionOutcome::Applied { .. }));
    }

    #[test]
    fn test_save_failure_keeps_change_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        fs::remove_file(s.path()).unwrap();
        fs::create_dir_all(s.path()).unwrap();

        let err = s
            .apply(PlanAction::AddFoodItem {
                item: almonds(),
                amount: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, PlanError::Persistence { .. }));
        assert_eq!(s.grid().food_row_count(), 1);
    }
}
