use anyhow::{Context, Result};
use serde::Serialize;
use std::io;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use dietplan_core::error::PlanError;
use dietplan_core::food_store::FoodStore;
use dietplan_core::grid::{PlanGrid, PlanView, parse_amount};
use dietplan_core::modes::NutrientModes;
use dietplan_core::session::{ActionOutcome, Admission, PlanAction, PlanSession};

use super::helpers::{confirm, exit_not_found, print_plan, prompt_amount};
use super::pick_food_item;
use crate::config::Config;

pub(crate) fn cmd_init(config: &Config, json: bool) -> Result<()> {
    let mut written = Vec::new();

    if config.library().ensure_template()? {
        written.push(config.template_path.clone());
    }
    if !config.modes_path.exists() {
        NutrientModes::defaults()
            .save(&config.modes_path)
            .context("Failed to write nutrient modes")?;
        written.push(config.modes_path.clone());
    }
    if !config.food_items_path.exists() {
        FoodStore::new()
            .save(&config.food_items_path)
            .context("Failed to write food items")?;
        written.push(config.food_items_path.clone());
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "data_dir": config.data_dir, "written": written })
        );
    } else if written.is_empty() {
        println!("Nothing to do, {} is already set up", config.data_dir.display());
    } else {
        for path in &written {
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

pub(crate) fn cmd_plan_list(config: &Config, json: bool) -> Result<()> {
    let plans = config.library().list()?;

    if plans.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No plans found");
        }
        std::process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Plan")]
        name: String,
        #[tabled(rename = "Modified")]
        modified: String,
    }
    let rows: Vec<PlanRow> = plans
        .iter()
        .enumerate()
        .map(|(i, p)| PlanRow {
            idx: i + 1,
            name: p.name.clone(),
            modified: p
                .modified
                .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_plan_create(config: &Config, name: &str, json: bool) -> Result<()> {
    let entry = config.library().create(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Created plan: {} ({})", entry.name, entry.path.display());
    }
    Ok(())
}

pub(crate) fn cmd_plan_delete(config: &Config, name: &str, yes: bool, json: bool) -> Result<()> {
    let library = config.library();
    if !yes && !confirm(&mut io::stdin().lock(), &format!("Delete plan '{name}'?"))? {
        eprintln!("Cancelled");
        return Ok(());
    }
    let path = match library.delete(name) {
        Ok(path) => path,
        Err(e @ PlanError::PlanNotFound(_)) => exit_not_found(&e.to_string(), json),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::json!({ "deleted": name, "path": path }));
    } else {
        println!("Deleted plan: {name}");
    }
    Ok(())
}

pub(crate) fn cmd_plan_show(config: &Config, name: &str, json: bool) -> Result<()> {
    let store = config.food_store()?;
    let session = open_session(config, name, &store, json)?;
    let view = session.grid().view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_plan(&view);
    }
    Ok(())
}

pub(crate) fn cmd_plan_add(
    config: &Config,
    plan: &str,
    food: &str,
    amount: Option<&str>,
    json: bool,
) -> Result<()> {
    let store = config.food_store()?;
    let mut session = open_session(config, plan, &store, json)?;
    let Some(item) = pick_food_item(&store, food)? else {
        exit_not_found(&PlanError::FoodItemNotFound(food.to_string()).to_string(), json);
    };

    let amount = match amount {
        Some(raw) => parse_amount(raw)?,
        None => match prompt_amount(&mut io::stdin().lock())? {
            Some(amount) => amount,
            None => {
                eprintln!("Cancelled");
                return Ok(());
            }
        },
    };

    let name = item.name.clone();
    let outcome = session.apply(PlanAction::AddFoodItem {
        item: item.clone(),
        amount,
    })?;
    report(&session, outcome, &format!("Added {name} x {amount}"), json)
}

pub(crate) fn cmd_plan_amount(
    config: &Config,
    plan: &str,
    row: usize,
    value: &str,
    json: bool,
) -> Result<()> {
    let store = config.food_store()?;
    let mut session = open_session(config, plan, &store, json)?;
    let outcome = session.apply(PlanAction::EditAmount {
        row,
        value: value.to_string(),
    })?;
    report(&session, outcome, &format!("Row {row} amount set to {value}"), json)
}

pub(crate) fn cmd_plan_name(
    config: &Config,
    plan: &str,
    row: usize,
    name: &str,
    json: bool,
) -> Result<()> {
    let store = config.food_store()?;
    let mut session = open_session(config, plan, &store, json)?;
    let outcome = session.apply(PlanAction::EditName {
        row,
        name: name.to_string(),
    })?;
    report(&session, outcome, &format!("Row {row} renamed to {name}"), json)
}

pub(crate) fn cmd_plan_remove(
    config: &Config,
    plan: &str,
    row: usize,
    yes: bool,
    json: bool,
) -> Result<()> {
    let store = config.food_store()?;
    let mut session = open_session(config, plan, &store, json)?;
    if let Some(name) = row_name(session.grid(), row) {
        if !yes && !confirm(&mut io::stdin().lock(), &format!("Remove '{name}' from {plan}?"))? {
            eprintln!("Cancelled");
            return Ok(());
        }
    }
    let outcome = session.apply(PlanAction::DeleteRow { row })?;
    report(&session, outcome, &format!("Removed row {row}"), json)
}

/// Open a plan, exiting with status 2 when it does not exist.
pub(super) fn open_session(
    config: &Config,
    name: &str,
    store: &FoodStore,
    json: bool,
) -> Result<PlanSession> {
    let modes = config.modes()?;
    match PlanSession::open(
        &config.library(),
        name,
        modes,
        store,
        &config.mapping,
        config.cooldown,
    ) {
        Ok(session) => Ok(session),
        Err(e @ PlanError::PlanNotFound(_)) => exit_not_found(&e.to_string(), json),
        Err(e) => Err(e).with_context(|| format!("Failed to open plan '{name}'")),
    }
}

/// Name cell of a food row; `None` for fixed or missing rows.
pub(super) fn row_name(grid: &PlanGrid, row: usize) -> Option<String> {
    let r = grid.row(row).filter(|r| !r.is_fixed())?;
    let name = grid
        .schema()
        .name_index()
        .and_then(|i| r.cell(i))
        .map(ToString::to_string)
        .unwrap_or_default();
    Some(name)
}

pub(super) fn outcome_message(outcome: ActionOutcome, applied: &str) -> String {
    match outcome {
        ActionOutcome::Applied { .. } => applied.to_string(),
        ActionOutcome::Ignored => "Ignored: not a usable amount, row unchanged".to_string(),
        ActionOutcome::Skipped {
            reason: Admission::Debounced,
        } => "Skipped: repeated too quickly".to_string(),
        ActionOutcome::Skipped { .. } => "Skipped: another change is in progress".to_string(),
    }
}

fn report(session: &PlanSession, outcome: ActionOutcome, applied: &str, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct Report {
        #[serde(flatten)]
        outcome: ActionOutcome,
        plan: PlanView,
    }

    if json {
        let report = Report {
            outcome,
            plan: session.grid().view(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let ActionOutcome::Applied { .. } = outcome {
        println!("{}", outcome_message(outcome, applied));
    } else {
        eprintln!("{}", outcome_message(outcome, applied));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dietplan_core::grid::FIRST_FOOD_ROW;
    use dietplan_core::models::FoodItem;

    fn setup() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().to_path_buf())).unwrap();
        cmd_init(&config, true).unwrap();
        let mut store = config.food_store().unwrap();
        store
            .add(
                FoodItem::from_input("Almonds", [("Protein", "6"), ("Sodium", "1")], &config.mapping)
                    .unwrap(),
            )
            .unwrap();
        store.save(&config.food_items_path).unwrap();
        (dir, config)
    }

    #[test]
    fn test_init_is_idempotent() {
        let (_dir, config) = setup();
        let before = std::fs::read_to_string(&config.food_items_path).unwrap();
        cmd_init(&config, true).unwrap();
        assert_eq!(std::fs::read_to_string(&config.food_items_path).unwrap(), before);
        assert!(config.template_path.exists());
        assert_eq!(config.modes().unwrap(), NutrientModes::defaults());
    }

    #[test]
    fn test_plan_commands_round_trip() {
        let (_dir, config) = setup();
        cmd_plan_create(&config, "Week 1!", true).unwrap();
        cmd_plan_add(&config, "Week 1", "almonds", Some("2.5"), true).unwrap();
        cmd_plan_amount(&config, "Week 1", FIRST_FOOD_ROW, "5", true).unwrap();
        cmd_plan_name(&config, "Week 1", FIRST_FOOD_ROW, "Roasted almonds", true).unwrap();

        let store = config.food_store().unwrap();
        let session = open_session(&config, "Week 1", &store, true).unwrap();
        let grid = session.grid();
        assert_eq!(grid.food_row_count(), 1);
        assert_eq!(row_name(grid, FIRST_FOOD_ROW).as_deref(), Some("Roasted almonds"));
        let protein = grid
            .schema()
            .headers()
            .position(|h| h == "Protein (g)")
            .unwrap();
        assert_eq!(grid.summation().cell(protein).unwrap().to_string(), "30.00");

        cmd_plan_remove(&config, "Week 1", FIRST_FOOD_ROW, true, true).unwrap();
        let session = open_session(&config, "Week 1", &store, true).unwrap();
        assert_eq!(session.grid().food_row_count(), 0);
    }

    #[test]
    fn test_plan_commands_reject_protected_rows_and_bad_amounts() {
        let (_dir, config) = setup();
        cmd_plan_create(&config, "Cut", true).unwrap();
        assert!(cmd_plan_add(&config, "Cut", "Almonds", Some("0"), true).is_err());
        assert!(cmd_plan_add(&config, "Cut", "Almonds", Some("101"), true).is_err());

        let err = cmd_plan_remove(&config, "Cut", 1, true, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::ProtectedRow(1))
        ));
    }

    #[test]
    fn test_outcome_message() {
        assert_eq!(
            outcome_message(ActionOutcome::Applied { row: 2 }, "done"),
            "done"
        );
        assert!(outcome_message(ActionOutcome::Ignored, "done").starts_with("Ignored"));
        assert!(
            outcome_message(
                ActionOutcome::Skipped {
                    reason: Admission::Debounced
                },
                "done"
            )
            .contains("quickly")
        );
    }
}
