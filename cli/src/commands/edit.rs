use anyhow::{Context, Result, bail};
use std::io::{self, BufRead};

use dietplan_core::food_store::FoodStore;
use dietplan_core::grid::parse_amount;
use dietplan_core::session::{ActionOutcome, PlanAction, PlanSession};

use super::find_food_item;
use super::helpers::{confirm, print_plan, prompt_amount, prompt_line};
use super::plan::{open_session, outcome_message, row_name};
use crate::config::Config;

const HELP: &str = "\
Commands:
  add <food item> [servings]   add a row (asks for servings if omitted)
  amount <row> <servings>      change the servings of a row
  name <row> <new name>        rename a row
  delete <row>                 remove a row
  show                         print the plan
  help                         show this help
  quit                         leave the editor
Rows are addressed by the number in brackets, e.g. 2 for \"Item 1 [2]\".";

#[derive(Debug, Clone, PartialEq)]
enum EditCommand {
    Add { food: String, amount: Option<String> },
    Amount { row: usize, value: String },
    Name { row: usize, name: String },
    Delete { row: usize },
    Show,
    Help,
    Quit,
}

fn parse_row(s: Option<&str>) -> Result<usize> {
    let s = s.context("Missing row number")?;
    s.parse()
        .with_context(|| format!("Invalid row number: '{s}'"))
}

/// Parse one input line. Blank lines yield `None`.
fn parse_command(line: &str) -> Result<Option<EditCommand>> {
    let line = line.trim();
    let Some((word, rest)) = line
        .split_once(char::is_whitespace)
        .map(|(w, r)| (w, r.trim()))
        .or(Some((line, "")))
        .filter(|(w, _)| !w.is_empty())
    else {
        return Ok(None);
    };

    let command = match word.to_lowercase().as_str() {
        "add" => {
            if rest.is_empty() {
                bail!("Usage: add <food item> [servings]");
            }
            // a trailing number is the serving count
            match rest.rsplit_once(char::is_whitespace) {
                Some((food, last)) if last.parse::<f64>().is_ok() => EditCommand::Add {
                    food: food.trim().to_string(),
                    amount: Some(last.to_string()),
                },
                _ => EditCommand::Add {
                    food: rest.to_string(),
                    amount: None,
                },
            }
        }
        "amount" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let row = parse_row(parts.next().filter(|s| !s.is_empty()))?;
            let value = parts.next().map(str::trim).unwrap_or_default();
            EditCommand::Amount {
                row,
                value: value.to_string(),
            }
        }
        "name" | "rename" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let row = parse_row(parts.next().filter(|s| !s.is_empty()))?;
            let name = parts.next().map(str::trim).unwrap_or_default();
            if name.is_empty() {
                bail!("Usage: name <row> <new name>");
            }
            EditCommand::Name {
                row,
                name: name.to_string(),
            }
        }
        "delete" | "rm" => EditCommand::Delete {
            row: parse_row(Some(rest).filter(|s| !s.is_empty()))?,
        },
        "show" | "ls" => EditCommand::Show,
        "help" | "?" => EditCommand::Help,
        "quit" | "exit" | "q" => EditCommand::Quit,
        other => bail!("Unknown command '{other}'. Type 'help' for the list"),
    };
    Ok(Some(command))
}

pub(crate) fn cmd_plan_edit(config: &Config, plan: &str) -> Result<()> {
    let store = config.food_store()?;
    let mut session = open_session(config, plan, &store, false)?;
    print_plan(&session.grid().view());
    eprintln!("Type 'help' for commands.");
    run_session(&mut session, &store, &mut io::stdin().lock())
}

/// Read commands until `quit` or end of input. A failed command is reported
/// and the session carries on with the last good state.
fn run_session<R: BufRead>(session: &mut PlanSession, store: &FoodStore, input: &mut R) -> Result<()> {
    loop {
        let prompt = format!("{}> ", session.grid().name());
        let Some(line) = prompt_line(input, &prompt)? else {
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e:#}");
                continue;
            }
        };
        if command == EditCommand::Quit {
            break;
        }
        if let Err(e) = execute(session, store, input, command) {
            eprintln!("Error: {e:#}");
        }
    }
    Ok(())
}

fn execute<R: BufRead>(
    session: &mut PlanSession,
    store: &FoodStore,
    input: &mut R,
    command: EditCommand,
) -> Result<()> {
    let (action, applied) = match command {
        EditCommand::Add { food, amount } => {
            let item = find_food_item(store, &food)?;
            let amount = match amount {
                Some(raw) => parse_amount(&raw)?,
                None => match prompt_amount(input)? {
                    Some(amount) => amount,
                    None => {
                        eprintln!("Cancelled");
                        return Ok(());
                    }
                },
            };
            let applied = format!("Added {} x {amount}", item.name);
            (
                PlanAction::AddFoodItem {
                    item: item.clone(),
                    amount,
                },
                applied,
            )
        }
        EditCommand::Amount { row, value } => {
            let applied = format!("Row {row} amount set to {value}");
            (PlanAction::EditAmount { row, value }, applied)
        }
        EditCommand::Name { row, name } => {
            let applied = format!("Row {row} renamed to {name}");
            (PlanAction::EditName { row, name }, applied)
        }
        EditCommand::Delete { row } => {
            if let Some(name) = row_name(session.grid(), row) {
                if !confirm(input, &format!("Remove '{name}'?"))? {
                    eprintln!("Cancelled");
                    return Ok(());
                }
            }
            (PlanAction::DeleteRow { row }, format!("Removed row {row}"))
        }
        EditCommand::Show => {
            print_plan(&session.grid().view());
            return Ok(());
        }
        EditCommand::Help => {
            println!("{HELP}");
            return Ok(());
        }
        EditCommand::Quit => return Ok(()),
    };

    let outcome = session.apply(action)?;
    let message = outcome_message(outcome, &applied);
    if let ActionOutcome::Applied { .. } = outcome {
        println!("{message}");
    } else {
        eprintln!("{message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::plan::cmd_init;
    use dietplan_core::grid::FIRST_FOOD_ROW;
    use dietplan_core::models::FoodItem;
    use std::io::Cursor;
    use std::time::Duration;

    fn setup() -> (tempfile::TempDir, Config, FoodStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().to_path_buf())).unwrap();
        cmd_init(&config, true).unwrap();
        let mut store = FoodStore::new();
        store
            .add(FoodItem::from_input("Almonds", [("Protein", "6")], &config.mapping).unwrap())
            .unwrap();
        store
            .add(FoodItem::from_input("Almond milk", [("Protein", "1")], &config.mapping).unwrap())
            .unwrap();
        config.library().create("Week").unwrap();
        (dir, config, store)
    }

    fn protein_total(session: &PlanSession) -> String {
        let grid = session.grid();
        let col = grid
            .schema()
            .headers()
            .position(|h| h == "Protein (g)")
            .unwrap();
        grid.summation().cell(col).unwrap().to_string()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(
            parse_command("add Greek yogurt 2.5").unwrap(),
            Some(EditCommand::Add {
                food: "Greek yogurt".to_string(),
                amount: Some("2.5".to_string())
            })
        );
        assert_eq!(
            parse_command("add Greek yogurt").unwrap(),
            Some(EditCommand::Add {
                food: "Greek yogurt".to_string(),
                amount: None
            })
        );
        assert_eq!(
            parse_command("amount 2 abc").unwrap(),
            Some(EditCommand::Amount {
                row: 2,
                value: "abc".to_string()
            })
        );
        assert_eq!(
            parse_command("name 3 Late snack").unwrap(),
            Some(EditCommand::Name {
                row: 3,
                name: "Late snack".to_string()
            })
        );
        assert_eq!(
            parse_command("RM 4").unwrap(),
            Some(EditCommand::Delete { row: 4 })
        );
        assert_eq!(parse_command("q").unwrap(), Some(EditCommand::Quit));
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(parse_command("add").is_err());
        assert!(parse_command("delete").is_err());
        assert!(parse_command("delete two").is_err());
        assert!(parse_command("name 2").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_session_script() {
        let (_dir, config, store) = setup();
        let mut session = open_session(&config, "Week", &store, false).unwrap();
        let script = "\
add almonds
2
amount 2 abc
amount 2 5
name 2 Snack
delete 2
n
delete 0
add almond 1
bogus
quit
add almonds 1
";
        run_session(&mut session, &store, &mut Cursor::new(script)).unwrap();

        let grid = session.grid();
        assert_eq!(grid.food_row_count(), 1);
        assert_eq!(row_name(grid, FIRST_FOOD_ROW).as_deref(), Some("Snack"));
        assert_eq!(protein_total(&session), "30.00");

        let reopened = open_session(&config, "Week", &store, false).unwrap();
        assert_eq!(reopened.grid().to_records(), session.grid().to_records());
    }

    #[test]
    fn test_session_debounces_repeated_lines() {
        let (_dir, mut config, store) = setup();
        config.cooldown = Duration::from_secs(60);
        let mut session = open_session(&config, "Week", &store, false).unwrap();
        let script = "add Almonds 1\nadd Almonds 1\nadd Almonds 2\n";
        run_session(&mut session, &store, &mut Cursor::new(script)).unwrap();
        assert_eq!(session.grid().food_row_count(), 2);
        assert_eq!(protein_total(&session), "18.00");
    }
}
