use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;
use tabled::{
    Table, Tabled,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Columns},
};

use dietplan_core::grid::{PlanView, parse_amount};
use dietplan_core::models::FoodItem;
use dietplan_core::nutrients::{self, NAME_FIELD};

/// Split `FIELD=VALUE`, e.g. `"Protein (g)=6"`.
pub(crate) fn parse_value_pair(s: &str) -> Result<(String, String)> {
    let Some((field, value)) = s.split_once('=') else {
        bail!("Invalid value '{s}'. Use FIELD=VALUE, e.g. 'Protein=6.5'");
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("Invalid value '{s}': missing field name");
    }
    Ok((field.to_string(), value.trim().to_string()))
}

/// Print `message` to stderr and read one line. `None` on end of input.
pub(crate) fn prompt_line<R: BufRead>(input: &mut R, message: &str) -> Result<Option<String>> {
    eprint!("{message}");
    io::stderr().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub(crate) fn confirm<R: BufRead>(input: &mut R, message: &str) -> Result<bool> {
    let answer = prompt_line(input, &format!("{message} [y/N] "))?;
    Ok(matches!(
        answer.as_deref().map(str::to_lowercase).as_deref(),
        Some("y" | "yes")
    ))
}

/// Ask for a serving count until a valid one is entered. An empty line or
/// end of input cancels.
pub(crate) fn prompt_amount<R: BufRead>(input: &mut R) -> Result<Option<f64>> {
    loop {
        let Some(line) = prompt_line(input, "Servings (greater than 0, at most 100): ")? else {
            return Ok(None);
        };
        if line.is_empty() {
            return Ok(None);
        }
        match parse_amount(&line) {
            Ok(amount) => return Ok(Some(amount)),
            Err(e) => eprintln!("{e}"),
        }
    }
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a food item (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

/// Report a missing plan or food item and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn print_food_table(items: &[&FoodItem]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Sodium")]
        sodium: String,
    }

    let value = |item: &FoodItem, field: &str| {
        item.raw(field)
            .filter(|v| !v.is_empty())
            .map_or_else(|| "-".to_string(), str::to_string)
    };
    let rows: Vec<FoodRow> = items
        .iter()
        .enumerate()
        .map(|(i, item)| FoodRow {
            idx: i + 1,
            name: truncate(&item.name, 35),
            amount: value(item, "Amount"),
            calories: value(item, "Calories / Energy"),
            protein: value(item, "Protein"),
            fat: value(item, "Total Fat"),
            carbs: value(item, "Carbohydrates"),
            sodium: value(item, "Sodium"),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Every canonical field of one food item with its unit.
pub(crate) fn print_food_detail(item: &FoodItem) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for f in nutrients::NUTRIENT_FIELDS {
        if f.name == NAME_FIELD {
            continue;
        }
        let raw = item.raw(f.name).unwrap_or_default();
        let value = if raw.is_empty() || f.unit.is_empty() {
            raw.to_string()
        } else {
            format!("{raw} {}", f.unit)
        };
        builder.push_record([f.name.to_string(), value]);
    }
    let table = builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();
    println!("{}", item.name);
    println!("{table}");
}

/// Column headers for the transposed plan table: one per plan row, with the
/// row index food rows are addressed by.
pub(crate) fn plan_row_headers(view: &PlanView) -> Vec<String> {
    view.rows
        .iter()
        .map(|r| {
            if r.editable.is_empty() {
                r.label.clone()
            } else {
                format!("{} [{}]", r.label, r.index)
            }
        })
        .collect()
}

/// Print a plan with one line per column and one column per plan row, plus
/// the classification of each Recommended value.
pub(crate) fn print_plan(view: &PlanView) {
    let mut builder = Builder::default();
    let mut header = vec!["Column".to_string()];
    header.extend(plan_row_headers(view));
    header.push("Status".to_string());
    builder.push_record(header);

    for (col, name) in view.headers.iter().enumerate() {
        let mut record = vec![truncate(name, 32)];
        record.extend(view.rows.iter().map(|r| {
            let cell = r.cells.get(col).map_or("", String::as_str);
            truncate(cell, 20)
        }));
        let status = view
            .classification
            .get(name)
            .map(|c| {
                if c.is_warning() {
                    format!("{} !", c.label())
                } else {
                    c.label().to_string()
                }
            })
            .unwrap_or_default();
        record.push(status);
        builder.push_record(record);
    }

    let table = builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=view.rows.len())).with(Alignment::right()))
        .to_string();
    println!("=== {} ===", view.name);
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max.saturating_sub(3)).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
