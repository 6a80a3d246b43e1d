mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_food_add, cmd_food_delete, cmd_food_list, cmd_food_show, cmd_init, cmd_plan_add,
    cmd_plan_amount, cmd_plan_create, cmd_plan_delete, cmd_plan_edit, cmd_plan_list,
    cmd_plan_name, cmd_plan_remove, cmd_plan_show,
};
use crate::config::Config;
use dietplan_core::error::PlanError;

#[derive(Parser)]
#[command(
    name = "dietplan",
    version,
    about = "Build nutrition plans from food items and check them against recommended values"
)]
struct Cli {
    /// Data directory (default: $DIETPLAN_DATA_DIR, else the platform data directory)
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default plan template, nutrient modes and food item file if missing
    Init {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage food items
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Manage and edit plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food item (values are per serving; missing values default to 0)
    Add {
        /// Food item name
        name: String,
        /// Nutrient value as FIELD=VALUE, e.g. "Protein=6" or "Sodium (mg)=120". Repeatable.
        #[arg(short = 'v', long = "value", value_name = "FIELD=VALUE")]
        values: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search food items
    List {
        /// Only items whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show every value of one food item
    Show {
        /// Food item name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food item
    Delete {
        /// Food item name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// List plans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a plan from the template
    Create {
        /// Plan name (letters, digits and spaces)
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a plan
    Delete {
        /// Plan name
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a plan with totals and how they compare to the recommended values
    Show {
        /// Plan name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a food item row to a plan
    Add {
        /// Plan name
        plan: String,
        /// Food item name (exact or partial)
        food: String,
        /// Servings, greater than 0 and at most 100 (prompted if omitted)
        amount: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the servings of a row
    Amount {
        /// Plan name
        plan: String,
        /// Row number as shown by `plan show` (food rows start at 2)
        row: usize,
        /// New servings
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a row
    Name {
        /// Plan name
        plan: String,
        /// Row number as shown by `plan show` (food rows start at 2)
        row: usize,
        /// New name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a row
    Remove {
        /// Plan name
        plan: String,
        /// Row number as shown by `plan show` (food rows start at 2)
        row: usize,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a plan interactively
    Edit {
        /// Plan name
        plan: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(exit_code(&e));
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<PlanError>() {
        Some(PlanError::PlanNotFound(_) | PlanError::FoodItemNotFound(_)) => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir)?;

    match cli.command {
        Commands::Init { json } => cmd_init(&config, json),
        Commands::Food { command } => match command {
            FoodCommands::Add { name, values, json } => cmd_food_add(&config, &name, &values, json),
            FoodCommands::List { search, json } => cmd_food_list(&config, search.as_deref(), json),
            FoodCommands::Show { name, json } => cmd_food_show(&config, &name, json),
            FoodCommands::Delete { name, json } => cmd_food_delete(&config, &name, json),
        },
        Commands::Plan { command } => match command {
            PlanCommands::List { json } => cmd_plan_list(&config, json),
            PlanCommands::Create { name, json } => cmd_plan_create(&config, &name, json),
            PlanCommands::Delete { name, yes, json } => cmd_plan_delete(&config, &name, yes, json),
            PlanCommands::Show { name, json } => cmd_plan_show(&config, &name, json),
            PlanCommands::Add {
                plan,
                food,
                amount,
                json,
            } => cmd_plan_add(&config, &plan, &food, amount.as_deref(), json),
            PlanCommands::Amount {
                plan,
                row,
                value,
                json,
            } => cmd_plan_amount(&config, &plan, row, &value, json),
            PlanCommands::Name {
                plan,
                row,
                name,
                json,
            } => cmd_plan_name(&config, &plan, row, &name, json),
            PlanCommands::Remove {
                plan,
                row,
                yes,
                json,
            } => cmd_plan_remove(&config, &plan, row, yes, json),
            PlanCommands::Edit { plan } => cmd_plan_edit(&config, &plan),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_food_add_values() {
        let cli = Cli::parse_from([
            "dietplan",
            "--data-dir",
            "/tmp/d",
            "food",
            "add",
            "Almonds",
            "-v",
            "Protein=6",
            "--value",
            "Sodium (mg)=1",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/d")));
        let Commands::Food {
            command: FoodCommands::Add { name, values, json },
        } = cli.command
        else {
            panic!("expected food add");
        };
        assert_eq!(name, "Almonds");
        assert_eq!(values, ["Protein=6", "Sodium (mg)=1"]);
        assert!(!json);
    }

    #[test]
    fn test_parse_plan_add_optional_amount() {
        let cli = Cli::parse_from(["dietplan", "plan", "add", "Week", "Oats", "--json"]);
        let Commands::Plan {
            command: PlanCommands::Add { amount, json, .. },
        } = cli.command
        else {
            panic!("expected plan add");
        };
        assert_eq!(amount, None);
        assert!(json);
    }

    #[test]
    fn test_exit_code() {
        let not_found = anyhow::Error::from(PlanError::PlanNotFound("x".to_string()));
        assert_eq!(exit_code(&not_found), 2);
        let wrapped = anyhow::Error::from(PlanError::FoodItemNotFound("y".to_string()))
            .context("while adding");
        assert_eq!(exit_code(&wrapped), 2);
        let other = anyhow::Error::from(PlanError::ProtectedRow(0));
        assert_eq!(exit_code(&other), 1);
    }
}
