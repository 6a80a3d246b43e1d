use anyhow::{Context, Result};

use dietplan_core::error::PlanError;
use dietplan_core::models::FoodItem;

use super::helpers::{exit_not_found, parse_value_pair, print_food_detail, print_food_table};
use crate::config::Config;

pub(crate) fn cmd_food_add(config: &Config, name: &str, values: &[String], json: bool) -> Result<()> {
    let pairs = values
        .iter()
        .map(|v| parse_value_pair(v))
        .collect::<Result<Vec<_>>>()?;
    let item = FoodItem::from_input(name, pairs, &config.mapping)?;

    let mut store = config.food_store()?;
    let item = store.add(item)?.clone();
    store
        .save(&config.food_items_path)
        .context("Failed to save food items")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let name = &item.name;
        let count = store.len();
        println!("Added food item: {name} ({count} in store)");
    }
    Ok(())
}

pub(crate) fn cmd_food_list(config: &Config, search: Option<&str>, json: bool) -> Result<()> {
    let store = config.food_store()?;
    let items = store.search(search);

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No food items found");
        }
        std::process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_food_table(&items);
    }
    Ok(())
}

pub(crate) fn cmd_food_show(config: &Config, name: &str, json: bool) -> Result<()> {
    let store = config.food_store()?;
    let Some(item) = store.get(name) else {
        exit_not_found(&PlanError::FoodItemNotFound(name.to_string()).to_string(), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(item)?);
    } else {
        print_food_detail(item);
    }
    Ok(())
}

/// Plans that already hold rows for this item keep their own copy of its
/// values.
pub(crate) fn cmd_food_delete(config: &Config, name: &str, json: bool) -> Result<()> {
    let mut store = config.food_store()?;
    let removed = match store.remove(name) {
        Ok(item) => item,
        Err(e @ PlanError::FoodItemNotFound(_)) => exit_not_found(&e.to_string(), json),
        Err(e) => return Err(e.into()),
    };
    store
        .save(&config.food_items_path)
        .context("Failed to save food items")?;

    if json {
        println!("{}", serde_json::json!({ "deleted": removed.name }));
    } else {
        println!("Deleted food item: {}", removed.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_add_and_delete_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().to_path_buf());

        cmd_food_add(
            &config,
            "Almonds",
            &["Protein (g)=6".to_string(), "calories=164".to_string()],
            true,
        )
        .unwrap();
        let store = config.food_store().unwrap();
        let almonds = store.get("almonds").unwrap();
        assert_eq!(almonds.value("Protein"), Some(6.0));
        assert_eq!(almonds.value("Calories / Energy"), Some(164.0));
        assert_eq!(almonds.value("Amount"), Some(1.0));
        assert_eq!(almonds.value("Iron"), Some(0.0));

        cmd_food_delete(&config, "ALMONDS", true).unwrap();
        assert!(config.food_store().unwrap().is_empty());
    }

    #[test]
    fn test_food_add_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().to_path_buf());

        assert!(cmd_food_add(&config, "Bad", &["Protein=-1".to_string()], true).is_err());
        assert!(cmd_food_add(&config, "Bad", &["Caffeine=1".to_string()], true).is_err());
        assert!(cmd_food_add(&config, "Bad", &["Protein".to_string()], true).is_err());
        assert!(cmd_food_add(&config, "  ", &[], true).is_err());
        assert!(!config.food_items_path.exists());

        cmd_food_add(&config, "Oats", &[], true).unwrap();
        let err = cmd_food_add(&config, "oats", &[], true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::DuplicateFoodItem(_))
        ));
    }
}
