mod edit;
mod food;
mod helpers;
mod plan;

use anyhow::{Result, bail};

use dietplan_core::error::PlanError;
use dietplan_core::food_store::FoodStore;
use dietplan_core::models::FoodItem;

use helpers::{print_food_table, prompt_choice};

pub(crate) use edit::cmd_plan_edit;
pub(crate) use food::{cmd_food_add, cmd_food_delete, cmd_food_list, cmd_food_show};
pub(crate) use plan::{
    cmd_init, cmd_plan_add, cmd_plan_amount, cmd_plan_create, cmd_plan_delete, cmd_plan_list,
    cmd_plan_name, cmd_plan_remove, cmd_plan_show,
};

/// An exact name match wins; otherwise every item whose name contains
/// `query`.
fn food_candidates<'a>(store: &'a FoodStore, query: &str) -> Vec<&'a FoodItem> {
    match store.get(query) {
        Some(item) => vec![item],
        None => store.search(Some(query)),
    }
}

/// Resolve a food item by name, letting the user pick when several match.
pub(super) fn pick_food_item<'a>(store: &'a FoodStore, query: &str) -> Result<Option<&'a FoodItem>> {
    let candidates = food_candidates(store, query);
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(Some(candidates[0])),
        n => {
            print_food_table(&candidates);
            let idx = prompt_choice(n)?;
            Ok(Some(candidates[idx]))
        }
    }
}

/// Resolve a food item by name without prompting; several matches are an
/// error listing them.
pub(super) fn find_food_item<'a>(store: &'a FoodStore, query: &str) -> Result<&'a FoodItem> {
    match food_candidates(store, query).as_slice() {
        [] => Err(PlanError::FoodItemNotFound(query.trim().to_string()).into()),
        [item] => Ok(*item),
        many => {
            let names: Vec<&str> = many.iter().map(|i| i.name.as_str()).collect();
            bail!("'{query}' matches several food items: {}", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FoodStore {
        let mut store = FoodStore::new();
        for name in ["Almonds", "Almond milk", "Banana"] {
            store.add(FoodItem::new(name)).unwrap();
        }
        store
    }

    #[test]
    fn test_exact_match_wins() {
        let store = store();
        assert_eq!(find_food_item(&store, "almonds").unwrap().name, "Almonds");
        assert_eq!(find_food_item(&store, "nan").unwrap().name, "Banana");
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let store = store();
        let err = find_food_item(&store, "almond").unwrap_err();
        assert!(err.to_string().contains("Almonds, Almond milk"));
        let err = find_food_item(&store, "kiwi").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::FoodItemNotFound(_))
        ));
        assert!(pick_food_item(&store, "kiwi").unwrap().is_none());
    }
}
