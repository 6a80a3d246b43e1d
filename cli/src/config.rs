use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

use dietplan_core::food_store::FoodStore;
use dietplan_core::modes::NutrientModes;
use dietplan_core::nutrients::NameMapping;
use dietplan_core::plan_store::PlanLibrary;
use dietplan_core::session::DEFAULT_COOLDOWN;

pub const DATA_DIR_ENV: &str = "DIETPLAN_DATA_DIR";

pub struct Config {
    pub data_dir: PathBuf,
    pub food_items_path: PathBuf,
    pub modes_path: PathBuf,
    pub plans_dir: PathBuf,
    pub template_path: PathBuf,
    pub cooldown: Duration,
    pub mapping: NameMapping,
}

impl Config {
    /// Resolve the data directory: explicit flag, then `DIETPLAN_DATA_DIR`,
    /// then the platform data directory.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir.or_else(data_dir_from_env) {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "dietplan")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };

        let config = Self::with_data_dir(data_dir);
        std::fs::create_dir_all(&config.plans_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                config.data_dir.display()
            )
        })?;
        tracing::debug!(data_dir = %config.data_dir.display(), "using data directory");
        Ok(config)
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            food_items_path: data_dir.join("food_items.csv"),
            modes_path: data_dir.join("nutrient_modes.csv"),
            plans_dir: data_dir.join("plans"),
            template_path: data_dir.join("templates").join("plan_template.csv"),
            cooldown: DEFAULT_COOLDOWN,
            mapping: NameMapping::default(),
            data_dir,
        }
    }

    pub fn library(&self) -> PlanLibrary {
        PlanLibrary::new(&self.plans_dir, &self.template_path)
    }

    pub fn food_store(&self) -> Result<FoodStore> {
        FoodStore::load(&self.food_items_path, &self.mapping).context("Failed to load food items")
    }

    pub fn modes(&self) -> Result<NutrientModes> {
        NutrientModes::load(&self.modes_path, &self.mapping).context("Failed to load nutrient modes")
    }
}

fn data_dir_from_env() -> Option<PathBuf> {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
