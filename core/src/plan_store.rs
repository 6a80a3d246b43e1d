use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{PlanError, PlanResult};
use crate::food_store::FoodStore;
use crate::grid::PlanGrid;
use crate::models::{Cell, FoodItem, format_number};
use crate::modes::NutrientModes;
use crate::nutrients::{AMOUNT_FIELD, ColumnKind, ColumnSchema, NUTRIENT_FIELDS, NameMapping};
use crate::recalc;

/// Recommended daily values written into the default plan template.
const DEFAULT_RECOMMENDED: &[(&str, &str)] = &[
    ("Calories / Energy", "2000"),
    ("Protein", "50"),
    ("Total Fat", "78"),
    ("Saturated Fat", "20"),
    ("Trans Fat", "2"),
    ("Cholesterol", "300"),
    ("Carbohydrates", "275"),
    ("Dietary Fiber", "28"),
    ("Added Sugars", "50"),
    ("Sodium", "2300"),
    ("Potassium", "4700"),
    ("Calcium", "1300"),
    ("Iron", "18"),
    ("Magnesium", "420"),
    ("Zinc", "11"),
    ("Phosphorus", "1250"),
    ("Iodine", "150"),
    ("Vitamin A", "900"),
    ("Vitamin C", "90"),
    ("Vitamin D", "20"),
    ("Vitamin E", "15"),
    ("Vitamin K", "120"),
    ("Vitamin B1 (Thiamine)", "1.2"),
    ("Vitamin B2 (Riboflavin)", "1.3"),
    ("Vitamin B3 (Niacin)", "16"),
    ("Vitamin B6", "1.7"),
    ("Vitamin B9 (Folate)", "400"),
    ("Vitamin B12", "2.4"),
    ("Omega-3 Fatty Acids", "1.6"),
    ("Omega-6 Fatty Acids", "17"),
];

/// Keep letters, digits and whitespace, then drop trailing whitespace.
pub fn sanitize_plan_name(name: &str) -> PlanResult<String> {
    let safe: String = name
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let safe = safe.trim_end().to_string();
    if safe.is_empty() {
        return Err(PlanError::InvalidPlanName(name.to_string()));
    }
    Ok(safe)
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Local>>,
}

/// Directory of plan files plus the template new plans are seeded from.
#[derive(Debug, Clone)]
pub struct PlanLibrary {
    dir: PathBuf,
    template: PathBuf,
}

impl PlanLibrary {
    pub fn new(dir: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn template(&self) -> &Path {
        &self.template
    }

    pub fn path_for(&self, name: &str) -> PlanResult<PathBuf> {
        let safe = sanitize_plan_name(name)?;
        Ok(self.dir.join(format!("{safe}.csv")))
    }

    pub fn list(&self) -> PlanResult<Vec<PlanEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&self.dir).map_err(|e| PlanError::persistence("list", &self.dir, e))?;
        let mut plans = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PlanError::persistence("list", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Local>::from);
            plans.push(PlanEntry {
                name,
                path,
                modified,
            });
        }
        plans.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(plans)
    }

    /// Write the default template unless one already exists.
    /// Returns whether a file was written.
    pub fn ensure_template(&self) -> PlanResult<bool> {
        if self.template.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.template.parent() {
            fs::create_dir_all(parent).map_err(|e| PlanError::persistence("create", parent, e))?;
        }
        let schema = ColumnSchema::canonical();
        let recommended: Vec<&str> = NUTRIENT_FIELDS
            .iter()
            .map(|f| {
                DEFAULT_RECOMMENDED
                    .iter()
                    .find(|(name, _)| *name == f.name)
                    .map_or("", |(_, v)| *v)
            })
            .collect();
        write_records(&self.template, schema.headers(), [recommended])?;
        tracing::info!(path = %self.template.display(), "wrote default plan template");
        Ok(true)
    }

    /// Create a plan file holding the template's headers and Recommended row.
    pub fn create(&self, name: &str) -> PlanResult<PlanEntry> {
        let path = self.path_for(name)?;
        if path.exists() {
            return Err(PlanError::PlanExists(name.trim().to_string()));
        }
        self.ensure_template()?;
        fs::create_dir_all(&self.dir).map_err(|e| PlanError::persistence("create", &self.dir, e))?;

        let file = fs::File::open(&self.template)
            .map_err(|e| PlanError::persistence("read", &self.template, e))?;
        let (headers, rows) = read_records(file)
            .map_err(|e| PlanError::persistence("read", &self.template, e))?;
        if headers.is_empty() {
            return Err(PlanError::MalformedPlan {
                path: self.template.clone(),
                reason: "template has no header row".to_string(),
            });
        }
        let recommended = rows.into_iter().next().unwrap_or_default();
        write_records(&path, headers.iter(), [recommended])?;

        let plan_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        tracing::info!(plan = %plan_name, path = %path.display(), "created plan");
        Ok(PlanEntry {
            name: plan_name,
            modified: Some(Local::now()),
            path,
        })
    }

    pub fn delete(&self, name: &str) -> PlanResult<PathBuf> {
        let path = self.existing_path(name)?;
        fs::remove_file(&path).map_err(|e| PlanError::persistence("delete", &path, e))?;
        tracing::info!(plan = name, "deleted plan");
        Ok(path)
    }

    fn existing_path(&self, name: &str) -> PlanResult<PathBuf> {
        let path = self.path_for(name)?;
        if path.exists() {
            Ok(path)
        } else {
            Err(PlanError::PlanNotFound(name.trim().to_string()))
        }
    }

    /// Load a plan into a grid. The Summation row is recomputed. A food row
    /// takes its base data from the food store item of the same name only
    /// when that item still scales to the stored values; otherwise the
    /// per-serving values are derived from the stored row.
    pub fn open(
        &self,
        name: &str,
        modes: NutrientModes,
        store: &FoodStore,
        mapping: &NameMapping,
    ) -> PlanResult<PlanGrid> {
        let path = self.existing_path(name)?;
        load_plan(&path, modes, store, mapping)
    }

    pub fn save(&self, grid: &PlanGrid) -> PlanResult<PathBuf> {
        let path = self.path_for(grid.name())?;
        save_plan(&path, grid)?;
        Ok(path)
    }
}

/// Read a plan file into a grid named after the file stem.
pub fn load_plan(
    path: &Path,
    modes: NutrientModes,
    store: &FoodStore,
    mapping: &NameMapping,
) -> PlanResult<PlanGrid> {
    let file = fs::File::open(path).map_err(|e| PlanError::persistence("read", path, e))?;
    let (headers, rows) = read_records(file).map_err(|e| PlanError::persistence("read", path, e))?;
    if headers.is_empty() {
        return Err(PlanError::MalformedPlan {
            path: path.to_path_buf(),
            reason: "missing header row".to_string(),
        });
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let schema = ColumnSchema::from_headers(&headers, mapping);
    let mut rows = rows.into_iter();
    let recommended = match rows.next() {
        Some(r) => r.iter().map(|v| Cell::from_raw(v)).collect(),
        None => {
            tracing::warn!(path = %path.display(), "plan has no Recommended row");
            Vec::new()
        }
    };

    let mut grid = PlanGrid::new(name, schema.clone(), recommended, modes);
    for raw in rows {
        let cells: Vec<Cell> = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let v = raw.get(i).map_or("", String::as_str);
                match col.kind {
                    ColumnKind::Name => Cell::from_raw(v),
                    _ => Cell::parse_numeric(v),
                }
            })
            .collect();
        let (source, amount) = restore_source(&cells, &schema, store);
        grid.push_restored_row(source, amount, cells);
    }
    grid.recompute_summation();
    Ok(grid)
}

/// Write headers, the Recommended row and the food rows. The Summation row
/// is derived and never stored.
pub fn save_plan(path: &Path, grid: &PlanGrid) -> PlanResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PlanError::persistence("create", parent, e))?;
    }
    write_records(path, grid.schema().headers(), grid.to_records())?;
    tracing::info!(plan = grid.name(), path = %path.display(), "saved plan");
    Ok(())
}

fn restore_source(cells: &[Cell], schema: &ColumnSchema, store: &FoodStore) -> (FoodItem, f64) {
    let name = schema
        .name_index()
        .and_then(|i| cells.get(i))
        .map(ToString::to_string)
        .unwrap_or_default();
    let amount = schema
        .amount_index()
        .and_then(|i| cells.get(i))
        .map_or(0.0, Cell::numeric_or_zero);

    if let Some(item) = store.get(&name).filter(|i| reproduces(i, amount, cells, schema)) {
        return (item.clone(), amount);
    }

    if amount <= 0.0 {
        tracing::warn!(item = %name, "stored row has no positive amount, per-serving values set to 0");
    }
    let mut item = FoodItem::new(name).with_value(AMOUNT_FIELD, "1");
    for (col, cell) in schema.columns().iter().zip(cells) {
        if let ColumnKind::Nutrient(field) = col.kind {
            let per_serving = if amount > 0.0 {
                cell.numeric_or_zero() / amount
            } else {
                0.0
            };
            item.values.insert(field.to_string(), per_serving.to_string());
        }
    }
    (item, amount)
}

/// Whether scaling `item` by `amount` gives the stored row as displayed.
/// A renamed row or a food item changed since the row was added does not.
fn reproduces(item: &FoodItem, amount: f64, cells: &[Cell], schema: &ColumnSchema) -> bool {
    let scaled = recalc::scale_row(item, amount, schema);
    schema
        .columns()
        .iter()
        .zip(scaled.iter().zip(cells))
        .filter(|(col, _)| matches!(col.kind, ColumnKind::Nutrient(_)))
        .all(|(_, (expected, stored))| {
            format_number(expected.numeric_or_zero()) == format_number(stored.numeric_or_zero())
        })
}

type Records = (Vec<String>, Vec<Vec<String>>);

fn read_records<R: Read>(reader: R) -> Result<Records, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn write_records<H, S, I, R, V>(path: &Path, headers: H, rows: I) -> PlanResult<()>
where
    H: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = V>,
    V: AsRef<[u8]>,
{
    let write = || -> Result<(), csv::Error> {
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        wtr.write_record(headers)?;
        for row in rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    };
    write().map_err(|e| PlanError::persistence("write", path, e))
}
