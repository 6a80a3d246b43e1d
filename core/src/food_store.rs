use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{PlanError, PlanResult};
use crate::models::FoodItem;
use crate::nutrients::{NAME_FIELD, NUTRIENT_FIELDS, NameMapping};

/// In-memory collection of food items backed by one CSV file.
///
/// File layout: a header row in canonical field order, a units row, then
/// one food item per row.
#[derive(Debug, Clone, Default)]
pub struct FoodStore {
    items: Vec<FoodItem>,
}

impl FoodStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store. A missing file is an empty store.
    pub fn load(path: &Path, mapping: &NameMapping) -> PlanResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no food item file, starting empty");
            return Ok(Self::new());
        }
        let file = fs::File::open(path).map_err(|e| PlanError::persistence("read", path, e))?;
        Self::parse_csv(file, mapping).map_err(|e| PlanError::persistence("read", path, e))
    }

    /// Parse the store format. Malformed rows are reported and skipped, and
    /// malformed values are kept as text (they recalculate as 0).
    pub fn parse_csv<R: Read>(reader: R, mapping: &NameMapping) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let fields: Vec<Option<&'static str>> = headers
            .iter()
            .map(|h| match mapping.resolve_field(h) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!("food item file: {e}; column ignored");
                    None
                }
            })
            .collect();
        let Some(name_idx) = fields.iter().position(|f| *f == Some(NAME_FIELD)) else {
            tracing::warn!("food item file has no Name column, no items loaded");
            return Ok(Self::new());
        };

        let mut store = Self::new();
        for (line_num, result) in rdr.records().enumerate() {
            let line = line_num + 2;
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(line, "skipping unreadable food item row: {e}");
                    continue;
                }
            };

            let name = record.get(name_idx).unwrap_or("").to_string();
            if name.is_empty() {
                // line 2 is the units row
                if line != 2 && record.iter().any(|v| !v.is_empty()) {
                    tracing::warn!(line, "skipping food item row without a name");
                }
                continue;
            }

            let mut item = FoodItem::new(name);
            for (field, raw) in fields.iter().zip(record.iter()) {
                let Some(field) = *field else { continue };
                if field == NAME_FIELD {
                    continue;
                }
                if !raw.is_empty() && !matches!(raw.parse::<f64>(), Ok(v) if v.is_finite() && v >= 0.0) {
                    tracing::warn!(line, item = %item.name, field, value = raw, "value is not a non-negative number");
                }
                item.values.insert(field.to_string(), raw.to_string());
            }
            store.items.push(item);
        }
        Ok(store)
    }

    /// Rewrite the whole file: headers, units row, then every item.
    pub fn save(&self, path: &Path) -> PlanResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PlanError::persistence("create", parent, e))?;
        }
        let write = || -> Result<(), csv::Error> {
            let mut wtr = csv::Writer::from_path(path)?;
            wtr.write_record(NUTRIENT_FIELDS.iter().map(|f| f.name))?;
            wtr.write_record(NUTRIENT_FIELDS.iter().map(|f| f.unit))?;
            for item in &self.items {
                wtr.write_record(
                    NUTRIENT_FIELDS
                        .iter()
                        .map(|f| item.raw(f.name).unwrap_or_default()),
                )?;
            }
            wtr.flush()?;
            Ok(())
        };
        write().map_err(|e| PlanError::persistence("write", path, e))
    }

    #[must_use]
    pub fn items(&self) -> &[FoodItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FoodItem> {
        let name = name.trim().to_lowercase();
        self.items.iter().find(|i| i.name.to_lowercase() == name)
    }

    /// Items whose name contains `query`, ignoring case. `None` lists all.
    #[must_use]
    pub fn search(&self, query: Option<&str>) -> Vec<&FoodItem> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => self.items.iter().collect(),
            Some(q) => {
                let q = q.to_lowercase();
                self.items
                    .iter()
                    .filter(|i| i.name.to_lowercase().contains(&q))
                    .collect()
            }
        }
    }

    pub fn add(&mut self, item: FoodItem) -> PlanResult<&FoodItem> {
        item.validate()?;
        if self.get(&item.name).is_some() {
            return Err(PlanError::DuplicateFoodItem(item.name));
        }
        self.items.push(item);
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn remove(&mut self, name: &str) -> PlanResult<FoodItem> {
        let name = name.trim();
        let key = name.to_lowercase();
        let idx = self
            .items
            .iter()
            .position(|i| i.name.to_lowercase() == key)
            .ok_or_else(|| PlanError::FoodItemNotFound(name.to_string()))?;
        Ok(self.items.remove(idx))
    }
}
