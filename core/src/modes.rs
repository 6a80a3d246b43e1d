use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{PlanError, PlanResult};
use crate::nutrients::{AMOUNT_FIELD, NAME_FIELD, NUTRIENT_FIELDS, NameMapping};

/// How a nutrient's total is judged against its recommended value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NutrientMode {
    /// More is better: falling short of the recommendation is flagged.
    Good,
    /// Less is better: going over the recommendation is flagged.
    Harmful,
    #[default]
    Irrelevant,
}

impl NutrientMode {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "good" => Some(Self::Good),
            "harmful" => Some(Self::Harmful),
            "irrelevant" => Some(Self::Irrelevant),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Harmful => "harmful",
            Self::Irrelevant => "irrelevant",
        }
    }
}

/// Per-nutrient mode table keyed by canonical field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NutrientModes {
    modes: HashMap<&'static str, NutrientMode>,
}

impl NutrientModes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &'static str, mode: NutrientMode) {
        self.modes.insert(field, mode);
    }

    /// Mode for a canonical field; missing entries are `Irrelevant`.
    #[must_use]
    pub fn get(&self, field: &str) -> NutrientMode {
        self.modes.get(field).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Load the mode file. A missing file yields an empty table (every
    /// column irrelevant); unknown headers and mode strings are skipped
    /// with a warning.
    pub fn load(path: &Path, mapping: &NameMapping) -> PlanResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no nutrient mode file, all modes irrelevant");
            return Ok(Self::new());
        }
        let file = fs::File::open(path).map_err(|e| PlanError::persistence("read", path, e))?;
        Self::parse_csv(file, mapping).map_err(|e| PlanError::persistence("read", path, e))
    }

    pub fn parse_csv<R: Read>(reader: R, mapping: &NameMapping) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let mut table = Self::new();

        let Some(record) = rdr.records().next().transpose()? else {
            return Ok(table);
        };

        for (header, raw) in headers.iter().zip(record.iter()) {
            let field = match mapping.resolve_field(header) {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!("nutrient mode file: {e}");
                    continue;
                }
            };
            match NutrientMode::parse(raw) {
                Some(mode) => table.set(field, mode),
                None => tracing::warn!(
                    field,
                    value = raw,
                    "unknown nutrient mode, treating as irrelevant"
                ),
            }
        }
        Ok(table)
    }

    /// Write the table as a header row plus one mode row in canonical order.
    pub fn save(&self, path: &Path) -> PlanResult<()> {
        let write = || -> Result<(), csv::Error> {
            let mut wtr = csv::Writer::from_path(path)?;
            let fields: Vec<_> = NUTRIENT_FIELDS
                .iter()
                .filter(|f| f.name != NAME_FIELD && f.name != AMOUNT_FIELD)
                .collect();
            wtr.write_record(fields.iter().map(|f| f.name))?;
            wtr.write_record(fields.iter().map(|f| self.get(f.name).as_str()))?;
            wtr.flush()?;
            Ok(())
        };
        write().map_err(|e| PlanError::persistence("write", path, e))
    }

    /// Sensible defaults: nutrients to reach are `good`, nutrients to limit
    /// are `harmful`, subtotals and breakdowns stay `irrelevant`.
    #[must_use]
    pub fn defaults() -> Self {
        const HARMFUL: &[&str] = &[
            "Saturated Fat",
            "Trans Fat",
            "Cholesterol",
            "Added Sugars",
            "Sodium",
        ];
        const IRRELEVANT: &[&str] = &[
            "Calories / Energy",
            "Total Fat",
            "Monounsaturated Fat",
            "Polyunsaturated Fat",
            "Carbohydrates",
            "Soluble Fiber",
            "Insoluble Fiber",
            "Total Sugars",
        ];
        let mut table = Self::new();
        for f in NUTRIENT_FIELDS
            .iter()
            .filter(|f| f.name != NAME_FIELD && f.name != AMOUNT_FIELD)
        {
            let mode = if HARMFUL.contains(&f.name) {
                NutrientMode::Harmful
            } else if IRRELEVANT.contains(&f.name) {
                NutrientMode::Irrelevant
            } else {
                NutrientMode::Good
            };
            table.set(f.name, mode);
        }
        table
    }
}
