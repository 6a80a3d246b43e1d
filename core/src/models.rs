use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{PlanError, PlanResult};
use crate::nutrients::{AMOUNT_FIELD, NAME_FIELD, NUTRIENT_FIELDS, NameMapping};

/// A food item holding nutrient content for one serving.
///
/// Values are kept as the text they were entered or stored with; they are
/// parsed only when a plan row is computed from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodItem {
    pub name: String,
    /// Canonical field name → raw value. Never contains `Name`.
    pub values: BTreeMap<String, String>,
}

impl FoodItem {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, field: &str, value: impl Into<String>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn raw(&self, field: &str) -> Option<&str> {
        if field == NAME_FIELD {
            return Some(&self.name);
        }
        self.values.get(field).map(String::as_str)
    }

    /// Parsed per-serving value, `None` when missing, blank or not a number.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values
            .get(field)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Build a validated item from user input keyed by any header spelling
    /// the name mapping understands. Missing nutrients default to "0" and
    /// `Amount` to "1" (one serving).
    pub fn from_input<K, V>(
        name: &str,
        input: impl IntoIterator<Item = (K, V)>,
        mapping: &NameMapping,
    ) -> PlanResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut item = FoodItem::new(name.trim());
        for (key, value) in input {
            let field = mapping
                .resolve_field(key.as_ref())
                .map_err(|e| PlanError::InvalidFoodItem(e.to_string()))?;
            if field == NAME_FIELD {
                return Err(PlanError::InvalidFoodItem(
                    "the name is given separately, not as a value".to_string(),
                ));
            }
            item.values
                .insert(field.to_string(), value.as_ref().trim().to_string());
        }
        for f in NUTRIENT_FIELDS.iter().filter(|f| f.name != NAME_FIELD) {
            let default = if f.name == AMOUNT_FIELD { "1" } else { "0" };
            item.values
                .entry(f.name.to_string())
                .or_insert_with(|| default.to_string());
        }
        item.validate()?;
        Ok(item)
    }

    /// Name must be non-empty and every value a non-negative number.
    pub fn validate(&self) -> PlanResult<()> {
        if self.name.trim().is_empty() {
            return Err(PlanError::InvalidFoodItem("name is required".to_string()));
        }
        for (field, raw) in &self.values {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => {}
                _ => {
                    return Err(PlanError::InvalidFoodItem(format!(
                        "{field} must be a non-negative number (got '{raw}')"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Typed grid cell. Numbers are rendered with two decimals only at the
/// presentation edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Blank,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Keep stored text as-is; empty becomes `Blank`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Cell::Blank
        } else {
            Cell::Text(raw.to_string())
        }
    }

    /// Parse stored text into a number where possible.
    #[must_use]
    pub fn parse_numeric(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Cell::Blank;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Text(raw.to_string()),
        }
    }

    #[must_use]
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Cell::Blank => None,
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Numeric value with blank or unparsable cells counting as 0.
    #[must_use]
    pub fn numeric_or_zero(&self) -> f64 {
        self.numeric().unwrap_or(0.0)
    }

    /// The value as shown: numbers are rounded to 2 decimals like
    /// `format_number`, text is parsed as written.
    #[must_use]
    pub fn shown_numeric_or_zero(&self) -> f64 {
        match self {
            Cell::Number(v) => format_number(*v).parse().unwrap_or(*v),
            _ => self.numeric_or_zero(),
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Blank)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(v) => f.write_str(&format_number(*v)),
        }
    }
}

/// Two-decimal display format for derived values.
#[must_use]
pub fn format_number(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v };
    let s = format!("{v:.2}");
    if s == "-0.00" { "0.00".to_string() } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(15.0), "15.00");
        assert_eq!(format_number(2.5), "2.50");
        assert_eq!(format_number(1.0 / 3.0), "0.33");
        assert_eq!(format_number(-0.0), "0.00");
        assert_eq!(format_number(-0.001), "0.00");
    }

    #[test]
    fn test_cell_shown_value() {
        assert!((Cell::Number(0.333).shown_numeric_or_zero() - 0.33).abs() < 1e-12);
        assert!((Cell::Number(2.005_1).shown_numeric_or_zero() - 2.01).abs() < 1e-12);
        assert!((Cell::Text("0.333".to_string()).shown_numeric_or_zero() - 0.333).abs() < 1e-12);
        assert!(Cell::Blank.shown_numeric_or_zero().abs() < f64::EPSILON);
    }

    #[test]
    fn test_cell_parsing() {
        assert_eq!(Cell::parse_numeric(""), Cell::Blank);
        assert_eq!(Cell::parse_numeric(" 6.5 "), Cell::Number(6.5));
        assert_eq!(Cell::parse_numeric("abc"), Cell::Text("abc".to_string()));
        assert_eq!(Cell::parse_numeric("NaN"), Cell::Text("NaN".to_string()));
        assert_eq!(Cell::from_raw("50"), Cell::Text("50".to_string()));
        assert_eq!(Cell::from_raw("  "), Cell::Blank);
    }

    #[test]
    fn test_cell_numeric() {
        assert_eq!(Cell::Text("50".to_string()).numeric(), Some(50.0));
        assert_eq!(Cell::Text("n/a".to_string()).numeric(), None);
        assert!((Cell::Text("n/a".to_string()).numeric_or_zero()).abs() < f64::EPSILON);
        assert!((Cell::Blank.numeric_or_zero()).abs() < f64::EPSILON);
        assert_eq!(Cell::Number(1.5).numeric(), Some(1.5));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Blank.to_string(), "");
        assert_eq!(Cell::Number(16.5).to_string(), "16.50");
        assert_eq!(Cell::Text("50".to_string()).to_string(), "50");
    }

    #[test]
    fn test_food_item_from_input_defaults() {
        let m = NameMapping::default();
        let item = FoodItem::from_input("Almonds", [("Protein (g)", "6"), ("fat", "14.2")], &m)
            .unwrap();
        assert_eq!(item.name, "Almonds");
        assert_eq!(item.raw("Protein"), Some("6"));
        assert_eq!(item.raw("Total Fat"), Some("14.2"));
        assert_eq!(item.raw("Amount"), Some("1"));
        assert_eq!(item.raw("Sodium"), Some("0"));
        assert_eq!(item.values.len(), NUTRIENT_FIELDS.len() - 1);
    }

    #[test]
    fn test_food_item_from_input_rejects_bad_values() {
        let m = NameMapping::default();
        assert!(FoodItem::from_input("X", [("Protein", "-1")], &m).is_err());
        assert!(FoodItem::from_input("X", [("Protein", "lots")], &m).is_err());
        assert!(FoodItem::from_input("X", [("Caffeine", "1")], &m).is_err());
        assert!(FoodItem::from_input("X", [("Name", "Y")], &m).is_err());
        assert!(FoodItem::from_input("  ", Vec::<(&str, &str)>::new(), &m).is_err());
    }

    #[test]
    fn test_food_item_value() {
        let item = FoodItem::new("Banana")
            .with_value("Protein", "1.5")
            .with_value("Sodium", "");
        assert_eq!(item.value("Protein"), Some(1.5));
        assert_eq!(item.value("Sodium"), None);
        assert_eq!(item.value("Iron"), None);
        assert_eq!(item.raw("Name"), Some("Banana"));
    }
}
