use std::collections::HashMap;

use serde::Serialize;

use crate::error::{PlanError, PlanResult};

/// A nutrient field of the canonical schema: display name plus unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NutrientField {
    pub name: &'static str,
    pub unit: &'static str,
}

impl NutrientField {
    const fn new(name: &'static str, unit: &'static str) -> Self {
        Self { name, unit }
    }

    /// Column header used in plan files: the unit is appended in parentheses
    /// for every nutrient, but never for `Name` or `Amount`.
    #[must_use]
    pub fn plan_header(&self) -> String {
        if self.name == NAME_FIELD || self.name == AMOUNT_FIELD || self.unit.is_empty() {
            self.name.to_string()
        } else {
            format!("{} ({})", self.name, self.unit)
        }
    }
}

pub const NAME_FIELD: &str = "Name";
pub const AMOUNT_FIELD: &str = "Amount";

/// The canonical, ordered nutrient schema shared by every food item and plan.
pub const NUTRIENT_FIELDS: &[NutrientField] = &[
    NutrientField::new(NAME_FIELD, ""),
    NutrientField::new(AMOUNT_FIELD, "g"),
    NutrientField::new("Calories / Energy", "kcal"),
    NutrientField::new("Protein", "g"),
    NutrientField::new("Total Fat", "g"),
    NutrientField::new("Saturated Fat", "g"),
    NutrientField::new("Monounsaturated Fat", "g"),
    NutrientField::new("Polyunsaturated Fat", "g"),
    NutrientField::new("Trans Fat", "g"),
    NutrientField::new("Cholesterol", "mg"),
    NutrientField::new("Carbohydrates", "g"),
    NutrientField::new("Dietary Fiber", "g"),
    NutrientField::new("Soluble Fiber", "g"),
    NutrientField::new("Insoluble Fiber", "g"),
    NutrientField::new("Total Sugars", "g"),
    NutrientField::new("Added Sugars", "g"),
    NutrientField::new("Sodium", "mg"),
    NutrientField::new("Potassium", "mg"),
    NutrientField::new("Calcium", "mg"),
    NutrientField::new("Iron", "mg"),
    NutrientField::new("Magnesium", "mg"),
    NutrientField::new("Zinc", "mg"),
    NutrientField::new("Phosphorus", "mg"),
    NutrientField::new("Iodine", "µg"),
    NutrientField::new("Vitamin A", "µg"),
    NutrientField::new("Vitamin C", "mg"),
    NutrientField::new("Vitamin D", "µg"),
    NutrientField::new("Vitamin E", "mg"),
    NutrientField::new("Vitamin K", "µg"),
    NutrientField::new("Vitamin B1 (Thiamine)", "mg"),
    NutrientField::new("Vitamin B2 (Riboflavin)", "mg"),
    NutrientField::new("Vitamin B3 (Niacin)", "mg"),
    NutrientField::new("Vitamin B6", "mg"),
    NutrientField::new("Vitamin B9 (Folate)", "µg"),
    NutrientField::new("Vitamin B12", "µg"),
    NutrientField::new("Omega-3 Fatty Acids", "g"),
    NutrientField::new("Omega-6 Fatty Acids", "g"),
];

/// Common shorthand that users and other tools put in column headers.
const EXTRA_ALIASES: &[(&str, &str)] = &[
    ("calories", "Calories / Energy"),
    ("energy", "Calories / Energy"),
    ("kcal", "Calories / Energy"),
    ("fat", "Total Fat"),
    ("carbs", "Carbohydrates"),
    ("carbohydrate", "Carbohydrates"),
    ("fiber", "Dietary Fiber"),
    ("fibre", "Dietary Fiber"),
    ("sugar", "Total Sugars"),
    ("sugars", "Total Sugars"),
    ("salt", "Sodium"),
    ("vitamin b1", "Vitamin B1 (Thiamine)"),
    ("thiamine", "Vitamin B1 (Thiamine)"),
    ("vitamin b2", "Vitamin B2 (Riboflavin)"),
    ("riboflavin", "Vitamin B2 (Riboflavin)"),
    ("vitamin b3", "Vitamin B3 (Niacin)"),
    ("niacin", "Vitamin B3 (Niacin)"),
    ("vitamin b9", "Vitamin B9 (Folate)"),
    ("folate", "Vitamin B9 (Folate)"),
    ("folic acid", "Vitamin B9 (Folate)"),
    ("omega-3", "Omega-3 Fatty Acids"),
    ("omega 3", "Omega-3 Fatty Acids"),
    ("omega-6", "Omega-6 Fatty Acids"),
    ("omega 6", "Omega-6 Fatty Acids"),
    ("servings", "Amount"),
];

#[must_use]
pub fn field(name: &str) -> Option<&'static NutrientField> {
    NUTRIENT_FIELDS.iter().find(|f| f.name == name)
}

/// Strip one trailing parenthesized suffix: `"Protein (g)"` → `"Protein"`.
#[must_use]
pub fn strip_unit_suffix(header: &str) -> Option<&str> {
    let trimmed = header.trim_end();
    if !trimmed.ends_with(')') {
        return None;
    }
    let open = trimmed.rfind('(')?;
    let stem = trimmed[..open].trim_end();
    if stem.is_empty() { None } else { Some(stem) }
}

/// Resolves plan column headers (and food store headers) to canonical
/// nutrient field names.
///
/// Resolution order: exact match, then the header with its trailing unit
/// suffix stripped, then a case-insensitive alias table built from the
/// canonical list.
#[derive(Debug, Clone)]
pub struct NameMapping {
    aliases: HashMap<String, &'static str>,
}

impl Default for NameMapping {
    fn default() -> Self {
        Self::new(NUTRIENT_FIELDS)
    }
}

impl NameMapping {
    #[must_use]
    pub fn new(fields: &'static [NutrientField]) -> Self {
        let mut aliases = HashMap::new();
        for f in fields {
            aliases.insert(f.name.to_lowercase(), f.name);
            if !f.unit.is_empty() {
                aliases.insert(format!("{} ({})", f.name, f.unit).to_lowercase(), f.name);
            }
        }
        for (alias, target) in EXTRA_ALIASES {
            if let Some(f) = fields.iter().find(|f| f.name == *target) {
                aliases.entry((*alias).to_string()).or_insert(f.name);
            }
        }
        Self { aliases }
    }

    pub fn resolve_field(&self, header: &str) -> PlanResult<&'static str> {
        let header = header.trim();
        if let Some(f) = field(header) {
            return Ok(f.name);
        }
        let stripped = strip_unit_suffix(header);
        if let Some(f) = stripped.and_then(field) {
            return Ok(f.name);
        }
        let lookup = |key: &str| self.aliases.get(&key.to_lowercase()).copied();
        lookup(header)
            .or_else(|| stripped.and_then(lookup))
            .ok_or_else(|| PlanError::UnresolvedColumn(header.to_string()))
    }
}

/// What a plan column holds once its header has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum ColumnKind {
    Name,
    Amount,
    Nutrient(&'static str),
    /// Header that matched nothing; its cells recalculate as 0.
    Unresolved,
}

impl ColumnKind {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnKind::Name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub header: String,
    pub kind: ColumnKind,
}

/// Ordered plan-side column schema, resolved once when a plan is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    /// Resolve every header. Unresolved headers are logged and kept so the
    /// plan file round-trips; they never block grid operations.
    pub fn from_headers<I, S>(headers: I, mapping: &NameMapping) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = headers
            .into_iter()
            .map(|h| {
                let header = h.as_ref().trim().to_string();
                let kind = match mapping.resolve_field(&header) {
                    Ok(NAME_FIELD) => ColumnKind::Name,
                    Ok(AMOUNT_FIELD) => ColumnKind::Amount,
                    Ok(name) => ColumnKind::Nutrient(name),
                    Err(e) => {
                        tracing::warn!("{e}; its values will be treated as 0");
                        ColumnKind::Unresolved
                    }
                };
                Column { header, kind }
            })
            .collect();
        Self { columns }
    }

    /// Schema with one unit-qualified header per canonical field.
    #[must_use]
    pub fn canonical() -> Self {
        let columns = NUTRIENT_FIELDS
            .iter()
            .map(|f| Column {
                header: f.plan_header(),
                kind: match f.name {
                    NAME_FIELD => ColumnKind::Name,
                    AMOUNT_FIELD => ColumnKind::Amount,
                    name => ColumnKind::Nutrient(name),
                },
            })
            .collect();
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.header.as_str())
    }

    #[must_use]
    pub fn index_of_kind(&self, kind: ColumnKind) -> Option<usize> {
        self.columns.iter().position(|c| c.kind == kind)
    }

    #[must_use]
    pub fn name_index(&self) -> Option<usize> {
        self.index_of_kind(ColumnKind::Name)
    }

    #[must_use]
    pub fn amount_index(&self) -> Option<usize> {
        self.index_of_kind(ColumnKind::Amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_list_shape() {
        assert_eq!(NUTRIENT_FIELDS.len(), 37);
        assert_eq!(NUTRIENT_FIELDS[0].name, NAME_FIELD);
        assert_eq!(NUTRIENT_FIELDS[0].unit, "");
        assert_eq!(NUTRIENT_FIELDS[1].name, AMOUNT_FIELD);
        assert_eq!(NUTRIENT_FIELDS[1].unit, "g");
        let names = NUTRIENT_FIELDS.iter().filter(|f| f.name == NAME_FIELD).count();
        assert_eq!(names, 1);
    }

    #[test]
    fn test_plan_header() {
        assert_eq!(field("Name").unwrap().plan_header(), "Name");
        assert_eq!(field("Amount").unwrap().plan_header(), "Amount");
        assert_eq!(field("Protein").unwrap().plan_header(), "Protein (g)");
        assert_eq!(
            field("Vitamin B1 (Thiamine)").unwrap().plan_header(),
            "Vitamin B1 (Thiamine) (mg)"
        );
    }

    #[test]
    fn test_strip_unit_suffix() {
        assert_eq!(strip_unit_suffix("Protein (g)"), Some("Protein"));
        assert_eq!(
            strip_unit_suffix("Vitamin B1 (Thiamine) (mg)"),
            Some("Vitamin B1 (Thiamine)")
        );
        assert_eq!(strip_unit_suffix("Protein"), None);
        assert_eq!(strip_unit_suffix("(g)"), None);
    }

    #[test]
    fn test_resolve_exact_and_suffixed() {
        let m = NameMapping::default();
        assert_eq!(m.resolve_field("Protein").unwrap(), "Protein");
        assert_eq!(m.resolve_field("Protein (g)").unwrap(), "Protein");
        assert_eq!(
            m.resolve_field("Calories / Energy (kcal)").unwrap(),
            "Calories / Energy"
        );
        assert_eq!(
            m.resolve_field("Vitamin B9 (Folate) (µg)").unwrap(),
            "Vitamin B9 (Folate)"
        );
        assert_eq!(
            m.resolve_field("Vitamin B1 (Thiamine)").unwrap(),
            "Vitamin B1 (Thiamine)"
        );
    }

    #[test]
    fn test_resolve_aliases_case_insensitive() {
        let m = NameMapping::default();
        assert_eq!(m.resolve_field("protein (G)").unwrap(), "Protein");
        assert_eq!(m.resolve_field("Calories").unwrap(), "Calories / Energy");
        assert_eq!(m.resolve_field("Fiber (g)").unwrap(), "Dietary Fiber");
        assert_eq!(m.resolve_field("Vitamin B1").unwrap(), "Vitamin B1 (Thiamine)");
        assert_eq!(m.resolve_field("AMOUNT (g)").unwrap(), "Amount");
    }

    #[test]
    fn test_resolve_is_total_over_canonical_headers() {
        let m = NameMapping::default();
        for f in NUTRIENT_FIELDS {
            assert_eq!(m.resolve_field(f.name).unwrap(), f.name);
            assert_eq!(m.resolve_field(&f.plan_header()).unwrap(), f.name);
        }
    }

    #[test]
    fn test_resolve_unknown_column() {
        let m = NameMapping::default();
        let err = m.resolve_field("Caffeine (mg)").unwrap_err();
        assert!(matches!(err, PlanError::UnresolvedColumn(ref h) if h == "Caffeine (mg)"));
    }

    #[test]
    fn test_schema_from_headers() {
        let m = NameMapping::default();
        let schema = ColumnSchema::from_headers(["Name", "Amount", "Protein (g)", "Caffeine"], &m);
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.name_index(), Some(0));
        assert_eq!(schema.amount_index(), Some(1));
        assert_eq!(schema.columns()[2].kind, ColumnKind::Nutrient("Protein"));
        assert_eq!(schema.columns()[3].kind, ColumnKind::Unresolved);
        assert_eq!(schema.columns()[3].header, "Caffeine");
    }

    #[test]
    fn test_canonical_schema_round_trips_through_mapping() {
        let canonical = ColumnSchema::canonical();
        let reparsed = ColumnSchema::from_headers(canonical.headers(), &NameMapping::default());
        assert_eq!(canonical, reparsed);
    }
}
