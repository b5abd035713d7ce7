use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::registry::SchemaRegistry;
use crate::error::{StudioError, StudioResult};

/// Selecting `value` for `field` contradicts any of the listed values of the
/// other fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    pub field: String,
    pub value: String,
    pub conflicts: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictMessage {
    pub field: String,
    pub value: String,
    pub other_field: String,
    pub other_value: String,
    pub message: String,
}

pub type ConflictReport = IndexMap<String, Vec<ConflictMessage>>;

/// On-disk shape of a rule table: field -> trigger value -> other field -> values.
type RuleTableDocument = IndexMap<String, IndexMap<String, IndexMap<String, Vec<String>>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictTable {
    rules: Vec<ConflictRule>,
}

impl ConflictTable {
    pub fn builtin() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    pub fn from_rules(rules: Vec<ConflictRule>) -> Self {
        Self { rules }
    }

    pub fn from_json(raw: &str) -> StudioResult<Self> {
        let document: RuleTableDocument = serde_json::from_str(raw)
            .map_err(|err| StudioError::validation(format!("invalid conflict table: {err}")))?;
        let mut rules = Vec::new();
        for (field, triggers) in document {
            for (value, conflicts) in triggers {
                rules.push(ConflictRule {
                    field: field.clone(),
                    value,
                    conflicts,
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ConflictRule] {
        &self.rules
    }

    /// Checks that every field and value named by the table exists.
    pub fn validate(&self, registry: &SchemaRegistry) -> StudioResult<()> {
        let check = |field: &str, value: &str| -> StudioResult<()> {
            let schema = registry.require(field)?;
            if !schema.accepts(value) {
                return Err(StudioError::validation(format!(
                    "conflict rule names '{value}', which is not a value of '{field}'"
                )));
            }
            Ok(())
        };
        for rule in &self.rules {
            check(&rule.field, &rule.value)?;
            for (other_field, values) in &rule.conflicts {
                for value in values {
                    check(other_field, value)?;
                }
            }
        }
        Ok(())
    }
}

pub struct ConflictDetector<'a> {
    registry: &'a SchemaRegistry,
    table: &'a ConflictTable,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(registry: &'a SchemaRegistry, table: &'a ConflictTable) -> Self {
        Self { registry, table }
    }

    /// Annotates every field involved in a conflict.
    ///
    /// Fields missing from `selections` count as holding their default. Each
    /// conflicting pair is reported on both fields regardless of which side
    /// declared the rule, once per pair. Fields without conflicts have no
    /// entry.
    pub fn detect(&self, selections: &IndexMap<String, String>) -> ConflictReport {
        let mut report = ConflictReport::new();
        for rule in self.table.rules() {
            if self.effective(selections, &rule.field) != Some(rule.value.as_str()) {
                continue;
            }
            for (other_field, values) in &rule.conflicts {
                let Some(other_value) = self.effective(selections, other_field) else {
                    continue;
                };
                if !values.iter().any(|value| value == other_value) {
                    continue;
                }
                self.attribute(&mut report, &rule.field, &rule.value, other_field, other_value);
                self.attribute(&mut report, other_field, other_value, &rule.field, &rule.value);
            }
        }
        report
    }

    fn effective<'s>(
        &'s self,
        selections: &'s IndexMap<String, String>,
        key: &str,
    ) -> Option<&'s str> {
        selections
            .get(key)
            .map(String::as_str)
            .or_else(|| self.registry.get(key).map(|field| field.default.as_str()))
    }

    fn attribute(
        &self,
        report: &mut ConflictReport,
        field: &str,
        value: &str,
        other_field: &str,
        other_value: &str,
    ) {
        let entries = report.entry(field.to_string()).or_default();
        if entries
            .iter()
            .any(|entry| entry.other_field == other_field && entry.other_value == other_value)
        {
            return;
        }
        entries.push(ConflictMessage {
            field: field.to_string(),
            value: value.to_string(),
            other_field: other_field.to_string(),
            other_value: other_value.to_string(),
            message: format!(
                "'{value}' conflicts with {} '{other_value}'",
                self.title(other_field)
            ),
        });
    }

    fn title(&self, key: &str) -> String {
        self.registry
            .get(key)
            .map(|field| field.title.clone())
            .unwrap_or_else(|| key.to_string())
    }
}

fn default_rules() -> Vec<ConflictRule> {
    let mut rules = Vec::new();

    let mut rule = |field: &str, value: &str, conflicts: &[(&str, &[&str])]| {
        rules.push(ConflictRule {
            field: field.to_string(),
            value: value.to_string(),
            conflicts: conflicts
                .iter()
                .map(|(other, values)| {
                    (
                        (*other).to_string(),
                        values.iter().map(|item| (*item).to_string()).collect(),
                    )
                })
                .collect(),
        });
    };

    rule(
        "lens_type_optical_effects",
        "Shallow Depth of Field (Blurred Background/Foreground)",
        &[(
            "subject_prominence",
            &[
                "Deep Focus / All Elements in Focus",
                "Background / Environment as Main Subject",
            ],
        )],
    );
    rule(
        "lens_type_optical_effects",
        "Deep Depth of Field (All in Focus)",
        &[(
            "subject_prominence",
            &["Primary Subject Sharp / Background Soft (Bokeh)"],
        )],
    );
    rule(
        "subject_prominence",
        "Primary Subject Sharp / Background Soft (Bokeh)",
        &[(
            "lens_type_optical_effects",
            &["Deep Depth of Field (All in Focus)"],
        )],
    );
    rule(
        "lighting_style_atmosphere",
        "High-Key Lighting (Bright, Low Contrast, Cheerful)",
        &[
            (
                "visual_style_medium_era",
                &["Film Noir (Dark, Shadowy B&W)", "Neo-Noir (Modern Film Noir)"],
            ),
            ("color_palette_grading", &["High Contrast Colors"]),
        ],
    );
    rule(
        "lighting_style_atmosphere",
        "Low-Key Lighting (Dark, High Contrast, Dramatic)",
        &[("color_palette_grading", &["Pastel Color Palette"])],
    );
    rule(
        "color_palette_grading",
        "Achromatic (Black, White, Grays)",
        &[
            (
                "vfx_post_production",
                &["Color Grading: Vibrant / Highly Saturated"],
            ),
            (
                "lighting_style_atmosphere",
                &["Neon Lighting (Vibrant, Artificial Glow)"],
            ),
        ],
    );
    rule(
        "camera_movement",
        "Steadicam / Gimbal Shot (Smooth Floating)",
        &[("vfx_post_production", &["Screen Shake / Camera Jitter (Post)"])],
    );
    rule(
        "editing_pace_transitions",
        "Slow Pacing / Long Takes / Contemplative",
        &[("vfx_post_production", &["Speed Ramping (Variable Speed)"])],
    );

    rules
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{ConflictDetector, ConflictRule, ConflictTable};
    use crate::schema::{SchemaField, SchemaRegistry};

    fn selections(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn small_registry() -> SchemaRegistry {
        SchemaRegistry::from_fields(vec![
            SchemaField::enumerated(
                "a",
                "Field A",
                &["Default", "v1", "v3"],
                "Default",
                "",
            ),
            SchemaField::enumerated("b", "Field B", &["Default", "v2"], "Default", ""),
        ])
        .unwrap()
    }

    fn one_way_rule() -> ConflictTable {
        let mut conflicts = IndexMap::new();
        conflicts.insert("b".to_string(), vec!["v2".to_string()]);
        ConflictTable::from_rules(vec![ConflictRule {
            field: "a".to_string(),
            value: "v1".to_string(),
            conflicts,
        }])
    }

    #[test]
    fn builtin_table_references_real_fields_and_values() {
        let registry = SchemaRegistry::builtin();
        assert!(ConflictTable::builtin().validate(&registry).is_ok());
    }

    #[test]
    fn one_way_rule_is_reported_on_both_fields() {
        let registry = small_registry();
        let table = one_way_rule();
        let report =
            ConflictDetector::new(&registry, &table).detect(&selections(&[("a", "v1"), ("b", "v2")]));

        assert_eq!(report["a"].len(), 1);
        assert_eq!(report["b"].len(), 1);
        assert_eq!(report["a"][0].other_field, "b");
        assert_eq!(report["b"][0].other_field, "a");
        assert_eq!(report["b"][0].message, "'v2' conflicts with Field A 'v1'");
    }

    #[test]
    fn declaring_from_the_other_side_gives_the_same_report() {
        let registry = small_registry();
        let mut conflicts = IndexMap::new();
        conflicts.insert("a".to_string(), vec!["v1".to_string()]);
        let reversed = ConflictTable::from_rules(vec![ConflictRule {
            field: "b".to_string(),
            value: "v2".to_string(),
            conflicts,
        }]);
        let report = ConflictDetector::new(&registry, &reversed)
            .detect(&selections(&[("a", "v1"), ("b", "v2")]));
        assert!(!report["a"].is_empty());
        assert!(!report["b"].is_empty());
    }

    #[test]
    fn redundant_declarations_are_reported_once() {
        let registry = SchemaRegistry::builtin();
        let table = ConflictTable::builtin();
        let report = ConflictDetector::new(&registry, &table).detect(&selections(&[
            ("lens_type_optical_effects", "Deep Depth of Field (All in Focus)"),
            ("subject_prominence", "Primary Subject Sharp / Background Soft (Bokeh)"),
        ]));
        assert_eq!(report.len(), 2);
        assert_eq!(report["lens_type_optical_effects"].len(), 1);
        assert_eq!(report["subject_prominence"].len(), 1);
    }

    #[test]
    fn fields_without_conflicts_have_no_entry() {
        let registry = small_registry();
        let table = one_way_rule();
        let detector = ConflictDetector::new(&registry, &table);

        assert!(detector.detect(&selections(&[("a", "v3"), ("b", "v2")])).is_empty());
        assert!(detector.detect(&selections(&[("a", "v1")])).is_empty());
        assert!(detector.detect(&IndexMap::new()).is_empty());
    }

    #[test]
    fn one_trigger_can_conflict_with_several_fields() {
        let registry = SchemaRegistry::builtin();
        let table = ConflictTable::builtin();
        let report = ConflictDetector::new(&registry, &table).detect(&selections(&[
            ("lighting_style_atmosphere", "High-Key Lighting (Bright, Low Contrast, Cheerful)"),
            ("visual_style_medium_era", "Film Noir (Dark, Shadowy B&W)"),
            ("color_palette_grading", "High Contrast Colors"),
        ]));
        assert_eq!(report["lighting_style_atmosphere"].len(), 2);
        assert_eq!(report["visual_style_medium_era"].len(), 1);
        assert_eq!(report["color_palette_grading"].len(), 1);
    }

    #[test]
    fn table_loads_from_json_document() -> anyhow::Result<()> {
        let table = ConflictTable::from_json(r#"{"a": {"v1": {"b": ["v2"]}}}"#)?;
        assert_eq!(table, one_way_rule());
        assert!(table.validate(&small_registry()).is_ok());

        let bad = ConflictTable::from_json(r#"{"a": {"v1": {"b": ["nope"]}}}"#)?;
        assert!(bad.validate(&small_registry()).is_err());
        assert!(ConflictTable::from_json("[1, 2]").is_err());
        Ok(())
    }
}
