use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{StudioError, StudioResult};
use crate::schema::SchemaRegistry;

/// A selection proposed because a trigger word appears in the core prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartSuggestion {
    pub trigger: String,
    pub field: String,
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionTable {
    entries: Vec<SmartSuggestion>,
}

impl SuggestionTable {
    pub fn builtin() -> Self {
        let mut entries = Vec::new();
        let mut add = |trigger: &str, field: &str, value: &str, label: &str| {
            entries.push(SmartSuggestion {
                trigger: trigger.to_string(),
                field: field.to_string(),
                value: value.to_string(),
                label: label.to_string(),
            });
        };

        add(
            "run",
            "camera_movement",
            "Truck / Tracking / Following Shot (Parallel to Subject)",
            "Tracking Shot for 'run' (Movement)",
        );
        add(
            "chase",
            "editing_pace_transitions",
            "Fast Pacing / Quick Cuts / Energetic",
            "Fast Pacing for 'chase' (Editing)",
        );
        add(
            "aerial",
            "camera_movement",
            "Drone Shot / Aerial Movement",
            "Drone Shot for 'aerial' (Movement)",
        );
        add(
            "sunset",
            "lighting_style_atmosphere",
            "Natural Light (Golden Hour / Magic Hour)",
            "Golden Hour for 'sunset' (Lighting)",
        );
        add(
            "sunrise",
            "lighting_style_atmosphere",
            "Natural Light (Golden Hour / Magic Hour)",
            "Golden Hour for 'sunrise' (Lighting)",
        );
        add(
            "night",
            "lighting_style_atmosphere",
            "Moonlight Effect / Night Lighting",
            "Night Lighting for 'night' (Lighting)",
        );
        add(
            "neon",
            "lighting_style_atmosphere",
            "Neon Lighting (Vibrant, Artificial Glow)",
            "Neon Lighting for 'neon' (Lighting)",
        );
        add(
            "portrait",
            "shot_size",
            "Close-Up (CU/Face)",
            "Close-Up for 'portrait' (Framing)",
        );
        add(
            "rain",
            "vfx_post_production",
            "Particle Effects (Snow, Rain, Dust, Fog, Embers)",
            "Particle Effects for 'rain' (VFX)",
        );
        add(
            "explosion",
            "vfx_post_production",
            "Explosions / Fire VFX",
            "Explosions for 'explosion' (VFX)",
        );

        Self { entries }
    }

    pub fn entries(&self) -> &[SmartSuggestion] {
        &self.entries
    }

    pub fn validate(&self, registry: &SchemaRegistry) -> StudioResult<()> {
        for entry in &self.entries {
            let field = registry.require(&entry.field)?;
            if !field.accepts(&entry.value) {
                return Err(StudioError::validation(format!(
                    "suggestion for '{}' names unknown value '{}'",
                    entry.trigger, entry.value
                )));
            }
        }
        Ok(())
    }

    /// Suggestions whose trigger appears as a whole word in `core_prompt`,
    /// ignoring case. A suggestion is skipped once its field already holds
    /// the suggested value, and a field is only proposed once.
    pub fn suggest(
        &self,
        core_prompt: &str,
        selections: &IndexMap<String, String>,
    ) -> Vec<&SmartSuggestion> {
        let words: BTreeSet<String> = core_prompt
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect();
        let mut proposed_fields = BTreeSet::new();
        self.entries
            .iter()
            .filter(|entry| words.contains(&entry.trigger.to_lowercase()))
            .filter(|entry| selections.get(&entry.field) != Some(&entry.value))
            .filter(|entry| proposed_fields.insert(entry.field.as_str()))
            .collect()
    }
}
