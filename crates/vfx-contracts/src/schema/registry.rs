use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Enum,
    FreeText,
}

/// One selectable attribute of the composed prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub key: String,
    pub title: String,
    pub kind: FieldKind,
    pub domain: Vec<String>,
    pub default: String,
    pub description: String,
}

impl SchemaField {
    pub fn enumerated(
        key: &str,
        title: &str,
        domain: &[&str],
        default: &str,
        description: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            kind: FieldKind::Enum,
            domain: domain.iter().map(|item| (*item).to_string()).collect(),
            default: default.to_string(),
            description: description.to_string(),
        }
    }

    pub fn free_text(key: &str, title: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            kind: FieldKind::FreeText,
            domain: Vec::new(),
            default: String::new(),
            description: description.to_string(),
        }
    }

    pub fn is_default(&self, value: &str) -> bool {
        value == self.default
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            FieldKind::Enum => self.domain.iter().any(|item| item == value),
            FieldKind::FreeText => true,
        }
    }

    /// Prompt phrase for `value`, or `None` when the value is blank or the
    /// field's default.
    pub fn render(&self, value: &str) -> Option<String> {
        if value.trim().is_empty() || self.is_default(value) {
            return None;
        }
        match self.kind {
            FieldKind::Enum => Some(format!("{}: {}", self.title, value)),
            FieldKind::FreeText => Some(value.trim().to_string()),
        }
    }

    fn validate(&self) -> StudioResult<()> {
        if self.key.trim().is_empty() {
            return Err(StudioError::validation("schema field key cannot be empty"));
        }
        match self.kind {
            FieldKind::Enum => {
                let occurrences = self
                    .domain
                    .iter()
                    .filter(|item| **item == self.default)
                    .count();
                if occurrences != 1 {
                    return Err(StudioError::validation(format!(
                        "default '{}' of field '{}' must appear exactly once in its domain (found {occurrences})",
                        self.default, self.key
                    )));
                }
            }
            FieldKind::FreeText => {
                if !self.domain.is_empty() {
                    return Err(StudioError::validation(format!(
                        "free-text field '{}' cannot declare a domain",
                        self.key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Immutable catalog of schema fields in display order.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    fields: IndexMap<String, SchemaField>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaRegistry {
    pub fn builtin() -> Self {
        Self {
            fields: default_fields(),
        }
    }

    pub fn from_fields(fields: Vec<SchemaField>) -> StudioResult<Self> {
        let mut map = IndexMap::new();
        for field in fields {
            field.validate()?;
            if map.contains_key(&field.key) {
                return Err(StudioError::validation(format!(
                    "duplicate schema field '{}'",
                    field.key
                )));
            }
            map.insert(field.key.clone(), field);
        }
        Ok(Self { fields: map })
    }

    pub fn get(&self, key: &str) -> Option<&SchemaField> {
        self.fields.get(key)
    }

    pub fn require(&self, key: &str) -> StudioResult<&SchemaField> {
        self.get(key)
            .ok_or_else(|| StudioError::not_found("schema field", key))
    }

    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn default_fields() -> IndexMap<String, SchemaField> {
    let mut map = IndexMap::new();

    let mut insert_enum = |key: &str,
                           title: &str,
                           domain: &[&str],
                           default: &str,
                           description: &str| {
        map.insert(
            key.to_string(),
            SchemaField::enumerated(key, title, domain, default, description),
        );
    };

    insert_enum(
        "composition_rule",
        "Compositional Rule",
        &[
            "Default",
            "Rule of Thirds",
            "Golden Ratio / Spiral",
            "Centered Framing / Symmetry",
            "Leading Lines",
            "Diagonal Lines",
            "Triangle Composition",
            "Frame Within a Frame",
            "Negative Space Focus",
            "Dynamic Symmetry",
        ],
        "Default",
        "Guides the visual arrangement of elements in the frame.",
    );
    insert_enum(
        "shot_size",
        "Shot Size / Framing",
        &[
            "Default",
            "Establishing Shot",
            "Master Shot",
            "Extreme Wide Shot (EWS/ELS)",
            "Very Wide Shot (VWS)",
            "Wide Shot (WS/LS)",
            "Full Shot (FS)",
            "Medium Wide Shot (MWS/American)",
            "Cowboy Shot (Mid-Thigh Up)",
            "Medium Shot (MS/Waist Up)",
            "Medium Close-Up (MCU/Chest Up)",
            "Close-Up (CU/Face)",
            "Choker Shot (Neck/Chin to Forehead)",
            "Extreme Close-Up (ECU/Features)",
            "Detail Shot / Insert",
            "Over-the-Shoulder (OTS)",
            "Point-of-View (POV)",
            "Cutaway Shot",
        ],
        "Default",
        "Defines how close the camera is to the subject.",
    );
    insert_enum(
        "camera_angle",
        "Camera Angle & Perspective",
        &[
            "Default / Eye-Level",
            "Shoulder Level",
            "High Angle (Looking Down)",
            "Low Angle (Looking Up)",
            "Dutch Angle / Canted Angle / Tilt",
            "Overhead / Bird's Eye View / Top Shot",
            "Ground Level Shot",
            "Worm's Eye View (Extreme Low)",
            "Hip Level",
            "Knee Level",
        ],
        "Default / Eye-Level",
        "Camera's vertical position and perspective relative to the subject.",
    );
    insert_enum(
        "camera_movement",
        "Camera Movement & Dynamics",
        &[
            "Default / Static Shot (No Movement)",
            "Pan (Left/Right)",
            "Whip Pan / Swish Pan",
            "Tilt (Up/Down)",
            "Whip Tilt",
            "Dolly (In/Out on Track/Wheels)",
            "Truck / Tracking / Following Shot (Parallel to Subject)",
            "Pedestal / Crane Shot (Vertical Lift)",
            "Boom Shot / Jib Arm (Arcing Vertical/Horizontal)",
            "Zoom (In/Out - Lens Magnification)",
            "Handheld Camera (Intentional Shake/Organic)",
            "Steadicam / Gimbal Shot (Smooth Floating)",
            "Arc Shot (Circles Subject)",
            "Dolly Zoom / Vertigo Effect / Zolly",
            "Drone Shot / Aerial Movement",
            "Reveal Shot (Gradual Unveiling)",
            "Random / Erratic Movement",
        ],
        "Default / Static Shot (No Movement)",
        "Describes the physical motion of the camera during the shot.",
    );
    insert_enum(
        "lens_type_optical_effects",
        "Lens Type & Optical Effects",
        &[
            "Default / Standard Lens (Natural Perspective)",
            "Wide-Angle Lens (Exaggerated Depth/Distortion)",
            "Telephoto Lens (Compressed Perspective/Shallow DoF)",
            "Prime Lens Look (Sharp, Fixed Focal Length)",
            "Anamorphic Lens Look (Oval Bokeh, Horizontal Flares)",
            "Fisheye Lens Effect (Extreme Barrel Distortion)",
            "Macro Lens Effect (Extreme Close-Up on Small Details)",
            "Tilt-Shift Effect (Miniature Look/Selective Focus Plane)",
            "Shallow Depth of Field (Blurred Background/Foreground)",
            "Deep Depth of Field (All in Focus)",
            "Rack Focus / Focus Pull (Shifting Focus Mid-Shot)",
            "Soft Focus / Diffusion Filter (Dreamy, Hazy)",
            "Creamy Bokeh (Smooth Out-of-Focus Areas)",
            "Swirly Bokeh",
            "Oval Bokeh (Anamorphic Specific)",
            "Lens Flare (Subtle/Natural)",
            "Lens Flare (Pronounced/Stylized)",
            "Lens Flare (Anamorphic Horizontal Blue/Orange)",
            "Starburst Lens Flare (Point Light Sources)",
            "Chromatic Aberration (Intentional Color Fringing)",
            "Lens Breathing Effect (Focal Shift During Focus)",
            "Split Diopter Effect (Two Focal Planes Sharp)",
        ],
        "Default / Standard Lens (Natural Perspective)",
        "Choice of lens and the optical character it gives the image.",
    );
    insert_enum(
        "lighting_style_atmosphere",
        "Lighting Style & Atmosphere",
        &[
            "Default / Naturalistic Lighting",
            "Natural Light (Sunlight - Midday)",
            "Natural Light (Golden Hour / Magic Hour)",
            "Natural Light (Blue Hour / Twilight)",
            "Natural Light (Overcast / Diffused Daylight)",
            "Moonlight Effect / Night Lighting",
            "Candlelight / Firelight Effect",
            "Hard Light (Sharp, Defined Shadows)",
            "Soft Light (Diffused, Gentle Shadows)",
            "Flat Lighting (Minimal Shadows, Even Illumination)",
            "Three-Point Lighting (Key, Fill, Backlight)",
            "High-Key Lighting (Bright, Low Contrast, Cheerful)",
            "Low-Key Lighting (Dark, High Contrast, Dramatic)",
            "Chiaroscuro (Strong Light/Dark Contrast)",
            "Rembrandt Lighting (Triangular Light on Cheek)",
            "Rim Lighting / Backlighting (Outlines Subject)",
            "Silhouette Lighting (Subject Dark Against Bright BG)",
            "Warm Color Temperature (Oranges, Yellows)",
            "Cool Color Temperature (Blues, Cyans)",
            "Neon Lighting (Vibrant, Artificial Glow)",
            "Volumetric Lighting (Light Beams Visible, e.g., God Rays)",
            "Motivated Lighting (Source Appears Realistic to Scene)",
            "Practical Lights (Lamps, Fixtures in Scene)",
            "Spotlight Effect (Focused Beam)",
            "Kicker Light (Side/Rear Edge Light)",
            "Gobo / Patterned Light (Shadows/Light Shapes)",
            "Window Light (Natural or Simulated)",
            "Day for Night Effect (Simulating Night during Day)",
        ],
        "Default / Naturalistic Lighting",
        "Quality, direction, color and mood of the light.",
    );
    insert_enum(
        "visual_style_medium_era",
        "Visual Style, Medium & Era",
        &[
            "Default / Realistic",
            "Cinematic (Film-like Quality)",
            "Photorealistic (Highly Detailed, Real)",
            "Hyperrealistic (Exceedingly Real)",
            "Documentary (Observational / Vérité)",
            "Documentary (Expository / Interview-based)",
            "Film Noir (Dark, Shadowy B&W)",
            "Neo-Noir (Modern Film Noir)",
            "Found Footage (Handheld, Raw)",
            "Music Video (Stylized, Often Abstract)",
            "Commercial (Polished, Product-focused)",
            "Experimental / Art House",
            "Minimalist Style",
            "Action Sequence Style",
            "Surreal / Dreamlike",
            "Glitch Art / Datamosh",
            "Animation: 3D Render (Modern CGI)",
            "Animation: 2D Cel / Traditional",
            "Animation: Anime (Japanese Style)",
            "Animation: Cartoon (Western Style)",
            "Animation: Motion Graphics",
            "Animation: Stop Motion / Claymation",
            "Animation: Pixel Art",
            "Animation: Voxel Art",
            "Animation: Rotoscoped",
            "Animation: Hand-drawn Sketch Style",
            "Oil Painting Style",
            "Watercolor Painting Style",
            "Impressionistic Painting Style",
            "Charcoal Sketch Style",
            "Comic Book / Graphic Novel Style",
            "Matte Painting Look",
            "8mm Film Look (Grainy, Vintage)",
            "16mm Film Look (Grainy, Indie)",
            "35mm Film Look (Classic Cinema)",
            "Technicolor Look (Vibrant, Saturated 2-strip/3-strip)",
            "Kodachrome Look",
            "Ektachrome Look",
            "Fujifilm Stock Look",
            "VHS Aesthetic (80s/90s Tape)",
            "Betamax Look",
            "Early 2000s Digicam / MiniDV Look",
            "Vintage Newsreel (B&W, Aged)",
            "Archival Footage Look",
            "Sepia Tone Vintage",
            "1920s Silent Film Look",
            "1950s Cinema Look",
            "1960s Mod Style",
            "1970s Film Look (Gritty/Saturated)",
            "1980s Neon/Synthwave",
            "1990s Grunge Video",
            "Cyberpunk Aesthetic",
            "Steampunk Aesthetic",
            "Solarpunk Aesthetic",
            "Dieselpunk Aesthetic",
            "Gothic Aesthetic",
            "Fantasy Art Style",
            "Sci-Fi Concept Art Style",
            "Infrared / Thermal Look",
            "X-Ray Look",
            "Security Camera (CCTV) Look",
        ],
        "Default / Realistic",
        "Overall aesthetic, medium or period look.",
    );
    insert_enum(
        "vfx_post_production",
        "Visual Effects (VFX) & Post-Production Styles",
        &[
            "None / In-Camera Only",
            "Subtle CGI Integration",
            "Heavy CGI / VFX Driven",
            "Practical Effects Focus",
            "Rotoscoping (Animated Outlines)",
            "Motion Graphics Elements",
            "Particle Effects (Snow, Rain, Dust, Fog, Embers)",
            "Lens Flares (Added in Post)",
            "Light Leaks (Post Effect)",
            "Film Grain Overlay (Added Texture)",
            "Color Grading: Cinematic Teal & Orange",
            "Color Grading: Bleach Bypass",
            "Color Grading: Desaturated / Muted",
            "Color Grading: Vibrant / Highly Saturated",
            "Color Grading: Cross-Processed Look",
            "Glitches / Distortion (Digital Artifacts)",
            "VHS Tracking Lines / Analog Glitches",
            "Data Moshing / Databending",
            "Scanlines / Interlacing Effect",
            "Composite (Green Screen Keying Implied)",
            "Wire Removal (Implied Clean-up)",
            "Digital Makeup / Retouching",
            "Time-Lapse Photography Effect",
            "Slow Motion (Overcranked)",
            "Speed Ramping (Variable Speed)",
            "Motion Blur (Post-Production Effect)",
            "Light Streaks / Trails (Post)",
            "Digital Set Extension / Matte Painting Integration",
            "Screen Shake / Camera Jitter (Post)",
            "Bullet Time Effect",
            "Slit-Scan Effect",
            "Morphing Effect",
            "Explosions / Fire VFX",
            "Muzzle Flashes / Gunfire VFX",
            "Smoke / Atmospheric VFX",
        ],
        "None / In-Camera Only",
        "Added visual manipulations and post-production treatments.",
    );
    insert_enum(
        "color_palette_grading",
        "Color Palette & Grading",
        &[
            "Default / Natural Colors",
            "Monochromatic (Single Color + Tints/Shades)",
            "Achromatic (Black, White, Grays)",
            "High Contrast Colors",
            "Low Contrast Colors",
            "Vibrant & Saturated Palette",
            "Desaturated / Muted Palette",
            "Pastel Color Palette",
            "Neon Color Palette",
            "Earthy Tones Palette",
            "Jewel Tones Palette",
            "Cool Color Dominant (Blues, Greens, Purples)",
            "Warm Color Dominant (Reds, Oranges, Yellows)",
            "Analogous Colors (Adjacent on Color Wheel)",
            "Complementary Colors (Opposite on Color Wheel)",
            "Triadic Colors (Evenly Spaced on Color Wheel)",
            "Split-Complementary Colors",
            "Teal and Orange Grading",
            "Bleach Bypass Look (Desaturated, High Contrast)",
            "Sepia Tone",
            "Two-Strip Technicolor Emulation",
            "Three-Strip Technicolor Emulation",
            "Cross-Processing Emulation",
        ],
        "Default / Natural Colors",
        "Defines the dominant color scheme and grade.",
    );
    insert_enum(
        "editing_pace_transitions",
        "Editing Pace & Transitions (Implied)",
        &[
            "Default / Standard Pace",
            "Slow Pacing / Long Takes / Contemplative",
            "Fast Pacing / Quick Cuts / Energetic",
            "Montage Sequence (Series of Short Shots)",
            "Rhythmic Editing (To Music/Beat)",
            "Smooth Transitions (e.g., Standard Cuts, Soft Dissolves)",
            "Dynamic Transitions (e.g., Wipes, Graphic Matches, Hard Cuts)",
            "Jump Cuts (Disorienting, Noticeable)",
            "Match Cut (Visual/Conceptual Link)",
            "Split Screen Presentation",
            "Invisible Editing / Seamless Cuts",
        ],
        "Default / Standard Pace",
        "Hints at the implied editing rhythm and transitions.",
    );
    insert_enum(
        "subject_prominence",
        "Subject Prominence & Focus",
        &[
            "Default / Balanced Focus",
            "Primary Subject Sharp / Background Soft (Bokeh)",
            "Deep Focus / All Elements in Focus",
            "Background / Environment as Main Subject",
            "Selective Focus on Detail",
            "Dynamic Focus Shift (Rack Focus Implied)",
        ],
        "Default / Balanced Focus",
        "Directs attention between subject and surroundings.",
    );
    insert_enum(
        "sound_design_influence",
        "Sound Design Influence (Visual Hint)",
        &[
            "Default / Unspecified Audio Influence",
            "Silent Film Aesthetic (Visuals for Silence)",
            "Intense Soundscape Implied (e.g., Visual Impacts, Dynamic Motion)",
            "Delicate / Quiet Sounds Implied (e.g., Subtle Visuals, Stillness)",
            "Music-Driven Visuals (Rhythmic, Flowing)",
            "Environmental Ambience Focus (Visuals Reflecting Natural Sounds)",
            "Dialogue Focused (Visuals Support Conversation)",
        ],
        "Default / Unspecified Audio Influence",
        "Experimental: hints at sound through visual cues.",
    );
    insert_enum(
        "prompt_detail_interpretation",
        "Prompt Detail & Interpretation Style",
        &[
            "Balanced Detail (Default)",
            "High Detail (Specific & Elaborate)",
            "Hyper-Detailed (Extremely Specific, Granular)",
            "Medium Detail (Key Elements Described)",
            "Low Detail (Broad Strokes, Core Concept)",
            "Concise & Punchy (Brief, Impactful)",
            "Literal Interpretation (Adhere Closely to Text)",
            "Creative Interpretation (Allow Artistic Freedom)",
        ],
        "Balanced Detail (Default)",
        "Guides the language model on detail level and literalness.",
    );

    map.insert(
        "custom_elements".to_string(),
        SchemaField::free_text(
            "custom_elements",
            "Custom Elements / Keywords",
            "Specific keywords, artist names or extra elements to include.",
        ),
    );

    map
}
