//! Descriptions of the three tool panels and the rules they share.

use serde::Serialize;

use crate::error::{StudioError, StudioResult};

/// Placeholder shown in a result box while its request is running.
pub const IN_FLIGHT_MARKER: &str = "Generating...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    UploadImage,
    FreeTextResult,
    SchemaDrivenResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Enhancer,
    Deconstructor,
    ImageToPrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageConstraints {
    pub allowed_mime_types: &'static [&'static str],
    pub max_bytes: u64,
}

impl ImageConstraints {
    pub fn check(&self, mime_type: &str, size_bytes: u64) -> StudioResult<()> {
        if !self.allowed_mime_types.contains(&mime_type) {
            let allowed: Vec<&str> = self
                .allowed_mime_types
                .iter()
                .map(|mime| mime.trim_start_matches("image/"))
                .collect();
            return Err(StudioError::validation(format!(
                "Invalid file type. Allowed: {}.",
                allowed.join(", ")
            )));
        }
        if size_bytes > self.max_bytes {
            return Err(StudioError::validation(format!(
                "Image is too large. Max {}MB.",
                self.max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolPanel {
    pub kind: ToolKind,
    pub title: &'static str,
    pub capabilities: &'static [Capability],
    pub image: ImageConstraints,
}

impl ToolPanel {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

const BROAD_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/heic",
    "image/heif",
];
const COMMON_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

pub const TOOL_PANELS: &[ToolPanel] = &[
    ToolPanel {
        kind: ToolKind::Enhancer,
        title: "Prompt Enhancer",
        capabilities: &[
            Capability::UploadImage,
            Capability::FreeTextResult,
            Capability::SchemaDrivenResult,
        ],
        image: ImageConstraints {
            allowed_mime_types: BROAD_IMAGE_TYPES,
            max_bytes: 10 * 1024 * 1024,
        },
    },
    ToolPanel {
        kind: ToolKind::Deconstructor,
        title: "Image Deconstructor",
        capabilities: &[Capability::UploadImage, Capability::FreeTextResult],
        image: ImageConstraints {
            allowed_mime_types: COMMON_IMAGE_TYPES,
            max_bytes: 5 * 1024 * 1024,
        },
    },
    ToolPanel {
        kind: ToolKind::ImageToPrompt,
        title: "Image to Prompt",
        capabilities: &[Capability::UploadImage, Capability::FreeTextResult],
        image: ImageConstraints {
            allowed_mime_types: COMMON_IMAGE_TYPES,
            max_bytes: 5 * 1024 * 1024,
        },
    },
];

pub fn panel(kind: ToolKind) -> &'static ToolPanel {
    match kind {
        ToolKind::Enhancer => &TOOL_PANELS[0],
        ToolKind::Deconstructor => &TOOL_PANELS[1],
        ToolKind::ImageToPrompt => &TOOL_PANELS[2],
    }
}

/// Whether a result box holds something worth copying out.
pub fn is_exportable(value: &str) -> bool {
    !(value.is_empty() || value.starts_with("Error:") || value == IN_FLIGHT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::{is_exportable, panel, Capability, ToolKind, IN_FLIGHT_MARKER, TOOL_PANELS};

    #[test]
    fn panels_are_indexed_by_kind() {
        for tool in TOOL_PANELS {
            assert_eq!(panel(tool.kind), tool);
        }
    }

    #[test]
    fn only_the_enhancer_is_schema_driven() {
        assert!(panel(ToolKind::Enhancer).supports(Capability::SchemaDrivenResult));
        assert!(!panel(ToolKind::Deconstructor).supports(Capability::SchemaDrivenResult));
        assert!(panel(ToolKind::ImageToPrompt).supports(Capability::UploadImage));
    }

    #[test]
    fn image_constraints_differ_per_tool() {
        let enhancer = panel(ToolKind::Enhancer).image;
        let decon = panel(ToolKind::Deconstructor).image;
        assert!(enhancer.check("image/heic", 8 * 1024 * 1024).is_ok());
        assert!(decon.check("image/heic", 1024).is_err());

        let err = decon.check("image/png", 6 * 1024 * 1024).err().unwrap();
        assert_eq!(err.to_string(), "Image is too large. Max 5MB.");
        let err = decon.check("image/bmp", 10).err().unwrap();
        assert_eq!(err.to_string(), "Invalid file type. Allowed: jpeg, png, webp, gif.");
    }

    #[test]
    fn export_guard_skips_placeholders_and_errors() {
        assert!(is_exportable("A slow pan over hills."));
        assert!(!is_exportable(""));
        assert!(!is_exportable("Error: quota"));
        assert!(!is_exportable(IN_FLIGHT_MARKER));
    }
}
