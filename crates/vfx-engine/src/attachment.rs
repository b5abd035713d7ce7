use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use vfx_contracts::tools::{Capability, ImageConstraints, ToolPanel};

/// An image read from disk and checked against one tool's limits.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl ImageAttachment {
    pub fn load(path: &Path, constraints: &ImageConstraints) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime_type = sniff_mime(&bytes)
            .or_else(|| mime_for_path(path))
            .unwrap_or("application/octet-stream");
        constraints
            .check(mime_type, bytes.len() as u64)
            .with_context(|| format!("cannot attach {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// Loads an image for a tool panel, which must accept uploads.
    pub fn for_panel(path: &Path, panel: &ToolPanel) -> Result<Self> {
        if !panel.supports(Capability::UploadImage) {
            bail!("{} does not accept images", panel.title);
        }
        Self::load(path, &panel.image)
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use vfx_contracts::tools::{panel, Capability, ToolKind, ToolPanel};

    use super::ImageAttachment;

    #[test]
    fn png_is_sniffed_and_encoded() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("frame.bin");
        RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])).save_with_format(&path, image::ImageFormat::Png)?;

        let image = ImageAttachment::load(&path, &panel(ToolKind::Deconstructor).image)?;
        assert_eq!(image.mime_type, "image/png");
        assert!(image.data_url().starts_with("data:image/png;base64,iVBOR"));
        assert!(image.base64().starts_with("iVBOR"));
        Ok(())
    }

    #[test]
    fn heic_falls_back_to_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("photo.heic");
        std::fs::write(&path, b"\0\0\0\x18ftypheic")?;

        let image = ImageAttachment::load(&path, &panel(ToolKind::Enhancer).image)?;
        assert_eq!(image.mime_type, "image/heic");
        assert!(ImageAttachment::load(&path, &panel(ToolKind::ImageToPrompt).image).is_err());
        Ok(())
    }

    #[test]
    fn oversized_files_are_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("big.gif");
        let mut bytes = b"GIF89a".to_vec();
        bytes.resize(5 * 1024 * 1024 + 1, 0);
        std::fs::write(&path, bytes)?;

        let err = ImageAttachment::load(&path, &panel(ToolKind::Deconstructor).image)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.contains("Image is too large. Max 5MB."), "{err}");
        Ok(())
    }

    #[test]
    fn panels_without_uploads_refuse_images() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("frame.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path)?;

        let enhancer = panel(ToolKind::Enhancer);
        assert_eq!(ImageAttachment::for_panel(&path, enhancer)?.mime_type, "image/png");

        let text_only = ToolPanel {
            capabilities: &[Capability::FreeTextResult],
            ..*enhancer
        };
        let err = ImageAttachment::for_panel(&path, &text_only)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "Prompt Enhancer does not accept images");
        Ok(())
    }
}
