use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::capture::frame::{Frame, Orientation};
use crate::capture::source::FrameSource;
use crate::foundation::error::{LapseError, LapseResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// JSON description of a capture: frames in capture order with optional orientation tags.
///
/// ```json
/// { "frames": [ { "path": "0001.jpg", "orientation": { "roll": 1.5, "pitch": 0.0, "yaw": -2.0 } } ] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureManifest {
    /// Frames in capture order.
    pub frames: Vec<ManifestEntry>,
}

/// One manifest frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManifestEntry {
    /// Image path; relative paths resolve against the manifest's directory.
    pub path: PathBuf,
    /// Capture-time orientation, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
}

impl CaptureManifest {
    /// Parse a manifest from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> LapseResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| LapseError::serde(e.to_string()))
    }

    /// Build a lazily-decoded [`FrameSource`], resolving relative paths against `root`.
    pub fn into_source(self, root: &Path) -> FrameSource {
        self.frames
            .into_iter()
            .map(|entry| {
                let path = if entry.path.is_absolute() {
                    entry.path
                } else {
                    root.join(entry.path)
                };
                let frame = Frame::from_path(path);
                match entry.orientation {
                    Some(o) => frame.with_orientation(o),
                    None => frame,
                }
            })
            .collect()
    }
}

/// Load a capture manifest from `path`.
pub fn load_manifest(path: &Path) -> LapseResult<FrameSource> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read manifest '{}'", path.display()))?;
    let manifest = CaptureManifest::from_json_bytes(&bytes)?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest.into_source(root))
}

/// Load every image file in `dir`, ordered by file name. Frames carry no orientation metadata.
pub fn load_directory(dir: &Path) -> LapseResult<FrameSource> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read directory '{}'", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list directory '{}'", dir.display()))?;
        let path = entry.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths.into_iter().map(Frame::from_path).collect())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/capture/manifest.rs"]
mod tests;
