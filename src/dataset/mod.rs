//! Dataset metadata loading.
//!
//! The dataset collaborator is a directory on disk: a `test_metadata.json`
//! index (produced by `--export`) plus the image and code files it points at.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub index: usize,
    pub caption: String,
    pub code: String,
    pub image_path: String,
    pub code_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// One sample ready for generation. `image_path` is absolute-ish (resolved
/// against the images root) and only present when the file exists.
#[derive(Debug, Clone)]
pub struct Sample {
    pub index: usize,
    pub caption: String,
    pub code: String,
    pub image_path: Option<PathBuf>,
}

pub fn load_metadata(path: &Path) -> Result<Vec<MetadataRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read metadata {}", path.display()))?;
    let records: Vec<MetadataRecord> = serde_json::from_str(&text)
        .with_context(|| format!("malformed metadata {}", path.display()))?;
    Ok(records)
}

/// Load samples, resolving image paths against `images_root`. When
/// `require_images` is set, samples whose image file is missing are skipped
/// with a warning (the vision modes cannot use them); otherwise the image is
/// optional and carried only if present.
pub fn load_samples(
    metadata_path: &Path,
    images_root: &Path,
    require_images: bool,
) -> Result<Vec<Sample>> {
    let records = load_metadata(metadata_path)?;

    let mut samples = Vec::with_capacity(records.len());
    for record in records {
        let resolved = images_root.join(&record.image_path);
        let image_path = if resolved.is_file() {
            Some(resolved)
        } else {
            if require_images {
                eprintln!(
                    "{} image missing for sample {}: {}",
                    "warning:".yellow(),
                    record.index,
                    resolved.display()
                );
                continue;
            }
            None
        };
        samples.push(Sample {
            index: record.index,
            caption: record.caption,
            code: record.code,
            image_path,
        });
    }

    if samples.is_empty() {
        bail!("no usable samples in {}", metadata_path.display());
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_metadata(dir: &Path, records: &serde_json::Value) -> PathBuf {
        let path = dir.join("test_metadata.json");
        fs::write(&path, serde_json::to_string_pretty(records).unwrap()).unwrap();
        path
    }

    #[test]
    fn loads_records_and_resolves_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/test_0.png"), b"png").unwrap();

        let meta = write_metadata(
            dir.path(),
            &serde_json::json!([{
                "index": 0,
                "caption": "a circle",
                "code": "\\begin{tikzpicture}\\end{tikzpicture}",
                "image_path": "images/test_0.png",
                "code_path": "codes/test_0.tex"
            }]),
        );

        let samples = load_samples(&meta, dir.path(), true).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].index, 0);
        assert!(samples[0].image_path.as_ref().unwrap().is_file());
    }

    #[test]
    fn missing_image_skipped_only_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write_metadata(
            dir.path(),
            &serde_json::json!([
                {"index": 0, "caption": "a", "code": "x", "image_path": "images/none.png", "code_path": "codes/test_0.tex"},
            ]),
        );

        // optional images: sample kept, image dropped
        let samples = load_samples(&meta, dir.path(), false).unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].image_path.is_none());

        // required images: nothing left, which is an error
        assert!(load_samples(&meta, dir.path(), true).is_err());
    }

    #[test]
    fn optional_fields_roundtrip() {
        let record: MetadataRecord = serde_json::from_str(
            r#"{"index":3,"caption":"c","code":"k","image_path":"i.png","code_path":"c.tex","uri":"https://example.org/fig3"}"#,
        )
        .unwrap();
        assert_eq!(record.uri.as_deref(), Some("https://example.org/fig3"));
        assert!(record.origin.is_none());
    }
}
