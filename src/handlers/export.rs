//! Convert a JSONL dataset dump into the on-disk evaluation layout.
//!
//! Input: one JSON object per line with `caption`, `code`, and either `image`
//! (base64 PNG) or `image_path`. Output under the save root:
//!
//! ```text
//! images/test_{idx}.png
//! codes/test_{idx}.tex
//! test_metadata.json
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Deserialize;

use crate::dataset::MetadataRecord;

#[derive(Debug, Deserialize)]
struct DumpRecord {
    caption: String,
    code: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    origin: Option<String>,
}

pub fn run(input: &Path, save_root: &Path) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    let image_dir = save_root.join("images");
    let code_dir = save_root.join("codes");
    fs::create_dir_all(&image_dir)?;
    fs::create_dir_all(&code_dir)?;

    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("exporting");

    let mut metadata = Vec::with_capacity(lines.len());
    let mut skipped = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        pb.inc(1);

        let record: DumpRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(err) => {
                eprintln!("{} line {}: {}", "error:".red(), idx + 1, err);
                skipped.push(idx);
                continue;
            }
        };
        let image = match read_image(&record, input) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("{} line {}: {:#}", "error:".red(), idx + 1, err);
                skipped.push(idx);
                continue;
            }
        };

        let image_rel = format!("images/test_{idx}.png");
        let code_rel = format!("codes/test_{idx}.tex");
        fs::write(save_root.join(&image_rel), image)?;
        fs::write(save_root.join(&code_rel), &record.code)?;

        metadata.push(MetadataRecord {
            index: idx,
            caption: record.caption,
            code: record.code,
            image_path: image_rel,
            code_path: code_rel,
            uri: record.uri,
            origin: record.origin,
        });
    }
    pb.finish_and_clear();

    let metadata_path = save_root.join("test_metadata.json");
    fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("exported {} samples to {}", metadata.len().green(), save_root.display());
    println!("metadata written to {}", metadata_path.display());
    if !skipped.is_empty() {
        println!("{} {:?}", "skipped lines:".yellow(), skipped);
    }
    Ok(())
}

fn read_image(record: &DumpRecord, input: &Path) -> Result<Vec<u8>> {
    if let Some(b64) = &record.image {
        return STANDARD.decode(b64.trim()).context("invalid base64 image");
    }
    if let Some(path) = &record.image_path {
        // relative paths are resolved against the dump's own directory
        let resolved = input.parent().unwrap_or(Path::new(".")).join(path);
        return fs::read(&resolved)
            .with_context(|| format!("failed to read image {}", resolved.display()));
    }
    anyhow::bail!("record has neither image nor image_path")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_layout_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("dump.jsonl");
        let png = STANDARD.encode(b"\x89PNG fake");
        fs::write(
            &dump,
            format!(
                "{}\n{}\n",
                serde_json::json!({"caption": "a", "code": "\\relax", "image": png}),
                serde_json::json!({"caption": "b", "code": "\\par", "image": png, "origin": "arxiv"}),
            ),
        )
        .unwrap();

        let save_root = dir.path().join("out");
        fs::create_dir_all(&save_root).unwrap();
        run(&dump, &save_root).unwrap();

        assert!(save_root.join("images/test_0.png").is_file());
        assert!(save_root.join("codes/test_1.tex").is_file());
        let metadata: Vec<MetadataRecord> =
            serde_json::from_str(&fs::read_to_string(save_root.join("test_metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[1].origin.as_deref(), Some("arxiv"));
        assert_eq!(metadata[0].image_path, "images/test_0.png");
    }

    #[test]
    fn bad_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("dump.jsonl");
        fs::write(&dump, "not json\n").unwrap();
        let save_root = dir.path().join("out");
        fs::create_dir_all(&save_root).unwrap();

        run(&dump, &save_root).unwrap();
        let metadata: Vec<MetadataRecord> =
            serde_json::from_str(&fs::read_to_string(save_root.join("test_metadata.json")).unwrap())
                .unwrap();
        assert!(metadata.is_empty());
    }
}
