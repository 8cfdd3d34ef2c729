//! Per-sample output files under a convention-named directory layout.
//!
//! ```text
//! <root>/original-output/   sample_{i}.json      result records
//! <root>/output-tex/        sample_{i}.tex       extracted code
//! <root>/save/pdf           sample_{i}.pdf
//! <root>/save/png           sample_{i}.png
//! <root>/save/log           sample_{i}.log       compiler transcripts (on error)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// One result record per sample. The caption-only mode fills `response`; the
/// repair mode fills `compiled_successfully` and `attempts`.
#[derive(Debug, Serialize)]
pub struct SampleRecord<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'a str>,
    pub latex_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled_successfully: Option<bool>,
    pub ground_truth: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn json_dir(&self) -> PathBuf {
        self.root.join("original-output")
    }

    pub fn tex_dir(&self) -> PathBuf {
        self.root.join("output-tex")
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.root.join("save").join("pdf")
    }

    pub fn png_dir(&self) -> PathBuf {
        self.root.join("save").join("png")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("save").join("log")
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [self.json_dir(), self.tex_dir(), self.pdf_dir(), self.png_dir(), self.log_dir()]
        {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn write_record(&self, stem: &str, record: &SampleRecord<'_>) -> Result<PathBuf> {
        let path = self.json_dir().join(format!("{stem}.json"));
        let text = serde_json::to_string_pretty(record)?;
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_tex(&self, stem: &str, code: &str) -> Result<PathBuf> {
        let path = self.tex_dir().join(format!("{stem}.tex"));
        fs::write(&path, code).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn pdf_path(&self, stem: &str) -> PathBuf {
        self.pdf_dir().join(format!("{stem}.pdf"))
    }

    pub fn png_path(&self, stem: &str) -> PathBuf {
        self.png_dir().join(format!("{stem}.png"))
    }

    pub fn log_path(&self, stem: &str) -> PathBuf {
        self.log_dir().join(format!("{stem}.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_record_omits_repair_fields() {
        let record = SampleRecord {
            prompt: "p",
            response: Some("r"),
            latex_code: "c",
            compiled_successfully: None,
            ground_truth: "g",
            attempts: None,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["response"], "r");
        assert!(v.get("compiled_successfully").is_none());
        assert!(v.get("attempts").is_none());
    }

    #[test]
    fn repair_record_omits_raw_response() {
        let record = SampleRecord {
            prompt: "p",
            response: None,
            latex_code: "c",
            compiled_successfully: Some(false),
            ground_truth: "g",
            attempts: Some(3),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert!(v.get("response").is_none());
        assert_eq!(v["compiled_successfully"], false);
        assert_eq!(v["attempts"], 3);
    }

    #[test]
    fn layout_writes_under_expected_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.ensure().unwrap();

        let tex = layout.write_tex("sample_7", "\\relax").unwrap();
        assert!(tex.ends_with("output-tex/sample_7.tex"));
        assert_eq!(fs::read_to_string(tex).unwrap(), "\\relax");
        assert!(layout.png_path("sample_7").ends_with("save/png/sample_7.png"));
    }
}
