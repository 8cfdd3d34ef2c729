//! LaTeX compilation and rasterization via external tools.
//!
//! The compiler and rasterizer are treated as opaque executables (`pdflatex`
//! and `pdftoppm` by default, both configurable) invoked in a temporary build
//! directory with stderr discarded.

pub mod log;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};

use crate::config::Config;

pub use self::log::parse_errors;

/// Job name used inside the build directory; compiler errors in the
/// transcript are attributed to this file.
pub const ROOT_FILE: &str = "diagram.tex";

/// One compiled LaTeX document: the source, the compiler transcript, and the
/// PDF bytes if the engine produced any pages.
#[derive(Debug, Clone)]
pub struct TikzDocument {
    pub code: String,
    pub log: String,
    pub pdf: Option<Vec<u8>>,
}

impl TikzDocument {
    /// The engine writes no PDF when there are no pages of output, so a
    /// present PDF implies at least one rendered page.
    pub fn has_content(&self) -> bool {
        self.pdf.is_some()
    }

    pub fn compiled_with_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    pub fn errors(&self) -> BTreeMap<u32, String> {
        parse_errors(&self.log, ROOT_FILE)
    }

    pub fn save_pdf(&self, path: &Path) -> Result<()> {
        let pdf = self.pdf.as_ref().ok_or_else(|| anyhow!("no PDF was produced"))?;
        fs::write(path, pdf).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn save_log(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.log).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct TikzCompiler {
    compiler: String,
    pdftoppm: String,
    dpi: usize,
}

impl TikzCompiler {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            compiler: cfg.get("LATEX_COMPILER").unwrap_or_else(|| "pdflatex".into()),
            pdftoppm: cfg.get("PDFTOPPM_BIN").unwrap_or_else(|| "pdftoppm".into()),
            dpi: cfg.get_usize("RASTER_DPI").unwrap_or(300),
        }
    }

    /// Compile `code` in a fresh temporary directory and collect the
    /// transcript and PDF. A failing exit status is not an error here: the
    /// transcript is what the repair loop feeds on.
    // TODO: bound the compiler's runtime; a pathological input can loop in macro expansion.
    pub fn compile(&self, code: &str) -> Result<TikzDocument> {
        let dir = tempfile::tempdir().context("failed to create build directory")?;
        fs::write(dir.path().join(ROOT_FILE), code)?;

        let output = Command::new(&self.compiler)
            .arg("-interaction=nonstopmode")
            .arg("-file-line-error")
            .arg(ROOT_FILE)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {}", self.compiler))?;

        // Prefer the .log file; fall back to captured stdout. Either may
        // contain bytes that are not valid UTF-8.
        let mut log = fs::read(dir.path().join("diagram.log"))
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        if log.is_empty() {
            log = String::from_utf8_lossy(&output.stdout).into_owned();
        }

        let pdf = fs::read(dir.path().join("diagram.pdf")).ok();

        Ok(TikzDocument { code: code.to_string(), log, pdf })
    }

    /// Rasterize the document's PDF to a single PNG at `png_path`.
    pub fn rasterize(&self, doc: &TikzDocument, png_path: &Path) -> Result<()> {
        let pdf = doc.pdf.as_ref().ok_or_else(|| anyhow!("no PDF to rasterize"))?;

        let dir = tempfile::tempdir()?;
        let pdf_path = dir.path().join("diagram.pdf");
        fs::write(&pdf_path, pdf)?;
        let stem = dir.path().join("diagram");

        let status = Command::new(&self.pdftoppm)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-singlefile")
            .arg(&pdf_path)
            .arg(&stem)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run {}", self.pdftoppm))?;
        if !status.success() {
            bail!("{} exited with {}", self.pdftoppm, status);
        }

        if let Some(parent) = png_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // copy, not rename: the temp dir may live on another filesystem
        fs::copy(stem.with_extension("png"), png_path)
            .with_context(|| format!("failed to write {}", png_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_without_pdf_has_no_content() {
        let doc = TikzDocument { code: "x".into(), log: String::new(), pdf: None };
        assert!(!doc.has_content());
        assert!(doc.save_pdf(Path::new("/nonexistent/out.pdf")).is_err());
    }

    #[test]
    fn errors_use_root_file_name() {
        let doc = TikzDocument {
            code: String::new(),
            log: "./diagram.tex:7: Undefined control sequence.\n".into(),
            pdf: None,
        };
        assert!(doc.compiled_with_errors());
        assert_eq!(doc.errors().first_key_value().map(|(k, _)| *k), Some(7));
    }

    #[test]
    fn pdf_presence_means_content() {
        let doc = TikzDocument { code: String::new(), log: String::new(), pdf: Some(vec![1, 2, 3]) };
        assert!(doc.has_content());
        assert!(!doc.compiled_with_errors());
    }
}
