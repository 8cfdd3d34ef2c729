//! Batch-compile a directory of .tex files into PDFs, PNGs and logs.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::latex::TikzCompiler;
use crate::output::OutputLayout;

pub fn run(tex_dir: &Path, output_root: &Path) -> Result<()> {
    let cfg = Config::load();
    let compiler = TikzCompiler::from_config(&cfg);

    let mut files: Vec<_> = fs::read_dir(tex_dir)
        .with_context(|| format!("failed to read {}", tex_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "tex").unwrap_or(false))
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no .tex files in {}", tex_dir.display());
    }

    let layout = OutputLayout::new(output_root);
    layout.ensure()?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("compiling");

    let mut compiled = 0usize;
    let mut failed = Vec::new();
    for path in &files {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match compile_one(&compiler, &layout, path, &stem) {
            Ok(true) => compiled += 1,
            Ok(false) => failed.push(stem),
            Err(err) => {
                eprintln!("{} {}: {:#}", "error:".red(), path.display(), err);
                failed.push(stem);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("{} of {} documents compiled", compiled.green(), files.len());
    if !failed.is_empty() {
        println!("{} {:?}", "failed:".yellow(), failed);
    }
    Ok(())
}

fn compile_one(
    compiler: &TikzCompiler,
    layout: &OutputLayout,
    path: &Path,
    stem: &str,
) -> Result<bool> {
    let code = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc = compiler.compile(&code)?;

    if doc.pdf.is_some() {
        doc.save_pdf(&layout.pdf_path(stem))?;
        compiler.rasterize(&doc, &layout.png_path(stem))?;
    }
    if doc.compiled_with_errors() {
        doc.save_log(&layout.log_path(stem))?;
    }
    Ok(doc.has_content())
}
