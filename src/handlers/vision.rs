//! Batch image+caption generation with compile-repair attempts.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::dataset::{self, Sample};
use crate::latex::TikzCompiler;
use crate::llm::{ChatOptions, ContentPart, LlmClient};
use crate::output::{OutputLayout, SampleRecord};
use crate::repair::{generate_and_repair, LlmGenerator};

pub struct VisionHandler;

impl VisionHandler {
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        dataset_path: &Path,
        images_root: &Path,
        output_root: &Path,
        model: &str,
        temperature: f32,
        top_p: f32,
        max_tokens: u32,
        max_attempts: u32,
        limit: Option<usize>,
    ) -> Result<()> {
        let cfg = Config::load();
        let client = LlmClient::from_config(&cfg)?;
        let compiler = TikzCompiler::from_config(&cfg);

        let mut samples = dataset::load_samples(dataset_path, images_root, true)?;
        if let Some(n) = limit {
            samples.truncate(n);
        }

        let layout = OutputLayout::new(output_root);
        layout.ensure()?;

        let opts = ChatOptions {
            model: model.to_string(),
            temperature,
            top_p,
            max_tokens,
        };

        let pb = ProgressBar::new(samples.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("repairing");

        let mut skipped = Vec::new();
        let mut compiled = 0usize;
        for sample in &samples {
            match Self::run_one(&client, &compiler, &layout, sample, &opts, max_attempts).await {
                Ok(true) => compiled += 1,
                Ok(false) => {}
                Err(err) => {
                    eprintln!("{} sample {}: {:#}", "error:".red(), sample.index, err);
                    skipped.push(sample.index);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        println!(
            "{} of {} samples compiled, artifacts in {}",
            compiled.green(),
            samples.len(),
            output_root.display()
        );
        if !skipped.is_empty() {
            println!("{} {:?}", "skipped samples:".yellow(), skipped);
        }
        Ok(())
    }

    /// Returns whether the sample's final document compiled. A sample with no
    /// document at all is an error so the caller records it as skipped.
    async fn run_one(
        client: &LlmClient,
        compiler: &TikzCompiler,
        layout: &OutputLayout,
        sample: &Sample,
        opts: &ChatOptions,
        max_attempts: u32,
    ) -> Result<bool> {
        let Some(image_path) = sample.image_path.as_deref() else {
            bail!("sample has no image");
        };
        let image = fs::read(image_path)
            .with_context(|| format!("failed to read {}", image_path.display()))?;

        let generator =
            LlmGenerator::new(client, opts.clone(), Some(ContentPart::image_png(&image)));
        let outcome = generate_and_repair(&generator, compiler, &sample.caption, max_attempts).await?;

        let stem = format!("sample_img_{}", sample.index);
        let code = outcome.document.as_ref().map(|d| d.code.as_str()).unwrap_or("");
        layout.write_record(
            &stem,
            &SampleRecord {
                prompt: &sample.caption,
                response: None,
                latex_code: code,
                compiled_successfully: Some(outcome.compiled_successfully()),
                ground_truth: &sample.code,
                attempts: Some(outcome.attempt_count()),
            },
        )?;

        let Some(doc) = &outcome.document else {
            // keep the last transcript around for post-mortems
            if let Some(last) = outcome.attempts.last() {
                fs::write(layout.log_path(&stem), &last.log)?;
            }
            bail!("no document after {} attempts", max_attempts);
        };

        layout.write_tex(&stem, &doc.code)?;
        if doc.pdf.is_some() {
            doc.save_pdf(&layout.pdf_path(&stem))?;
            compiler.rasterize(doc, &layout.png_path(&stem))?;
        }
        if doc.compiled_with_errors() {
            doc.save_log(&layout.log_path(&stem))?;
        }
        Ok(doc.has_content())
    }
}
