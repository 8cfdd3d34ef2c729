//! Batch caption-to-code generation over a dataset.

use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::cache::RequestCache;
use crate::config::Config;
use crate::dataset::{self, Sample};
use crate::extract::extract_latex;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, Role};
use crate::output::{OutputLayout, SampleRecord};
use crate::prompt;

pub struct GenerateHandler;

impl GenerateHandler {
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        dataset_path: &Path,
        images_root: &Path,
        output_root: &Path,
        model: &str,
        temperature: f32,
        top_p: f32,
        max_tokens: u32,
        limit: Option<usize>,
        caching: bool,
    ) -> Result<()> {
        let cfg = Config::load();
        let client = LlmClient::from_config(&cfg)?;
        let base_url = cfg.get("API_BASE_URL").unwrap_or_else(|| "default".into());
        let req_cache = RequestCache::from_config(&cfg);

        let mut samples = dataset::load_samples(dataset_path, images_root, false)?;
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
        pb.set_message("generating");

        let mut skipped = Vec::new();
        for sample in &samples {
            let result = Self::run_one(
                &client,
                &req_cache,
                &base_url,
                &layout,
                sample,
                &opts,
                caching,
            )
            .await;
            if let Err(err) = result {
                eprintln!("{} sample {}: {:#}", "error:".red(), sample.index, err);
                skipped.push(sample.index);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        println!(
            "generated {} of {} samples into {}",
            (samples.len() - skipped.len()).green(),
            samples.len(),
            output_root.display()
        );
        if !skipped.is_empty() {
            println!("{} {:?}", "skipped samples:".yellow(), skipped);
        }
        Ok(())
    }

    async fn run_one(
        client: &LlmClient,
        req_cache: &RequestCache,
        base_url: &str,
        layout: &OutputLayout,
        sample: &Sample,
        opts: &ChatOptions,
        caching: bool,
    ) -> Result<()> {
        let messages = vec![
            ChatMessage::new(Role::System, prompt::TIKZ_SYSTEM_ROLE),
            ChatMessage::new(Role::User, sample.caption.clone()),
        ];

        let key = req_cache.key_for(base_url, &opts.model, opts.temperature, opts.top_p, &messages);
        let response = match req_cache.get(&key).filter(|_| caching) {
            Some(cached) => cached,
            None => {
                let text = client.complete(messages, opts.clone()).await?;
                if caching && !text.is_empty() {
                    let _ = req_cache.set(&key, &text);
                }
                text
            }
        };

        let latex_code = extract_latex(&response);
        let stem = format!("sample_{}", sample.index);
        layout.write_record(
            &stem,
            &SampleRecord {
                prompt: &sample.caption,
                response: Some(&response),
                latex_code: &latex_code,
                compiled_successfully: None,
                ground_truth: &sample.code,
                attempts: None,
            },
        )?;
        layout.write_tex(&stem, &latex_code)?;
        Ok(())
    }
}
