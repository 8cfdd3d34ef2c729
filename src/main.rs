mod cache;
mod cli;
mod config;
mod dataset;
mod extract;
mod external;
mod handlers;
mod latex;
mod llm;
mod output;
mod prompt;
mod repair;

use anyhow::{bail, Result};
use config::Config;
use is_terminal::IsTerminal;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Load config
    let cfg = Config::load();

    // Resolve model: CLI overrides config; fall back to DEFAULT_MODEL
    let effective_model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "qwen2.5-coder-7b-instruct".to_string());

    // stdin handling (pipe support for single-shot captions)
    let mut caption_from_stdin = String::new();
    if !io::stdin().is_terminal() {
        io::stdin().read_to_string(&mut caption_from_stdin)?;
    }

    // Resolve caption: stdin + optional positional
    let arg_caption = args.caption.clone().unwrap_or_default();
    let stdin_caption = caption_from_stdin.trim();
    let caption = if !stdin_caption.is_empty() && !arg_caption.is_empty() {
        format!("{}\n\n{}", stdin_caption, arg_caption)
    } else if !stdin_caption.is_empty() {
        stdin_caption.to_string()
    } else {
        arg_caption
    };

    let caching = if args.no_cache {
        false
    } else if args.cache {
        true
    } else {
        true // default enabled
    };

    let output_root = args
        .output
        .clone()
        .or_else(|| cfg.get("OUTPUT_PATH"))
        .unwrap_or_else(|| "output".to_string());
    let output_root = PathBuf::from(output_root);

    // Route to handler
    if args.export {
        let Some(input) = args.input.as_deref() else {
            bail!("--export requires --input <dump.jsonl>");
        };
        return handlers::export::run(Path::new(input), &output_root);
    }
    if args.compile {
        let Some(tex_dir) = args.tex_dir.as_deref() else {
            bail!("--compile requires --tex-dir <dir>");
        };
        return handlers::compile::run(Path::new(tex_dir), &output_root);
    }
    if let Some(metric) = args.score.as_deref() {
        return handlers::score::ScoreHandler::run(
            metric,
            args.ref_dir.as_deref().map(Path::new),
            args.gen_dir.as_deref().map(Path::new),
            args.dataset.as_deref().map(Path::new),
        )
        .await;
    }

    if args.generate || args.vision {
        let Some(dataset) = args.dataset.as_deref() else {
            bail!("--generate/--vision require --dataset <metadata.json>");
        };
        let dataset = PathBuf::from(dataset);
        let images_root = args
            .images_root
            .as_deref()
            .map(PathBuf::from)
            .or_else(|| dataset.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        if args.vision {
            return handlers::vision::VisionHandler::run(
                &dataset,
                &images_root,
                &output_root,
                &effective_model,
                args.temperature,
                args.top_p,
                args.max_tokens,
                args.max_attempts,
                args.limit,
            )
            .await;
        }
        return handlers::generate::GenerateHandler::run(
            &dataset,
            &images_root,
            &output_root,
            &effective_model,
            args.temperature,
            args.top_p,
            args.max_tokens,
            args.limit,
            caching,
        )
        .await;
    }

    // Single-shot: caption (and optionally an image) in, code on stdout
    if caption.trim().is_empty() {
        bail!("Provide a caption argument or pipe one via stdin");
    }
    handlers::single::run(
        &caption,
        args.image.as_deref(),
        &effective_model,
        args.temperature,
        args.top_p,
        args.max_tokens,
        args.max_attempts,
    )
    .await
}
