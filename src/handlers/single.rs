//! Single-shot mode: one caption (optionally one image) in, code on stdout.

use std::fs;

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::extract::extract_latex;
use crate::latex::TikzCompiler;
use crate::llm::{ChatMessage, ChatOptions, ContentPart, LlmClient, Role};
use crate::prompt;
use crate::repair::{generate_and_repair, LlmGenerator};

pub async fn run(
    caption: &str,
    image: Option<&str>,
    model: &str,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    max_attempts: u32,
) -> Result<()> {
    let cfg = Config::load();
    let client = LlmClient::from_config(&cfg)?;
    let opts = ChatOptions {
        model: model.to_string(),
        temperature,
        top_p,
        max_tokens,
    };

    match image {
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read image {}", path))?;
            let generator =
                LlmGenerator::new(&client, opts, Some(ContentPart::image_png(&bytes)));
            let compiler = TikzCompiler::from_config(&cfg);

            let outcome = generate_and_repair(&generator, &compiler, caption, max_attempts).await?;
            match outcome.document {
                Some(doc) => {
                    println!("{}", doc.code);
                    if !doc.has_content() {
                        eprintln!(
                            "{} code did not compile after {} attempts",
                            "warning:".yellow(),
                            outcome.attempts.len()
                        );
                    }
                }
                None => bail!("no document after {} attempts", max_attempts),
            }
        }
        None => {
            let messages = vec![
                ChatMessage::new(Role::System, prompt::TIKZ_SYSTEM_ROLE),
                ChatMessage::new(Role::User, caption.to_string()),
            ];
            let response = client.complete(messages, opts).await?;
            println!("{}", extract_latex(&response));
        }
    }
    Ok(())
}
