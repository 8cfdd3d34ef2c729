//! Generate-and-repair loop.
//!
//! Each attempt asks the model to continue from the code prefix accepted so
//! far, compiles the result, and on failure truncates the code just above the
//! first reported error line before trying again. The truncation offset backs
//! off multiplicatively while the same error line keeps recurring and resets
//! once the error moves.

use anyhow::Result;

use crate::extract::extract_latex;
use crate::latex::{TikzCompiler, TikzDocument};
use crate::llm::{ChatMessage, ChatOptions, ContentPart, LlmClient, Role};
use crate::prompt;

/// Truncation offset ceiling, in lines.
pub const MAX_OFFSET: u32 = 4096;

/// Code generation capability: produce a LaTeX continuation for `caption`
/// given the accepted code prefix `snippet`.
#[allow(async_fn_in_trait)]
pub trait Generate {
    async fn generate(&self, caption: &str, snippet: &str) -> Result<String>;
}

/// Compilation capability. Compiler diagnostics live in the returned
/// document; `Err` is reserved for infrastructure failures.
pub trait Compile {
    fn compile(&self, code: &str) -> Result<TikzDocument>;
}

impl Compile for TikzCompiler {
    fn compile(&self, code: &str) -> Result<TikzDocument> {
        TikzCompiler::compile(self, code)
    }
}

/// One generate-compile round, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub code: String,
    pub compiled: bool,
    pub log: String,
}

#[derive(Debug)]
pub struct RepairOutcome {
    /// `Some` on success, or when no parseable error was left to steer the
    /// truncation (the document may still be broken). `None` when every
    /// attempt failed.
    pub document: Option<TikzDocument>,
    pub attempts: Vec<Attempt>,
}

impl RepairOutcome {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn compiled_successfully(&self) -> bool {
        self.document.as_ref().map(|d| d.has_content()).unwrap_or(false)
    }
}

pub async fn generate_and_repair<G: Generate, C: Compile>(
    generator: &G,
    compiler: &C,
    caption: &str,
    max_attempts: u32,
) -> Result<RepairOutcome> {
    let mut attempts = Vec::new();
    let mut snippet = String::new();
    let mut offset: u32 = 1;
    let mut prev_first_error: Option<u32> = None;

    for attempt in 1..=max_attempts {
        let continuation = generator.generate(caption, &snippet).await?;
        let full_code = format!("{snippet}{continuation}");
        let doc = compiler.compile(&full_code)?;
        attempts.push(Attempt {
            code: doc.code.clone(),
            compiled: doc.has_content(),
            log: doc.log.clone(),
        });

        if doc.has_content() {
            return Ok(RepairOutcome { document: Some(doc), attempts });
        }
        if attempt == max_attempts {
            break;
        }

        let errors = doc.errors();
        let Some((&first_error, _)) = errors.first_key_value() else {
            // Nothing left to steer the truncation: hand the document back
            // as-is rather than regenerating blindly.
            return Ok(RepairOutcome { document: Some(doc), attempts });
        };

        offset = if prev_first_error == Some(first_error) { escalate(offset) } else { 1 };
        prev_first_error = Some(first_error);

        let keep = (first_error as usize).saturating_sub(offset as usize);
        snippet = take_lines(&full_code, keep);
    }

    Ok(RepairOutcome { document: None, attempts })
}

fn escalate(offset: u32) -> u32 {
    (offset * 4).min(MAX_OFFSET)
}

/// First `keep` lines of `code`, line endings preserved.
fn take_lines(code: &str, keep: usize) -> String {
    code.split_inclusive('\n').take(keep).collect()
}

/// Production [`Generate`] impl: one multimodal chat request per attempt, the
/// LaTeX fragment extracted from the raw response.
pub struct LlmGenerator<'a> {
    client: &'a LlmClient,
    opts: ChatOptions,
    image: Option<ContentPart>,
}

impl<'a> LlmGenerator<'a> {
    pub fn new(client: &'a LlmClient, opts: ChatOptions, image: Option<ContentPart>) -> Self {
        Self { client, opts, image }
    }
}

impl Generate for LlmGenerator<'_> {
    async fn generate(&self, caption: &str, snippet: &str) -> Result<String> {
        let request = prompt::continuation_request(caption, snippet);
        let mut parts = Vec::new();
        if let Some(image) = &self.image {
            parts.push(image.clone());
        }
        parts.push(ContentPart::text(request));

        let messages = vec![
            ChatMessage::new(Role::System, prompt::TIKZ_SYSTEM_ROLE),
            ChatMessage::multimodal(Role::User, parts),
        ];
        let response = self.client.complete(messages, self.opts.clone()).await?;
        Ok(extract_latex(&response))
    }
}
