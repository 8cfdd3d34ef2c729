use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "tikzgen", about = "TikZ diagram generation and evaluation pipeline", version)]
#[command(group(ArgGroup::new("mode").args(["generate", "vision", "compile", "export", "score"]).multiple(false)))]
#[command(group(ArgGroup::new("cache_switch").args(["cache", "no_cache"]).multiple(false)))]
pub struct Cli {
    /// Caption to generate a diagram for (single-shot mode).
    #[arg(value_name = "CAPTION")]
    pub caption: Option<String>,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, default_value_t = 0.7, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Limits highest probable tokens (words).
    #[arg(long = "top-p", default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub top_p: f32,

    /// Maximum tokens generated per model call.
    #[arg(long = "max-tokens", default_value_t = 1024)]
    pub max_tokens: u32,

    /// Batch caption-to-code generation over a dataset.
    #[arg(short = 'g', long)]
    pub generate: bool,

    /// Batch image+caption generation with compile-repair attempts.
    #[arg(short = 'v', long)]
    pub vision: bool,

    /// Compile a directory of .tex files into PDFs and PNGs.
    #[arg(long)]
    pub compile: bool,

    /// Convert a JSONL dataset dump into the on-disk evaluation layout.
    #[arg(long)]
    pub export: bool,

    /// Score generated diagrams: crystalbleu|ter|eed|clipscore|kid.
    #[arg(long)]
    pub score: Option<String>,

    /// Image to condition a single-shot generation on (enables repair).
    #[arg(long)]
    pub image: Option<String>,

    /// Dataset metadata JSON (index/caption/code/image_path records).
    #[arg(short = 'd', long)]
    pub dataset: Option<String>,

    /// Root directory the metadata's image paths are relative to.
    /// Defaults to the metadata file's directory.
    #[arg(long = "images-root")]
    pub images_root: Option<String>,

    /// Output root directory.
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Process only the first N samples.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Maximum generation attempts per sample in repair mode.
    #[arg(long = "max-attempts", default_value_t = 5)]
    pub max_attempts: u32,

    /// Ground-truth directory for --score (.tex or .png files).
    #[arg(long = "ref-dir")]
    pub ref_dir: Option<String>,

    /// Generated-output directory for --score (.tex or .png files).
    #[arg(long = "gen-dir")]
    pub gen_dir: Option<String>,

    /// JSONL dump for --export.
    #[arg(long)]
    pub input: Option<String>,

    /// Directory of .tex files for --compile.
    #[arg(long = "tex-dir")]
    pub tex_dir: Option<String>,

    /// Cache model responses.
    #[arg(long)]
    pub cache: bool,
    /// Disable response caching.
    #[arg(long = "no-cache")]
    pub no_cache: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
