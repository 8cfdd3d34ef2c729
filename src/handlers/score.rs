//! Score generated diagrams against ground truth via the metrics service.
//!
//! Pairing happens here; the metric math is external. Text metrics pair
//! `.tex` files by shared filename, image metrics pair PNGs by the trailing
//! sample index in the filename (`test_12.png` vs `sample_img_12.png`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use owo_colors::OwoColorize;
use regex::Regex;
use serde_json::{json, Value};

use crate::config::Config;
use crate::dataset;
use crate::external::metrics::MetricsClient;

pub struct ScoreHandler;

impl ScoreHandler {
    pub async fn run(
        metric: &str,
        ref_dir: Option<&Path>,
        gen_dir: Option<&Path>,
        dataset_path: Option<&Path>,
    ) -> Result<()> {
        let cfg = Config::load();
        let client = MetricsClient::from_config(&cfg)?;

        match metric {
            "ter" | "crystalbleu" => {
                let (ref_dir, gen_dir) = require_dirs(ref_dir, gen_dir)?;
                let pairs = pair_tex_files(ref_dir, gen_dir)?;
                println!("scoring {} with {} pairs", metric, pairs.len());

                let references: Vec<Vec<&str>> =
                    pairs.iter().map(|(r, _)| vec![r.as_str()]).collect();
                let predictions: Vec<&str> = pairs.iter().map(|(_, p)| p.as_str()).collect();
                let result = client.score(metric, json!(references), json!(predictions)).await?;
                println!("{} {}", format!("{metric}:").green(), result);
            }
            "eed" => {
                let (ref_dir, gen_dir) = require_dirs(ref_dir, gen_dir)?;
                let pairs = pair_tex_files(ref_dir, gen_dir)?;
                println!("scoring eed with {} pairs", pairs.len());

                let mut sum = 0f64;
                let mut count = 0usize;
                for (reference, prediction) in &pairs {
                    let result = client
                        .score("eed", json!([[reference]]), json!([prediction]))
                        .await?;
                    if let Some(score) = scalar_score(&result, "EED") {
                        sum += score;
                        count += 1;
                    }
                }
                if count == 0 {
                    bail!("no valid eed scores returned");
                }
                println!("{} {}", "average eed:".green(), sum / count as f64);
            }
            "clipscore" => {
                let gen_dir = gen_dir
                    .ok_or_else(|| anyhow::anyhow!("--score clipscore requires --gen-dir"))?;
                let dataset_path = dataset_path
                    .ok_or_else(|| anyhow::anyhow!("--score clipscore requires --dataset"))?;

                let captions: BTreeMap<usize, String> = dataset::load_metadata(dataset_path)?
                    .into_iter()
                    .map(|r| (r.index, r.caption))
                    .collect();
                let images = indexed_pngs(gen_dir)?;

                let mut references = Vec::new();
                let mut predictions = Vec::new();
                for (idx, path) in &images {
                    if let Some(caption) = captions.get(idx) {
                        references.push(caption.clone());
                        predictions.push(png_base64(path)?);
                    }
                }
                if references.is_empty() {
                    bail!("no generated image matches a dataset caption");
                }
                println!("scoring clipscore with {} caption/image pairs", references.len());
                let result = client
                    .score("clipscore", json!(references), json!(predictions))
                    .await?;
                println!("{} {}", "clipscore:".green(), result);
            }
            "kid" => {
                let (ref_dir, gen_dir) = require_dirs(ref_dir, gen_dir)?;
                let pairs = pair_pngs(ref_dir, gen_dir)?;
                println!("scoring kid with {} image pairs", pairs.len());

                let mut references = Vec::new();
                let mut predictions = Vec::new();
                for (reference, prediction) in &pairs {
                    references.push(png_base64(reference)?);
                    predictions.push(png_base64(prediction)?);
                }
                let result = client.score("kid", json!(references), json!(predictions)).await?;
                println!("{} {}", "kid:".green(), result);
            }
            other => bail!("unknown metric: {other} (expected crystalbleu|ter|eed|clipscore|kid)"),
        }
        Ok(())
    }
}

fn require_dirs<'a>(
    ref_dir: Option<&'a Path>,
    gen_dir: Option<&'a Path>,
) -> Result<(&'a Path, &'a Path)> {
    match (ref_dir, gen_dir) {
        (Some(r), Some(g)) => Ok((r, g)),
        _ => bail!("--score requires --ref-dir and --gen-dir"),
    }
}

/// (reference content, prediction content) for every `.tex` filename present
/// in both directories, in filename order.
fn pair_tex_files(ref_dir: &Path, gen_dir: &Path) -> Result<Vec<(String, String)>> {
    let mut names: Vec<String> = list_files(ref_dir, "tex")?
        .into_iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();

    let mut pairs = Vec::new();
    for name in names {
        let gen_path = gen_dir.join(&name);
        if !gen_path.is_file() {
            continue;
        }
        let reference = fs::read_to_string(ref_dir.join(&name))?;
        let prediction = fs::read_to_string(&gen_path)?;
        pairs.push((reference, prediction));
    }
    if pairs.is_empty() {
        bail!(
            "no .tex filename occurs in both {} and {}",
            ref_dir.display(),
            gen_dir.display()
        );
    }
    Ok(pairs)
}

/// PNG pairs matched by the trailing sample index, in index order.
fn pair_pngs(ref_dir: &Path, gen_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let references: BTreeMap<usize, PathBuf> = indexed_pngs(ref_dir)?.into_iter().collect();
    let generated: BTreeMap<usize, PathBuf> = indexed_pngs(gen_dir)?.into_iter().collect();

    let pairs: Vec<(PathBuf, PathBuf)> = references
        .into_iter()
        .filter_map(|(idx, r)| generated.get(&idx).map(|g| (r, g.clone())))
        .collect();
    if pairs.is_empty() {
        bail!(
            "no sample index occurs in both {} and {}",
            ref_dir.display(),
            gen_dir.display()
        );
    }
    Ok(pairs)
}

fn indexed_pngs(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let mut out: Vec<(usize, PathBuf)> = list_files(dir, "png")?
        .into_iter()
        .filter_map(|p| {
            let idx = p.file_name().and_then(|n| sample_index(&n.to_string_lossy()))?;
            Some((idx, p))
        })
        .collect();
    out.sort_by_key(|(idx, _)| *idx);
    Ok(out)
}

static INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.png$").expect("index pattern"));

/// Trailing sample index of a PNG filename (`sample_img_12.png` -> 12).
fn sample_index(name: &str) -> Option<usize> {
    INDEX_RE.captures(name).and_then(|c| c[1].parse().ok())
}

fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    Ok(fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == ext).unwrap_or(false))
        .collect())
}

fn png_base64(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

/// Pull a scalar out of a metric response: either a bare number or an object
/// keyed by the metric name (e.g. `{"EED": 0.42}`) or `"score"`.
fn scalar_score(value: &Value, key: &str) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.get(key).and_then(Value::as_f64))
        .or_else(|| value.get("score").and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_index_takes_trailing_digits() {
        assert_eq!(sample_index("sample_img_12.png"), Some(12));
        assert_eq!(sample_index("test_0.png"), Some(0));
        assert_eq!(sample_index("cover.png"), None);
        assert_eq!(sample_index("sample_3.jpg"), None);
    }

    #[test]
    fn tex_pairing_uses_filename_intersection() {
        let refs = tempfile::tempdir().unwrap();
        let gens = tempfile::tempdir().unwrap();
        fs::write(refs.path().join("sample_0.tex"), "ref0").unwrap();
        fs::write(refs.path().join("sample_1.tex"), "ref1").unwrap();
        fs::write(gens.path().join("sample_1.tex"), "gen1").unwrap();
        fs::write(gens.path().join("sample_2.tex"), "gen2").unwrap();

        let pairs = pair_tex_files(refs.path(), gens.path()).unwrap();
        assert_eq!(pairs, vec![("ref1".to_string(), "gen1".to_string())]);
    }

    #[test]
    fn png_pairing_matches_differing_name_schemes() {
        let refs = tempfile::tempdir().unwrap();
        let gens = tempfile::tempdir().unwrap();
        fs::write(refs.path().join("test_0.png"), "a").unwrap();
        fs::write(refs.path().join("test_5.png"), "b").unwrap();
        fs::write(gens.path().join("sample_img_5.png"), "c").unwrap();

        let pairs = pair_pngs(refs.path(), gens.path()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0.ends_with("test_5.png"));
        assert!(pairs[0].1.ends_with("sample_img_5.png"));
    }

    #[test]
    fn scalar_score_accepts_number_or_keyed_object() {
        assert_eq!(scalar_score(&json!(0.5), "EED"), Some(0.5));
        assert_eq!(scalar_score(&json!({"EED": 0.25}), "EED"), Some(0.25));
        assert_eq!(scalar_score(&json!({"score": 1.0}), "EED"), Some(1.0));
        assert_eq!(scalar_score(&json!({"other": 1.0}), "EED"), None);
    }
}
