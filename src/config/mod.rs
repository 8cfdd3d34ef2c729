use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .tikzgenrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().flatten() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(self.get("CACHE_PATH").unwrap())
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or TIKZGEN_*/OPENAI_* for forward-compat
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "CACHE_PATH",
        "CACHE_LENGTH",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "METRICS_BASE_URL",
        "LATEX_COMPILER",
        "PDFTOPPM_BIN",
        "RASTER_DPI",
        "OUTPUT_PATH",
    ];

    KEYS.contains(&k) || k.starts_with("TIKZGEN_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("tikzgen").join(".tikzgenrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    // Paths
    let temp = env::temp_dir().join("tikzgen");

    m.insert(
        "CACHE_PATH".into(),
        temp.join("cache").to_string_lossy().into_owned(),
    );

    // Numbers
    m.insert("CACHE_LENGTH".into(), "100".into());
    m.insert("REQUEST_TIMEOUT".into(), "120".into());
    m.insert("RASTER_DPI".into(), "300".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "qwen2.5-coder-7b-instruct".into());
    m.insert("API_BASE_URL".into(), "default".into());
    m.insert("METRICS_BASE_URL".into(), "http://127.0.0.1:8091".into());
    m.insert("LATEX_COMPILER".into(), "pdflatex".into());
    m.insert("PDFTOPPM_BIN".into(), "pdftoppm".into());
    m.insert("OUTPUT_PATH".into(), "output".into());

    m
}
