//! Compiler transcript parsing.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

static FATAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Emergency stop|Fatal error").expect("fatal pattern"));

/// Collect `<rootfile>:<line>: <message>` errors from a compiler transcript,
/// keyed by line number. The `-file-line-error` format prefixes the root file
/// with `./` in most engines; both forms are accepted.
///
/// If no line-tagged error is present but the transcript reports an emergency
/// stop or fatal error, the failure is attributed to line 0.
pub fn parse_errors(log: &str, rootfile: &str) -> BTreeMap<u32, String> {
    let pattern = format!(r"(?m)^(?:\./)?{}:(\d+):[ \t]*(.*)$", regex::escape(rootfile));
    let re = Regex::new(&pattern).expect("log pattern");

    let mut errors = BTreeMap::new();
    for caps in re.captures_iter(log) {
        if let Ok(line) = caps[1].parse::<u32>() {
            errors.entry(line).or_insert_with(|| caps[2].trim().to_string());
        }
    }

    if errors.is_empty() && FATAL.is_match(log) {
        errors.insert(0, "fatal error during compilation".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "diagram.tex";

    #[test]
    fn parses_file_line_error_format() {
        let log = "This is pdfTeX\n./diagram.tex:5: Undefined control sequence.\nl.5 \\foo\n";
        let errors = parse_errors(log, ROOT);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[&5], "Undefined control sequence.");
    }

    #[test]
    fn accepts_missing_dot_slash_prefix() {
        let log = "diagram.tex:12: Missing $ inserted.\n";
        let errors = parse_errors(log, ROOT);
        assert_eq!(errors[&12], "Missing $ inserted.");
    }

    #[test]
    fn earliest_line_is_first_key() {
        let log = "./diagram.tex:9: second\n./diagram.tex:3: first\n";
        let errors = parse_errors(log, ROOT);
        assert_eq!(errors.first_key_value(), Some((&3, &"first".to_string())));
    }

    #[test]
    fn fatal_error_reported_at_line_zero() {
        let log = "! Emergency stop.\n<*> diagram.tex\n";
        let errors = parse_errors(log, ROOT);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key(&0));
    }

    #[test]
    fn other_files_do_not_match() {
        let log = "./tikz.sty:40: some internal note\n";
        assert!(parse_errors(log, ROOT).is_empty());
    }

    #[test]
    fn clean_log_yields_no_errors() {
        let log = "Output written on diagram.pdf (1 page).\n";
        assert!(parse_errors(log, ROOT).is_empty());
    }
}
