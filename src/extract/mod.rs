//! LaTeX fragment extraction from raw model responses.
//!
//! Models wrap code in prose, markdown fences, or nothing at all. Patterns are
//! tried in order from most to least specific; the first match wins. If none
//! match, the trimmed raw response is used as-is.

use once_cell::sync::Lazy;
use regex::Regex;

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)```(?:latex|tex)?\s*(.*?)\s*```",
        r"(?is)(\\documentclass\{standalone\}.*?\\end\{document\})",
        r"(?is)(\\documentclass\{article\}.*?\\end\{document\})",
        r"(?is)(\\begin\{document\}.*?\\end\{document\})",
        r"(?is)(\\begin\{tikzpicture\}.*?\\end\{tikzpicture\})",
        r"(?is)(\\documentclass.*?\\end\{document\})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("extraction pattern"))
    .collect()
});

pub fn extract_latex(response: &str) -> String {
    for re in PATTERNS.iter() {
        if let Some(caps) = re.captures(response) {
            if let Some(m) = caps.get(1) {
                return m.as_str().trim().to_string();
            }
        }
    }
    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_wins_over_bare_tikzpicture() {
        let response = "\\begin{tikzpicture}\\draw (0,0);\\end{tikzpicture}\n\
                        Here it is properly:\n```latex\n\\documentclass{standalone}\n\\begin{document}x\\end{document}\n```";
        let code = extract_latex(response);
        assert!(code.starts_with("\\documentclass{standalone}"));
        assert!(code.ends_with("\\end{document}"));
    }

    #[test]
    fn fenced_block_without_language_tag() {
        let response = "Sure!\n```\n\\begin{tikzpicture}\n\\draw (0,0) -- (1,1);\n\\end{tikzpicture}\n```\nDone.";
        assert_eq!(
            extract_latex(response),
            "\\begin{tikzpicture}\n\\draw (0,0) -- (1,1);\n\\end{tikzpicture}"
        );
    }

    #[test]
    fn standalone_document_matched_in_prose() {
        let response = "The diagram:\n\\documentclass{standalone}\n\\usepackage{tikz}\n\\begin{document}\n\\end{document}\nHope that helps.";
        let code = extract_latex(response);
        assert!(code.starts_with("\\documentclass{standalone}"));
        assert!(!code.contains("Hope"));
    }

    #[test]
    fn document_body_before_bare_tikzpicture() {
        let response = "\\begin{document}\n\\begin{tikzpicture}\\end{tikzpicture}\n\\end{document}";
        let code = extract_latex(response);
        assert!(code.starts_with("\\begin{document}"));
    }

    #[test]
    fn bare_tikzpicture_matched_when_nothing_else() {
        let response = "here: \\begin{tikzpicture}\\node {a};\\end{tikzpicture} ok?";
        assert_eq!(extract_latex(response), "\\begin{tikzpicture}\\node {a};\\end{tikzpicture}");
    }

    #[test]
    fn generic_documentclass_span_as_last_pattern() {
        let response = "\\documentclass[tikz]{beamer}\nstuff\n\\end{document}";
        let code = extract_latex(response);
        assert!(code.starts_with("\\documentclass[tikz]{beamer}"));
    }

    #[test]
    fn falls_back_to_trimmed_raw_response() {
        assert_eq!(extract_latex("  no latex here \n"), "no latex here");
    }
}
