//! Prompt texts for diagram generation and repair continuations.

/// System role for all generation modes.
pub const TIKZ_SYSTEM_ROLE: &str = "You are a TikZ LaTeX diagram generation assistant capable of producing semantically accurate and structurally clear TikZ LaTeX code based on user prompts.";

/// User prompt for a repair attempt: ask the model to continue from the
/// accepted code prefix instead of starting over.
pub fn continuation_request(caption: &str, snippet: &str) -> String {
    format!(
        "Please generate LaTeX code based on the image and description (continue to improve the following code):\n\
         Existing code:\n{snippet}\n\
         Description to be supplemented: {caption}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_embeds_snippet_and_caption() {
        let text = continuation_request("a red circle", "\\documentclass{standalone}\n");
        assert!(text.contains("Existing code:\n\\documentclass{standalone}\n"));
        assert!(text.ends_with("Description to be supplemented: a red circle"));
    }
}
