use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn code_block_regex() -> &'static Regex {
    static CODE_BLOCK: OnceLock<Regex> = OnceLock::new();
    CODE_BLOCK.get_or_init(|| Regex::new(r"(?s)```[\s\S]*?```").expect("code block pattern is valid"))
}

/// Escapes raw HTML in markdown post bodies while leaving fenced code
/// blocks (```) untouched. Existing entities are normalized first so
/// saving the same body twice does not double-escape it.
pub fn sanitize_markdown_content(markdown_input: &str) -> String {
    let mut code_blocks: Vec<String> = Vec::new();
    // Per-call token, so body text can never match a placeholder.
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let placeholder = |i: usize| format!("\u{0}code-{}-{}\u{0}", nonce, i);

    let with_placeholders = code_block_regex().replace_all(markdown_input, |caps: &regex::Captures| {
        code_blocks.push(caps[0].to_string());
        placeholder(code_blocks.len() - 1)
    });

    let decoded = html_escape::decode_html_entities(&with_placeholders);
    let mut output = html_escape::encode_text(&decoded).to_string();

    for (i, block) in code_blocks.iter().enumerate() {
        output = output.replacen(&placeholder(i), block, 1);
    }

    output
}

/// Strips every HTML tag and returns plain text (titles, names, comments).
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();
    // ammonia re-encodes `&`, `<` and friends; the stored value is plain text.
    html_escape::decode_html_entities(&cleaned).trim().to_string()
}

/// Trims and strips an optional field, mapping blank input to `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(strip_all_html)
        .filter(|s| !s.is_empty())
}
