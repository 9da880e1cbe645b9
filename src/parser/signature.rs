use super::patterns::{all_captures, SIGNATURE_BLOCK_RE, SIGNATURE_KEYWORD_RE};
use crate::model::{Member, Signature};

/// One signature per C# signature block (overloads included), hidden or not.
pub fn extract(html: &str, method: &Member) -> Vec<Signature> {
    all_captures(&SIGNATURE_BLOCK_RE, html, 1)
        .map(|block| Signature::for_method(method, &build_snippet(&parameter_types(block))))
        .collect()
}

/// Keyword spans of a block, minus the first (the method's own name).
pub fn parameter_types(block: &str) -> Vec<&str> {
    all_captures(&SIGNATURE_KEYWORD_RE, block, 1).skip(1).collect()
}

/// `["A", "B"]` → `(${1:A}, ${2:B})`
pub fn build_snippet(params: &[&str]) -> String {
    let placeholders: Vec<String> = params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("${{{}:{}}}", i + 1, p))
        .collect();
    format!("({})", placeholders.join(", "))
}
