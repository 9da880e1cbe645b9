//! Site-specific markup patterns.
//!
//! These match the rendered Unity ScriptReference pages byte for byte and are
//! expected to break when the site's markup changes. Each pattern is compiled
//! once; repeated occurrences are walked with `captures_iter`, which never
//! revisits a match.

use std::sync::LazyLock;

use regex::Regex;

/// Body text: tags, punctuation, brackets and newlines, matched lazily.
/// `.*?` alone misses some descriptions, so the class is spelled out.
const EVERYTHING: &str = r#"([_"', <>=/:;}{.\w\-)(\n\r\[\]?]*?)"#;
const LINK: &str = r"([\w.\-]*?)";
const NAME: &str = r"(\w*?)";

/// Section headers on the index page that are layout, not data.
pub const RESERVED_HEADERS: [&str; 5] = [
    "Classes",
    "Interfaces",
    "Enumerations",
    "Attributes",
    "Assemblies",
];

pub static INDEX_REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<h2>Scripting API</h2>(.*)<div class="mCSB_scrollTools" style="position: absolute; display: none;">"#,
    )
    .unwrap()
});

pub static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<span>([\w\-.<>]*?)</span>").unwrap());

pub static STUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"<a href="{}" id="" class="">{}</a>"#, LINK, NAME)).unwrap()
});

pub static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"<h2>Description</h2><p>{}</p>", EVERYTHING)).unwrap()
});

pub static CLASSIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"<p class="cl mb0 left mr10">{}(?: |</p>)"#, NAME)).unwrap()
});

pub static STATIC_PROPERTIES_RE: LazyLock<Regex> =
    LazyLock::new(|| section_pattern("Static Properties"));

pub static STATIC_METHODS_RE: LazyLock<Regex> =
    LazyLock::new(|| section_pattern("Static Methods"));

pub static MEMBER_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"<td class="lbl"><a href="{}">{}</a></td><td class="desc">{}</td>"#,
        LINK, NAME, EVERYTHING
    ))
    .unwrap()
});

// Matches whether or not the block carries `style="display: none;"`:
// the C#/JS toggle only hides it visually.
pub static SIGNATURE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"<div class="signature-CS sig-block"[^>]*>{}</div>"#,
        EVERYTHING
    ))
    .unwrap()
});

pub static SIGNATURE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"<span class="sig-kw">{}</span>"#, EVERYTHING)).unwrap()
});

/// `<div class="subsection"><h2>{title}</h2> ... </div>`
pub fn section_pattern(title: &str) -> Regex {
    Regex::new(&format!(
        r#"<div class="subsection"><h2>{}</h2>{}</div>"#,
        regex::escape(title),
        EVERYTHING
    ))
    .unwrap()
}

/// First capture group of the first match, or `None` when the page lacks it.
pub fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Iterate capture group `group` of every match, in document order.
pub fn all_captures<'a>(
    re: &'a Regex,
    text: &'a str,
    group: usize,
) -> impl Iterator<Item = &'a str> + 'a {
    re.captures_iter(text)
        .filter_map(move |c| c.get(group).map(|m| m.as_str()))
}

pub fn is_reserved_header(text: &str) -> bool {
    RESERVED_HEADERS.contains(&text)
}
