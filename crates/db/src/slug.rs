//! Public slugs.

use rslug::slugify;

/// Longest slug produced, in bytes.
pub const MAX_SLUG_LENGTH: usize = 200;

// Various quotation marks: '"''""„"`«»‹›
const QUOTATION_MARKS: [char; 13] = [
    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}', '\u{0060}',
    '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
];

/// Converts a title into a URL-safe slug.
///
/// Quotation marks are dropped rather than turned into separators, so
/// `Don't Panic` becomes `dont-panic`. Returns an empty string when nothing
/// URL-safe is left.
pub fn sanitize(title: impl AsRef<str>) -> String {
    let stripped: String = title.as_ref().chars().filter(|c| !QUOTATION_MARKS.contains(c)).collect();
    let slug = slugify!(&stripped);
    let slug = &slug[..slug.floor_char_boundary(MAX_SLUG_LENGTH)];
    slug.trim_matches('-').to_string()
}

/// Appends a numeric suffix to `base`.
pub(crate) fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{n}");
    let cut = base.floor_char_boundary(MAX_SLUG_LENGTH.saturating_sub(suffix.len()));
    format!("{}{suffix}", base[..cut].trim_end_matches('-'))
}
