use alloc::format;
use alloc::string::String;
use time::OffsetDateTime;

/// Used when a label has no alphanumeric characters at all.
pub const SLUG_PLACEHOLDER: &str = "lift";

/// Lowercase ASCII alphanumeric runs of `label` joined by single hyphens.
pub fn slugify(label: &str) -> String {
    let mut slug = String::new();
    let mut gap = false;
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }
    if slug.is_empty() {
        slug.push_str(SLUG_PLACEHOLDER);
    }
    slug
}

/// `DD-MM-YYYY-HH-MM-SS-<slug>-<suffix>`.
pub fn generate_session_id(
    at: OffsetDateTime,
    lift: &str,
    suffix: &str,
) -> String {
    format!(
        "{:02}-{:02}-{:04}-{:02}-{:02}-{:02}-{}-{}",
        at.day(),
        at.month() as u8,
        at.year(),
        at.hour(),
        at.minute(),
        at.second(),
        slugify(lift),
        suffix
    )
}
