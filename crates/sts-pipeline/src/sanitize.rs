/// Extension given to every saved image, whatever its actual encoding
pub const IMAGE_EXTENSION: &str = "png";

/// Maps a display name to an image filename.
///
/// The name is lower-cased and everything but ASCII letters, digits and
/// whitespace is dropped (`²` becomes `2` first). Whitespace runs turn into
/// single hyphens. Distinct names may map to the same filename.
pub fn sanitize(display_name: &str) -> String {
    let cleaned = display_name
        .trim()
        .to_lowercase()
        .replace('²', "2")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect::<String>();

    let mut stem = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    stem.push('.');
    stem.push_str(IMAGE_EXTENSION);
    stem
}

/// Inserts `-{n}` before the extension of a sanitized filename
pub fn with_suffix(filename: &str, n: usize) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{filename}-{n}"),
    }
}
