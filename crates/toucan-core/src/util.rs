// crates/toucan-core/src/util.rs
//
// Small pure-function helpers shared by the compiler and the timeline
// wrapper: URL scheme splitting and sequence filename formatting. Nothing
// here touches the filesystem — opening the resulting path is a
// `toucan-media` concern.

/// Splits a `target_url` into (scheme, rest). A url with no `://` has no
/// scheme and is returned as a plain path with an empty scheme string.
pub fn split_url_protocol(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(idx) => (&url[..idx], &url[idx + 3..]),
        None => ("", url),
    }
}

/// Given a sequence's name prefix/suffix and a frame number, formats the
/// filename for that frame with `padding` zero-padded digits (0 means no
/// padding, just the frame number as-is).
pub fn format_sequence_frame(name_prefix: &str, frame: i64, padding: usize, name_suffix: &str) -> String {
    if padding == 0 {
        format!("{name_prefix}{frame}{name_suffix}")
    } else {
        format!("{name_prefix}{frame:0padding$}{name_suffix}")
    }
}

/// Splits a filename like `render.0042.exr` into (`render.`, `0042`,
/// `.exr`), the inverse of `format_sequence_frame`. Returns `None` if no
/// run of digits is found.
pub fn split_file_name_number(name: &str) -> Option<(&str, &str, &str)> {
    let digit_start = name.find(|c: char| c.is_ascii_digit())?;
    let digit_end = name[digit_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| digit_start + i)
        .unwrap_or(name.len());
    Some((&name[..digit_start], &name[digit_start..digit_end], &name[digit_end..]))
}

/// Zero-padding width implied by a digit run, e.g. "0042" -> 4.
pub fn number_padding(digits: &str) -> usize {
    digits.len()
}

/// Nearest-neighbor fit ratio that scales `(src_w, src_h)` to fit entirely
/// within `(dst_w, dst_h)` while preserving aspect ratio.
pub fn fit(src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> f64 {
    if src_w == 0 || src_h == 0 {
        return 1.0;
    }
    let sx = dst_w as f64 / src_w as f64;
    let sy = dst_h as f64 / src_h as f64;
    sx.min(sy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_scheme_and_path() {
        assert_eq!(split_url_protocol("file:///a/b.mov"), ("file", "/a/b.mov"));
        assert_eq!(split_url_protocol("/a/b.mov"), ("", "/a/b.mov"));
    }

    #[test]
    fn formats_and_splits_sequence_frame_roundtrip() {
        let name = format_sequence_frame("render.", 42, 4, ".exr");
        assert_eq!(name, "render.0042.exr");
        let (prefix, digits, suffix) = split_file_name_number(&name).unwrap();
        assert_eq!(prefix, "render.");
        assert_eq!(digits, "0042");
        assert_eq!(suffix, ".exr");
        assert_eq!(number_padding(digits), 4);
    }

    #[test]
    fn fit_preserves_aspect_and_bounds() {
        let scale = fit(100, 50, 200, 200);
        assert!((scale - 2.0).abs() < 1e-9);
    }
}
