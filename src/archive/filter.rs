//! Which archive entries become pages.

/// Extensions accepted as page images. Compared case-sensitively.
pub const VALID_PAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Extension of the final path component, from its last `.` inclusive.
///
/// Returns `""` when there is no dot. A leading dot counts, so `.png` has
/// extension `.png`.
pub fn file_extension(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

pub fn is_valid_page(name: &str) -> bool {
    VALID_PAGE_EXTENSIONS.contains(&file_extension(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allowed_extensions() {
        assert!(is_valid_page("1.jpg"));
        assert!(is_valid_page("02.jpeg"));
        assert!(is_valid_page("cover.png"));
        assert!(is_valid_page("nested/dir/3.png"));
    }

    #[test]
    fn test_rejects_other_extensions() {
        assert!(!is_valid_page("readme.txt"));
        assert!(!is_valid_page("anim.gif"));
        assert!(!is_valid_page("archive.jpg.zip"));
        assert!(!is_valid_page("noext"));
        assert!(!is_valid_page("dir.png/noext"));
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        assert!(!is_valid_page("1.JPG"));
        assert!(!is_valid_page("2.Png"));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a/b/c.tar.gz"), ".gz");
        assert_eq!(file_extension("plain"), "");
        assert_eq!(file_extension(".png"), ".png");
    }
}
