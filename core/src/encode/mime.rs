//! Content type inference for multipart file parts, backed by `mime_guess`.

pub const OCTET_STREAM: &str = "application/octet-stream";

/// The lowercased extension of `file_name` with its leading dot, or an empty
/// string. Dotfiles such as `.env` have no extension.
pub fn extension_of(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(i) => base[i..].to_ascii_lowercase(),
    }
}

/// Look up an extension, with or without its leading dot.
pub fn lookup(extension: &str) -> Option<&'static str> {
    let ext = extension.trim_start_matches('.');
    if ext.is_empty() {
        return None;
    }
    mime_guess::from_ext(ext).first_raw()
}

/// Infer a content type from a file name, falling back to
/// `application/octet-stream`.
pub fn for_file_name(file_name: &str) -> &'static str {
    lookup(&extension_of(file_name)).unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_extensions() {
        assert_eq!(for_file_name("a.png"), "image/png");
        assert_eq!(for_file_name("REPORT.PDF"), "application/pdf");
        assert_eq!(for_file_name("page.html"), "text/html");
        assert_eq!(for_file_name("photo.JPG"), "image/jpeg");
        assert_eq!(for_file_name("blob.qqq"), OCTET_STREAM);
        assert_eq!(for_file_name("Makefile"), OCTET_STREAM);
        assert_eq!(for_file_name(".env"), OCTET_STREAM);
    }

    #[test]
    fn lookup_accepts_either_form() {
        assert_eq!(lookup(".json"), Some("application/json"));
        assert_eq!(lookup("json"), Some("application/json"));
        assert_eq!(lookup(""), None);
        assert_eq!(lookup("."), None);
    }

    #[test]
    fn extension_rules() {
        assert_eq!(extension_of("dir.d/file"), "");
        assert_eq!(extension_of(".env"), "");
        assert_eq!(extension_of("photo.JPG"), ".jpg");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
    }
}
