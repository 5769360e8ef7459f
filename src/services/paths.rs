// file: URL and path helpers

use super::ShellError;

pub const FILE_SCHEME_PREFIX: &str = "file:///";

/// Name the platform stylesheet is shipped under.
pub const PLATFORM_DEFAULT_CSS: &str = "platformdefault.css";

/// Turn an absolute path into a `file:///` URL.
pub fn path_to_url(path: &str) -> String {
    // file: paths are already absolute
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}{}", FILE_SCHEME_PREFIX, path)
}

/// Turn a `file:` URL into an absolute path, decoding percent escapes.
pub fn url_to_path(url: &str) -> Result<String, ShellError> {
    let rest = url
        .strip_prefix("file://")
        .ok_or_else(|| ShellError::NotFileUrl(url.to_string()))?;

    // Escapes decode to raw bytes; only UTF-8 paths are representable
    let decoded = urlencoding::decode_binary(rest.as_bytes());
    let path = String::from_utf8(decoded.into_owned())
        .map_err(|_| ShellError::NonUtf8Path(url.to_string()))?;

    // Keep the leading slash of the absolute path
    if path.starts_with('/') {
        Ok(path)
    } else {
        Ok(format!("/{}", path))
    }
}

/// Leaf name of a `/`-separated path.
pub fn filename_from_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Append a component to `path`, inserting a separator when needed.
pub fn path_add_part(path: &mut String, part: &str) {
    if !path.is_empty() && !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(part);
}

/// `rsrc:///` URL for a bundled resource.
pub fn resource_url(name: &str) -> String {
    let name = if name == "default.css" {
        PLATFORM_DEFAULT_CSS
    } else {
        name
    };
    let url = format!("rsrc:///{}", name);
    tracing::debug!("resource_url({}) -> {}", name, url);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_url() {
        assert_eq!(path_to_url("/home/user/a.html"), "file:///home/user/a.html");
        assert_eq!(path_to_url("relative.html"), "file:///relative.html");
    }

    #[test]
    fn test_url_to_path_decodes_escapes() {
        assert_eq!(
            url_to_path("file:///home/user/My%20Page.html").unwrap(),
            "/home/user/My Page.html"
        );
    }

    #[test]
    fn test_url_to_path_round_trip_of_absolute_path() {
        let path = "/boot/home/index.html";
        assert_eq!(url_to_path(&path_to_url(path)).unwrap(), path);
    }

    #[test]
    fn test_url_to_path_rejects_other_schemes() {
        assert!(matches!(
            url_to_path("http://example.com/"),
            Err(ShellError::NotFileUrl(_))
        ));
    }

    #[test]
    fn test_url_to_path_decodes_after_the_scheme() {
        assert_eq!(
            url_to_path("file:///tmp/caf%C3%A9%2Fmenu").unwrap(),
            "/tmp/café/menu"
        );
        assert!(matches!(
            url_to_path("file:///tmp/%FF.html"),
            Err(ShellError::NonUtf8Path(_))
        ));
        assert!(matches!(
            url_to_path("file%3A///tmp/a.html"),
            Err(ShellError::NotFileUrl(_))
        ));
    }

    #[test]
    fn test_filename_from_path() {
        assert_eq!(filename_from_path("/a/b/c.txt"), "c.txt");
        assert_eq!(filename_from_path("c.txt"), "c.txt");
        assert_eq!(filename_from_path("/a/b/"), "");
    }

    #[test]
    fn test_path_add_part() {
        let mut path = "/a/b".to_string();
        path_add_part(&mut path, "c");
        assert_eq!(path, "/a/b/c");

        let mut path = "/a/b/".to_string();
        path_add_part(&mut path, "c");
        assert_eq!(path, "/a/b/c");
    }

    #[test]
    fn test_resource_url_maps_default_css() {
        assert_eq!(resource_url("default.css"), "rsrc:///platformdefault.css");
        assert_eq!(resource_url("quirks.css"), "rsrc:///quirks.css");
    }
}
