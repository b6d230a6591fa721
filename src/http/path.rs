//! URL path handling
//!
//! Collapsing of request paths, percent coding and translation of URL paths
//! onto the document root.

use std::path::{Path, PathBuf};

/// Split a request target into path and optional query string
///
/// The fragment, if a client sent one, is dropped.
pub fn split_query(target: &str) -> (&str, Option<&str>) {
    let target = target.split_once('#').map_or(target, |(head, _)| head);
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

/// Collapse a URL path into its canonical form
///
/// `.` segments and empty segments are removed, `..` pops the previous
/// segment and can never climb above the root. A trailing slash is kept.
///
/// ```text
/// /a/./b//c/../d/  ->  /a/b/d/
/// /../etc/passwd   ->  /etc/passwd
/// ```
pub fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let mut collapsed = format!("/{}", segments.join("/"));
    if trailing && !segments.is_empty() {
        collapsed.push('/');
    }
    collapsed
}

/// Decode escapes of unreserved characters (RFC 3986 section 6.2.2.2)
///
/// `%2D` becomes `-` and `%2E` becomes `.`, while escapes such as `%2F` stay
/// encoded so the segment structure of the path is preserved.
pub fn normalize_percent_encoding(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = (hi << 4) | lo;
                if decoded.is_ascii_alphanumeric() || matches!(decoded, b'-' | b'.' | b'_' | b'~') {
                    out.push(char::from(decoded));
                    i += 3;
                    continue;
                }
            }
        }
        // Copy one whole character so multi-byte UTF-8 survives
        let ch_len = path[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&path[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Decode `%XX` escapes, invalid escapes are kept verbatim
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Percent-encode a single path segment for use in an href
pub fn percent_encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Escape text for inclusion in HTML
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Translate a URL path to a file system path under `root`
///
/// Query and fragment are discarded and every segment is percent-decoded.
/// Segments that could escape the root (`..`, `.`, or anything containing a
/// separator after decoding) are dropped, so the result always lies inside
/// `root`.
pub fn translate_path(root: &Path, url_path: &str) -> PathBuf {
    let (path, _) = split_query(url_path);
    let mut translated = root.to_path_buf();
    for segment in path.split('/') {
        let decoded = percent_decode(segment);
        if decoded.is_empty()
            || decoded == "."
            || decoded == ".."
            || decoded.contains('/')
            || decoded.contains('\\')
            || decoded.contains('\0')
        {
            continue;
        }
        translated.push(decoded);
    }
    translated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("/a/b?x=1&y=2"), ("/a/b", Some("x=1&y=2")));
        assert_eq!(split_query("/a/b"), ("/a/b", None));
        assert_eq!(split_query("/a?q#frag"), ("/a", Some("q")));
        assert_eq!(split_query("/a#frag?not-query"), ("/a", None));
    }

    #[test]
    fn test_collapse_path() {
        assert_eq!(collapse_path("/a/./b//c/../d/"), "/a/b/d/");
        assert_eq!(collapse_path("/../etc/passwd"), "/etc/passwd");
        assert_eq!(collapse_path("/notera/cgi-bin/../cgi-bin/api.cgi"), "/notera/cgi-bin/api.cgi");
        assert_eq!(collapse_path("/a/b/.."), "/a/");
        assert_eq!(collapse_path("/"), "/");
        assert_eq!(collapse_path(""), "/");
        assert_eq!(collapse_path("/.."), "/");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("hello%20world"), "hello world");
        assert_eq!(percent_decode("%2Fetc"), "/etc");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%4"), "%4");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_normalize_percent_encoding() {
        assert_eq!(normalize_percent_encoding("/notera/cgi%2Dbin/api.cgi"), "/notera/cgi-bin/api.cgi");
        assert_eq!(normalize_percent_encoding("/a/%2e%2E/b"), "/a/../b");
        assert_eq!(normalize_percent_encoding("/a%2Fb/%20c"), "/a%2Fb/%20c");
        assert_eq!(normalize_percent_encoding("/caf\u{e9}/%"), "/caf\u{e9}/%");
    }

    #[test]
    fn test_percent_encode_segment() {
        assert_eq!(percent_encode_segment("a b.txt"), "a%20b.txt");
        assert_eq!(percent_encode_segment("x&y"), "x%26y");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_translate_path() {
        let root = Path::new("/srv/www");
        assert_eq!(
            translate_path(root, "/notera/static/readme.txt?x=1"),
            Path::new("/srv/www/notera/static/readme.txt")
        );
        assert_eq!(
            translate_path(root, "/../../etc/passwd"),
            Path::new("/srv/www/etc/passwd")
        );
        assert_eq!(
            translate_path(root, "/a/%2e%2e/%2Fetc/b%20c"),
            Path::new("/srv/www/a/b c")
        );
        assert_eq!(translate_path(root, "/"), Path::new("/srv/www"));
    }
}
