//! Static file serving module
//!
//! Serves files and directory listings relative to the document root.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::IF_NONE_MATCH;
use hyper::{Method, Request, Response};
use std::io;
use std::path::Path;
use tokio::fs;

use crate::config::Config;
use crate::http::path::{html_escape, percent_decode, percent_encode_segment};
use crate::http::{self, cache, mime, translate_path};
use crate::logger;

/// Serve the file or directory addressed by `url_path`
///
/// `url_path` is the collapsed request path, so `..` segments have already
/// removed their parent.
pub async fn serve(req: &Request<Bytes>, config: &Config, url_path: &str) -> Response<Full<Bytes>> {
    let is_head = *req.method() == Method::HEAD;
    let root = &config.server.document_root;
    let fs_path = translate_path(root, url_path);

    let metadata = match fs::metadata(&fs_path).await {
        Ok(m) => m,
        Err(e) => return io_error_response(&e),
    };

    // Symlinks inside the root must not lead outside of it
    match fs::canonicalize(&fs_path).await {
        Ok(canonical) if canonical.starts_with(root) => {}
        Ok(canonical) => {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {} -> {}",
                url_path,
                canonical.display()
            ));
            return http::build_404_response("File not found");
        }
        Err(e) => return io_error_response(&e),
    }

    if metadata.is_dir() {
        if !url_path.ends_with('/') {
            let location = match req.uri().query() {
                Some(query) => format!("{url_path}/?{query}"),
                None => format!("{url_path}/"),
            };
            return http::build_301_response(&location);
        }
        for index in &config.http.index_files {
            let candidate = fs_path.join(index);
            if candidate.is_file() {
                return serve_file(&candidate, req, is_head).await;
            }
        }
        return list_directory(&fs_path, url_path, is_head).await;
    }

    serve_file(&fs_path, req, is_head).await
}

async fn serve_file(path: &Path, req: &Request<Bytes>, is_head: bool) -> Response<Full<Bytes>> {
    let content = match fs::read(path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_debug(&format!("Failed to read '{}': {e}", path.display()));
            return io_error_response(&e);
        }
    };

    let etag = cache::generate_etag(&content);
    let if_none_match = req
        .headers()
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    let last_modified = fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .map(cache::http_date);

    http::response::build_file_response(
        Bytes::from(content),
        mime::content_type_for(path),
        &etag,
        last_modified.as_deref(),
        is_head,
    )
}

/// Render an HTML index of a directory without an index file
async fn list_directory(dir: &Path, url_path: &str, is_head: bool) -> Response<Full<Bytes>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) => {
            logger::log_warning(&format!("Cannot list '{}': {e}", dir.display()));
            return http::build_403_response("No permission to list directory");
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await.ok();
        let is_dir = entry.path().is_dir();
        let is_symlink = file_type.is_some_and(|t| t.is_symlink());
        names.push((name, is_dir, is_symlink));
    }
    names.sort_by_key(|(name, _, _)| name.to_lowercase());

    let title = html_escape(&percent_decode(url_path));
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Directory listing for {title}</title>\n</head>\n<body>\n\
         <h1>Directory listing for {title}</h1>\n<hr>\n<ul>\n"
    );
    for (name, is_dir, is_symlink) in &names {
        let (display, link) = if *is_dir {
            (format!("{name}/"), format!("{}/", percent_encode_segment(name)))
        } else if *is_symlink {
            (format!("{name}@"), percent_encode_segment(name))
        } else {
            (name.clone(), percent_encode_segment(name))
        };
        html.push_str(&format!(
            "<li><a href=\"{link}\">{}</a></li>\n",
            html_escape(&display)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    http::response::build_html_response(html, is_head)
}

fn io_error_response(err: &io::Error) -> Response<Full<Bytes>> {
    match err.kind() {
        io::ErrorKind::PermissionDenied => http::build_403_response("Permission denied"),
        _ => http::build_404_response("File not found"),
    }
}
