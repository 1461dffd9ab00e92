//! Bundled static content
//!
//! The built SPA (scripts, styles, the shell template and its manifest) is
//! compiled into the binary from `dist/` and served from memory.

use std::borrow::Cow;
use std::collections::HashMap;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use rust_embed::Embed;

/// Frontend build output packaged with the binary
#[derive(Embed)]
#[folder = "dist/"]
struct Bundle;

/// In-memory map from relative path to file contents
#[derive(Debug, Clone, Default)]
pub struct Assets {
    files: HashMap<String, Bytes>,
}

impl Assets {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bundle from `(path, contents)` pairs
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Bytes>,
    {
        let mut assets = Self::new();
        for (path, contents) in entries {
            assets.insert(path.as_ref(), contents);
        }
        assets
    }

    /// Bundle compiled into the binary
    pub fn embedded() -> Self {
        let mut assets = Self::new();
        for path in Bundle::iter() {
            let Some(file) = Bundle::get(&path) else {
                continue;
            };
            let contents = match file.data {
                Cow::Borrowed(data) => Bytes::from_static(data),
                Cow::Owned(data) => Bytes::from(data),
            };
            assets.insert(&path, contents);
        }
        assets
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Bytes>) {
        self.files.insert(normalize(path).to_string(), contents.into());
    }

    /// Look up a file. Paths escaping the bundle never match.
    pub fn get(&self, path: &str) -> Option<&Bytes> {
        let path = normalize(path);
        if path.is_empty() || path.split('/').any(|segment| segment == "..") {
            return None;
        }
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Respond with a bundled file
pub fn serve(path: &str, contents: Bytes) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        contents,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_normalizes_leading_slash() {
        let assets = Assets::from_entries([("/app.js", "console.log(1)")]);
        assert!(assets.contains("app.js"));
        assert!(assets.contains("/app.js"));
        assert!(!assets.contains(""));
        assert!(!assets.contains("/"));
    }

    #[test]
    fn test_lookup_rejects_traversal() {
        let assets = Assets::from_entries([("secret", "x"), ("a/b.js", "y")]);
        assert!(!assets.contains("a/../secret"));
        assert!(assets.contains("a/b.js"));
    }

    #[test]
    fn test_embedded_bundle() {
        let assets = Assets::embedded();
        assert!(assets.contains("index.html"));
        assert!(assets.contains("manifest.json"));
        assert!(assets.contains("assets/main.js"));
        assert!(!assets.contains("../Cargo.toml"));
    }

    #[test]
    fn test_serve_content_type() {
        let response = serve("app.js", Bytes::from_static(b"1"));
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.contains("javascript"));

        let response = serve("blob.unknownext", Bytes::new());
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
    }
}
