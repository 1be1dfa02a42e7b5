//! Request handling for the archive.
use super::SafeArchive;
use crate::util::sha256_hex;
use std::fs;
use std::path::{Path, PathBuf};

/// Why a file was allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    SafeExtension,
    TrustedDirectory,
    ChecksumMatched,
}

impl Verification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verification::SafeExtension => "safe-extension",
            Verification::TrustedDirectory => "trusted-directory",
            Verification::ChecksumMatched => "checksum-matched",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    pub rel_path: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub verification: Verification,
}

impl ServedFile {
    pub fn file_name(&self) -> &str {
        self.rel_path
            .rsplit_once('/')
            .map_or(self.rel_path.as_str(), |(_, name)| name)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Every served file has been vetted, so the host's restrictive
    /// content-security headers are dropped for it.
    pub fn bypasses_content_security(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeResponse {
    Serve(ServedFile),
    Redirect(String),
    NotFound,
    Forbidden,
}

impl ServeResponse {
    pub fn label(&self) -> &'static str {
        match self {
            ServeResponse::Serve(_) => "serve",
            ServeResponse::Redirect(_) => "redirect",
            ServeResponse::NotFound => "not-found",
            ServeResponse::Forbidden => "forbidden",
        }
    }
}

impl SafeArchive {
    /// Answer a request for `rest_of_path` relative to the archive root.
    pub fn serve(&self, rest_of_path: &str) -> ServeResponse {
        let rel = rest_of_path.strip_prefix('/').unwrap_or(rest_of_path);
        if rel.is_empty() {
            tracing::debug!(index = %self.settings.index_file, "redirecting to index file");
            return ServeResponse::Redirect(self.settings.index_file.clone());
        }
        if !self.is_scanned() {
            tracing::debug!(path = rel, "archive has not been scanned");
            return ServeResponse::NotFound;
        }

        let candidate = self.root.join(rel);
        if !candidate.is_file() {
            tracing::debug!(path = rel, "file does not exist");
            return ServeResponse::NotFound;
        }
        let Some(resolved) = contained_path(&self.root, &candidate) else {
            tracing::debug!(path = rel, "file is outside archive directory");
            return ServeResponse::NotFound;
        };

        if self.is_safe_file(rel) {
            return read_and_serve(rel, &resolved, Verification::SafeExtension);
        }
        if self.is_trusted_asset(rel) {
            return read_and_serve(rel, &resolved, Verification::TrustedDirectory);
        }

        let Some(expected) = self.store.lookup(rel) else {
            tracing::debug!(path = rel, "file exists but no checksum recorded");
            return ServeResponse::NotFound;
        };
        // Hash the bytes we are about to send, not a second read.
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(path = rel, "read failed: {err}");
                return ServeResponse::NotFound;
            }
        };
        let actual = sha256_hex(&bytes);
        if actual != expected {
            tracing::warn!(
                path = rel,
                recorded = %expected,
                actual = %actual,
                "checksum mismatch"
            );
            return ServeResponse::Forbidden;
        }
        ServeResponse::Serve(ServedFile {
            rel_path: rel.to_string(),
            content_type: content_type(rel),
            bytes,
            verification: Verification::ChecksumMatched,
        })
    }
}

fn read_and_serve(rel: &str, resolved: &Path, verification: Verification) -> ServeResponse {
    match fs::read(resolved) {
        Ok(bytes) => {
            tracing::debug!(path = rel, ?verification, "serving file");
            ServeResponse::Serve(ServedFile {
                rel_path: rel.to_string(),
                content_type: content_type(rel),
                bytes,
                verification,
            })
        }
        Err(err) => {
            tracing::debug!(path = rel, "read failed: {err}");
            ServeResponse::NotFound
        }
    }
}

/// Canonical path of `candidate` if it resolves inside `root`.
fn contained_path(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let resolved = candidate.canonicalize().ok()?;
    resolved.starts_with(&root).then_some(resolved)
}

pub fn content_type(rel_path: &str) -> &'static str {
    let ext = rel_path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain; charset=utf-8",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}
