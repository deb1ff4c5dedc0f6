use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::extract::{docx_text, pdf_text, Extracted};
use crate::types::{keys, Document, Meta};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Extensions without the leading dot, matched case-insensitively.
    pub extensions: Vec<String>,
    pub recursive: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let extensions = ["pdf", "docx", "txt", "md", "markdown", "rst", "csv", "html", "htm", "json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self { extensions, recursive: true }
    }
}

#[derive(Debug, Clone)]
pub struct Loader {
    extensions: Vec<String>,
    recursive: bool,
}

impl Loader {
    pub fn new(config: &LoaderConfig) -> Self {
        let extensions = config.extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { extensions, recursive: config.recursive }
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        file_type(path).map(|ext| self.extensions.iter().any(|e| *e == ext)).unwrap_or(false)
    }

    /// Lazily walk `dir`, yielding the path of every supported file in file
    /// name order. Fails up front when `dir` is missing or unreadable.
    pub fn discover(&self, dir: &Path) -> Result<Paths> {
        let meta = fs::metadata(dir).map_err(|e| Error::io(dir, e))?;
        if !meta.is_dir() {
            return Err(Error::io(dir, io::Error::new(io::ErrorKind::InvalidInput, "not a directory")));
        }
        fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
        let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
        if !self.recursive { walker = walker.max_depth(1); }
        Ok(Paths { walker: walker.into_iter(), loader: self.clone() })
    }

    /// Like [`Loader::discover`], reading each file as it is reached.
    pub fn load_dir(&self, dir: &Path) -> Result<Documents> {
        Ok(Documents { paths: self.discover(dir)? })
    }

    pub fn load_file(&self, path: &Path) -> Result<Document> {
        if !path.is_file() {
            return Err(Error::io(path, io::Error::new(io::ErrorKind::NotFound, "file not found")));
        }
        if !self.is_supported(path) {
            return Err(Error::config(format!("unsupported file type: {}", path.display())));
        }
        read_document(path)
    }

    /// [`Loader::load_file`] on the blocking thread pool.
    pub async fn load_file_async(&self, path: &Path) -> Result<Document> {
        let loader = self.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || loader.load_file(&owned))
            .await
            .map_err(|e| Error::io(path, io::Error::new(io::ErrorKind::Other, e.to_string())))?
    }
}

/// Supported file paths produced by [`Loader::discover`].
pub struct Paths {
    walker: walkdir::IntoIter,
    loader: Loader,
}

impl Iterator for Paths {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    return Some(Err(Error::io(path, io::Error::from(e))));
                }
            };
            if !entry.file_type().is_file() { continue; }
            if !self.loader.is_supported(entry.path()) {
                debug!("skipping unsupported file {}", entry.path().display());
                continue;
            }
            return Some(Ok(entry.into_path()));
        }
    }
}

/// Lazy sequence of documents produced by [`Loader::load_dir`].
pub struct Documents {
    paths: Paths,
}

impl Iterator for Documents {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.paths.next()?.and_then(|path| read_document(&path)))
    }
}

fn file_type(path: &Path) -> Option<String> {
    path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase)
}

fn decode(path: &Path, kind: &str, bytes: Vec<u8>) -> Result<Extracted> {
    let invalid = |msg: String| Error::io(path, io::Error::new(io::ErrorKind::InvalidData, msg));
    match kind {
        "pdf" => pdf_text(&bytes).map_err(invalid),
        "docx" => docx_text(&bytes).map_err(invalid),
        _ => {
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            };
            Ok(Extracted { text, pages: None, paragraphs: None })
        }
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let size = bytes.len();
    let kind = file_type(path).unwrap_or_default();
    let extracted = decode(path, &kind, bytes)?;

    let mut metadata = Meta::new();
    metadata.insert(keys::FILE_TYPE.to_string(), kind);
    metadata.insert(keys::SIZE_BYTES.to_string(), size.to_string());
    if let Some(name) = path.file_name() {
        metadata.insert(keys::FILE_NAME.to_string(), name.to_string_lossy().to_string());
    }
    if let Some(pages) = extracted.pages {
        metadata.insert(keys::TOTAL_PAGES.to_string(), pages.to_string());
    }
    if let Some(paragraphs) = extracted.paragraphs {
        metadata.insert(keys::TOTAL_PARAGRAPHS.to_string(), paragraphs.to_string());
    }
    Ok(Document { path: path_string(path), raw_text: extracted.text, metadata })
}

pub fn path_string(path: &Path) -> String { path.to_string_lossy().to_string() }

/// Collect every document under `dir`, stopping at the first error.
pub fn load_all(loader: &Loader, dir: &Path) -> Result<Vec<Document>> {
    loader.load_dir(dir)?.collect()
}
