//! Document loading with recursive import resolution
//!
//! Local paths are canonicalized; `http(s)://` documents are fetched with a
//! blocking reqwest client. Relative imports resolve against the importing
//! document's location. Each document is parsed once per load and import
//! cycles are rejected.

use crate::error::{SourcePosition, WdlError};
use crate::parser;
use crate::tree::Document;
use log::debug;
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Options controlling document retrieval
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub http_timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Load a document and, recursively, everything it imports
pub fn load(uri: &str) -> Result<Document, WdlError> {
    load_with_options(uri, &LoadOptions::default())
}

/// [`load`] with explicit retrieval options
pub fn load_with_options(uri: &str, options: &LoadOptions) -> Result<Document, WdlError> {
    let mut loader = Loader::new(options.clone());
    let origin = SourcePosition::new(uri.to_string(), uri.to_string(), 1, 1, 1, 1);
    let abspath = loader.resolve(None, uri, &origin)?;
    loader.load_document(uri, &abspath, &origin)
}

/// True if `uri` is an `http://` or `https://` URL
pub fn is_http(uri: &str) -> bool {
    matches!(Url::parse(uri), Ok(url) if url.scheme() == "http" || url.scheme() == "https")
}

struct Loader {
    options: LoadOptions,
    client: Option<Client>,
    cache: HashMap<String, Document>,
    stack: Vec<String>,
}

impl Loader {
    fn new(options: LoadOptions) -> Self {
        Self {
            options,
            client: None,
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Resolve `uri` as written in the document at `base` to an absolute
    /// path or URL
    fn resolve(
        &self,
        base: Option<&str>,
        uri: &str,
        pos: &SourcePosition,
    ) -> Result<String, WdlError> {
        if is_http(uri) {
            return Ok(uri.to_string());
        }

        if let Some(base) = base.filter(|b| is_http(b)) {
            let joined = Url::parse(base)
                .and_then(|b| b.join(uri))
                .map_err(|e| WdlError::import_error_with_cause(pos.clone(), uri.to_string(), e))?;
            return Ok(joined.to_string());
        }

        let candidate = match base {
            Some(base) if !Path::new(uri).is_absolute() => Path::new(base)
                .parent()
                .map(|dir| dir.join(uri))
                .unwrap_or_else(|| PathBuf::from(uri)),
            _ => PathBuf::from(uri),
        };
        let canonical = fs::canonicalize(&candidate)
            .map_err(|e| WdlError::import_error_with_cause(pos.clone(), uri.to_string(), e))?;
        Ok(canonical.to_string_lossy().into_owned())
    }

    fn fetch(&mut self, uri: &str, abspath: &str, pos: &SourcePosition) -> Result<String, WdlError> {
        if !is_http(abspath) {
            return fs::read_to_string(abspath)
                .map_err(|e| WdlError::import_error_with_cause(pos.clone(), uri.to_string(), e));
        }

        if self.client.is_none() {
            let client = Client::builder()
                .timeout(self.options.http_timeout)
                .build()
                .map_err(|e| WdlError::import_error_with_cause(pos.clone(), uri.to_string(), e))?;
            self.client = Some(client);
        }
        let client = match &self.client {
            Some(client) => client,
            None => return Err(WdlError::import_error(pos.clone(), uri.to_string(), None)),
        };

        debug!("fetching {}", abspath);
        client
            .get(abspath)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| WdlError::import_error_with_cause(pos.clone(), uri.to_string(), e))
    }

    fn load_document(
        &mut self,
        uri: &str,
        abspath: &str,
        pos: &SourcePosition,
    ) -> Result<Document, WdlError> {
        if self.stack.iter().any(|p| p == abspath) {
            return Err(WdlError::import_error(
                pos.clone(),
                uri.to_string(),
                Some(format!("circular import of {}", abspath)),
            ));
        }
        if let Some(doc) = self.cache.get(abspath) {
            return Ok(doc.clone());
        }

        let source = self.fetch(uri, abspath, pos)?;
        debug!("parsing {}", abspath);
        let mut doc = parser::parse_document(&source, uri, abspath)?;

        self.stack.push(abspath.to_string());
        let result = self.load_imports(&mut doc);
        self.stack.pop();
        result?;

        self.cache.insert(abspath.to_string(), doc.clone());
        Ok(doc)
    }

    fn load_imports(&mut self, doc: &mut Document) -> Result<(), WdlError> {
        let base = doc.abspath().to_string();
        for import in doc.imports.iter_mut() {
            let abspath = self.resolve(Some(&base), &import.uri, &import.pos)?;
            let child = self.load_document(&import.uri, &abspath, &import.pos)?;
            import.doc = Some(Box::new(child));
        }
        Ok(())
    }
}
