//! Fallback view rendering for HTTP activations.

use std::collections::HashMap;

/// Name of the view rendered when an HTTP operation has no handler.
pub const NOT_FOUND_VIEW: &str = "error_404";

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>404 Not Found</title></head>\n<body><h1>404 Not Found</h1></body>\n</html>\n";

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("view not found: {0}")]
    NotFound(String),
}

pub trait ViewRenderer: Send + Sync + 'static {
    fn render(&self, view: &str) -> Result<String, ViewError>;
}

/// Fixed set of pre-rendered pages. Ships with [`NOT_FOUND_VIEW`].
#[derive(Debug, Clone)]
pub struct StaticViews {
    views: HashMap<String, String>,
}

impl StaticViews {
    pub fn empty() -> Self {
        Self {
            views: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, page: impl Into<String>) {
        self.views.insert(name.into(), page.into());
    }
}

impl Default for StaticViews {
    fn default() -> Self {
        let mut views = Self::empty();
        views.insert(NOT_FOUND_VIEW, NOT_FOUND_PAGE);
        views
    }
}

impl ViewRenderer for StaticViews {
    fn render(&self, view: &str) -> Result<String, ViewError> {
        self.views
            .get(view)
            .cloned()
            .ok_or_else(|| ViewError::NotFound(view.to_string()))
    }
}
