//! Per-scan visuals (SVG charts) referenced by the producer output
//!
//! A visual that is referenced but cannot be read aborts the report; no
//! partial document is written.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves a scan's `visualRef` into inline markup
pub trait VisualSource {
    fn load(&self, reference: &str) -> Result<String>;

    /// False when visuals are switched off and scan rows carry no chart
    fn enabled(&self) -> bool {
        true
    }
}

/// Loads `<root>/<ref>`, appending `.svg` when the reference has no extension
#[derive(Debug, Clone)]
pub struct DirectoryVisuals {
    root: PathBuf,
    sanitizer: SvgSanitizer,
}

impl DirectoryVisuals {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(DirectoryVisuals {
            root: root.into(),
            sanitizer: SvgSanitizer::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, reference: &str) -> PathBuf {
        let path = self.root.join(reference);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("svg")
        }
    }
}

impl VisualSource for DirectoryVisuals {
    fn load(&self, reference: &str) -> Result<String> {
        let path = self.path_for(reference);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scan visual: {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = raw.len(), "loaded scan visual");
        Ok(self.sanitizer.sanitize(&raw))
    }
}

/// Visuals disabled: every scan renders without a chart
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVisuals;

impl VisualSource for NoVisuals {
    fn load(&self, _reference: &str) -> Result<String> {
        Ok(String::new())
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Prepares standalone SVG files for inlining into HTML
#[derive(Debug, Clone)]
pub struct SvgSanitizer {
    prolog: Regex,
    doctype: Regex,
    root_tag: Regex,
    size_attr: Regex,
}

impl SvgSanitizer {
    pub fn new() -> Result<Self> {
        Ok(SvgSanitizer {
            prolog: Regex::new(r"<\?xml[^>]*\?>").context("invalid prolog pattern")?,
            doctype: Regex::new(r"(?is)<!DOCTYPE[^>\[]*(\[[^\]]*\])?\s*>")
                .context("invalid doctype pattern")?,
            root_tag: Regex::new(r"(?s)<svg\b[^>]*>").context("invalid svg tag pattern")?,
            size_attr: Regex::new(r#"\s(?:width|height)\s*=\s*("[^"]*"|'[^']*')"#)
                .context("invalid size attribute pattern")?,
        })
    }

    /// Strip the XML prolog and DOCTYPE, and drop the root element's fixed
    /// width/height so the chart scales with its table cell
    pub fn sanitize(&self, svg: &str) -> String {
        let without_prolog = self.prolog.replace_all(svg, "");
        let body = self.doctype.replace_all(&without_prolog, "");
        let root = self.root_tag.find(&body).map(|m| (m.start(), m.end()));
        let resized = match root {
            Some((start, end)) => {
                let cleaned = self.size_attr.replace_all(&body[start..end], "");
                format!("{}{}{}", &body[..start], cleaned, &body[end..])
            }
            None => body.into_owned(),
        };
        resized.trim().to_string()
    }
}

/// Convenience wrapper around a one-off [`SvgSanitizer`]
pub fn sanitize_svg(svg: &str) -> Result<String> {
    Ok(SvgSanitizer::new()?.sanitize(svg))
}
