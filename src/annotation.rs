//! Annotation catalog: per-item ground truth parsed from a `;`-delimited text file.
//!
//! Line syntax: `image id;class id;is query (0|1);class count[;ignored columns...]`.
//! The first column is ignored; the item id is the 0-based line number.

use crate::error::{MapEvalError, Result};
use std::path::Path;
use std::time::Instant;

const DELIMITER: char = ';';

/// Ground truth for one catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogItem {
    /// Row index in the feature matrix, assigned by line order.
    pub id: usize,
    pub class_id: i64,
    pub is_query: bool,
    /// Externally supplied number of items relevant to this item's class, itself included.
    pub class_count: i64,
}

/// Ordered catalog of items plus the query subset (in file order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    query_ids: Vec<usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item; its id is its position in the catalog.
    pub fn push(&mut self, class_id: i64, is_query: bool, class_count: i64) {
        let id = self.items.len();
        self.items.push(CatalogItem {
            id,
            class_id,
            is_query,
            class_count,
        });
        if is_query {
            self.query_ids.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, id: usize) -> Option<&CatalogItem> {
        self.items.get(id)
    }

    /// Query items in file order.
    pub fn queries(&self) -> impl ExactSizeIterator<Item = &CatalogItem> + '_ {
        self.query_ids.iter().map(move |&id| &self.items[id])
    }

    pub fn query_count(&self) -> usize {
        self.query_ids.len()
    }
}

/// Parse an annotation file from disk.
pub fn parse(path: &Path) -> Result<Catalog> {
    let start = Instant::now();
    log::info!("Loading annotation file: {}", path.display());

    let content = std::fs::read_to_string(path)?;
    let catalog = parse_str(&content)?;

    log::info!(
        "Annotation file loaded in {:?} ({} items, {} queries)",
        start.elapsed(),
        catalog.len(),
        catalog.query_count()
    );
    Ok(catalog)
}

/// Parse annotation records from text.
///
/// Trailing blank lines are tolerated; a blank line anywhere else is an error since
/// skipping it would shift every following id.
pub fn parse_str(content: &str) -> Result<Catalog> {
    let mut lines: Vec<&str> = content.lines().collect();
    while lines.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        lines.pop();
    }

    let mut catalog = Catalog::new();
    for (index, line) in lines.iter().enumerate() {
        let line_number = index + 1;
        let mut columns = line.split(DELIMITER);

        // First column is an id we don't trust; the line number is used instead.
        let _ = columns.next();

        let class_id = parse_column(columns.next(), "class_id", line_number)?;
        let is_query = parse_column(columns.next(), "is_query", line_number)?;
        if is_query != 0 && is_query != 1 {
            return Err(MapEvalError::Parse {
                line: line_number,
                message: format!(
                    "invalid value in column \"is_query\": 0 or 1 expected but {} received",
                    is_query
                ),
            });
        }
        let class_count = parse_column(columns.next(), "class_count", line_number)?;

        catalog.push(class_id, is_query == 1, class_count);
    }

    Ok(catalog)
}

fn parse_column(token: Option<&str>, name: &str, line: usize) -> Result<i64> {
    let token = token.ok_or_else(|| MapEvalError::Parse {
        line,
        message: format!("missing column \"{}\"", name),
    })?;
    token.trim().parse::<i64>().map_err(|_| MapEvalError::Parse {
        line,
        message: format!(
            "error parsing column \"{}\": \"{}\" is not an integer",
            name,
            token.trim()
        ),
    })
}
