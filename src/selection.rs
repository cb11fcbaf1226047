//! A narrow stand-in for the document-selection expression parser, which is
//! an external collaborator out of scope for this crate. Only a "leaf"
//! grammar is implemented: the empty string matches everything, and
//! `id = "<id>"` matches a single document id exactly. `createIterator`
//! accepts leaf selections; [`Selection::parse_strict`] is the stricter
//! helper that rejects them.

use crate::document::{Document, DocumentId};
use crate::error::StoreError;

/// A parsed selection predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Matches every document (the empty selection string).
    All,
    /// Matches a single document id exactly.
    IdEquals(DocumentId),
}

impl Selection {
    /// Parses `text` as a leaf selection. The empty string parses as
    /// `Selection::All`; anything else must match the `id = "<id>"` grammar
    /// or this returns `Err(StoreError::unparseable_selection())`.
    pub fn parse_leaf(text: &str) -> Result<Selection, StoreError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Selection::All);
        }
        if let Some(rhs) = trimmed.strip_prefix("id") {
            let rhs = rhs.trim_start();
            if let Some(rhs) = rhs.strip_prefix('=') {
                let rhs = rhs.trim();
                if rhs.len() >= 2 && rhs.starts_with('"') && rhs.ends_with('"') {
                    let id = &rhs[1..rhs.len() - 1];
                    return Ok(Selection::IdEquals(DocumentId::new(id)));
                }
            }
        }
        Err(StoreError::unparseable_selection())
    }

    /// Parses `text`, rejecting leaf selections. This crate's grammar only
    /// has leaf selections, so this always rejects non-empty input; kept as
    /// a documented entry point for callers that need the stricter contract.
    pub fn parse_strict(text: &str) -> Result<Selection, StoreError> {
        match Self::parse_leaf(text)? {
            Selection::All => Err(StoreError::unparseable_selection()),
            other => Ok(other),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Selection::All => true,
            Selection::IdEquals(id) => &doc.id == id,
        }
    }

    pub fn matches_id(&self, id: &DocumentId) -> bool {
        match self {
            Selection::All => true,
            Selection::IdEquals(expected) => expected == id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_matches_all() {
        assert_eq!(Selection::parse_leaf("").unwrap(), Selection::All);
    }

    #[test]
    fn id_equals_parses() {
        let sel = Selection::parse_leaf(r#"id = "id:ns:t::a""#).unwrap();
        assert_eq!(sel, Selection::IdEquals(DocumentId::new("id:ns:t::a")));
    }

    #[test]
    fn garbage_is_unparseable() {
        assert!(Selection::parse_leaf("not a selection").is_err());
    }

    #[test]
    fn strict_rejects_leaf_all() {
        assert!(Selection::parse_strict("").is_err());
    }
}
