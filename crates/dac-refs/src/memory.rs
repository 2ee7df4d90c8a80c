//! In-memory reference store for testing and ephemeral use.
//!
//! [`InMemoryRefStore`] keeps references in a `BTreeMap` protected by a
//! `RwLock`, so listings come back sorted by name.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use dac_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::validate_reference_name;
use crate::traits::{ReferenceReader, ReferenceWriter};
use crate::types::Reference;

/// An in-memory implementation of [`ReferenceReader`] and [`ReferenceWriter`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, ObjectId>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceReader for InMemoryRefStore {
    fn read_reference(&self, name: &str) -> Result<Option<Reference>> {
        let refs = self
            .refs
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        Ok(refs.get(name).map(|target| Reference::new(name, *target)))
    }

    fn list_references(&self) -> Result<Vec<Reference>> {
        let refs = self
            .refs
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        Ok(refs
            .iter()
            .map(|(name, target)| Reference::new(name.clone(), *target))
            .collect())
    }
}

impl ReferenceWriter for InMemoryRefStore {
    fn write_reference(&self, reference: &Reference) -> Result<()> {
        validate_reference_name(&reference.name)?;
        if reference.target.is_null() {
            return Err(RefError::NullTarget {
                name: reference.name.clone(),
            });
        }

        let mut refs = self
            .refs
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))?;
        let previous = refs.insert(reference.name.clone(), reference.target);
        debug!(
            name = %reference.name,
            from = ?previous,
            to = %reference.target.short_hex(),
            "wrote reference"
        );
        Ok(())
    }
}
