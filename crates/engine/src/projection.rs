//! Collection projection
//!
//! Materializes the visible examples of a collection as of a version bound.
//! Nothing is cached: every call re-resolves against the view it was built on.

use std::sync::Arc;

use exemplar_core::{
    CollectionId, Error, Example, ExampleId, LogView, Result, Revision, RevisionId, Timestamp,
    Version, VersionId,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::resolver::{self, VersionBound};

/// Effective state of one example as of a version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExampleState {
    /// Example id
    pub example_id: ExampleId,
    /// Winning revision
    pub revision_id: RevisionId,
    /// Version of the winning revision
    pub version_id: VersionId,
    /// Effective input
    pub input: JsonValue,
    /// Effective output
    pub output: JsonValue,
    /// Effective metadata
    pub metadata: JsonValue,
    /// When the example identity was created
    pub created_at: Timestamp,
    /// Creation time of the winning revision's version
    pub updated_at: Timestamp,
}

impl ExampleState {
    fn from_winner(example: &Example, revision: &Revision) -> Self {
        Self {
            example_id: example.id,
            revision_id: revision.id,
            version_id: revision.version_id,
            input: revision.payload.input.clone(),
            output: revision.payload.output.clone(),
            metadata: revision.payload.metadata.clone(),
            created_at: example.created_at,
            updated_at: revision.version_key.created_at,
        }
    }
}

/// Visible examples of one collection at one resolved version
pub struct CollectionProjection<'a, V: LogView + ?Sized> {
    view: &'a V,
    collection: CollectionId,
    version: Option<Version>,
}

impl<'a, V: LogView + ?Sized> CollectionProjection<'a, V> {
    /// Resolve `bound` and build a projection over `view`
    ///
    /// # Errors
    ///
    /// `UnknownCollection` / `UnknownVersion` from bound resolution.
    pub fn new(view: &'a V, collection: CollectionId, bound: VersionBound) -> Result<Self> {
        let version = resolver::resolve_bound(view, collection, bound)?;
        Ok(Self {
            view,
            collection,
            version,
        })
    }

    /// The version the bound resolved to, `None` if nothing precedes it
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    fn visible_winners(&self) -> Result<Vec<Arc<Revision>>> {
        let Some(version) = &self.version else {
            return Ok(Vec::new());
        };
        Ok(resolver::resolve(self.view, self.collection, version.key())?
            .into_values()
            .filter(|revision| revision.is_visible())
            .collect())
    }

    /// All visible examples, descending example id
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection disappeared from the view.
    pub fn states(&self) -> Result<Vec<ExampleState>> {
        let winners = self.visible_winners()?;
        if winners.is_empty() {
            return Ok(Vec::new());
        }
        let examples: FxHashMap<ExampleId, Example> = self
            .view
            .examples(self.collection)?
            .into_iter()
            .map(|example| (example.id, example))
            .collect();

        let mut states: Vec<ExampleState> = winners
            .iter()
            .filter_map(|revision| {
                examples
                    .get(&revision.example_id)
                    .map(|example| ExampleState::from_winner(example, revision))
            })
            .collect();
        states.sort_by(|a, b| b.example_id.cmp(&a.example_id));
        Ok(states)
    }

    /// Number of visible examples
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection disappeared from the view.
    pub fn count(&self) -> Result<usize> {
        Ok(self.visible_winners()?.len())
    }

    /// State of one example, `None` if it is absent at this version
    ///
    /// # Errors
    ///
    /// `UnknownExample` if the example does not belong to this collection.
    pub fn get(&self, example: ExampleId) -> Result<Option<ExampleState>> {
        let record = self
            .view
            .example(example)
            .filter(|e| e.collection_id == self.collection)
            .ok_or(Error::UnknownExample(example))?;
        let Some(version) = &self.version else {
            return Ok(None);
        };
        let winners = resolver::resolve_examples(self.view, &[example], version.key())?;
        Ok(winners
            .get(&example)
            .filter(|revision| revision.is_visible())
            .map(|revision| ExampleState::from_winner(&record, revision)))
    }
}

impl<V: LogView + ?Sized> std::fmt::Debug for CollectionProjection<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionProjection")
            .field("collection", &self.collection)
            .field("version", &self.version.as_ref().map(|v| v.id))
            .finish()
    }
}
