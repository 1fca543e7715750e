//! Version resolution
//!
//! Turns a version bound into a concrete `VersionKey`, then picks the winning
//! revision of every example in one grouped pass over the candidate set:
//! the candidate with the greatest version key per example wins. A winner of
//! kind DELETE means the example is absent at that bound.

use std::sync::Arc;

use exemplar_core::{
    CollectionId, Error, ExampleId, LogView, Result, Revision, Version, VersionId, VersionKey,
};
use rustc_hash::FxHashMap;

/// Which version of a collection to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionBound {
    /// The newest version of the collection
    #[default]
    Latest,
    /// A specific version
    At(VersionId),
}

impl From<VersionId> for VersionBound {
    fn from(id: VersionId) -> Self {
        VersionBound::At(id)
    }
}

impl From<Option<VersionId>> for VersionBound {
    fn from(id: Option<VersionId>) -> Self {
        id.map(VersionBound::At).unwrap_or(VersionBound::Latest)
    }
}

/// Winning revision per example
pub type Winners = FxHashMap<ExampleId, Arc<Revision>>;

/// Resolve a bound to a version of `collection`
///
/// Returns `None` when nothing precedes the bound: the collection has no
/// versions, or `At(id)` names an id that does not exist and no version of
/// the collection has a smaller id. A missing id is treated as a point in
/// time between its neighbors, so reads at it see the newest version created
/// before it.
///
/// # Errors
///
/// - `UnknownCollection` if the collection is not visible
/// - `UnknownVersion` if the id belongs to a different collection
pub fn resolve_bound<V: LogView + ?Sized>(
    view: &V,
    collection: CollectionId,
    bound: VersionBound,
) -> Result<Option<Version>> {
    let versions = view.versions(collection)?;
    match bound {
        VersionBound::Latest => Ok(versions.into_iter().last()),
        VersionBound::At(id) => match view.version(id) {
            Some(version) if version.collection_id == collection => Ok(Some(version)),
            Some(_) => Err(Error::UnknownVersion(id)),
            None => Ok(versions
                .into_iter()
                .filter(|v| v.id <= id)
                .max_by_key(Version::key)),
        },
    }
}

/// Group-wise maximum by version key
///
/// Candidates may arrive in any order. Every winner is returned, DELETE
/// included; callers decide visibility.
pub fn winning_revisions<I>(candidates: I) -> Winners
where
    I: IntoIterator<Item = Arc<Revision>>,
{
    let mut winners: Winners = FxHashMap::default();
    for candidate in candidates {
        let newer = winners
            .get(&candidate.example_id)
            .map_or(true, |current| current.version_key < candidate.version_key);
        if newer {
            winners.insert(candidate.example_id, candidate);
        }
    }
    winners
}

/// Winners for every example of a collection as of `bound`
///
/// # Errors
///
/// `UnknownCollection` if the collection is not visible.
pub fn resolve<V: LogView + ?Sized>(
    view: &V,
    collection: CollectionId,
    bound: VersionKey,
) -> Result<Winners> {
    Ok(winning_revisions(view.revisions_up_to(collection, bound)?))
}

/// Winners for a chosen set of examples as of `bound`
///
/// # Errors
///
/// `UnknownExample` if any example is not visible.
pub fn resolve_examples<V: LogView + ?Sized>(
    view: &V,
    examples: &[ExampleId],
    bound: VersionKey,
) -> Result<Winners> {
    Ok(winning_revisions(view.revisions_for(examples, bound)?))
}
