//! Type trees mirroring a candidate hierarchy.

use crate::classifier::TypeMap;
use larreco_types::{CandidateId, Event, TypeLabel, TypeTree};

/// Tree of labels for `id` and its descendants, children in hierarchy order.
/// Candidates missing from `types` are labelled [`TypeLabel::Unknown`].
pub fn build_type_tree(event: &Event, id: CandidateId, types: &TypeMap) -> TypeTree {
    let label = types.get(&id).copied().unwrap_or(TypeLabel::Unknown);
    let children = event
        .children(id)
        .iter()
        .map(|child| build_type_tree(event, *child, types))
        .collect();
    TypeTree::new(label, children)
}
