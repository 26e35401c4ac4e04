use std::collections::HashSet;

use crate::llm_client::provider::GroundingMetadata;
use crate::models::Source;

/// Citations from grounding metadata, de-duplicated by `uri`.
///
/// Chunks missing either a title or a uri are dropped. The first occurrence
/// of a uri wins and arrival order is preserved.
pub fn extract_sources(grounding: Option<&GroundingMetadata>) -> Vec<Source> {
    let Some(grounding) = grounding else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    grounding
        .chunks
        .iter()
        .filter_map(|chunk| match (&chunk.title, &chunk.uri) {
            (Some(title), Some(uri)) if !title.is_empty() && !uri.is_empty() => Some(Source {
                title: title.clone(),
                uri: uri.clone(),
            }),
            _ => None,
        })
        .filter(|source| seen.insert(source.uri.clone()))
        .collect()
}

/// Appends `extra` to `sources`, skipping uris already present.
pub fn merge_sources(sources: &mut Vec<Source>, extra: Vec<Source>) {
    let mut seen: HashSet<String> = sources.iter().map(|s| s.uri.clone()).collect();
    sources.extend(extra.into_iter().filter(|s| seen.insert(s.uri.clone())));
}
