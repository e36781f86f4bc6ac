use crate::catalog::Movie;
use std::collections::HashSet;

/// Hard cap on merged results returned to the caller.
pub const MAX_RESULTS: usize = 20;

/// Merges the primary discover results with the keyword-derived results.
///
/// Primary results keep their order and win ties; keyword results are
/// appended in order when their id is not already present, and the
/// concatenation is truncated to [`MAX_RESULTS`].
pub fn merge_results(primary: Vec<Movie>, keyword: Vec<Movie>) -> Vec<Movie> {
    let seen: HashSet<u64> = primary.iter().map(|movie| movie.id).collect();

    let mut merged = primary;
    merged.extend(keyword.into_iter().filter(|movie| !seen.contains(&movie.id)));
    merged.truncate(MAX_RESULTS);
    merged
}
