//! Path rewriting.

use axum::http::uri::{InvalidUri, PathAndQuery};
use axum::http::Uri;

use crate::routing::RouteMatch;

/// Downstream path filled from the route's captures; the query is kept as is.
pub fn downstream_path_and_query(
    matched: &RouteMatch,
    original: &Uri,
) -> Result<PathAndQuery, InvalidUri> {
    let path = matched.route.downstream.expand(&matched.captures);
    let full = match original.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    PathAndQuery::try_from(full)
}
