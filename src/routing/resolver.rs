//! Upstream URL resolution.
//!
//! Pure functions from (route, residual path, headers, query) to the target
//! URL. Nothing here touches the network, so the same inbound request always
//! resolves to the same URL.

use std::borrow::Cow;

use axum::http::HeaderMap;
use url::{form_urlencoded, Url};

use crate::error::ProxyError;
use crate::routing::router::{BaseOrigin, DeploymentRewrite, Route};

/// Query parameter holding the generic route's target.
pub const URL_PARAM: &str = "url";
/// Per-request base origin override (header, then query).
pub const BASE_URL_HEADER: &str = "x-base-url";
pub const BASE_URL_PARAM: &str = "base_url";
/// Per-request API version override (header, then query).
pub const API_VERSION_HEADER: &str = "x-api-version";
pub const API_VERSION_PARAM: &str = "api-version";
/// Deployment name for deployment-scoped addressing.
pub const DEPLOYMENT_HEADER: &str = "x-deployment-name";

/// Decoded query pairs in arrival order.
pub type QueryPairs = Vec<(String, String)>;

pub fn parse_query(query: Option<&str>) -> QueryPairs {
    query
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Resolve the upstream URL for `route`.
pub fn resolve(
    route: &Route,
    residual: &str,
    headers: &HeaderMap,
    query: &[(String, String)],
) -> Result<Url, ProxyError> {
    match &route.base {
        BaseOrigin::QueryUrl => resolve_query_url(query),
        BaseOrigin::Fixed(origin) => {
            let mut url = join_path(origin, residual);
            merge_query(&mut url, query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            Ok(url)
        }
        BaseOrigin::Dynamic { default, rewrite } => {
            resolve_dynamic(default, rewrite, residual, headers, query)
        }
    }
}

/// Target taken verbatim from the mandatory `url` parameter.
pub fn resolve_query_url(query: &[(String, String)]) -> Result<Url, ProxyError> {
    let target = first_param(query, URL_PARAM).ok_or(ProxyError::MissingUrl)?;
    Url::parse(target).map_err(|_| ProxyError::InvalidUrl)
}

fn resolve_dynamic(
    default: &Url,
    rewrite: &DeploymentRewrite,
    residual: &str,
    headers: &HeaderMap,
    query: &[(String, String)],
) -> Result<Url, ProxyError> {
    let origin = match header_value(headers, BASE_URL_HEADER)
        .or_else(|| first_param(query, BASE_URL_PARAM))
    {
        Some(raw) => Url::parse(raw).map_err(|_| ProxyError::InvalidBaseUrl)?,
        None => default.clone(),
    };
    let version =
        header_value(headers, API_VERSION_HEADER).or_else(|| first_param(query, API_VERSION_PARAM));
    let deployment = header_value(headers, DEPLOYMENT_HEADER);

    let path = rewrite_path(rewrite, origin.as_str(), deployment, residual);
    let mut url = join_path(&origin, &path);

    let forwarded = query
        .iter()
        .filter(|(k, _)| k != BASE_URL_PARAM && k != API_VERSION_PARAM)
        .map(|(k, v)| (k.as_str(), v.as_str()));
    merge_query(&mut url, forwarded.chain(version.map(|v| (API_VERSION_PARAM, v))));

    Ok(url)
}

/// Map `<version>/<rest>` to `<infix>/<deployment>/<rest>` when addressing a
/// deployment-scoped provider; any other input comes back unchanged.
pub fn rewrite_path<'a>(
    rewrite: &DeploymentRewrite,
    origin: &str,
    deployment: Option<&str>,
    path: &'a str,
) -> Cow<'a, str> {
    let Some(deployment) = deployment else {
        return Cow::Borrowed(path);
    };
    if !origin.contains(rewrite.host_marker.as_str()) {
        return Cow::Borrowed(path);
    }
    match path.strip_prefix(rewrite.version_prefix.as_str()) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Cow::Owned(format!(
            "{}/{}{}",
            rewrite.deployment_infix, deployment, rest
        )),
        _ => Cow::Borrowed(path),
    }
}

/// Append `path` to the origin's own path with a single `/` between them.
fn join_path(origin: &Url, path: &str) -> Url {
    let mut url = origin.clone();
    let base = origin.path().trim_end_matches('/');
    url.set_path(&format!("{}/{}", base, path));
    url
}

/// Copy parameters into the URL's query. Keys are unique: a later value
/// replaces an earlier one in place.
fn merge_query<'a>(url: &mut Url, params: impl IntoIterator<Item = (&'a str, &'a str)>) {
    let mut pairs: QueryPairs = url.query_pairs().into_owned().collect();
    for (key, value) in params {
        set_pair(&mut pairs, key, value);
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
}

fn set_pair(pairs: &mut QueryPairs, key: &str, value: &str) {
    let mut found = false;
    pairs.retain_mut(|(k, v)| {
        if k != key {
            return true;
        }
        if found {
            return false;
        }
        found = true;
        *v = value.to_string();
        true
    });
    if !found {
        pairs.push((key.to_string(), value.to_string()));
    }
}

fn first_param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
