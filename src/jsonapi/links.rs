use crate::config::ApiConfig;
use crate::filter::QueryParams;

/// Canonical URLs: `{domain}/{version}/{url}[/{id}]` when a public domain is
/// configured, otherwise `{origin}/{prefix}/{version}/{url}[/{id}]` with the
/// origin taken from the request.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    pub fn new(api: &ApiConfig, origin: Option<&str>) -> Self {
        let base = match &api.domain {
            Some(domain) => join(&[domain.trim_end_matches('/'), &api.version]),
            None => join(&[origin.unwrap_or("").trim_end_matches('/'), &api.prefix, &api.version]),
        };
        Self { base }
    }

    /// API root, e.g. `http://localhost:3000/api/v1`
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn resource(&self, url: &str, id: Option<&str>) -> String {
        match id {
            Some(id) if !id.is_empty() => format!("{}/{}/{}", self.base, url, id),
            _ => format!("{}/{}", self.base, url),
        }
    }

    /// Collection link carrying the request query with `replace` applied
    pub fn with_query(&self, url: &str, params: &QueryParams, replace: &[(&str, String)]) -> String {
        let query = params.rewrite(replace);
        let link = self.resource(url, None);
        if query.is_empty() {
            link
        } else {
            format!("{}?{}", link, query)
        }
    }
}

fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(part);
        } else if !part.is_empty() {
            out.push('/');
            out.push_str(part);
        }
    }
    out
}

/// `scheme://host` of the request, from `Host` and `X-Forwarded-Proto`
pub fn request_origin(headers: &axum::http::HeaderMap) -> Option<String> {
    let host = headers.get(axum::http::header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Some(format!("{}://{}", scheme, host))
}
