//! Upstream route registry.
//!
//! A static table of `(prefix, upstream base URL)` pairs, fixed at startup.
//! Lookups pick the longest prefix that matches on a path-segment boundary.

use crate::error::{GatewayError, Result};
use url::Url;

/// A single route table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Path prefix, with a leading `/` and no trailing `/` (except the root route `/`).
    pub prefix: String,
    /// Upstream base URL without a trailing `/`.
    pub upstream: String,
}

impl Route {
    /// Create a validated route.
    pub fn new(prefix: &str, upstream: &str) -> Result<Self> {
        let trimmed = prefix.trim().trim_end_matches('/');
        let prefix = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };

        let upstream = upstream.trim().trim_end_matches('/');
        let url = Url::parse(upstream)
            .map_err(|e| GatewayError::InvalidRoute(format!("{}: {}", upstream, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidRoute(format!(
                "{}: scheme must be http or https",
                upstream
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(GatewayError::InvalidRoute(format!(
                "{}: upstream must not carry a query or fragment",
                upstream
            )));
        }

        Ok(Self {
            prefix,
            upstream: upstream.to_string(),
        })
    }

    /// Whether `path` falls under this route's prefix.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Upstream URL for a request. The prefix is kept: upstreams serve the
    /// same prefixed paths the client used.
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.upstream, path_and_query)
    }
}

/// Read-only route table.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    /// Sorted by prefix length, longest first.
    routes: Vec<Route>,
}

impl RouteRegistry {
    /// Build a registry. Duplicate prefixes are rejected.
    pub fn new(mut routes: Vec<Route>) -> Result<Self> {
        routes.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        for pair in routes.windows(2) {
            if pair[0].prefix == pair[1].prefix {
                return Err(GatewayError::InvalidRoute(format!(
                    "duplicate prefix {}",
                    pair[0].prefix
                )));
            }
        }
        Ok(Self { routes })
    }

    /// Longest-prefix match for a request path (without query string).
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Registered prefixes, longest first.
    pub fn prefixes(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.prefix.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Parse a route table of the form `prefix=url,prefix=url`.
pub fn parse_routes(table: &str) -> Result<Vec<Route>> {
    table.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, upstream) = entry.split_once('=').ok_or_else(|| {
                GatewayError::InvalidRoute(format!("{}: expected prefix=url", entry))
            })?;
            Route::new(prefix, upstream)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RouteRegistry {
        RouteRegistry::new(vec![
            Route::new("/api/auth", "http://auth-service:3002").unwrap(),
            Route::new("/api/tasks", "http://tasks-service:3003").unwrap(),
            Route::new("/api/tasks/reports", "http://reports:4000/").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let routes = registry();
        assert_eq!(
            routes.resolve("/api/tasks/reports/weekly").unwrap().upstream,
            "http://reports:4000"
        );
        assert_eq!(
            routes.resolve("/api/tasks/42").unwrap().upstream,
            "http://tasks-service:3003"
        );
        assert_eq!(
            routes.resolve("/api/auth/login").unwrap().upstream,
            "http://auth-service:3002"
        );
    }

    #[test]
    fn test_segment_boundary() {
        let routes = registry();
        assert!(routes.resolve("/api/tasks").is_some());
        assert!(routes.resolve("/api/tasks/").is_some());
        assert!(routes.resolve("/api/tasksx").is_none());
        assert!(routes.resolve("/api").is_none());
        assert!(routes.resolve("/health").is_none());
    }

    #[test]
    fn test_target_keeps_full_path() {
        let routes = registry();
        let route = routes.resolve("/api/tasks/1").unwrap();
        assert_eq!(
            route.target_url("/api/tasks/1?page=2&size=10"),
            "http://tasks-service:3003/api/tasks/1?page=2&size=10"
        );
    }

    #[test]
    fn test_normalization() {
        let route = Route::new("api/tasks/", "http://tasks-service:3003/").unwrap();
        assert_eq!(route.prefix, "/api/tasks");
        assert_eq!(route.upstream, "http://tasks-service:3003");

        let root = Route::new("/", "http://fallback:8080").unwrap();
        assert_eq!(root.prefix, "/");
        assert!(root.matches("/anything"));
    }

    #[test]
    fn test_invalid_upstream() {
        assert!(Route::new("/api", "not a url").is_err());
        assert!(Route::new("/api", "ftp://files:21").is_err());
        assert!(Route::new("/api", "http://svc:1?x=1").is_err());
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let result = RouteRegistry::new(vec![
            Route::new("/api/tasks", "http://a:1").unwrap(),
            Route::new("/api/tasks/", "http://b:2").unwrap(),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_routes() {
        let routes =
            parse_routes("/api/auth=http://auth:3002, /api/tasks=http://tasks:3003,").unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].prefix, "/api/auth");
        assert_eq!(routes[1].upstream, "http://tasks:3003");

        assert!(parse_routes("/api/auth").is_err());
    }
}
