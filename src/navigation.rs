//! Routes the AR core can ask the shell to open. The core never navigates
//! by itself; it hands a [`Route`] to a [`Navigator`].

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, SiteRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Route {
    Home,
    SiteDetail(String),
    ArViewer(String),
    Scanner,
    Governor(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::SiteDetail(id) => format!("/sites/{id}"),
            Route::ArViewer(id) => format!("/ar/{id}"),
            Route::Scanner => "/scan".to_string(),
            Route::Governor(id) => format!("/governors/{id}"),
        }
    }

    pub fn parse(path: &str) -> Option<Route> {
        let trimmed = path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Some(Route::Home);
        }

        let mut parts = trimmed.trim_start_matches('/').splitn(2, '/');
        let head = parts.next()?;
        let tail = parts.next().filter(|id| !id.is_empty() && !id.contains('/'));

        match (head, tail) {
            ("scan", None) => Some(Route::Scanner),
            ("sites", Some(id)) => Some(Route::SiteDetail(id.to_string())),
            ("ar", Some(id)) => Some(Route::ArViewer(id.to_string())),
            ("governors", Some(id)) => Some(Route::Governor(id.to_string())),
            _ => None,
        }
    }
}

/// Shell-side navigation. Implementations must not block.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// The site id a session was opened for, as read from a deep link.
#[derive(Debug, Clone, PartialEq)]
pub enum DeepLink<'a> {
    Found(&'a SiteRecord),
    NotFound(String),
}

impl<'a> DeepLink<'a> {
    pub fn requested_site(catalog: &'a dyn Catalog, requested_id: &str) -> DeepLink<'a> {
        match catalog.find_site_by_id(requested_id) {
            Some(site) => DeepLink::Found(site),
            None => DeepLink::NotFound(requested_id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;

    #[test]
    fn paths_round_trip_through_parse() {
        for route in [
            Route::Home,
            Route::Scanner,
            Route::ArViewer("masjid-jamik".into()),
            Route::SiteDetail("tugu-thomas-parr".into()),
            Route::Governor("rohidin-mersyah".into()),
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert_eq!(Route::parse("/ar/"), None);
        assert_eq!(Route::parse("/ar/a/b"), None);
        assert_eq!(Route::parse("/museum"), None);
    }

    #[test]
    fn deep_link_to_unknown_site_is_not_found() {
        let catalog = StaticCatalog::embedded();
        assert!(matches!(
            DeepLink::requested_site(catalog, "benteng-marlborough"),
            DeepLink::Found(site) if site.id == "benteng-marlborough"
        ));
        assert_eq!(
            DeepLink::requested_site(catalog, "atlantis"),
            DeepLink::NotFound("atlantis".into())
        );
    }
}
