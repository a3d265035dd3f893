pub mod models;

pub use models::{GeoPoint, GovernorRecord, SiteRecord};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::log_error;

const ENABLE_LOGS: bool = true;

const EMBEDDED_CATALOG: &str = include_str!("../../data/catalog.json");

static EMBEDDED: OnceLock<StaticCatalog> = OnceLock::new();

/// Read-only lookup service for sites and governors.
///
/// The AR core only ever asks "does this id exist" and "give me the record",
/// so any backing store can stand in.
pub trait Catalog: Send + Sync {
    fn find_site_by_id(&self, id: &str) -> Option<&SiteRecord>;

    /// Site ids in catalog order.
    fn list_site_ids(&self) -> Vec<&str>;

    fn find_governor_by_id(&self, id: &str) -> Option<&GovernorRecord>;

    fn contains_site(&self, id: &str) -> bool {
        self.find_site_by_id(id).is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    sites: Vec<SiteRecord>,
    #[serde(default)]
    governors: Vec<GovernorRecord>,
}

#[derive(Debug, Clone)]
pub struct StaticCatalog {
    sites: Vec<SiteRecord>,
    governors: Vec<GovernorRecord>,
}

impl StaticCatalog {
    pub fn new(sites: Vec<SiteRecord>, governors: Vec<GovernorRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for site in &sites {
            if !seen.insert(site.id.as_str()) {
                bail!("duplicate site id '{}'", site.id);
            }
        }
        let mut seen = HashSet::new();
        for governor in &governors {
            if !seen.insert(governor.id.as_str()) {
                bail!("duplicate governor id '{}'", governor.id);
            }
        }
        Ok(Self { sites, governors })
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(contents).context("catalog data is not valid JSON")?;
        Self::new(file.sites, file.governors)
    }

    /// The catalog compiled into the binary, parsed on first use.
    pub fn embedded() -> &'static StaticCatalog {
        EMBEDDED.get_or_init(|| match Self::from_json(EMBEDDED_CATALOG) {
            Ok(catalog) => catalog,
            Err(err) => {
                log_error!("Embedded catalog rejected, starting empty: {err:#}");
                Self {
                    sites: Vec::new(),
                    governors: Vec::new(),
                }
            }
        })
    }

    pub fn sites(&self) -> &[SiteRecord] {
        &self.sites
    }

    pub fn list_governors(&self) -> &[GovernorRecord] {
        &self.governors
    }

    pub fn sites_with_models(&self) -> impl Iterator<Item = &SiteRecord> {
        self.sites.iter().filter(|site| site.has_model())
    }
}

impl Catalog for StaticCatalog {
    fn find_site_by_id(&self, id: &str) -> Option<&SiteRecord> {
        self.sites.iter().find(|site| site.id == id)
    }

    fn list_site_ids(&self) -> Vec<&str> {
        self.sites.iter().map(|site| site.id.as_str()).collect()
    }

    fn find_governor_by_id(&self, id: &str) -> Option<&GovernorRecord> {
        self.governors.iter().find(|governor| governor.id == id)
    }
}
