//! Catalog records. Loaded once, never mutated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A heritage site as shown in the browser and AR viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub id: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

impl SiteRecord {
    pub fn has_model(&self) -> bool {
        self.model_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorRecord {
    pub id: String,
    pub name: String,
    pub term: String,
    #[serde(default)]
    pub party: Option<String>,
    pub photo: String,
    pub biography: String,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
}
