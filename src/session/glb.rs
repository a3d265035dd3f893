use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::loader::{LoadError, LoadedScene, ModelLoader};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const JSON_CHUNK: &[u8; 4] = b"JSON";
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

#[derive(Deserialize)]
struct GltfDocument {
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
    #[serde(default)]
    animations: Vec<GltfAnimation>,
}

#[derive(Deserialize)]
struct GltfAnimation {
    name: Option<String>,
}

/// Loads binary glTF models bundled with the app, resolving `/models/x.glb`
/// against `root`.
#[derive(Debug, Clone)]
pub struct GlbFileLoader {
    root: PathBuf,
}

impl GlbFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(url.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_)));
        if escapes || relative.as_os_str().is_empty() {
            return Err(LoadError::Fetch(format!("refusing model path '{url}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ModelLoader for GlbFileLoader {
    async fn load(&self, url: &str) -> Result<LoadedScene, LoadError> {
        let path = self.resolve(url)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| LoadError::Fetch(format!("{}: {err}", path.display())))?;
        parse_glb(&bytes)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Reads the header and JSON chunk of a GLB container. Binary buffers are
/// left to the renderer.
pub fn parse_glb(bytes: &[u8]) -> Result<LoadedScene, LoadError> {
    if bytes.get(..4) != Some(GLB_MAGIC.as_slice()) {
        return Err(LoadError::Parse("not a GLB file".into()));
    }
    let version = read_u32(bytes, 4).ok_or_else(|| LoadError::Parse("truncated header".into()))?;
    if version != 2 {
        return Err(LoadError::Parse(format!("unsupported glTF version {version}")));
    }

    let chunk_len = read_u32(bytes, HEADER_LEN)
        .ok_or_else(|| LoadError::Parse("missing JSON chunk".into()))? as usize;
    let chunk_type = bytes.get(HEADER_LEN + 4..HEADER_LEN + CHUNK_HEADER_LEN);
    if chunk_type != Some(JSON_CHUNK.as_slice()) {
        return Err(LoadError::Parse("first chunk is not JSON".into()));
    }

    let start = HEADER_LEN + CHUNK_HEADER_LEN;
    let json = start
        .checked_add(chunk_len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| LoadError::Parse("JSON chunk runs past end of file".into()))?;
    let document: GltfDocument =
        serde_json::from_slice(json).map_err(|err| LoadError::Parse(err.to_string()))?;

    Ok(LoadedScene {
        node_count: document.nodes.len(),
        animations: document
            .animations
            .into_iter()
            .enumerate()
            .map(|(index, animation)| {
                animation
                    .name
                    .unwrap_or_else(|| format!("animation-{index}"))
            })
            .collect(),
    })
}
