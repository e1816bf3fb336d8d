//! Snapshot codec: the document's layer sequence as comparable JSON text.
//!
//! Snapshots exclude the background image, which is tracked separately.
//! Encoding is deterministic: struct fields serialize in declaration order, so
//! two structurally equal layer sequences produce identical text.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{EditorError, Result};
use crate::fonts::{FontCatalog, resolve_font};
use crate::layers::{Layer, LayerId};

const FORMAT_VERSION: u32 = 1;

/// Serialized layer sequence at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    /// Wrap stored snapshot text without validating it.
    pub fn from_raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    layers: &'a [Layer],
}

#[derive(Deserialize)]
struct SnapshotOwned {
    version: u32,
    layers: Vec<Layer>,
}

/// Encode every layer of the document, including `locked` and `name`.
pub fn encode(document: &Document) -> Result<Snapshot> {
    encode_layers(document.layers())
}

pub fn encode_layers(layers: &[Layer]) -> Result<Snapshot> {
    let body = SnapshotRef {
        version: FORMAT_VERSION,
        layers,
    };
    serde_json::to_string(&body)
        .map(Snapshot)
        .map_err(EditorError::CorruptSnapshot)
}

/// Parse snapshot text into layers without resolving any resources.
pub fn parse(snapshot: &Snapshot) -> Result<Vec<Layer>> {
    let parsed: SnapshotOwned =
        serde_json::from_str(&snapshot.0).map_err(EditorError::CorruptSnapshot)?;
    if parsed.version != FORMAT_VERSION {
        return Err(EditorError::CorruptSnapshot(serde_json::Error::custom(format!(
            "unsupported snapshot version {}",
            parsed.version
        ))));
    }
    Ok(parsed.layers)
}

/// Parse and resolve fonts so every layer is ready to render.
///
/// Faces that fail to load are replaced by the default face.
pub async fn decode_layers(snapshot: &Snapshot, fonts: &dyn FontCatalog) -> Result<Vec<Layer>> {
    let mut layers = parse(snapshot)?;
    for layer in &mut layers {
        resolve_layer_font(layer, fonts).await;
    }
    Ok(layers)
}

/// Replace the target document's layers with the decoded ones.
///
/// The document is untouched unless decoding succeeds completely; the
/// background is never touched.
pub async fn decode_into(
    snapshot: &Snapshot,
    target: &mut Document,
    fonts: &dyn FontCatalog,
) -> Result<()> {
    let layers = decode_layers(snapshot, fonts).await?;
    target.replace_layers(layers);
    Ok(())
}

/// Deep copy of a single layer under a fresh id, ready to render.
pub async fn clone_layer(layer: &Layer, fonts: &dyn FontCatalog) -> Result<Layer> {
    let text = serde_json::to_string(layer).map_err(EditorError::CorruptSnapshot)?;
    let mut clone: Layer = serde_json::from_str(&text).map_err(EditorError::CorruptSnapshot)?;
    clone.id = LayerId::new();
    resolve_layer_font(&mut clone, fonts).await;
    Ok(clone)
}

async fn resolve_layer_font(layer: &mut Layer, fonts: &dyn FontCatalog) {
    if let Some(text) = layer.as_text_mut() {
        let (family, weight) = resolve_font(fonts, &text.font_family, text.font_weight).await;
        text.font_family = family;
        text.font_weight = weight;
    }
}
