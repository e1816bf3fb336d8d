//! Font catalog interface and fallback resolution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

/// Family substituted when a requested face cannot be loaded.
pub const DEFAULT_FONT_FAMILY: &str = "Inter";

/// Numeric CSS font weight, restricted to "100".."900" in steps of 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontWeight(u16);

impl FontWeight {
    pub const REGULAR: Self = Self(400);
    pub const BOLD: Self = Self(700);

    /// All nine weights, lightest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=9).map(|n| Self(n * 100))
    }

    pub fn new(value: u16) -> Option<Self> {
        (value % 100 == 0 && (100..=900).contains(&value)).then_some(Self(value))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::REGULAR
    }
}

impl std::fmt::Display for FontWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FontWeight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("invalid font weight {s:?}"))
    }
}

impl TryFrom<String> for FontWeight {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontWeight> for String {
    fn from(weight: FontWeight) -> Self {
        weight.to_string()
    }
}

/// A family offered by the catalog with the weights it ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontFamily {
    pub family: String,
    pub weights: Vec<FontWeight>,
}

/// Source of font families and loader for individual faces.
#[async_trait]
pub trait FontCatalog: Send + Sync {
    async fn list_fonts(&self) -> Vec<FontFamily>;

    /// Resolves once the face is ready for measurement and rendering.
    async fn ensure_font_loaded(&self, family: &str, weight: FontWeight) -> Result<()>;
}

/// Weights offered for `family`; every weight when the catalog doesn't know it.
pub fn available_weights(fonts: &[FontFamily], family: &str) -> Vec<FontWeight> {
    fonts
        .iter()
        .find(|f| f.family == family)
        .map(|f| f.weights.clone())
        .unwrap_or_else(|| FontWeight::all().collect())
}

/// Load a face, substituting the default face when it is unavailable.
///
/// Returns the family and weight that ended up loaded.
pub async fn resolve_font(
    catalog: &dyn FontCatalog,
    family: &str,
    weight: FontWeight,
) -> (String, FontWeight) {
    match catalog.ensure_font_loaded(family, weight).await {
        Ok(()) => (family.to_string(), weight),
        Err(err) => {
            tracing::warn!("{err}; falling back to {DEFAULT_FONT_FAMILY} {}", FontWeight::REGULAR);
            if let Err(err) = catalog
                .ensure_font_loaded(DEFAULT_FONT_FAMILY, FontWeight::REGULAR)
                .await
            {
                tracing::warn!("fallback font unavailable: {err}");
            }
            (DEFAULT_FONT_FAMILY.to_string(), FontWeight::REGULAR)
        }
    }
}

/// Built-in catalog used when no font service is configured.
///
/// Every listed face counts as loaded; anything else is a missing resource.
#[derive(Debug, Clone)]
pub struct StaticFontCatalog {
    fonts: Vec<FontFamily>,
}

impl StaticFontCatalog {
    pub fn new(fonts: Vec<FontFamily>) -> Self {
        Self { fonts }
    }
}

impl Default for StaticFontCatalog {
    fn default() -> Self {
        let family = |name: &str, weights: &[u16]| FontFamily {
            family: name.to_string(),
            weights: weights.iter().filter_map(|w| FontWeight::new(*w)).collect(),
        };
        Self::new(vec![
            family("Inter", &[100, 200, 300, 400, 500, 600, 700, 800, 900]),
            family("Roboto", &[100, 300, 400, 500, 700, 900]),
            family("Open Sans", &[300, 400, 500, 600, 700, 800]),
            family("Lato", &[100, 300, 400, 700, 900]),
            family("Montserrat", &[100, 200, 300, 400, 500, 600, 700, 800, 900]),
        ])
    }
}

#[async_trait]
impl FontCatalog for StaticFontCatalog {
    async fn list_fonts(&self) -> Vec<FontFamily> {
        self.fonts.clone()
    }

    async fn ensure_font_loaded(&self, family: &str, weight: FontWeight) -> Result<()> {
        let known = self
            .fonts
            .iter()
            .any(|f| f.family == family && f.weights.contains(&weight));
        if known {
            Ok(())
        } else {
            Err(EditorError::MissingResource {
                family: family.to_string(),
                weight: weight.to_string(),
            })
        }
    }
}
