//! Map style references, presets and the access credential used to load them.

use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::color::Color;

mod resolver;
mod summary;

pub use resolver::{redact, StyleHost, StyleResolver, TileEndpoint};
pub use summary::StyleSummary;

/// Style every other style falls back to when it turns out to be broken.
pub const BASELINE_STYLE: &str = "mapbox://styles/mapbox/streets-v11";
/// Newer revision of the baseline style, offered as the first preset.
pub const STREETS_V12: &str = "mapbox://styles/mapbox/streets-v12";

/// Reference to a style: either a symbolic `scheme://namespace/path` identifier or a full HTTP(S)
/// URL. Cheap to clone, never modified after creation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StyleRef(Arc<str>);

impl StyleRef {
    /// Creates a new style reference.
    pub fn new(reference: impl AsRef<str>) -> Self {
        Self(Arc::from(reference.as_ref()))
    }

    /// The baseline style.
    pub fn baseline() -> Self {
        Self::new(BASELINE_STYLE)
    }

    /// String form of the reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for StyleRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StyleRef({})", self.0)
    }
}

impl Display for StyleRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StyleRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Access token of the map style service.
///
/// `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps the token. Returns `None` for blank strings.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        (!token.is_empty()).then_some(Self(token))
    }

    /// The token value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Named style offered in the inspector panel.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePreset {
    /// Button label.
    pub label: String,
    /// Style to switch to.
    pub style: StyleRef,
    /// Button fill color.
    pub background: Color,
    /// Button text color.
    pub foreground: Color,
}

impl StylePreset {
    /// Creates a new preset.
    pub fn new(
        label: impl Into<String>,
        style: StyleRef,
        background: Color,
        foreground: Color,
    ) -> Self {
        Self {
            label: label.into(),
            style,
            background,
            foreground,
        }
    }
}

/// Presets shown in the inspector by default.
pub fn default_presets() -> Vec<StylePreset> {
    [
        ("Streets v12", STREETS_V12, "#9ca3af", "#111827"),
        (
            "GreenNova",
            "mapbox://styles/ghernandezd/cmfa8j9l2005d01s5eagv0mru",
            "#16a34a",
            "#ffffff",
        ),
        (
            "Velvet",
            "mapbox://styles/ghernandezd/cmfaa96su001u01qoeqft1zot",
            "#7c3aed",
            "#ffffff",
        ),
        (
            "BloodyWaters",
            "mapbox://styles/ghernandezd/cmghesr1300it01sb77bb1iky",
            "#ef4444",
            "#ffffff",
        ),
        (
            "Decimal 2.0",
            "mapbox://styles/ghernandezd/cmfabck50006201rw11b7d8fd",
            "#0ea5e9",
            "#04202e",
        ),
    ]
    .into_iter()
    .map(|(label, style, background, foreground)| {
        StylePreset::new(
            label,
            StyleRef::new(style),
            Color::parse_hex(background).unwrap_or(Color::BLACK),
            Color::parse_hex(foreground).unwrap_or(Color::WHITE),
        )
    })
    .collect()
}
