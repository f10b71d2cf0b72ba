//! Exclusion settings written by the settings editor and read by the colorizer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::color::HexColor;
use crate::defaults;

/// Channel labels that must never be tinted, each paired with the color the
/// editor stored for it.
///
/// The paired color is kept as written and is not interpreted here. Iteration
/// order is lexicographic by label and is the order exclusion matching scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionMap(BTreeMap<String, String>);

impl ExclusionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an exclusion. Returns the previously stored color.
    pub fn insert(&mut self, label: impl Into<String>, color: impl Into<String>) -> Option<String> {
        self.0.insert(label.into(), color.into())
    }

    pub fn remove(&mut self, label: &str) -> Option<String> {
        self.0.remove(label)
    }

    /// First configured label that `channel` equals or contains as a substring.
    ///
    /// An empty label is contained in every channel and so excludes all of them.
    pub fn matching_label(&self, channel: &str) -> Option<&str> {
        self.0
            .keys()
            .find(|label| channel == label.as_str() || channel.contains(label.as_str()))
            .map(String::as_str)
    }

    pub fn is_excluded(&self, channel: &str) -> bool {
        self.matching_label(channel).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExclusionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The stored colorizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Channels exempt from tinting.
    #[serde(default, alias = "channelColors")]
    pub channel_colors: ExclusionMap,

    /// Tint applied to every channel that is not excluded.
    #[serde(default = "defaults::default_color", alias = "defaultColor")]
    pub default_color: HexColor,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_colors: ExclusionMap::default(),
            default_color: defaults::default_color(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML (JSON exported from browser storage also parses).
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml_ng::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(contents)
    }

    pub fn with_default_color(mut self, color: HexColor) -> Self {
        self.default_color = color;
        self
    }

    pub fn with_exclusion(mut self, label: impl Into<String>, color: impl Into<String>) -> Self {
        self.channel_colors.insert(label, color);
        self
    }
}
