//! Card data model: records, lookup keys and image formats

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Snapshot of one card printing as returned by Scryfall
///
/// The fields the cache needs are promoted to named fields; everything else
/// Scryfall sends is kept verbatim in `extra` and reachable via [`CardRecord::field`].
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CardRecord {
    /// Scryfall ID, the canonical cache key
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtgo_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtgo_foil_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multiverse_ids: Vec<u64>,
    /// Image format name to remote URL
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_uris: BTreeMap<String, String>,
    /// Remaining metadata, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CardRecord {
    /// Fill in derived fields after a fetch
    ///
    /// Double-faced cards carry no top-level `image_uris`; their images live
    /// on the faces, so the front face's images are promoted.
    pub fn normalized(mut self) -> Self {
        if self.image_uris.is_empty() {
            if let Some(uris) = self.face_image_uris() {
                self.image_uris = uris;
            }
        }
        self.id = self.id.to_lowercase();
        self.set = self.set.to_lowercase();
        self
    }

    fn face_image_uris(&self) -> Option<BTreeMap<String, String>> {
        let faces = self.extra.get("card_faces")?.as_array()?;
        faces.iter().find_map(|face| {
            let uris = face.get("image_uris")?.as_object()?;
            Some(
                uris.iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .collect(),
            )
        })
    }

    /// Raw access to any metadata field not promoted to a named field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn set_name(&self) -> Option<&str> {
        self.str_field("set_name")
    }

    pub fn type_line(&self) -> Option<&str> {
        self.str_field("type_line")
    }

    pub fn mana_cost(&self) -> Option<&str> {
        self.str_field("mana_cost")
    }

    pub fn oracle_text(&self) -> Option<&str> {
        self.str_field("oracle_text")
    }

    pub fn rarity(&self) -> Option<&str> {
        self.str_field("rarity")
    }

    /// URL of the image in the given format, if Scryfall provides one
    pub fn image_url(&self, format: ImageFormat) -> Option<&str> {
        self.image_uris.get(format.as_str()).map(String::as_str)
    }

    /// Foreign keys that identify exactly this printing
    ///
    /// Names are deliberately absent: one name covers many printings.
    pub fn intrinsic_keys(&self) -> Vec<LookupKey> {
        let mut keys = Vec::new();
        if let Some(id) = self.mtgo_id {
            keys.push(LookupKey::Mtgo(id));
        }
        if let Some(id) = self.mtgo_foil_id {
            keys.push(LookupKey::MtgoFoil(id));
        }
        for id in &self.multiverse_ids {
            keys.push(LookupKey::Multiverse(*id));
        }
        if !self.set.is_empty() && !self.collector_number.is_empty() {
            keys.push(LookupKey::set_number(&self.set, &self.collector_number));
        }
        keys
    }
}

impl fmt::Display for CardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.id)
    }
}

/// Key used to resolve a card
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    /// Scryfall ID
    Id(String),
    Mtgo(u64),
    MtgoFoil(u64),
    Multiverse(u64),
    /// Exact card name, optionally restricted to one set
    Name { name: String, set: Option<String> },
    SetNumber { set: String, number: String },
}

impl LookupKey {
    /// Scryfall IDs are UUIDs, so the key is case-folded
    pub fn id(id: &str) -> Self {
        LookupKey::Id(id.to_lowercase())
    }

    pub fn name(name: impl Into<String>) -> Self {
        LookupKey::Name {
            name: name.into(),
            set: None,
        }
    }

    pub fn name_in_set(name: impl Into<String>, set: &str) -> Self {
        LookupKey::Name {
            name: name.into(),
            set: Some(set.to_lowercase()),
        }
    }

    pub fn set_number(set: &str, number: impl Into<String>) -> Self {
        LookupKey::SetNumber {
            set: set.to_lowercase(),
            number: number.into(),
        }
    }

    /// Whether the key already is the canonical Scryfall ID
    pub fn is_canonical(&self) -> bool {
        matches!(self, LookupKey::Id(_))
    }

    /// Stable textual form, used for the foreign key table and fetch deduplication
    ///
    /// Scryfall matches exact names case-insensitively, so names are folded.
    pub fn cache_key(&self) -> String {
        match self {
            LookupKey::Id(id) => format!("id:{}", id.to_lowercase()),
            LookupKey::Mtgo(id) => format!("mtgo:{}", id),
            LookupKey::MtgoFoil(id) => format!("mtgo_foil:{}", id),
            LookupKey::Multiverse(id) => format!("multiverse:{}", id),
            LookupKey::Name { name, set: None } => format!("name:{}", name.to_lowercase()),
            LookupKey::Name {
                name,
                set: Some(set),
            } => format!("name:{}@{}", name.to_lowercase(), set.to_lowercase()),
            LookupKey::SetNumber { set, number } => {
                format!("set:{}/{}", set.to_lowercase(), number)
            }
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Id(id) => write!(f, "id {}", id),
            LookupKey::Mtgo(id) => write!(f, "MTGO id {}", id),
            LookupKey::MtgoFoil(id) => write!(f, "foil MTGO id {}", id),
            LookupKey::Multiverse(id) => write!(f, "multiverse id {}", id),
            LookupKey::Name { name, set: None } => write!(f, "name {:?}", name),
            LookupKey::Name {
                name,
                set: Some(set),
            } => write!(f, "name {:?} in set {}", name, set),
            LookupKey::SetNumber { set, number } => write!(f, "{}/{}", set, number),
        }
    }
}

/// Image versions offered by Scryfall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Small,
    Normal,
    Large,
    Png,
    ArtCrop,
    BorderCrop,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 6] = [
        ImageFormat::Small,
        ImageFormat::Normal,
        ImageFormat::Large,
        ImageFormat::Png,
        ImageFormat::ArtCrop,
        ImageFormat::BorderCrop,
    ];

    /// Name used by Scryfall in `image_uris`
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Small => "small",
            ImageFormat::Normal => "normal",
            ImageFormat::Large => "large",
            ImageFormat::Png => "png",
            ImageFormat::ArtCrop => "art_crop",
            ImageFormat::BorderCrop => "border_crop",
        }
    }

    /// Everything Scryfall serves is JPEG except the PNG version
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            _ => "jpg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CacheError::UnknownImageFormat(s.to_string()))
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
