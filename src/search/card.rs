//! Card records returned by the search backend.
//!
//! The backend proxies a Scryfall-style catalogue, and older rows use
//! different key names (`setcode`, `number`, `uuid`). Every field is
//! optional on the wire; accessors pick whichever key is present.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageUris {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prices {
    #[serde(default)]
    pub usd: Option<String>,
    #[serde(default)]
    pub usd_foil: Option<String>,
}

/// One card printing as returned by the search service. Never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardCandidate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub scryfall_id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub setcode: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub collector_number: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub card_faces: Vec<CardFace>,
    #[serde(default)]
    pub prices: Option<Prices>,
}

fn first_non_empty<'a>(options: &[&'a Option<String>]) -> &'a str {
    options
        .iter()
        .copied()
        .filter_map(|o| o.as_deref())
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

impl CardCandidate {
    /// Stable printing identifier.
    pub fn identifier(&self) -> &str {
        first_non_empty(&[&self.scryfall_id, &self.id, &self.uuid])
    }

    pub fn name(&self) -> &str {
        first_non_empty(&[&self.name])
    }

    pub fn set_code(&self) -> &str {
        first_non_empty(&[&self.set, &self.setcode])
    }

    pub fn set_name(&self) -> &str {
        first_non_empty(&[&self.set_name, &self.setcode])
    }

    pub fn collector_number(&self) -> &str {
        first_non_empty(&[&self.collector_number, &self.number])
    }

    /// Small image reference, falling back to the front face for double-faced cards.
    pub fn image_ref(&self) -> Option<&str> {
        let front_face = self
            .card_faces
            .first()
            .and_then(|f| f.image_uris.as_ref())
            .and_then(|u| u.small.as_deref());
        self.image_uri
            .as_deref()
            .or_else(|| self.image_uris.as_ref().and_then(|u| u.small.as_deref()))
            .or(front_face)
    }

    /// Display price for the given finish, "0.00" when unknown.
    pub fn price(&self, foil: bool) -> &str {
        let prices = self.prices.as_ref();
        let price = if foil {
            prices.and_then(|p| p.usd_foil.as_deref())
        } else {
            prices.and_then(|p| p.usd.as_deref())
        };
        price.unwrap_or("0.00")
    }

    #[cfg(test)]
    pub fn named(id: &str, name: &str, set: &str, number: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            set: Some(set.to_string()),
            collector_number: Some(number.to_string()),
            ..Default::default()
        }
    }
}
