use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

mod document;

pub use document::{DataEntity, DocumentMetadata, PropertyDocument};

/// Source of the property listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Zillow,
    Redfin,
}

impl Source {
    /// Key used under `ids` and in sale records
    pub fn key(&self) -> &'static str {
        match self {
            Source::Zillow => "zillow",
            Source::Redfin => "redfin",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Source::Zillow => "https://www.zillow.com",
            Source::Redfin => "https://www.redfin.com",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Zillow => f.write_str("Zillow"),
            Source::Redfin => f.write_str("Redfin"),
        }
    }
}

/// Listing identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifiers {
    pub source: Source,
    /// Provider id, or the normalized `address|zip` key when the provider gave none
    pub listing_id: String,
    pub synthesized: bool,
    pub mls_number: Option<String>,
}

/// Location information for a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub full_bathrooms: Option<u32>,
    pub half_bathrooms: Option<u32>,
    pub stories: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub living_area_sqft: Option<u64>,
    pub lot_sqft: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    pub property_type: String,
    pub year_built: Option<u32>,
}

/// The closing sale that makes a listing "sold"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub date: DateTime<Utc>,
    pub final_sale_price: u64,
    pub days_on_market: Option<u32>,
}

/// Canonical sold-property record shared by every provider and fetch method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProperty {
    pub identifiers: Identifiers,
    pub location: Location,
    pub features: Features,
    pub size: Size,
    pub characteristics: Characteristics,
    pub sale: Sale,
    pub source_uri: String,
}

impl CanonicalProperty {
    pub fn source(&self) -> Source {
        self.identifiers.source
    }
}
