//! Submission format consumed by the network validator.
//!
//! A [`CanonicalProperty`] is rendered into a [`PropertyDocument`] whose
//! JSON layout (`ids`, `property`, `home_sales`, `market_context`) is fixed
//! by the validator, then wrapped in a [`DataEntity`] carrying the listing
//! uri and the zipcode label.

use super::{CanonicalProperty, Source};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const SCHEMA_VERSION: &str = "1.0";
const TRANSACTION_SOLD: &str = "sold";

#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetadata {
    pub version: String,
    pub description: String,
    pub collection_date: String,
    pub miner_hot_key: Option<String>,
}

impl DocumentMetadata {
    pub fn new(source: Source, collected_at: DateTime<Utc>, miner_hot_key: Option<String>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            description: format!("Property data from {}", source),
            collection_date: collected_at.format("%Y-%m-%d").to_string(),
            miner_hot_key,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderId {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MlsIds {
    pub mls_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdsSection {
    #[serde(flatten)]
    pub providers: BTreeMap<String, ProviderId>,
    pub mls: MlsIds,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationSection {
    pub addresses: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturesSection {
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub full_bathrooms: Option<u32>,
    pub half_bathrooms: Option<u32>,
    pub stories: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizeSection {
    pub house_size_sqft: Option<u64>,
    pub lot_size_sqft: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicsSection {
    pub property_type: String,
    pub year_built: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySection {
    pub location: LocationSection,
    pub features: FeaturesSection,
    pub size: SizeSection,
    pub characteristics: CharacteristicsSection,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleRecord {
    pub date: String,
    pub value: f64,
    pub transaction_type: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeSalesSection {
    pub sales_history: Vec<SaleRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketContextSection {
    pub sale_date: String,
    pub final_sale_price: f64,
    pub days_on_market: Option<u32>,
}

/// JSON document submitted for one sold property
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDocument {
    pub metadata: DocumentMetadata,
    pub ids: IdsSection,
    pub property: PropertySection,
    pub home_sales: HomeSalesSection,
    pub market_context: MarketContextSection,
}

impl PropertyDocument {
    pub fn new(property: &CanonicalProperty, metadata: DocumentMetadata) -> Self {
        let source = property.source();
        let sale_date = property.sale.date.to_rfc3339_opts(SecondsFormat::Secs, false);
        let price = property.sale.final_sale_price as f64;

        let mut providers = BTreeMap::new();
        providers.insert(
            source.key().to_string(),
            ProviderId {
                id: property.identifiers.listing_id.clone(),
            },
        );

        Self {
            metadata,
            ids: IdsSection {
                providers,
                mls: MlsIds {
                    mls_number: property.identifiers.mls_number.clone(),
                },
            },
            property: PropertySection {
                location: LocationSection {
                    addresses: property.location.address.clone(),
                    city: property.location.city.clone(),
                    state: property.location.state.clone(),
                    zip_code: property.location.zip_code.clone(),
                    latitude: property.location.latitude,
                    longitude: property.location.longitude,
                },
                features: FeaturesSection {
                    bedrooms: property.features.bedrooms,
                    bathrooms: property.features.bathrooms,
                    full_bathrooms: property.features.full_bathrooms,
                    half_bathrooms: property.features.half_bathrooms,
                    stories: property.features.stories,
                },
                size: SizeSection {
                    house_size_sqft: property.size.living_area_sqft,
                    lot_size_sqft: property.size.lot_sqft,
                },
                characteristics: CharacteristicsSection {
                    property_type: property.characteristics.property_type.clone(),
                    year_built: property.characteristics.year_built,
                },
            },
            home_sales: HomeSalesSection {
                sales_history: vec![SaleRecord {
                    date: sale_date.clone(),
                    value: price,
                    transaction_type: TRANSACTION_SOLD.to_string(),
                    source: source.key().to_string(),
                }],
            },
            market_context: MarketContextSection {
                sale_date,
                final_sale_price: price,
                days_on_market: property.sale.days_on_market,
            },
        }
    }
}

/// Envelope handed to the submission transport
#[derive(Debug, Clone, Serialize)]
pub struct DataEntity {
    pub uri: String,
    pub datetime: DateTime<Utc>,
    pub source: Source,
    /// Zipcode the record was scraped for
    pub label: String,
    pub content: String,
    pub content_size_bytes: usize,
}

impl DataEntity {
    pub fn from_property(
        property: &CanonicalProperty,
        label: &str,
        scraped_at: DateTime<Utc>,
        miner_hot_key: Option<String>,
    ) -> serde_json::Result<Self> {
        let metadata = DocumentMetadata::new(property.source(), scraped_at, miner_hot_key);
        let content = serde_json::to_string(&PropertyDocument::new(property, metadata))?;

        Ok(Self {
            uri: property.source_uri.clone(),
            datetime: scraped_at,
            source: property.source(),
            label: label.to_string(),
            content_size_bytes: content.len(),
            content,
        })
    }
}
