use super::coerce;
use super::dedup::address_key;
use super::extractor::{Extractor, Field};
use crate::error::{RejectReason, Rejection};
use crate::models::{
    CanonicalProperty, Characteristics, Features, Identifiers, Location, Sale, Size, Source,
};
use serde_json::Value;

/// Category used when a provider type code is not in the table
pub const DEFAULT_PROPERTY_TYPE: &str = "Residential";

/// Provider type codes → canonical category. Redfin sends numeric codes,
/// Zillow sends upper-case names.
const PROPERTY_TYPES: &[(&str, &str)] = &[
    ("1", "Single Family Residential"),
    ("2", "Condo/Co-op"),
    ("3", "Townhouse"),
    ("4", "Multi-Family"),
    ("5", "Land"),
    ("6", "Other"),
    ("SINGLE_FAMILY", "Single Family Residential"),
    ("CONDO", "Condo/Co-op"),
    ("TOWNHOUSE", "Townhouse"),
    ("MULTI_FAMILY", "Multi-Family"),
    ("LOT", "Land"),
    ("LAND", "Land"),
    ("MANUFACTURED", "Manufactured"),
];

pub fn canonical_property_type(code: Option<&Value>) -> &'static str {
    let code = match code {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_ascii_uppercase(),
        _ => return DEFAULT_PROPERTY_TYPE,
    };
    PROPERTY_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, category)| *category)
        .unwrap_or(DEFAULT_PROPERTY_TYPE)
}

/// Turns one raw provider listing into a [`CanonicalProperty`] or a [`Rejection`]
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    source: Source,
    extractor: Extractor,
}

impl RecordBuilder {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            extractor: Extractor::for_source(source),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Build a record for a listing scraped under `region`.
    ///
    /// Required fields are checked in a fixed order (address, zip, price,
    /// sale date) and the first failure is reported. The zip falls back to
    /// the scraped region when the listing has none; city and state default
    /// to empty text.
    pub fn build(&self, raw: &Value, region: &str) -> Result<CanonicalProperty, Rejection> {
        if !raw.is_object() {
            return Err(Rejection {
                field: Field::ListingId,
                reason: RejectReason::NotAnObject,
            });
        }
        let get = |field| self.extractor.extract(raw, field);

        let address = coerce::required(Field::Address, get(Field::Address), coerce::text)?;
        let zip_code = coerce::optional(get(Field::ZipCode), coerce::zip_code)
            .map(Ok)
            .unwrap_or_else(|| coerce::zip_code(&Value::String(region.to_string())))
            .map_err(|err| Rejection {
                field: Field::ZipCode,
                reason: err.into(),
            })?;
        let price = coerce::required(Field::Price, get(Field::Price), coerce::amount)?;
        let sale_date = coerce::required(Field::SaleDate, get(Field::SaleDate), coerce::timestamp)?;

        let city = coerce::optional(get(Field::City), coerce::text).unwrap_or_default();
        let state = coerce::optional(get(Field::State), coerce::text).unwrap_or_default();

        let (listing_id, synthesized) = match coerce::optional(get(Field::ListingId), coerce::text) {
            Some(id) => (id, false),
            None => (address_key(&address, &zip_code), true),
        };

        let source_uri = self.source_uri(
            coerce::optional(get(Field::Url), coerce::text),
            &listing_id,
            synthesized,
            &zip_code,
        );

        Ok(CanonicalProperty {
            identifiers: Identifiers {
                source: self.source,
                listing_id,
                synthesized,
                mls_number: coerce::optional(get(Field::MlsNumber), coerce::text),
            },
            location: Location {
                address,
                city,
                state,
                zip_code,
                latitude: coerce::optional(get(Field::Latitude), coerce::latitude),
                longitude: coerce::optional(get(Field::Longitude), coerce::longitude),
            },
            features: Features {
                bedrooms: coerce::optional(get(Field::Bedrooms), coerce::count),
                bathrooms: coerce::optional(get(Field::Bathrooms), coerce::float),
                full_bathrooms: coerce::optional(get(Field::FullBathrooms), coerce::count),
                half_bathrooms: coerce::optional(get(Field::HalfBathrooms), coerce::count),
                stories: coerce::optional(get(Field::Stories), coerce::count),
            },
            size: Size {
                living_area_sqft: coerce::optional(get(Field::LivingArea), coerce::amount),
                lot_sqft: coerce::optional(get(Field::LotSize), coerce::amount),
            },
            characteristics: Characteristics {
                property_type: canonical_property_type(
                    get(Field::PropertyType).map(|raw| raw.value()),
                )
                .to_string(),
                year_built: coerce::optional(get(Field::YearBuilt), coerce::count),
            },
            sale: Sale {
                date: sale_date,
                final_sale_price: price,
                days_on_market: coerce::optional(get(Field::DaysOnMarket), coerce::count),
            },
            source_uri,
        })
    }

    fn source_uri(&self, url: Option<String>, id: &str, synthesized: bool, zip: &str) -> String {
        let base = self.source.base_url();
        match url {
            Some(url) if url.starts_with("http") => url,
            Some(path) if path.starts_with('/') => format!("{}{}", base, path),
            Some(path) => format!("{}/{}", base, path),
            None if synthesized => match self.source {
                Source::Zillow => format!("{}/homes/{}_rb/", base, zip),
                Source::Redfin => format!("{}/zipcode/{}", base, zip),
            },
            None => match self.source {
                Source::Zillow => format!("{}/homedetails/{}_zpid/", base, id),
                Source::Redfin => format!("{}/home/{}", base, id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const SOLD_MS: i64 = 1710460800000;

    fn redfin_home() -> Value {
        json!({
            "propertyId": "123",
            "streetLine": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zip": "62701",
            "price": 500000,
            "soldDate": SOLD_MS,
        })
    }

    #[test]
    fn test_minimal_redfin_listing() {
        let property = RecordBuilder::new(Source::Redfin)
            .build(&redfin_home(), "62701")
            .unwrap();

        assert_eq!(property.identifiers.listing_id, "123");
        assert!(!property.identifiers.synthesized);
        assert_eq!(property.location.address, "1 Main St");
        assert_eq!(property.sale.final_sale_price, 500_000);
        assert_eq!(
            property.sale.date,
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(property.characteristics.property_type, DEFAULT_PROPERTY_TYPE);
        assert_eq!(property.source_uri, "https://www.redfin.com/home/123");
        assert_eq!(property.features, Features::default());
    }

    #[test]
    fn test_full_redfin_listing_with_wrappers() {
        let raw = json!({
            "propertyId": 98765,
            "mlsId": { "label": "MLS#", "value": "ML81912345" },
            "streetLine": { "value": "55 Elm Ct" },
            "city": "San Jose",
            "state": "CA",
            "zip": "95112",
            "latLong": { "value": { "latitude": 37.34, "longitude": -121.89 } },
            "price": { "value": 1250000, "level": 1 },
            "soldDate": SOLD_MS,
            "beds": 3.0,
            "baths": 2.5,
            "fullBaths": 2,
            "partialBaths": 1,
            "stories": 2,
            "sqFt": { "value": 1640 },
            "lotSize": { "value": 6000 },
            "yearBuilt": { "value": 1958 },
            "dom": { "value": 9 },
            "propertyType": 3,
            "url": "/CA/San-Jose/55-Elm-Ct-95112/home/98765",
        });

        let property = RecordBuilder::new(Source::Redfin).build(&raw, "95112").unwrap();

        assert_eq!(property.identifiers.listing_id, "98765");
        assert_eq!(property.identifiers.mls_number.as_deref(), Some("ML81912345"));
        assert_eq!(property.location.latitude, Some(37.34));
        assert_eq!(property.location.longitude, Some(-121.89));
        assert_eq!(property.features.bedrooms, Some(3));
        assert_eq!(property.features.bathrooms, Some(2.5));
        assert_eq!(property.features.half_bathrooms, Some(1));
        assert_eq!(property.size.living_area_sqft, Some(1640));
        assert_eq!(property.size.lot_sqft, Some(6000));
        assert_eq!(property.characteristics.property_type, "Townhouse");
        assert_eq!(property.characteristics.year_built, Some(1958));
        assert_eq!(property.sale.days_on_market, Some(9));
        assert_eq!(
            property.source_uri,
            "https://www.redfin.com/CA/San-Jose/55-Elm-Ct-95112/home/98765"
        );
    }

    #[test]
    fn test_zillow_listing_from_nested_home_info() {
        let raw = json!({
            "zpid": "2077447466",
            "address": "800 Pine St APT 4, Seattle, WA 98101",
            "addressCity": "Seattle",
            "addressState": "WA",
            "addressZipcode": "98101",
            "price": "$715,000",
            "beds": 2,
            "baths": 2.0,
            "area": 1010,
            "detailUrl": "https://www.zillow.com/homedetails/800-Pine-St-APT-4/2077447466_zpid/",
            "hdpData": { "homeInfo": {
                "streetAddress": "800 Pine St APT 4",
                "price": 715000.0,
                "dateSold": SOLD_MS,
                "homeType": "CONDO",
                "daysOnZillow": 31
            }}
        });

        let property = RecordBuilder::new(Source::Zillow).build(&raw, "98101").unwrap();

        assert_eq!(property.location.address, "800 Pine St APT 4");
        assert_eq!(property.sale.final_sale_price, 715_000);
        assert_eq!(property.characteristics.property_type, "Condo/Co-op");
        assert_eq!(property.sale.days_on_market, Some(31));
        assert!(property.source_uri.ends_with("2077447466_zpid/"));
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let mut raw = redfin_home();
        raw.as_object_mut().unwrap().remove("price");

        let err = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap_err();
        assert_eq!(err.field, Field::Price);
        assert_eq!(err.reason, RejectReason::Missing);
    }

    #[test]
    fn test_first_failing_required_field_is_reported() {
        let raw = json!({ "propertyId": "1", "price": "n/a" });

        let err = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap_err();
        assert_eq!(err.field, Field::Address);
    }

    #[test]
    fn test_negative_price_and_bad_date_are_rejected() {
        let mut raw = redfin_home();
        raw["price"] = json!(-10);
        let err = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap_err();
        assert_eq!(err.field, Field::Price);

        let mut raw = redfin_home();
        raw["soldDate"] = json!("someday");
        let err = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap_err();
        assert_eq!(err.field, Field::SaleDate);
    }

    #[test]
    fn test_invalid_optional_fields_become_none() {
        let mut raw = redfin_home();
        raw["beds"] = json!("studio");
        raw["sqFt"] = json!(-40);
        raw["latLong"] = json!({ "value": { "latitude": 512.0 } });

        let property = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap();
        assert_eq!(property.features.bedrooms, None);
        assert_eq!(property.size.living_area_sqft, None);
        assert_eq!(property.location.latitude, None);
    }

    #[test]
    fn test_identifier_synthesized_from_address() {
        let mut raw = redfin_home();
        raw.as_object_mut().unwrap().remove("propertyId");
        raw.as_object_mut().unwrap().remove("zip");

        let property = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap();
        assert!(property.identifiers.synthesized);
        assert_eq!(property.identifiers.listing_id, "1 main st|62701");
        assert_eq!(property.location.zip_code, "62701");
        assert_eq!(property.source_uri, "https://www.redfin.com/zipcode/62701");
    }

    #[test]
    fn test_each_required_key_removed() {
        // (key removed, region, expected city/state/zip or the rejected field)
        let cases: &[(&str, &str, Result<(&str, &str, &str), Field>)] = &[
            ("streetLine", "62701", Err(Field::Address)),
            ("city", "62701", Ok(("", "IL", "62701"))),
            ("state", "62701", Ok(("Springfield", "", "62701"))),
            ("zip", "62702", Ok(("Springfield", "IL", "62702"))),
            ("zip", "", Err(Field::ZipCode)),
            ("price", "62701", Err(Field::Price)),
            ("soldDate", "62701", Err(Field::SaleDate)),
        ];
        let builder = RecordBuilder::new(Source::Redfin);

        for (key, region, expected) in cases {
            let mut raw = redfin_home();
            raw.as_object_mut().unwrap().remove(*key);

            let outcome = builder.build(&raw, region).map(|property| {
                (
                    property.location.city,
                    property.location.state,
                    property.location.zip_code,
                )
            });
            match (outcome, expected) {
                (Ok((city, state, zip)), Ok((want_city, want_state, want_zip))) => {
                    assert_eq!(
                        (city.as_str(), state.as_str(), zip.as_str()),
                        (*want_city, *want_state, *want_zip),
                        "without {}",
                        key
                    );
                }
                (Err(rejection), Err(field)) => assert_eq!(rejection.field, *field, "without {}", key),
                (outcome, expected) => panic!("without {}: got {:?}, want {:?}", key, outcome, expected),
            }
        }
    }

    #[test]
    fn test_listing_without_city_or_state() {
        let raw = json!({
            "propertyId": "123",
            "streetLine": "1 Main St",
            "price": 500000,
            "soldDate": SOLD_MS,
        });

        let property = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap();
        assert_eq!(property.location.city, "");
        assert_eq!(property.location.state, "");
        assert_eq!(property.location.zip_code, "62701");
        assert_eq!(property.sale.final_sale_price, 500_000);
    }

    #[test]
    fn test_float_typed_id_and_zip() {
        let mut raw = redfin_home();
        raw["propertyId"] = json!(98765.0);
        raw["zip"] = json!(2134.0);

        let property = RecordBuilder::new(Source::Redfin).build(&raw, "62701").unwrap();
        assert_eq!(property.identifiers.listing_id, "98765");
        assert_eq!(property.location.zip_code, "02134");
        assert_eq!(property.source_uri, "https://www.redfin.com/home/98765");
    }

    #[test]
    fn test_non_object_candidate() {
        let err = RecordBuilder::new(Source::Zillow)
            .build(&json!(["zpid", 1]), "98101")
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::NotAnObject);
    }

    #[test]
    fn test_property_type_table() {
        assert_eq!(canonical_property_type(Some(&json!(1))), "Single Family Residential");
        assert_eq!(canonical_property_type(Some(&json!("single_family"))), "Single Family Residential");
        assert_eq!(canonical_property_type(Some(&json!("MANUFACTURED"))), "Manufactured");
        assert_eq!(canonical_property_type(Some(&json!(13))), DEFAULT_PROPERTY_TYPE);
        assert_eq!(canonical_property_type(Some(&json!("APARTMENT"))), DEFAULT_PROPERTY_TYPE);
        assert_eq!(canonical_property_type(None), DEFAULT_PROPERTY_TYPE);
    }
}
