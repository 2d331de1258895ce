use crate::models::Source;
use serde_json::Value;
use std::fmt;

/// Canonical fields pulled out of a raw listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ListingId,
    MlsNumber,
    Address,
    City,
    State,
    ZipCode,
    Latitude,
    Longitude,
    Price,
    SaleDate,
    Bedrooms,
    Bathrooms,
    FullBathrooms,
    HalfBathrooms,
    Stories,
    LivingArea,
    LotSize,
    YearBuilt,
    DaysOnMarket,
    PropertyType,
    Url,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::ListingId => "listing_id",
            Field::MlsNumber => "mls_number",
            Field::Address => "address",
            Field::City => "city",
            Field::State => "state",
            Field::ZipCode => "zip_code",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Price => "final_sale_price",
            Field::SaleDate => "sale_date",
            Field::Bedrooms => "bedrooms",
            Field::Bathrooms => "bathrooms",
            Field::FullBathrooms => "full_bathrooms",
            Field::HalfBathrooms => "half_bathrooms",
            Field::Stories => "stories",
            Field::LivingArea => "living_area_sqft",
            Field::LotSize => "lot_sqft",
            Field::YearBuilt => "year_built",
            Field::DaysOnMarket => "days_on_market",
            Field::PropertyType => "property_type",
            Field::Url => "url",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value found in a raw listing.
///
/// Providers sometimes wrap scalars as `{"value": ...}`; the wrapper is
/// peeled off here so later stages only ever see the inner value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Scalar(&'a Value),
    Wrapped(&'a Value),
}

impl<'a> RawValue<'a> {
    pub fn value(&self) -> &'a Value {
        match self {
            RawValue::Scalar(value) | RawValue::Wrapped(value) => value,
        }
    }
}

/// Ordered source paths for each canonical field of one provider.
///
/// Paths are dot separated, numeric segments index into arrays, and any
/// step may pass through a `value` wrapper.
#[derive(Debug)]
pub struct FieldTable {
    entries: &'static [(Field, &'static [&'static str])],
}

impl FieldTable {
    pub fn for_source(source: Source) -> &'static FieldTable {
        match source {
            Source::Redfin => &REDFIN_FIELDS,
            Source::Zillow => &ZILLOW_FIELDS,
        }
    }

    pub fn paths(&self, field: Field) -> &'static [&'static str] {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, paths)| *paths)
            .unwrap_or(&[])
    }
}

pub static REDFIN_FIELDS: FieldTable = FieldTable {
    entries: &[
        (Field::ListingId, &["propertyId", "listingId"]),
        (Field::MlsNumber, &["mlsId"]),
        (Field::Address, &["streetLine", "address"]),
        (Field::City, &["city"]),
        (Field::State, &["state"]),
        (Field::ZipCode, &["zip", "postalCode"]),
        (Field::Latitude, &["latLong.latitude", "latitude"]),
        (Field::Longitude, &["latLong.longitude", "longitude"]),
        (Field::Price, &["price", "soldPrice"]),
        (Field::SaleDate, &["soldDate", "sashes.0.lastSaleDate", "lastSaleDate"]),
        (Field::Bedrooms, &["beds"]),
        (Field::Bathrooms, &["baths"]),
        (Field::FullBathrooms, &["fullBaths"]),
        (Field::HalfBathrooms, &["partialBaths"]),
        (Field::Stories, &["stories"]),
        (Field::LivingArea, &["sqFt"]),
        (Field::LotSize, &["lotSize"]),
        (Field::YearBuilt, &["yearBuilt"]),
        (Field::DaysOnMarket, &["dom", "timeOnRedfin"]),
        (Field::PropertyType, &["propertyType"]),
        (Field::Url, &["url"]),
    ],
};

pub static ZILLOW_FIELDS: FieldTable = FieldTable {
    entries: &[
        (Field::ListingId, &["zpid"]),
        (Field::MlsNumber, &["hdpData.homeInfo.mlsId"]),
        (
            Field::Address,
            &["hdpData.homeInfo.streetAddress", "streetAddress", "address"],
        ),
        (Field::City, &["addressCity", "hdpData.homeInfo.city"]),
        (Field::State, &["addressState", "hdpData.homeInfo.state"]),
        (Field::ZipCode, &["addressZipcode", "hdpData.homeInfo.zipcode"]),
        (
            Field::Latitude,
            &["latLong.latitude", "hdpData.homeInfo.latitude"],
        ),
        (
            Field::Longitude,
            &["latLong.longitude", "hdpData.homeInfo.longitude"],
        ),
        (
            Field::Price,
            &["unformattedPrice", "hdpData.homeInfo.price", "price", "soldPrice"],
        ),
        (
            Field::SaleDate,
            &["hdpData.homeInfo.dateSold", "dateSold", "soldDate"],
        ),
        (Field::Bedrooms, &["beds", "bedrooms", "hdpData.homeInfo.bedrooms"]),
        (
            Field::Bathrooms,
            &["baths", "bathrooms", "hdpData.homeInfo.bathrooms"],
        ),
        (Field::FullBathrooms, &[]),
        (Field::HalfBathrooms, &[]),
        (Field::Stories, &[]),
        (
            Field::LivingArea,
            &["area", "livingArea", "hdpData.homeInfo.livingArea"],
        ),
        (Field::LotSize, &["hdpData.homeInfo.lotSize"]),
        (Field::YearBuilt, &["hdpData.homeInfo.yearBuilt"]),
        (Field::DaysOnMarket, &["hdpData.homeInfo.daysOnZillow"]),
        (Field::PropertyType, &["hdpData.homeInfo.homeType", "homeType"]),
        (Field::Url, &["detailUrl"]),
    ],
};

/// Looks up canonical fields in raw listings through a [`FieldTable`]
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    table: &'static FieldTable,
}

impl Extractor {
    pub fn new(table: &'static FieldTable) -> Self {
        Self { table }
    }

    pub fn for_source(source: Source) -> Self {
        Self::new(FieldTable::for_source(source))
    }

    /// First present value for `field`, probing paths in table order.
    ///
    /// Null values and blank strings count as absent.
    pub fn extract<'a>(&self, raw: &'a Value, field: Field) -> Option<RawValue<'a>> {
        self.table
            .paths(field)
            .iter()
            .find_map(|path| resolve_path(raw, path))
    }
}

fn resolve_path<'a>(raw: &'a Value, path: &str) -> Option<RawValue<'a>> {
    let mut current = raw;
    for segment in path.split('.') {
        current = step(current, segment)?;
    }

    let resolved = match current.get("value") {
        Some(inner) if current.is_object() => RawValue::Wrapped(inner),
        _ => RawValue::Scalar(current),
    };

    match resolved.value() {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        _ => Some(resolved),
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map
            .get(segment)
            .or_else(|| map.get("value").and_then(|inner| step(inner, segment))),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_and_wrapped_values() {
        let raw = json!({
            "streetLine": { "value": "1 Main St" },
            "beds": 3,
        });
        let extractor = Extractor::for_source(Source::Redfin);

        assert_eq!(
            extractor.extract(&raw, Field::Address),
            Some(RawValue::Wrapped(&json!("1 Main St")))
        );
        assert_eq!(
            extractor.extract(&raw, Field::Bedrooms),
            Some(RawValue::Scalar(&json!(3)))
        );
    }

    #[test]
    fn test_path_through_value_wrapper() {
        let raw = json!({
            "latLong": { "value": { "latitude": 37.33, "longitude": -121.88 } }
        });
        let extractor = Extractor::for_source(Source::Redfin);

        let lat = extractor.extract(&raw, Field::Latitude).unwrap();
        assert_eq!(lat.value(), &json!(37.33));
        let lon = extractor.extract(&raw, Field::Longitude).unwrap();
        assert_eq!(lon.value(), &json!(-121.88));
    }

    #[test]
    fn test_falls_through_to_later_paths() {
        let raw = json!({
            "unformattedPrice": null,
            "hdpData": { "homeInfo": { "price": 612000 } },
            "price": "$612,000",
        });
        let extractor = Extractor::for_source(Source::Zillow);

        let price = extractor.extract(&raw, Field::Price).unwrap();
        assert_eq!(price.value(), &json!(612000));
    }

    #[test]
    fn test_array_index_segment() {
        let raw = json!({ "sashes": [{ "sashType": 1, "lastSaleDate": "Mar 15, 2024" }] });
        let extractor = Extractor::for_source(Source::Redfin);

        let date = extractor.extract(&raw, Field::SaleDate).unwrap();
        assert_eq!(date.value(), &json!("Mar 15, 2024"));
    }

    #[test]
    fn test_absent_null_and_blank() {
        let raw = json!({ "city": "  ", "state": null });
        let extractor = Extractor::for_source(Source::Redfin);

        assert_eq!(extractor.extract(&raw, Field::City), None);
        assert_eq!(extractor.extract(&raw, Field::State), None);
        assert_eq!(extractor.extract(&raw, Field::Price), None);
        assert_eq!(extractor.extract(&json!("not an object"), Field::Price), None);
    }

    #[test]
    fn test_unlisted_field_has_no_paths() {
        assert!(ZILLOW_FIELDS.paths(Field::Stories).is_empty());
        assert_eq!(REDFIN_FIELDS.paths(Field::ListingId), &["propertyId", "listingId"]);
    }
}
