use crate::models::CanonicalProperty;
use std::collections::HashSet;

/// Normalized `address|zip` key: lowercase, whitespace collapsed
pub fn address_key(address: &str, zip_code: &str) -> String {
    let address = address.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{}|{}", address.to_lowercase(), zip_code.trim().to_lowercase())
}

/// Identifiers seen so far in one orchestrator run.
///
/// The listing id is the key. A record without a provider id carries its
/// address key as its id, so addresses are only compared when one of the
/// two records had its id synthesized. Distinct provider ids at the same
/// address stay distinct.
#[derive(Debug, Default)]
pub struct Deduplicator {
    ids: HashSet<String>,
    addresses: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, property: &CanonicalProperty) -> bool {
        let id = &property.identifiers.listing_id;
        if property.identifiers.synthesized {
            // Also matches an earlier record with a provider id at this address
            self.addresses.contains(id)
        } else {
            let address = address_key(&property.location.address, &property.location.zip_code);
            // A synthesized id is its address key
            self.ids.contains(id) || self.ids.contains(&address)
        }
    }

    /// Check and register a property; `false` means it is a repeat and must be dropped.
    pub fn admit(&mut self, property: &CanonicalProperty) -> bool {
        if self.is_duplicate(property) {
            return false;
        }
        self.ids.insert(property.identifiers.listing_id.clone());
        self.addresses
            .insert(address_key(&property.location.address, &property.location.zip_code));
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
