//! Shipping and billing addresses.

use serde::{Deserialize, Deserializer, Serialize};

use super::country::CountryCode;

/// Regions and postal codes are nullable outside the US and Canada.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A shipping address attached to an order's requested fulfillment.
///
/// Immutable once fetched; the checkout never edits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub region: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub postal_code: String,
    pub country: CountryCode,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl Ship {
    /// Lines used to present the address to the buyer.
    ///
    /// - name
    /// - `addressLine1, addressLine2` (line 2 trimmed, dropped when blank)
    /// - `city, region postalCode`
    /// - country display name
    /// - phone number, when present
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let street = [
            self.address_line1.as_str(),
            self.address_line2.as_deref().unwrap_or("").trim(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        let mut lines = vec![
            self.name.clone(),
            street,
            format!("{}, {} {}", self.city, self.region, self.postal_code),
            self.country.display_name().to_string(),
        ];

        if let Some(phone) = self.phone_number.as_deref().filter(|p| !p.is_empty()) {
            lines.push(phone.to_string());
        }

        lines
    }
}

/// Billing address form state.
///
/// Same shape as [`Ship`] with every field held as the raw text the buyer
/// typed. An empty form has every text field blank and the country select on
/// [`CountryCode::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone_number: String,
}

impl Address {
    /// An empty billing form.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            address_line1: String::new(),
            address_line2: String::new(),
            city: String::new(),
            region: String::new(),
            postal_code: String::new(),
            country: CountryCode::DEFAULT.to_string(),
            phone_number: String::new(),
        }
    }

    /// Whether the form holds nothing but defaults.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// The form's country, if it parses as a country code.
    #[must_use]
    pub fn country_code(&self) -> Option<CountryCode> {
        CountryCode::parse(&self.country).ok()
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&Ship> for Address {
    fn from(ship: &Ship) -> Self {
        Self {
            name: ship.name.clone(),
            address_line1: ship.address_line1.clone(),
            address_line2: ship.address_line2.clone().unwrap_or_default(),
            city: ship.city.clone(),
            region: ship.region.clone(),
            postal_code: ship.postal_code.clone(),
            country: ship.country.to_string(),
            phone_number: ship.phone_number.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn broadway() -> Ship {
        Ship {
            name: "Joelle Van Dyne".to_string(),
            address_line1: "401 Broadway".to_string(),
            address_line2: Some("Suite 25".to_string()),
            city: "New York".to_string(),
            region: "NY".to_string(),
            postal_code: "10013".to_string(),
            country: CountryCode::parse("US").unwrap(),
            phone_number: Some("120938120983".to_string()),
        }
    }

    #[test]
    fn test_empty_address_defaults_to_us() {
        let address = Address::empty();
        assert_eq!(address.country, "US");
        assert!(address.name.is_empty());
        assert!(address.is_empty());
        assert_eq!(Address::default(), address);
    }

    #[test]
    fn test_address_from_ship() {
        let address = Address::from(&broadway());
        assert_eq!(address.name, "Joelle Van Dyne");
        assert_eq!(address.address_line2, "Suite 25");
        assert_eq!(address.country, "US");
        assert!(!address.is_empty());
    }

    #[test]
    fn test_address_from_ship_without_optional_fields() {
        let ship = Ship {
            address_line2: None,
            phone_number: None,
            ..broadway()
        };
        let address = Address::from(&ship);
        assert_eq!(address.address_line2, "");
        assert_eq!(address.phone_number, "");
    }

    #[test]
    fn test_summary_lines() {
        assert_eq!(
            broadway().summary_lines(),
            vec![
                "Joelle Van Dyne",
                "401 Broadway, Suite 25",
                "New York, NY 10013",
                "United States",
                "120938120983",
            ]
        );
    }

    #[test]
    fn test_summary_lines_skips_blank_line2_and_phone() {
        let ship = Ship {
            address_line2: Some("   ".to_string()),
            phone_number: None,
            ..broadway()
        };
        let lines = ship.summary_lines();
        assert_eq!(lines.get(1).map(String::as_str), Some("401 Broadway"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_ship_null_region_becomes_empty() {
        let json = serde_json::json!({
            "name": "Erik David",
            "addressLine1": "1 Ross Ice Shelf",
            "city": "McMurdo",
            "region": null,
            "postalCode": null,
            "country": "AQ"
        });
        let ship: Ship = serde_json::from_value(json).unwrap();
        assert_eq!(ship.region, "");
        assert_eq!(ship.postal_code, "");
    }

    #[test]
    fn test_ship_deserializes_from_graphql() {
        let json = serde_json::json!({
            "name": "Joelle Van Dyne",
            "addressLine1": "401 Broadway",
            "addressLine2": null,
            "city": "New York",
            "region": "NY",
            "postalCode": "10013",
            "country": "US",
            "phoneNumber": null
        });
        let ship: Ship = serde_json::from_value(json).unwrap();
        assert_eq!(ship.address_line2, None);
        assert_eq!(ship.region, "NY");
        assert_eq!(ship.country.as_str(), "US");
    }
}
