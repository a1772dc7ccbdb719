//! Billing form validation.
//!
//! Validation state is never stored: errors are recomputed from the form, and
//! which of them the buyer sees depends on the touched set and whether a
//! submission has been attempted.

use std::collections::{BTreeMap, BTreeSet};

use gallery_core::{Address, CountryCode};

/// Message shown under a required field left blank.
pub const REQUIRED_MESSAGE: &str = "This field is required";

/// A field of the billing form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressField {
    Name,
    AddressLine1,
    AddressLine2,
    City,
    Region,
    PostalCode,
    Country,
    PhoneNumber,
}

impl AddressField {
    /// Fields in form order.
    pub const ALL: [Self; 8] = [
        Self::Name,
        Self::AddressLine1,
        Self::AddressLine2,
        Self::City,
        Self::Region,
        Self::PostalCode,
        Self::Country,
        Self::PhoneNumber,
    ];

    /// Label shown above the input.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Name => "Full name",
            Self::AddressLine1 => "Address line 1",
            Self::AddressLine2 => "Address line 2 (optional)",
            Self::City => "City",
            Self::Region => "State, province, or region",
            Self::PostalCode => "Postal code",
            Self::Country => "Country",
            Self::PhoneNumber => "Phone number (optional)",
        }
    }

    /// Name of the form input.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::AddressLine1 => "address_line1",
            Self::AddressLine2 => "address_line2",
            Self::City => "city",
            Self::Region => "region",
            Self::PostalCode => "postal_code",
            Self::Country => "country",
            Self::PhoneNumber => "phone_number",
        }
    }

    /// Look a field up by its input name.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    /// The field's value in `address`.
    #[must_use]
    pub fn value(self, address: &Address) -> &str {
        match self {
            Self::Name => &address.name,
            Self::AddressLine1 => &address.address_line1,
            Self::AddressLine2 => &address.address_line2,
            Self::City => &address.city,
            Self::Region => &address.region,
            Self::PostalCode => &address.postal_code,
            Self::Country => &address.country,
            Self::PhoneNumber => &address.phone_number,
        }
    }

    /// Overwrite the field's value in `address`.
    pub fn set(self, address: &mut Address, value: String) {
        let slot = match self {
            Self::Name => &mut address.name,
            Self::AddressLine1 => &mut address.address_line1,
            Self::AddressLine2 => &mut address.address_line2,
            Self::City => &mut address.city,
            Self::Region => &mut address.region,
            Self::PostalCode => &mut address.postal_code,
            Self::Country => &mut address.country,
            Self::PhoneNumber => &mut address.phone_number,
        };
        *slot = value;
    }

    /// Whether the field must be filled for `country`.
    ///
    /// `country` is `None` when the form's country does not parse; the
    /// country field itself then fails, and region and postal code are held
    /// to the strict rule.
    #[must_use]
    pub fn is_required(self, country: Option<&CountryCode>) -> bool {
        match self {
            Self::Name | Self::AddressLine1 | Self::City | Self::Country => true,
            Self::Region | Self::PostalCode => {
                country.is_none_or(CountryCode::requires_postal_code_and_region)
            }
            Self::AddressLine2 | Self::PhoneNumber => false,
        }
    }
}

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// A required field is blank.
    Required,
}

impl FieldError {
    /// Message shown to the buyer.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Required => REQUIRED_MESSAGE,
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Validation errors for one address, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressErrors(BTreeMap<AddressField, FieldError>);

impl AddressErrors {
    /// Whether every field passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    /// The error for `field`, if any.
    #[must_use]
    pub fn get(&self, field: AddressField) -> Option<FieldError> {
        self.0.get(&field).copied()
    }

    /// Fields that failed, in form order.
    pub fn fields(&self) -> impl Iterator<Item = AddressField> + '_ {
        self.0.keys().copied()
    }
}

/// Validate a billing address.
///
/// Whitespace-only values count as blank.
#[must_use]
pub fn validate(address: &Address) -> AddressErrors {
    let country = address.country_code();
    let errors = AddressField::ALL
        .into_iter()
        .filter(|field| field.is_required(country.as_ref()))
        .filter(|field| field.value(address).trim().is_empty())
        .map(|field| (field, FieldError::Required))
        .collect();
    AddressErrors(errors)
}

/// Fields the buyer has interacted with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedFields(BTreeSet<AddressField>);

impl TouchedFields {
    /// Mark `field` as touched.
    pub fn touch(&mut self, field: AddressField) {
        self.0.insert(field);
    }

    /// Whether `field` has been touched.
    #[must_use]
    pub fn contains(&self, field: AddressField) -> bool {
        self.0.contains(&field)
    }

    /// Forget every touch.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// The error the buyer should see for `field`.
///
/// Before a submission attempt only touched fields report; afterwards every
/// invalid field does.
#[must_use]
pub fn visible_error(
    errors: &AddressErrors,
    touched: &TouchedFields,
    submitted: bool,
    field: AddressField,
) -> Option<FieldError> {
    if submitted || touched.contains(field) {
        errors.get(field)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(country: &str) -> Address {
        Address {
            name: "Erik David".to_string(),
            address_line1: "401 Broadway".to_string(),
            address_line2: String::new(),
            city: "New York".to_string(),
            region: "NY".to_string(),
            postal_code: "10013".to_string(),
            country: country.to_string(),
            phone_number: String::new(),
        }
    }

    #[test]
    fn test_complete_address_is_valid() {
        assert!(validate(&complete("US")).is_valid());
    }

    #[test]
    fn test_empty_form_requires_core_fields() {
        let errors = validate(&Address::empty());
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec![
                AddressField::Name,
                AddressField::AddressLine1,
                AddressField::City,
                AddressField::Region,
                AddressField::PostalCode,
            ]
        );
        assert_eq!(errors.get(AddressField::Name), Some(FieldError::Required));
        assert_eq!(errors.get(AddressField::AddressLine2), None);
        assert_eq!(errors.get(AddressField::PhoneNumber), None);
    }

    #[test]
    fn test_postal_code_and_region_optional_outside_us_and_canada() {
        for country in ["AQ", "GB", "UK", "FR", "JP"] {
            let address = Address {
                region: String::new(),
                postal_code: String::new(),
                ..complete(country)
            };
            assert!(validate(&address).is_valid(), "{country} should be valid");
        }
    }

    #[test]
    fn test_postal_code_and_region_required_in_us_and_canada() {
        for country in ["US", "CA", "us"] {
            let address = Address {
                region: String::new(),
                postal_code: String::new(),
                ..complete(country)
            };
            let errors = validate(&address);
            assert_eq!(errors.get(AddressField::Region), Some(FieldError::Required));
            assert_eq!(
                errors.get(AddressField::PostalCode),
                Some(FieldError::Required)
            );
        }
    }

    #[test]
    fn test_blank_country_is_required_and_strict() {
        let address = Address {
            country: String::new(),
            region: String::new(),
            ..complete("US")
        };
        let errors = validate(&address);
        assert_eq!(errors.get(AddressField::Country), Some(FieldError::Required));
        assert_eq!(errors.get(AddressField::Region), Some(FieldError::Required));
    }

    #[test]
    fn test_whitespace_counts_as_blank() {
        let address = Address {
            city: "   ".to_string(),
            ..complete("US")
        };
        assert_eq!(
            validate(&address).get(AddressField::City),
            Some(FieldError::Required)
        );
    }

    #[test]
    fn test_visible_error_before_submit_needs_touch() {
        let errors = validate(&Address::empty());
        let mut touched = TouchedFields::default();
        touched.touch(AddressField::AddressLine1);

        assert_eq!(
            visible_error(&errors, &touched, false, AddressField::AddressLine1),
            Some(FieldError::Required)
        );
        assert_eq!(
            visible_error(&errors, &touched, false, AddressField::City),
            None
        );
    }

    #[test]
    fn test_visible_error_after_submit_shows_all() {
        let errors = validate(&Address::empty());
        let touched = TouchedFields::default();
        assert_eq!(
            visible_error(&errors, &touched, true, AddressField::City),
            Some(FieldError::Required)
        );
        assert_eq!(
            visible_error(&errors, &touched, true, AddressField::AddressLine2),
            None
        );
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in AddressField::ALL {
            assert_eq!(AddressField::from_key(field.key()), Some(field));
        }
        assert_eq!(AddressField::from_key("card_number"), None);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(FieldError::Required.to_string(), "This field is required");
    }
}
