//! Saved addresses and the shipping snapshot copied onto orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AddressId, ContactError, Phone, Pincode, UserId};

/// A customer's saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone: Phone,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: Pincode,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Copy of this address as stored on an order.
    #[must_use]
    pub fn snapshot(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            pincode: self.pincode.clone(),
        }
    }
}

/// The address frozen onto an order at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: Phone,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: Pincode,
}

impl ShippingAddress {
    /// Single-line rendering for couriers and invoices.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        parts.extend([self.city.as_str(), self.state.as_str(), self.pincode.as_str()]);
        parts.join(", ")
    }
}

/// Validation failures for a submitted address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error(transparent)]
    Contact(#[from] ContactError),
}

/// An address as typed into the checkout or address book form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressForm {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressForm {
    /// Validate and normalize into a shipping address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] for blank required fields or a malformed
    /// phone number or pincode.
    pub fn validate(&self) -> Result<ShippingAddress, AddressError> {
        let required = |value: &str, field: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(AddressError::Missing(field))
            } else {
                Ok(value.to_owned())
            }
        };

        Ok(ShippingAddress {
            full_name: required(&self.full_name, "full name")?,
            line1: required(&self.line1, "address line 1")?,
            city: required(&self.city, "city")?,
            state: required(&self.state, "state")?,
            line2: self
                .line2
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned),
            phone: Phone::parse(&self.phone)?,
            pincode: Pincode::parse(&self.pincode)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn form() -> AddressForm {
        AddressForm {
            full_name: "Asha Rao".to_string(),
            phone: "+91 98450 12345".to_string(),
            line1: "12 MG Road".to_string(),
            line2: Some("  ".to_string()),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
            is_default: true,
        }
    }

    #[test]
    fn test_form_validates() {
        let addr = form().validate().unwrap();
        assert_eq!(addr.phone.as_str(), "9845012345");
        assert_eq!(addr.line2, None);
        assert_eq!(addr.one_line(), "12 MG Road, Bengaluru, Karnataka, 560001");
    }

    #[test]
    fn test_missing_field() {
        let mut f = form();
        f.city = " ".to_string();
        assert_eq!(f.validate(), Err(AddressError::Missing("city")));
    }

    #[test]
    fn test_bad_pincode() {
        let mut f = form();
        f.pincode = "012345".to_string();
        assert!(matches!(f.validate(), Err(AddressError::Contact(_))));
    }
}
