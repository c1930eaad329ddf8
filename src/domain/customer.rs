use serde::{Deserialize, Serialize};

pub type CustomerId = String;

/// The owner of one or more accounts. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl Customer {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
        }
    }

    /// Returns the first field that cannot be stored as a single `Key: value` line.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.id.trim().is_empty() {
            return Some("id");
        }
        [
            ("id", &self.id),
            ("name", &self.name),
            ("address", &self.address),
            ("phone", &self.phone),
        ]
        .into_iter()
        .find(|(_, value)| value.contains(['\n', '\r']))
        .map(|(field, _)| field)
    }
}
