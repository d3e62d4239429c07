use serde::{Deserialize, Serialize};

use crate::config::BusinessConfig;

/// Contact details for the business behind the site, handed to the dialog
/// engine and HTTP handlers instead of being read from global state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub hours: String,
    pub scheduling_url: String,
}

impl BusinessInfo {
    /// Phone number reduced to digits, suitable for `tel:` links.
    pub fn phone_digits(&self) -> String {
        self.phone.chars().filter(char::is_ascii_digit).collect()
    }
}

impl Default for BusinessInfo {
    fn default() -> Self {
        Self::from(&BusinessConfig::default())
    }
}

impl From<&BusinessConfig> for BusinessInfo {
    fn from(config: &BusinessConfig) -> Self {
        Self {
            name: config.name.clone(),
            phone: config.phone.clone(),
            email: config.email.clone(),
            address: config.address.clone(),
            hours: config.hours.clone(),
            scheduling_url: config.scheduling_url.clone(),
        }
    }
}
