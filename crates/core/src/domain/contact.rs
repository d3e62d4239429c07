use serde::{Deserialize, Serialize};

/// Contact data gathered by the chat widget's forms.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Display label of the selected project type.
    pub project_type: String,
    /// Raw square-footage text as typed.
    pub sqft: String,
    pub message: String,
}

impl FormFields {
    pub fn apply_contact(&mut self, contact: &ContactDetails) {
        self.name = contact.name.trim().to_string();
        self.phone = contact.phone.trim().to_string();
        if let Some(email) = &contact.email {
            self.email = email.trim().to_string();
        }
        if let Some(address) = &contact.address {
            self.address = address.trim().to_string();
        }
        if let Some(message) = &contact.message {
            self.message = message.trim().to_string();
        }
    }

    /// Drops everything tied to a dialog path while keeping who the visitor is.
    pub fn clear_project(&mut self) {
        self.project_type.clear();
        self.sqft.clear();
    }
}

/// Payload of a contact form submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Which contact form the widget is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactForm {
    Estimate,
    Emergency,
}

impl ContactForm {
    pub fn missing_fields(self, contact: &ContactDetails) -> Vec<String> {
        let blank = |value: &str| value.trim().is_empty();
        let blank_opt = |value: &Option<String>| value.as_deref().map(blank).unwrap_or(true);

        let mut missing = Vec::new();
        if blank(&contact.name) {
            missing.push("name".to_string());
        }
        if blank(&contact.phone) {
            missing.push("phone".to_string());
        }
        match self {
            Self::Estimate if blank_opt(&contact.email) => missing.push("email".to_string()),
            Self::Emergency if blank_opt(&contact.address) => missing.push("address".to_string()),
            Self::Estimate | Self::Emergency => {}
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::{ContactDetails, ContactForm, FormFields};

    #[test]
    fn estimate_form_requires_email_but_not_address() {
        let contact = ContactDetails {
            name: "Ana".to_string(),
            phone: "555-0100".to_string(),
            address: Some("1 Main St".to_string()),
            ..ContactDetails::default()
        };

        assert_eq!(ContactForm::Estimate.missing_fields(&contact), vec!["email".to_string()]);
        assert!(ContactForm::Emergency.missing_fields(&contact).is_empty());
    }

    #[test]
    fn whitespace_only_values_count_as_missing() {
        let contact = ContactDetails {
            name: "  ".to_string(),
            phone: String::new(),
            email: Some(" ".to_string()),
            ..ContactDetails::default()
        };

        assert_eq!(
            ContactForm::Estimate.missing_fields(&contact),
            vec!["name".to_string(), "phone".to_string(), "email".to_string()]
        );
    }

    #[test]
    fn apply_contact_keeps_fields_not_present_in_submission() {
        let mut fields = FormFields { email: "ana@example.com".to_string(), ..FormFields::default() };
        fields.apply_contact(&ContactDetails {
            name: " Ana ".to_string(),
            phone: "555".to_string(),
            address: Some("1 Main St".to_string()),
            ..ContactDetails::default()
        });

        assert_eq!(fields.name, "Ana");
        assert_eq!(fields.email, "ana@example.com");
        assert_eq!(fields.address, "1 Main St");
    }
}
