use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::form::field_for_key;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InboundEmailId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// Email as decoded from the relay webhook, before persistence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInboundEmail {
    pub from_address: String,
    pub to_address: String,
    pub cc: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub envelope: Value,
    pub attachment_info: Vec<AttachmentInfo>,
    pub message_id: String,
    pub crm_contact_id: String,
}

impl NewInboundEmail {
    pub fn has_content(&self) -> bool {
        !self.subject.trim().is_empty()
            || !self.text_body.trim().is_empty()
            || !self.html_body.trim().is_empty()
    }
}

/// Lead details extracted from an email body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFields {
    pub lead_source: String,
    pub listing_id: String,
    pub listing_name: String,
    pub listing_profit: Option<Decimal>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub purchase_timeframe: String,
    pub amount_to_invest: String,
    pub lead_message: String,
    pub ref_id: String,
}

impl LeadFields {
    /// At least one field that ties the email to a listing or a person.
    pub fn identifies_lead(&self) -> bool {
        [&self.listing_id, &self.listing_name, &self.email, &self.phone]
            .iter()
            .any(|value| !value.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundEmail {
    pub id: InboundEmailId,
    pub from_address: String,
    pub to_address: String,
    pub cc: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub envelope: Value,
    pub attachment_info: Vec<AttachmentInfo>,
    pub message_id: String,
    pub lead: LeadFields,
    pub raw_parsed: Value,
    pub form_values: BTreeMap<String, String>,
    pub crm_contact_id: String,
    pub received_at: DateTime<Utc>,
    pub parsed_at: Option<DateTime<Utc>>,
}

/// A contact with a signable NDA for one listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdaContact {
    pub contact_id: String,
    pub listing_id: String,
    pub listing_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEmail {
    /// `None` unless the record has a contact id, a listing id and a phone number.
    pub fn nda_contact(&self) -> Option<NdaContact> {
        let complete = [&self.crm_contact_id, &self.lead.listing_id, &self.lead.phone]
            .iter()
            .all(|value| !value.trim().is_empty());
        if !complete {
            return None;
        }
        Some(NdaContact {
            contact_id: self.crm_contact_id.clone(),
            listing_id: self.lead.listing_id.clone(),
            listing_name: self.lead.listing_name.clone(),
            name: self.lead.name.clone(),
            email: self.lead.email.clone(),
            phone: self.lead.phone.clone(),
            received_at: self.received_at,
        })
    }

    /// Prefill pairs for the NDA form, one per field.
    ///
    /// Saved form values replace extracted lead details unless they are blank. Keys saved under
    /// an alias are folded onto the template field name.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let lead = [
            ("ref_id", &self.lead.ref_id),
            ("listing_id", &self.lead.listing_id),
            ("listing_name", &self.lead.listing_name),
            ("name", &self.lead.name),
            ("email", &self.lead.email),
            ("cell", &self.lead.phone),
            ("timeframe", &self.lead.purchase_timeframe),
        ];

        let mut pairs: BTreeMap<String, String> = lead
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        for (key, value) in &self.form_values {
            let name = field_for_key(key).map_or(key.as_str(), |field| field.name);
            if value.trim().is_empty() && pairs.contains_key(name) {
                continue;
            }
            pairs.insert(name.to_string(), value.clone());
        }
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use serde_json::json;

    use super::{InboundEmail, InboundEmailId, LeadFields, NewInboundEmail};

    #[test]
    fn lead_is_identified_by_listing_or_contact_details() {
        assert!(!LeadFields::default().identifies_lead());
        assert!(!LeadFields { name: "Only A Name".to_string(), ..LeadFields::default() }
            .identifies_lead());
        assert!(LeadFields { phone: "555-0100".to_string(), ..LeadFields::default() }
            .identifies_lead());
    }

    #[test]
    fn content_requires_subject_or_body() {
        assert!(!NewInboundEmail::default().has_content());
        assert!(NewInboundEmail { subject: "New lead".to_string(), ..NewInboundEmail::default() }
            .has_content());
    }

    fn email(lead: LeadFields, form_values: &[(&str, &str)]) -> InboundEmail {
        InboundEmail {
            id: InboundEmailId(7),
            from_address: "alerts@listings.example".to_string(),
            to_address: String::new(),
            cc: String::new(),
            subject: "Lead".to_string(),
            text_body: String::new(),
            html_body: String::new(),
            envelope: json!({}),
            attachment_info: Vec::new(),
            message_id: String::new(),
            lead,
            raw_parsed: json!({}),
            form_values: form_values
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<BTreeMap<_, _>>(),
            crm_contact_id: "contact-1".to_string(),
            received_at: Utc::now(),
            parsed_at: None,
        }
    }

    fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        pairs.iter().filter(|(name, _)| name == key).map(|(_, value)| value.as_str()).collect()
    }

    #[test]
    fn saved_form_values_override_extracted_lead_details() {
        let lead = LeadFields {
            name: "Extracted Name".to_string(),
            phone: "555-0100".to_string(),
            ..LeadFields::default()
        };
        let pairs = email(lead, &[("name", "Typed Name")]).form_pairs();

        assert_eq!(value(&pairs, "name"), ["Typed Name"]);
        assert_eq!(value(&pairs, "cell"), ["555-0100"]);
    }

    #[test]
    fn alias_keys_fold_onto_the_template_field() {
        let lead = LeadFields { phone: "111".to_string(), ..LeadFields::default() };
        let pairs = email(lead, &[("phone", "222"), ("email", "")]).form_pairs();

        assert_eq!(value(&pairs, "cell"), ["222"]);
        assert!(value(&pairs, "phone").is_empty());
        assert_eq!(value(&pairs, "email"), [""]);
    }

    #[test]
    fn blank_saved_values_keep_the_extracted_detail() {
        let lead = LeadFields { name: "Extracted Name".to_string(), ..LeadFields::default() };
        let pairs = email(lead, &[("name", " ")]).form_pairs();
        assert_eq!(value(&pairs, "name"), ["Extracted Name"]);
    }

    #[test]
    fn nda_contact_needs_contact_listing_and_phone() {
        let lead = LeadFields {
            listing_id: "2344916".to_string(),
            phone: "555-0100".to_string(),
            name: "Dana Buyer".to_string(),
            ..LeadFields::default()
        };
        let contact = email(lead.clone(), &[]).nda_contact().expect("complete record");
        assert_eq!(contact.contact_id, "contact-1");
        assert_eq!(contact.listing_id, "2344916");
        assert_eq!(contact.name, "Dana Buyer");

        let without_phone = LeadFields { phone: " ".to_string(), ..lead };
        assert!(email(without_phone, &[]).nda_contact().is_none());
    }
}
