use std::sync::Arc;

use leadsign_core::config::CrmConfig;
use leadsign_core::pipeline::CrmPublisher;
use leadsign_core::{CrmError, FieldId, FieldIdCache};
use leadsign_server::crm::{ContactSnapshot, GhlClient, GhlPublisher};

use crate::commands::{load_config, runtime, CommandResult};

const MAX_VALUE_CHARS: usize = 200;

/// Reads a contact back from the CRM and marks the signed document field.
pub fn run(contact_id: &str, field_id: Option<&str>) -> CommandResult {
    let config = match load_config("verify-contact") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let client = match GhlClient::from_config(&config.crm) {
        Ok(Some(client)) => client,
        Ok(None) => {
            return CommandResult::failure(
                "verify-contact",
                "config_validation",
                "crm.api_key is required to read a contact",
                2,
            );
        }
        Err(error) => {
            return CommandResult::failure("verify-contact", "crm_client", error.to_string(), 3);
        }
    };
    let runtime = match runtime("verify-contact") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let field_override = field_id
        .map(str::to_string)
        .or_else(|| config.crm.custom_field_id.clone());
    let publisher = GhlPublisher::new(client, Arc::new(FieldIdCache::default()), field_override);

    let outcome = runtime.block_on(async {
        let snapshot = publisher.client().get_contact(contact_id).await?;
        let field = publisher.resolve_custom_field_id(&config.crm.custom_field_label).await;
        Ok::<_, CrmError>((snapshot, field))
    });

    match outcome {
        Ok((snapshot, field)) => {
            let report = render(contact_id, &snapshot, field, &config.crm);
            CommandResult::success("verify-contact", report)
        }
        Err(error) => CommandResult::failure("verify-contact", "crm_request", error.to_string(), 6),
    }
}

fn render(
    contact_id: &str,
    contact: &ContactSnapshot,
    field: Result<FieldId, CrmError>,
    crm: &CrmConfig,
) -> String {
    let id = if contact.id.is_empty() { contact_id } else { contact.id.as_str() };
    let mut lines = vec![format!("contact {id}: {} <{}>", contact.name, contact.email)];

    let field_id = match &field {
        Ok(field_id) => field_id.as_str(),
        Err(_) => "<unresolved>",
    };
    lines.push(format!("custom fields (signed document field: {field_id}):"));
    for (id, value) in &contact.custom_fields {
        let marker = match &field {
            Ok(field_id) if field_id.as_str() == id => "  <- signed document field",
            _ => "",
        };
        lines.push(format!("- {id} = {}{marker}", shorten(value)));
    }

    match &field {
        Err(error) => lines.push(format!("warning: signed document field not resolved: {error}")),
        Ok(field_id) if !contact.custom_fields.contains_key(field_id.as_str()) => {
            lines.push(format!("warning: `{}` has no value on this contact", field_id.as_str()));
        }
        Ok(_) => {}
    }

    let tag_state = if contact.has_tag(&crm.tag) { "present" } else { "missing" };
    lines.push(format!("tag `{}`: {tag_state}", crm.tag));
    lines.join("\n")
}

fn shorten(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS {
        return value.to_string();
    }
    let mut short: String = value.chars().take(MAX_VALUE_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use leadsign_core::config::AppConfig;
    use leadsign_core::{CrmError, FieldId};
    use leadsign_server::crm::ContactSnapshot;

    use super::{render, shorten};

    fn contact(fields: &[(&str, &str)], tags: &[&str]) -> ContactSnapshot {
        ContactSnapshot {
            id: "c-1".to_string(),
            name: "Dana Buyer".to_string(),
            email: "dana@example.com".to_string(),
            custom_fields: fields
                .iter()
                .map(|(id, value)| (id.to_string(), value.to_string()))
                .collect::<BTreeMap<_, _>>(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    #[test]
    fn marks_the_signed_document_field_and_the_tag() {
        let crm = AppConfig::default().crm;
        let output = render(
            "c-1",
            &contact(
                &[("fld-nda", "http://x/nda_signed_R1.pdf"), ("fld-2", "2231")],
                &["nda_signed"],
            ),
            Ok(FieldId("fld-nda".to_string())),
            &crm,
        );

        assert!(output.starts_with("contact c-1: Dana Buyer <dana@example.com>"));
        assert!(output
            .contains("- fld-nda = http://x/nda_signed_R1.pdf  <- signed document field"));
        assert!(output.contains("- fld-2 = 2231\n"));
        assert!(output.ends_with("tag `NDA_Signed`: present"));
        assert!(!output.contains("warning"));
    }

    #[test]
    fn warns_when_the_field_is_empty_or_unresolved() {
        let crm = AppConfig::default().crm;
        let empty = render("c-1", &contact(&[], &[]), Ok(FieldId("fld-nda".to_string())), &crm);
        assert!(empty.contains("warning: `fld-nda` has no value on this contact"));
        assert!(empty.contains("tag `NDA_Signed`: missing"));

        let unresolved = Err(CrmError::FieldNotFound { label: "Signed NDA".to_string() });
        let output = render("c-1", &contact(&[], &[]), unresolved, &crm);
        assert!(output.contains("signed document field: <unresolved>"));
        assert!(output.contains("warning: signed document field not resolved"));
    }

    #[test]
    fn long_values_are_shortened() {
        let long = "é".repeat(250);
        let short = shorten(&long);
        assert_eq!(short.chars().count(), 203);
        assert!(short.ends_with("..."));
        assert_eq!(shorten("short"), "short");
    }
}
