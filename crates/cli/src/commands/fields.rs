use leadsign_core::config::CrmConfig;
use leadsign_server::crm::{CustomField, GhlClient};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("fields") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let client = match GhlClient::from_config(&config.crm) {
        Ok(Some(client)) if client.location_id().is_some() => client,
        Ok(_) => {
            return CommandResult::failure(
                "fields",
                "config_validation",
                "crm.api_key and crm.location_id are required to list custom fields",
                2,
            );
        }
        Err(error) => {
            return CommandResult::failure("fields", "crm_client", error.to_string(), 3);
        }
    };
    let runtime = match runtime("fields") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    match runtime.block_on(client.list_custom_fields()) {
        Ok(fields) => CommandResult::success("fields", render(&fields, &config.crm)),
        Err(error) => CommandResult::failure("fields", "crm_request", error.to_string(), 6),
    }
}

fn is_configured(field: &CustomField, crm: &CrmConfig) -> bool {
    match crm.custom_field_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => field.id == id,
        None => field.matches_label(&crm.custom_field_label),
    }
}

fn render(fields: &[CustomField], crm: &CrmConfig) -> String {
    let mut lines = vec![format!("{} custom fields:", fields.len())];
    let mut matched = false;
    for field in fields {
        let configured = is_configured(field, crm);
        matched |= configured;
        lines.push(format!(
            "- {} | {} | {} | {}{}",
            field.id,
            field.name,
            field.field_key,
            field.data_type,
            if configured { "  <- configured" } else { "" }
        ));
    }

    if !matched {
        let wanted = crm.custom_field_id.as_deref().unwrap_or(&crm.custom_field_label);
        lines.push(format!(
            "warning: no custom field matches `{wanted}`; signed document links will not be published"
        ));
    }
    lines.join("\n")
}
