use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::Row;

use leadsign_core::domain::inbound::{
    AttachmentInfo, InboundEmail, InboundEmailId, LeadFields, NdaContact, NewInboundEmail,
};
use leadsign_core::form::field_for_key;

use super::{InboundEmailRepository, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT id, from_address, to_address, cc, subject, text_body,
        html_body, envelope_json, attachment_info_json, message_id, lead_source, listing_id,
        listing_name, listing_profit, name, email, phone, purchase_timeframe, amount_to_invest,
        lead_message, ref_id, raw_parsed_json, form_values_json, crm_contact_id, received_at,
        parsed_at
     FROM inbound_email";

pub struct SqlInboundEmailRepository {
    pool: DbPool,
}

impl SqlInboundEmailRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn write_record(&self, email: &InboundEmail) -> Result<(), RepositoryError> {
        let form_values = encode_json(&email.form_values)?;
        sqlx::query(
            "UPDATE inbound_email SET
                 name = ?, email = ?, phone = ?, purchase_timeframe = ?,
                 listing_id = ?, listing_name = ?, ref_id = ?, form_values_json = ?
             WHERE id = ?",
        )
        .bind(&email.lead.name)
        .bind(&email.lead.email)
        .bind(&email.lead.phone)
        .bind(&email.lead.purchase_timeframe)
        .bind(&email.lead.listing_id)
        .bind(&email.lead.listing_name)
        .bind(&email.lead.ref_id)
        .bind(form_values)
        .bind(email.id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(decode_err)
}

/// Fixed-width so TEXT ordering matches chronological ordering.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn row_to_email(row: &sqlx::sqlite::SqliteRow) -> Result<InboundEmail, RepositoryError> {
    let text = |column: &str| row.try_get::<String, _>(column).map_err(decode_err);

    let envelope: Value = serde_json::from_str(&text("envelope_json")?).map_err(decode_err)?;
    let attachment_info: Vec<AttachmentInfo> =
        serde_json::from_str(&text("attachment_info_json")?).map_err(decode_err)?;
    let raw_parsed: Value = serde_json::from_str(&text("raw_parsed_json")?).map_err(decode_err)?;
    let form_values: BTreeMap<String, String> =
        serde_json::from_str(&text("form_values_json")?).map_err(decode_err)?;

    let listing_profit = row
        .try_get::<Option<String>, _>("listing_profit")
        .map_err(decode_err)?
        .map(|raw| Decimal::from_str(&raw).map_err(decode_err))
        .transpose()?;
    let parsed_at = row
        .try_get::<Option<String>, _>("parsed_at")
        .map_err(decode_err)?
        .map(|raw| parse_timestamp(&raw))
        .transpose()?;

    Ok(InboundEmail {
        id: InboundEmailId(row.try_get("id").map_err(decode_err)?),
        from_address: text("from_address")?,
        to_address: text("to_address")?,
        cc: text("cc")?,
        subject: text("subject")?,
        text_body: text("text_body")?,
        html_body: text("html_body")?,
        envelope,
        attachment_info,
        message_id: text("message_id")?,
        lead: LeadFields {
            lead_source: text("lead_source")?,
            listing_id: text("listing_id")?,
            listing_name: text("listing_name")?,
            listing_profit,
            name: text("name")?,
            email: text("email")?,
            phone: text("phone")?,
            purchase_timeframe: text("purchase_timeframe")?,
            amount_to_invest: text("amount_to_invest")?,
            lead_message: text("lead_message")?,
            ref_id: text("ref_id")?,
        },
        raw_parsed,
        form_values,
        crm_contact_id: text("crm_contact_id")?,
        received_at: parse_timestamp(&text("received_at")?)?,
        parsed_at,
    })
}

/// Stores form values under their template field name and copies the ones that have a
/// dedicated lead column onto the record.
///
/// A key given under its template name wins over an alias in the same batch.
fn apply_form_values(email: &mut InboundEmail, values: &BTreeMap<String, String>) {
    for (key, value) in values {
        let field = field_for_key(key);
        let name = field.map_or(key.as_str(), |field| field.name);
        if name != key && values.contains_key(name) {
            continue;
        }
        if let Some(field) = field {
            for alias in field.aliases {
                email.form_values.remove(*alias);
            }
        }

        let column = match name {
            "name" => Some(&mut email.lead.name),
            "email" => Some(&mut email.lead.email),
            "cell" => Some(&mut email.lead.phone),
            "timeframe" => Some(&mut email.lead.purchase_timeframe),
            "listing_id" => Some(&mut email.lead.listing_id),
            "listing_name" => Some(&mut email.lead.listing_name),
            "ref_id" => Some(&mut email.lead.ref_id),
            _ => None,
        };
        if let Some(column) = column.filter(|_| !value.trim().is_empty()) {
            column.clone_from(value);
        }
        email.form_values.insert(name.to_string(), value.clone());
    }
}

#[async_trait::async_trait]
impl InboundEmailRepository for SqlInboundEmailRepository {
    async fn insert(&self, email: NewInboundEmail) -> Result<InboundEmailId, RepositoryError> {
        let envelope = if email.envelope.is_null() {
            "{}".to_string()
        } else {
            encode_json(&email.envelope)?
        };
        let attachment_info = encode_json(&email.attachment_info)?;

        let result = sqlx::query(
            "INSERT INTO inbound_email (from_address, to_address, cc, subject, text_body,
                                        html_body, envelope_json, attachment_info_json,
                                        message_id, crm_contact_id, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&email.from_address)
        .bind(&email.to_address)
        .bind(&email.cc)
        .bind(&email.subject)
        .bind(&email.text_body)
        .bind(&email.html_body)
        .bind(envelope)
        .bind(attachment_info)
        .bind(&email.message_id)
        .bind(&email.crm_contact_id)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;

        Ok(InboundEmailId(result.last_insert_rowid()))
    }

    async fn find_by_id(
        &self,
        id: InboundEmailId,
    ) -> Result<Option<InboundEmail>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_email(r)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<InboundEmail>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY received_at DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_email).collect()
    }

    async fn list_nda_contacts(&self, limit: u32) -> Result<Vec<NdaContact>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS}
             WHERE crm_contact_id <> '' AND listing_id <> '' AND phone <> ''
             ORDER BY received_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut seen = HashSet::new();
        let mut contacts = Vec::new();
        for row in &rows {
            let Some(contact) = row_to_email(row)?.nda_contact() else {
                continue;
            };
            if seen.insert((contact.contact_id.clone(), contact.listing_id.clone())) {
                contacts.push(contact);
            }
            if contacts.len() >= limit as usize {
                break;
            }
        }
        Ok(contacts)
    }

    async fn latest_for_contact(
        &self,
        crm_contact_id: &str,
    ) -> Result<Option<InboundEmail>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE crm_contact_id = ? ORDER BY received_at DESC, id DESC LIMIT 1"
        ))
        .bind(crm_contact_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_email(r)?)),
            None => Ok(None),
        }
    }

    async fn update_lead_fields(
        &self,
        id: InboundEmailId,
        lead: &LeadFields,
        raw_parsed: &Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE inbound_email SET
                 lead_source = ?, listing_id = ?, listing_name = ?, listing_profit = ?,
                 name = ?, email = ?, phone = ?, purchase_timeframe = ?, amount_to_invest = ?,
                 lead_message = ?, ref_id = ?, raw_parsed_json = ?, parsed_at = ?
             WHERE id = ?",
        )
        .bind(&lead.lead_source)
        .bind(&lead.listing_id)
        .bind(&lead.listing_name)
        .bind(lead.listing_profit.map(|profit| profit.to_string()))
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.purchase_timeframe)
        .bind(&lead.amount_to_invest)
        .bind(&lead.lead_message)
        .bind(&lead.ref_id)
        .bind(encode_json(raw_parsed)?)
        .bind(now_timestamp())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_form_values(
        &self,
        crm_contact_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<InboundEmailId, RepositoryError> {
        let mut email = match self.latest_for_contact(crm_contact_id).await? {
            Some(email) => email,
            None => {
                let id = self
                    .insert(NewInboundEmail {
                        crm_contact_id: crm_contact_id.to_string(),
                        ..NewInboundEmail::default()
                    })
                    .await?;
                self.find_by_id(id).await?.ok_or_else(|| {
                    RepositoryError::Decode(format!("inbound email {} vanished after insert", id.0))
                })?
            }
        };

        apply_form_values(&mut email, values);
        self.write_record(&email).await?;
        Ok(email.id)
    }
}
