use std::str::FromStr;
use std::sync::Arc;

use leadsign_core::domain::inbound::{InboundEmail, LeadFields};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{ChatPrompt, LlmClient};

pub const MAX_PROMPT_CHARS: usize = 30_000;

pub const LEAD_KEYS: [&str; 11] = [
    "lead_source",
    "listing_id",
    "listing_name",
    "listing_profit",
    "name",
    "email",
    "phone",
    "purchase_timeframe",
    "amount_to_invest",
    "lead_message",
    "ref_id",
];

const SYSTEM_PROMPT: &str = r#"You read lead notification emails sent by business-for-sale marketplaces such as BizBuySell, TangentBrokerage.com and BusinessesforSale.com.

The lead is the prospective buyer who sent the inquiry. Forwarded emails are common, so the From header may belong to the forwarder rather than the lead. When the body has labelled lines such as "Name:", "Email:", "Phone:", "Lead For:", "Message:", "Amount to Invest:", "Purchase Timeframe:" or "Your Ref ID#:", take the lead's details from those lines. Fall back to the From or Reply-To header only when the body has no such details.

Respond with a single JSON object containing exactly these keys. Use "" for anything not found, except listing_profit which is null when not found.
- lead_source: the marketplace, inferred from the sender domain ("BizBuySell", "TangentBrokerage.com" or "BusinessesforSale.com")
- listing_id: the listing or reference number, e.g. "2344916" from "Listing# 2344916"
- listing_name: the full listing title or "Lead For" line
- listing_profit: the profit figure as a plain number without currency, e.g. 539384 from "$539,384 Profit"
- name: the lead's full name
- email: the lead's email address
- phone: the lead's phone number
- purchase_timeframe: e.g. "ASAP" or "3 to 6 Months"
- amount_to_invest: the text given, e.g. "Not disclosed" or "$500k"
- lead_message: the inquiry text
- ref_id: the value after "Your Ref ID#:" or similar

Return JSON only."#;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("LLM call failed: {0}")]
    Llm(String),
    #[error("LLM returned invalid JSON: {0}")]
    InvalidJson(String),
    #[error("LLM returned {0} instead of a JSON object")]
    NotAnObject(&'static str),
}

/// The parts of an email the extractor reads.
#[derive(Clone, Copy, Debug)]
pub struct EmailContent<'a> {
    pub from_address: &'a str,
    pub subject: &'a str,
    pub text_body: &'a str,
    pub html_body: &'a str,
}

impl<'a> From<&'a InboundEmail> for EmailContent<'a> {
    fn from(email: &'a InboundEmail) -> Self {
        Self {
            from_address: &email.from_address,
            subject: &email.subject,
            text_body: &email.text_body,
            html_body: &email.html_body,
        }
    }
}

impl EmailContent<'_> {
    /// Plain text body, falling back to the HTML body with tags removed.
    pub fn body_text(&self) -> String {
        let text = self.text_body.trim();
        if !text.is_empty() {
            return text.to_string();
        }
        strip_html(self.html_body).trim().to_string()
    }

    pub fn prompt_text(&self) -> String {
        let full = format!(
            "From: {}\nSubject: {}\n\nBody:\n{}",
            self.from_address,
            self.subject.trim(),
            self.body_text()
        );
        full.chars().take(MAX_PROMPT_CHARS).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeadExtraction {
    pub lead: LeadFields,
    /// The object exactly as the model returned it.
    pub raw: Value,
}

pub struct LeadExtractor {
    client: Arc<dyn LlmClient>,
}

impl LeadExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// `Ok(None)` when the email has neither a subject nor a body.
    pub async fn extract(
        &self,
        email: EmailContent<'_>,
    ) -> Result<Option<LeadExtraction>, ExtractionError> {
        if email.subject.trim().is_empty() && email.body_text().is_empty() {
            debug!(event_name = "lead_extraction.skipped", "email has no content to parse");
            return Ok(None);
        }

        let prompt = ChatPrompt { system: SYSTEM_PROMPT.to_string(), user: email.prompt_text() };
        let content = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| ExtractionError::Llm(format!("{error:#}")))?;

        let raw: Value = serde_json::from_str(&content).map_err(|error| {
            warn!(event_name = "lead_extraction.invalid_json", error = %error);
            ExtractionError::InvalidJson(error.to_string())
        })?;
        let object = raw.as_object().ok_or(ExtractionError::NotAnObject(json_kind(&raw)))?;

        Ok(Some(LeadExtraction { lead: lead_fields(object), raw }))
    }
}

pub fn lead_fields(object: &Map<String, Value>) -> LeadFields {
    let text = |key: &str| object.get(key).map(text_value).unwrap_or_default();
    LeadFields {
        lead_source: text("lead_source"),
        listing_id: text("listing_id"),
        listing_name: text("listing_name"),
        listing_profit: object.get("listing_profit").and_then(profit_value),
        name: text("name"),
        email: text("email"),
        phone: text("phone"),
        purchase_timeframe: text("purchase_timeframe"),
        amount_to_invest: text("amount_to_invest"),
        lead_message: text("lead_message"),
        ref_id: text("ref_id"),
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

fn profit_value(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().replace([',', '$'], ""),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{strip_html, EmailContent, ExtractionError, LeadExtractor, MAX_PROMPT_CHARS};
    use crate::llm::{ChatPrompt, LlmClient};

    struct CannedClient {
        reply: String,
        prompts: Mutex<Vec<ChatPrompt>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()) })
        }

        fn prompts(&self) -> Vec<ChatPrompt> {
            self.prompts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, prompt: &ChatPrompt) -> Result<String> {
            self.prompts.lock().expect("lock").push(prompt.clone());
            Ok(self.reply.clone())
        }
    }

    fn content<'a>(subject: &'a str, text: &'a str, html: &'a str) -> EmailContent<'a> {
        EmailContent {
            from_address: "leads@bizbuysell.com",
            subject,
            text_body: text,
            html_body: html,
        }
    }

    #[tokio::test]
    async fn normalizes_model_output() {
        let reply = json!({
            "lead_source": "BizBuySell",
            "listing_id": " 2344916 ",
            "listing_name": "$539,384 Profit; FDA approved",
            "listing_profit": "$539,384",
            "name": "Test Test",
            "email": "test123@gmail.com",
            "phone": null,
            "purchase_timeframe": "3 to 6 Months",
            "amount_to_invest": "Not disclosed",
            "lead_message": "Interested.",
            "ref_id": "xray"
        })
        .to_string();
        let extractor = LeadExtractor::new(CannedClient::new(&reply));

        let extraction = extractor
            .extract(content("New lead", "Name: Test Test", ""))
            .await
            .expect("extract")
            .expect("has content");

        assert_eq!(extraction.lead.listing_id, "2344916");
        assert_eq!(extraction.lead.listing_profit, Some(Decimal::from(539_384)));
        assert_eq!(extraction.lead.phone, "");
        assert_eq!(extraction.lead.ref_id, "xray");
        assert!(extraction.lead.identifies_lead());
        assert_eq!(extraction.raw["listing_profit"], "$539,384");
    }

    #[tokio::test]
    async fn numeric_and_missing_profit() {
        let extractor =
            LeadExtractor::new(CannedClient::new(r#"{"listing_profit": 125000.5, "name": "A"}"#));
        let extraction =
            extractor.extract(content("Lead", "", "")).await.expect("extract").expect("content");
        assert_eq!(extraction.lead.listing_profit, Some(Decimal::from_str("125000.5").expect("d")));
        assert_eq!(extraction.lead.email, "");

        let extractor = LeadExtractor::new(CannedClient::new(r#"{"listing_profit": "n/a"}"#));
        let extraction =
            extractor.extract(content("Lead", "", "")).await.expect("extract").expect("content");
        assert_eq!(extraction.lead.listing_profit, None);
    }

    #[tokio::test]
    async fn empty_email_skips_the_model() {
        let client = CannedClient::new("{}");
        let extractor = LeadExtractor::new(client.clone());

        let result = extractor.extract(content("  ", "", "<p> </p>")).await.expect("extract");
        assert!(result.is_none());
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn prompt_uses_html_when_text_is_missing_and_is_capped() {
        let client = CannedClient::new("{}");
        let extractor = LeadExtractor::new(client.clone());
        let html = format!("<div>Name:&nbsp;Dana</div>{}", "x".repeat(MAX_PROMPT_CHARS));

        extractor.extract(content("Lead", "", &html)).await.expect("extract");

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.starts_with("From: leads@bizbuysell.com\nSubject: Lead"));
        assert!(prompts[0].user.contains("Name: Dana"));
        assert_eq!(prompts[0].user.chars().count(), MAX_PROMPT_CHARS);
    }

    #[tokio::test]
    async fn rejects_invalid_or_non_object_json() {
        let extractor = LeadExtractor::new(CannedClient::new("not json"));
        let error = extractor.extract(content("Lead", "body", "")).await.expect_err("invalid");
        assert!(matches!(error, ExtractionError::InvalidJson(_)));

        let extractor = LeadExtractor::new(CannedClient::new("[1, 2]"));
        let error = extractor.extract(content("Lead", "body", "")).await.expect_err("array");
        assert!(matches!(error, ExtractionError::NotAnObject("an array")));
    }

    #[test]
    fn strips_tags() {
        assert_eq!(strip_html("<b>Hi</b>&nbsp;there").trim(), "Hi  there");
    }
}
