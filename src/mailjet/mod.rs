use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use tracing::{info, warn};

use crate::catalog::{EventType, PropertySpec, SegmentSpec, TemplateDef, WEBHOOK_STATUS_ALIVE};
use crate::mailjet::model::{
    ContactProperty, ListResponse, Segment, Sender, Template, TemplateContent, Webhook,
};

pub mod model;

const MAILJET_API_BASE: &str = "https://api.mailjet.com/";

/// Edit mode for newly created templates (drag-and-drop builder).
const TEMPLATE_EDIT_MODE_DRAG_AND_DROP: u8 = 1;
const TEMPLATE_OWNER_APIKEY: &str = "apikey";
const TEMPLATE_AUTHOR: &str = "mailjet-sync default templates";

/// Authenticated client for the Mailjet REST v3 API.
///
/// Empty credentials are accepted; the resulting client fails every remote
/// call with a 401, which is the intended degraded behavior when a store has
/// no usable key pair.
#[derive(Clone)]
pub struct MailjetClient {
    http: Client,
    base_url: Url,
    api_key: String,
    secret_key: String,
}

impl fmt::Debug for MailjetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailjetClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Remote operations the reconciliation service depends on. Tests substitute
/// a recording implementation.
#[async_trait]
pub trait MailjetService: Send + Sync {
    async fn get_webhooks(&self) -> Result<Vec<Webhook>>;
    async fn create_webhook(&self, event: EventType, url: &str) -> Result<()>;
    async fn update_webhook(&self, id: u64, event: EventType, url: &str) -> Result<()>;
    async fn delete_webhook(&self, id: u64) -> Result<()>;

    async fn get_contact_properties(&self) -> Result<Vec<ContactProperty>>;
    async fn create_contact_property(&self, spec: &PropertySpec) -> Result<()>;

    async fn get_segments(&self) -> Result<Vec<Segment>>;
    async fn create_segment(&self, spec: &SegmentSpec) -> Result<()>;

    async fn get_template(&self, id: u64) -> Result<Option<Template>>;
    async fn create_template(&self, def: &TemplateDef) -> Result<Template>;
    async fn create_template_content(&self, id: u64, content: &TemplateContent) -> Result<()>;
    async fn update_template_content(&self, id: u64, content: &TemplateContent) -> Result<()>;
    async fn get_template_content(&self, id: u64) -> Result<Option<TemplateContent>>;

    async fn get_senders(&self) -> Result<Vec<Sender>>;
}

impl MailjetClient {
    pub fn new(api_key: String, secret_key: String) -> Self {
        let base_url = Url::parse(MAILJET_API_BASE).expect("valid default Mailjet URL");
        Self::with_base_url(api_key, secret_key, base_url)
    }

    pub fn with_base_url(api_key: String, secret_key: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("mailjet-sync/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
            secret_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .context("invalid Mailjet base URL")
    }

    async fn get_list<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.endpoint(path)?;
        info!(url = %url, "mailjet GET");
        let res = self
            .http
            .get(url)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .send()
            .await
            .context("failed to reach Mailjet")?;
        let body: ListResponse<T> = check(res, path).await?.json().await.with_context(|| {
            format!("invalid Mailjet response JSON from {path}")
        })?;
        Ok(body.data)
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        info!(url = %url, %method, "mailjet request");
        let res = self
            .http
            .request(method, url)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .json(body)
            .send()
            .await
            .context("failed to reach Mailjet")?;
        check(res, path).await
    }

    pub async fn get_webhooks(&self) -> Result<Vec<Webhook>> {
        self.get_list("v3/REST/eventcallbackurl").await
    }

    pub async fn create_webhook(&self, event: EventType, url: &str) -> Result<()> {
        let body = build_webhook_payload(event, url);
        self.send_json(reqwest::Method::POST, "v3/REST/eventcallbackurl", &body)
            .await?;
        Ok(())
    }

    pub async fn update_webhook(&self, id: u64, event: EventType, url: &str) -> Result<()> {
        let body = build_webhook_payload(event, url);
        self.send_json(
            reqwest::Method::PUT,
            &format!("v3/REST/eventcallbackurl/{id}"),
            &body,
        )
        .await?;
        Ok(())
    }

    pub async fn delete_webhook(&self, id: u64) -> Result<()> {
        let url = self.endpoint(&format!("v3/REST/eventcallbackurl/{id}"))?;
        info!(url = %url, "mailjet DELETE");
        let res = self
            .http
            .delete(url)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .send()
            .await
            .context("failed to reach Mailjet")?;
        check(res, "eventcallbackurl").await?;
        Ok(())
    }

    pub async fn get_contact_properties(&self) -> Result<Vec<ContactProperty>> {
        self.get_list("v3/REST/contactmetadata").await
    }

    pub async fn create_contact_property(&self, spec: &PropertySpec) -> Result<()> {
        let body = json!({
            "Name": spec.name,
            "Datatype": spec.datatype,
            "NameSpace": spec.namespace,
        });
        self.send_json(reqwest::Method::POST, "v3/REST/contactmetadata", &body)
            .await?;
        Ok(())
    }

    pub async fn get_segments(&self) -> Result<Vec<Segment>> {
        self.get_list("v3/REST/contactfilter").await
    }

    pub async fn create_segment(&self, spec: &SegmentSpec) -> Result<()> {
        let body = json!({
            "Name": spec.name,
            "Expression": spec.expression,
            "Description": spec.description,
        });
        self.send_json(reqwest::Method::POST, "v3/REST/contactfilter", &body)
            .await?;
        Ok(())
    }

    /// Fetch one template head by id; a remote 404 means the stored id is
    /// dangling and yields `None`.
    pub async fn get_template(&self, id: u64) -> Result<Option<Template>> {
        let url = self.endpoint(&format!("v3/REST/template/{id}"))?;
        let res = self
            .http
            .get(url)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .send()
            .await
            .context("failed to reach Mailjet")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ListResponse<Template> = check(res, "template")
            .await?
            .json()
            .await
            .context("invalid Mailjet template JSON")?;
        Ok(body.data.into_iter().next())
    }

    pub async fn create_template(&self, def: &TemplateDef) -> Result<Template> {
        let body = build_template_payload(def);
        let res = self
            .send_json(reqwest::Method::POST, "v3/REST/template", &body)
            .await?;
        let created: ListResponse<Template> = res
            .json()
            .await
            .context("invalid Mailjet create-template JSON")?;
        created
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("mailjet returned no template record for '{}'", def.name))
    }

    pub async fn create_template_content(&self, id: u64, content: &TemplateContent) -> Result<()> {
        let body = serde_json::to_value(content).context("serialize template content")?;
        self.send_json(
            reqwest::Method::POST,
            &format!("v3/REST/template/{id}/detailcontent"),
            &body,
        )
        .await?;
        Ok(())
    }

    pub async fn update_template_content(&self, id: u64, content: &TemplateContent) -> Result<()> {
        let body = serde_json::to_value(content).context("serialize template content")?;
        self.send_json(
            reqwest::Method::PUT,
            &format!("v3/REST/template/{id}/detailcontent"),
            &body,
        )
        .await?;
        Ok(())
    }

    /// Fetch the stored detail content for one template; 404 yields `None`.
    pub async fn get_template_content(&self, id: u64) -> Result<Option<TemplateContent>> {
        let url = self.endpoint(&format!("v3/REST/template/{id}/detailcontent"))?;
        let res = self
            .http
            .get(url)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .send()
            .await
            .context("failed to reach Mailjet")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ListResponse<TemplateContent> = check(res, "detailcontent")
            .await?
            .json()
            .await
            .context("invalid Mailjet detailcontent JSON")?;
        Ok(body.data.into_iter().next())
    }

    pub async fn get_senders(&self) -> Result<Vec<Sender>> {
        self.get_list("v3/REST/sender").await
    }
}

async fn check(res: reqwest::Response, path: &str) -> Result<reqwest::Response> {
    if res.status() == StatusCode::TOO_MANY_REQUESTS {
        let body = res.text().await.unwrap_or_default();
        warn!(path, "rate limited by Mailjet: {}", body);
        return Err(anyhow!("received 429 from Mailjet: {}", body));
    }
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        warn!(path, %status, "Mailjet API error: {}", body);
        return Err(anyhow!("mailjet error {status} on {path}: {body}"));
    }
    Ok(res)
}

/// Webhook create/update payload with status forced alive.
pub fn build_webhook_payload(event: EventType, url: &str) -> Value {
    json!({
        "EventType": event.as_str(),
        "Status": WEBHOOK_STATUS_ALIVE,
        "Url": url,
    })
}

/// Fixed metadata for newly created default templates.
pub fn build_template_payload(def: &TemplateDef) -> Value {
    json!({
        "Author": TEMPLATE_AUTHOR,
        "Categories": ["basic"],
        "Copyright": "",
        "Description": "",
        "EditMode": TEMPLATE_EDIT_MODE_DRAG_AND_DROP,
        "IsStarred": false,
        "IsTextPartGenerationEnabled": true,
        "Locale": "en_US",
        "Name": def.name,
        "OwnerType": TEMPLATE_OWNER_APIKEY,
        "Presets": "",
        "Purposes": [def.purpose],
    })
}

/// Assemble template detail content from local assets and the account's
/// default sender. An empty sender name falls back to the template subject.
pub fn build_template_content(
    def: &TemplateDef,
    sender: &Sender,
    mjml: Value,
    html: String,
) -> TemplateContent {
    let sender_name = if sender.name.trim().is_empty() {
        def.subject
    } else {
        sender.name.as_str()
    };
    TemplateContent {
        headers: json!({
            "SenderName": sender_name,
            "SenderEmail": sender.email,
            "From": sender.email,
            "Subject": def.subject,
            "Reply-To": sender.email,
        }),
        html_part: html,
        mjml_content: mjml,
        text_part: String::new(),
    }
}

#[async_trait]
impl MailjetService for MailjetClient {
    async fn get_webhooks(&self) -> Result<Vec<Webhook>> {
        MailjetClient::get_webhooks(self).await
    }
    async fn create_webhook(&self, event: EventType, url: &str) -> Result<()> {
        MailjetClient::create_webhook(self, event, url).await
    }
    async fn update_webhook(&self, id: u64, event: EventType, url: &str) -> Result<()> {
        MailjetClient::update_webhook(self, id, event, url).await
    }
    async fn delete_webhook(&self, id: u64) -> Result<()> {
        MailjetClient::delete_webhook(self, id).await
    }
    async fn get_contact_properties(&self) -> Result<Vec<ContactProperty>> {
        MailjetClient::get_contact_properties(self).await
    }
    async fn create_contact_property(&self, spec: &PropertySpec) -> Result<()> {
        MailjetClient::create_contact_property(self, spec).await
    }
    async fn get_segments(&self) -> Result<Vec<Segment>> {
        MailjetClient::get_segments(self).await
    }
    async fn create_segment(&self, spec: &SegmentSpec) -> Result<()> {
        MailjetClient::create_segment(self, spec).await
    }
    async fn get_template(&self, id: u64) -> Result<Option<Template>> {
        MailjetClient::get_template(self, id).await
    }
    async fn create_template(&self, def: &TemplateDef) -> Result<Template> {
        MailjetClient::create_template(self, def).await
    }
    async fn create_template_content(&self, id: u64, content: &TemplateContent) -> Result<()> {
        MailjetClient::create_template_content(self, id, content).await
    }
    async fn update_template_content(&self, id: u64, content: &TemplateContent) -> Result<()> {
        MailjetClient::update_template_content(self, id, content).await
    }
    async fn get_template_content(&self, id: u64) -> Result<Option<TemplateContent>> {
        MailjetClient::get_template_content(self, id).await
    }
    async fn get_senders(&self) -> Result<Vec<Sender>> {
        MailjetClient::get_senders(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TEMPLATES;

    #[test]
    fn webhook_payload_forces_alive_status() {
        let body = build_webhook_payload(EventType::Bounce, "https://cb/bounce");
        assert_eq!(body["EventType"], "bounce");
        assert_eq!(body["Status"], "alive");
        assert_eq!(body["Url"], "https://cb/bounce");
    }

    #[test]
    fn template_payload_carries_fixed_metadata() {
        let body = build_template_payload(&TEMPLATES[0]);
        assert_eq!(body["EditMode"], 1);
        assert_eq!(body["OwnerType"], "apikey");
        assert_eq!(body["Locale"], "en_US");
        assert_eq!(body["Categories"][0], "basic");
        assert_eq!(body["Purposes"][0], "transactional");
        assert_eq!(body["Name"], TEMPLATES[0].name);
    }

    #[test]
    fn content_headers_use_sender_identity() {
        let sender = Sender {
            id: 1,
            name: "Shop".into(),
            email: "shop@example.com".into(),
        };
        let content = build_template_content(
            &TEMPLATES[0],
            &sender,
            serde_json::json!({"tagName": "mjml"}),
            "<p>hi</p>".into(),
        );
        assert_eq!(content.headers["SenderName"], "Shop");
        assert_eq!(content.headers["From"], "shop@example.com");
        assert_eq!(content.headers["Subject"], TEMPLATES[0].subject);
        assert_eq!(content.text_part, "");
    }

    #[test]
    fn content_falls_back_to_subject_for_unnamed_sender() {
        let sender = Sender {
            id: 1,
            name: "  ".into(),
            email: "shop@example.com".into(),
        };
        let content = build_template_content(
            &TEMPLATES[0],
            &sender,
            Value::Null,
            String::new(),
        );
        assert_eq!(content.headers["SenderName"], TEMPLATES[0].subject);
    }
}
