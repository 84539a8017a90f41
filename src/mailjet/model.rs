//! Wire models for the Mailjet REST v3 API.
//!
//! Every listing endpoint wraps its payload in `{"Count": n, "Data": [...],
//! "Total": n}`; field names are the API's PascalCase spellings.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard list envelope returned by the REST v3 endpoints. The envelope
/// also carries `Count` and `Total`; only `Data` is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(rename = "Data", default = "Vec::new")]
    pub data: Vec<T>,
}

/// A webhook subscription (`/v3/REST/eventcallbackurl`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Webhook {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "EventType")]
    pub event_type: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Url")]
    pub url: String,
}

/// A contact property definition (`/v3/REST/contactmetadata`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactProperty {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Datatype")]
    pub datatype: String,
    #[serde(rename = "NameSpace", default)]
    pub namespace: String,
}

/// A saved contact filter (`/v3/REST/contactfilter`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Expression")]
    pub expression: String,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// A template head record (`/v3/REST/template`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// A verified sender identity (`/v3/REST/sender`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sender {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
}

/// Template detail content (`/v3/REST/template/{id}/detailcontent`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateContent {
    #[serde(rename = "Headers", default)]
    pub headers: Value,
    #[serde(rename = "Html-part", default)]
    pub html_part: String,
    #[serde(rename = "MJMLContent", default)]
    pub mjml_content: Value,
    #[serde(rename = "Text-part", default)]
    pub text_part: String,
}
