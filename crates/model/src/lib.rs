use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

pub mod env;
pub mod record;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Every widget document lives under this prefix in the blob store.
pub const WIDGET_KEY_PREFIX: &str = "widgets/";

/// The change a request asks for.
/// Anything other than the known kinds is kept as `Unknown` so it can be skipped.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name: &str = match self {
            RequestKind::Create => "create",
            RequestKind::Update => "update",
            RequestKind::Delete => "delete",
            RequestKind::Unknown => "unknown",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A single widget change as it arrives from the source.
///
/// Fields this worker does not interpret are retained in `extra`,
/// so serializing the request reproduces the incoming payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetChangeRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub widget_id: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_attributes: Option<Vec<Attribute>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WidgetChangeRequest {
    pub fn owner_slug(&self) -> String {
        slug(&self.owner)
    }

    pub fn attributes(&self) -> &[Attribute] {
        self.other_attributes.as_deref().unwrap_or_default()
    }
}

/// Normalise a display name into the form used in storage keys.
pub fn slug(owner: &str) -> String {
    owner.replace(' ', "-").to_lowercase()
}

/// Blob key of a widget, `owner_slug` must already be normalised.
pub fn widget_key(owner_slug: &str, widget_id: &str) -> String {
    format!("{WIDGET_KEY_PREFIX}{owner_slug}/{widget_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slug_replaces_spaces_and_lowercases() {
        assert_eq!("john-doe", slug("John Doe"));
        assert_eq!("a--b", slug("A  B"));
        assert_eq!("", slug(""));
    }

    #[test]
    fn slug_is_idempotent() {
        for owner in ["John Doe", "already-slugged", "MiXeD Case Name", " padded "] {
            let once: String = slug(owner);

            assert_eq!(once, slug(&once));
        }
    }

    #[test]
    fn widget_key_uses_prefix() {
        assert_eq!("widgets/john-doe/123", widget_key("john-doe", "123"));
    }

    #[test]
    fn request_parses_full_payload() {
        let payload: Value = json!({
            "type": "create",
            "widgetId": "123",
            "owner": "John Doe",
            "label": "L",
            "description": "D",
            "otherAttributes": [{"name": "color", "value": "red"}]
        });

        let request: WidgetChangeRequest =
            serde_json::from_value(payload).expect("Payload should parse");

        assert_eq!(RequestKind::Create, request.kind);
        assert_eq!("123", request.widget_id);
        assert_eq!("john-doe", request.owner_slug());
        assert_eq!(Some("L".to_string()), request.label);
        assert_eq!(
            vec![Attribute {
                name: "color".to_string(),
                value: "red".to_string()
            }],
            request.attributes()
        );
    }

    #[test]
    fn request_serializes_back_to_payload() {
        let payload: Value = json!({
            "type": "update",
            "widgetId": "9",
            "owner": "Jane",
            "description": "only a description",
            "otherAttributes": [],
            "requestId": "abc-1"
        });

        let request: WidgetChangeRequest =
            serde_json::from_value(payload.clone()).expect("Payload should parse");
        let serialized: Value = serde_json::to_value(&request).expect("Request should serialize");

        assert_eq!(payload, serialized);
    }

    #[test]
    fn unknown_kind_is_tolerated() {
        let request: WidgetChangeRequest = serde_json::from_str(
            r#"{"type": "archive", "widgetId": "1", "owner": "someone"}"#,
        )
        .expect("Unknown kinds should still parse");

        assert_eq!(RequestKind::Unknown, request.kind);
        assert!(request.attributes().is_empty());
    }

    #[test]
    fn missing_widget_id_is_rejected() {
        let result: Result<WidgetChangeRequest, serde_json::Error> =
            serde_json::from_str(r#"{"type": "delete", "owner": "someone"}"#);

        assert!(result.is_err());
    }
}
