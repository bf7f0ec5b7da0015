use crate::WidgetChangeRequest;
use std::collections::BTreeMap;
use thiserror::Error;

pub const WIDGET_ID: &str = "widget_id";
pub const OWNER: &str = "owner";
pub const LABEL: &str = "label";
pub const DESCRIPTION: &str = "description";

/// Flattened projection of a widget as stored in the record table.
pub type WidgetRecord = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("widget {widget_id} is missing required field {field}")]
    MissingField {
        widget_id: String,
        field: &'static str,
    },
}

/// Build the record projection of a request.
///
/// Attributes are applied after the reserved fields, so an attribute
/// named like a reserved field replaces its value.
pub fn to_record(widget: &WidgetChangeRequest) -> Result<WidgetRecord, ProjectionError> {
    let label: &str = required(widget, widget.label.as_deref(), LABEL)?;
    let description: &str = required(widget, widget.description.as_deref(), DESCRIPTION)?;

    let mut record: WidgetRecord = BTreeMap::new();
    record.insert(WIDGET_ID.to_string(), widget.widget_id.clone());
    record.insert(OWNER.to_string(), widget.owner.clone());
    record.insert(LABEL.to_string(), label.to_string());
    record.insert(DESCRIPTION.to_string(), description.to_string());

    for attribute in widget.attributes() {
        record.insert(attribute.name.clone(), attribute.value.clone());
    }

    Ok(record)
}

fn required<'a>(
    widget: &WidgetChangeRequest,
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ProjectionError> {
    value.ok_or_else(|| ProjectionError::MissingField {
        widget_id: widget.widget_id.clone(),
        field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attribute, RequestKind};

    fn widget(attributes: Vec<Attribute>) -> WidgetChangeRequest {
        WidgetChangeRequest {
            kind: RequestKind::Create,
            widget_id: "123".to_string(),
            owner: "John Doe".to_string(),
            label: Some("L".to_string()),
            description: Some("D".to_string()),
            other_attributes: Some(attributes),
            extra: Default::default(),
        }
    }

    fn attribute(name: &str, value: &str) -> Attribute {
        Attribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn record_flattens_attributes() {
        let record: WidgetRecord =
            to_record(&widget(vec![attribute("color", "red")])).expect("Record should build");

        let expected: WidgetRecord = [
            ("widget_id", "123"),
            ("owner", "John Doe"),
            ("label", "L"),
            ("description", "D"),
            ("color", "red"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(expected, record);
    }

    #[test]
    fn record_keeps_raw_owner() {
        let record: WidgetRecord = to_record(&widget(vec![])).expect("Record should build");

        assert_eq!(Some(&"John Doe".to_string()), record.get(OWNER));
    }

    #[test]
    fn colliding_attribute_overwrites_reserved_field() {
        let record: WidgetRecord = to_record(&widget(vec![attribute("label", "from attribute")]))
            .expect("Record should build");

        assert_eq!(Some(&"from attribute".to_string()), record.get(LABEL));
        assert_eq!(4, record.len());
    }

    #[test]
    fn later_attribute_wins() {
        let record: WidgetRecord = to_record(&widget(vec![
            attribute("color", "red"),
            attribute("color", "blue"),
        ]))
        .expect("Record should build");

        assert_eq!(Some(&"blue".to_string()), record.get("color"));
    }

    #[test]
    fn missing_label_is_reported() {
        let mut request: WidgetChangeRequest = widget(vec![]);
        request.label = None;

        assert_eq!(
            Err(ProjectionError::MissingField {
                widget_id: "123".to_string(),
                field: LABEL,
            }),
            to_record(&request)
        );
    }
}
