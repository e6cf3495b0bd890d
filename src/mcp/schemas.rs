//! JSON schema builders for MCP tools.

use serde_json::{Map, Value};

/// Build the schema describing the `upload-document` tool input.
pub(crate) fn upload_document_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "path".into(),
        string_schema("Local path of the document to upload"),
    );
    properties.insert(
        "name".into(),
        string_schema("Optional display name; defaults to the file name from `path`."),
    );
    finalize_object_schema(properties, &["path"])
}

/// Build the schema describing the `upload-url` tool input.
pub(crate) fn upload_url_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    let mut url_schema = Map::new();
    url_schema.insert("type".into(), Value::String("string".into()));
    url_schema.insert("format".into(), Value::String("uri".into()));
    url_schema.insert(
        "description".into(),
        Value::String("Absolute http(s) URL of the document to ingest".into()),
    );
    properties.insert("url".into(), Value::Object(url_schema));
    finalize_object_schema(properties, &["url"])
}

/// Build the schema describing the `ask-question` tool input.
pub(crate) fn ask_question_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    let mut question_schema = Map::new();
    question_schema.insert("type".into(), Value::String("string".into()));
    question_schema.insert(
        "description".into(),
        Value::String("Question about the ready document".into()),
    );
    question_schema.insert("minLength".into(), Value::Number(1.into()));
    properties.insert("question".into(), Value::Object(question_schema));
    finalize_object_schema(properties, &["question"])
}

/// Schema for tools that take no arguments.
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_schema_requires_path_only() {
        let schema = upload_document_input_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert_eq!(schema["additionalProperties"], Value::Bool(false));
        assert!(schema["properties"].get("name").is_some());
    }

    #[test]
    fn empty_schema_has_no_required_list() {
        let schema = empty_object_schema();
        assert!(schema.get("required").is_none());
    }
}
