//! Integration tests: loading forms from disk and end-to-end form flows.

use std::path::PathBuf;

use compform_core::{Form, FormCatalog, FormError};
use serde_json::json;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn basic_form_from_json_file() {
    let mut form = Form::from_json_file(fixture("basic_form.json")).expect("load");
    assert_eq!(form.keys(), ["name", "city"]);

    form.put("name", "Alice").expect("put").put("city", "Wonderland").expect("put");
    let request = form.create_request().expect("request");
    assert_eq!(request.messages()[1].content, "Hello, my name is Alice and I live in Wonderland.");

    let format = request.response_format().expect("structured");
    assert_eq!(format.schema()["required"], json!(["greeting", "location_echo"]));
}

#[test]
fn nested_form_projection() {
    let form = Form::from_json_file(fixture("nested_form.json")).expect("load");
    let format = form.response_format().expect("structured");
    let profile = &format.schema()["properties"]["profile"];

    assert_eq!(profile["description"], json!("The extracted profile."));
    assert_eq!(profile["required"], json!(["age", "name"]));
    assert_eq!(profile["properties"]["languages"]["items"], json!({ "type": "string" }));
    assert_eq!(format.schema()["required"], json!(["confidence", "profile"]));
}

#[test]
fn text_form_parses_thinking() {
    let mut form = Form::from_json_file(fixture("text_form.json")).expect("load");
    assert!(form.response_format().is_none());
    form.put("text_to_summarize", "A long article.").expect("put");

    let request = form.create_request().expect("request");
    assert!(request.is_text_response());
    let parsed = request
        .parse("<think>The article is long.</think>\nShort summary.")
        .expect("parse");
    assert_eq!(parsed["thinking"], json!("The article is long."));
    assert_eq!(parsed["summary"], json!("Short summary."));
}

#[test]
fn toml_form_keeps_role_order() {
    let form = Form::from_toml_file(fixture("haiku.toml")).expect("load");
    assert_eq!(form.keys(), ["topic", "poet"]);
    let roles: Vec<&str> = form.messages_schema().into_iter().map(|(role, _)| role).collect();
    assert_eq!(roles, ["system", "user"]);
}

#[test]
fn missing_file_and_malformed_json_are_distinct() {
    let missing = Form::from_json_file(fixture("does_not_exist.json"));
    assert!(matches!(missing, Err(FormError::FileNotFound(_))));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"user\": ").expect("write");
    let malformed = Form::from_json_file(&path);
    assert!(matches!(malformed, Err(FormError::InvalidJson { .. })));
}

#[test]
fn catalog_loads_directory() {
    let catalog = FormCatalog::from_directory(fixture("")).expect("catalog");
    assert_eq!(catalog.names(), ["basic_form", "haiku", "nested_form", "text_form"]);
    assert!(catalog.get("haiku").expect("haiku").response_format().is_none());
}

#[test]
fn catalog_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("notes.txt"), "not a form").expect("write");
    assert!(matches!(
        FormCatalog::from_directory(dir.path()),
        Err(FormError::EmptyCatalog(_))
    ));

    std::fs::write(dir.path().join("bad.json"), r#"{"user": "x"}"#).expect("write");
    assert!(matches!(
        FormCatalog::from_directory(dir.path()),
        Err(FormError::InvalidTemplate(_))
    ));
}

#[test]
fn messages_round_trip_substituted_values() {
    let mut form = Form::from_value(&json!({
        "system": "Context: {ctx}",
        "user": "{{literal}} {question}",
        "response": { "answer": { "type": "text" } }
    }))
    .expect("valid");
    form.put("ctx", "a {b} c").expect("put").put("question", "why?").expect("put");

    let messages = form.messages().expect("messages");
    assert_eq!(messages[0].content, "Context: a {b} c");
    assert_eq!(messages[1].content, "{literal} why?");
}
