//! Convenience layer: one-shot evaluation, option mappings, decoding.

use std::io::Write;

use jsonnet::{
    eval_file_with, eval_snippet_with, Encoding, Error, NativeFunction, OptionValue, Output,
    Resolved, Vm,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

fn with_example_file(content: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".jsonnet")
        .tempfile()
        .expect("create temp file");
    file.write_all(content).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

#[test]
fn libversion_returns_the_engine_version() {
    assert!(!jsonnet::libversion().is_empty());
}

#[test]
fn evaluate_returns_a_decoded_result() {
    let result: Value = jsonnet::evaluate("{ foo: \"bar\" }").unwrap();
    assert_eq!(result, json!({"foo": "bar"}));
}

#[test]
fn evaluate_decodes_into_caller_types() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Config {
        replicas: u32,
        name: String,
    }

    let config: Config = jsonnet::evaluate("{ replicas: 2 + 1, name: \"web\" }").unwrap();
    assert_eq!(
        config,
        Config {
            replicas: 3,
            name: "web".to_owned(),
        }
    );
}

#[test]
fn evaluate_with_accepts_vm_options() {
    let result: Value = jsonnet::evaluate_with(
        "import \"imported.jsonnet\"",
        vec![(
            "import_callback".to_owned(),
            OptionValue::import(|_base, _rel| {
                Ok(Resolved {
                    content: "{ foo: \"bar\" }".to_owned(),
                    path: "imported".into(),
                })
            }),
        )],
    )
    .unwrap();
    assert_eq!(result, json!({"foo": "bar"}));
}

#[test]
fn evaluate_with_rejects_unknown_options() {
    let err = jsonnet::evaluate_with::<Value, _>(
        "{}",
        vec![("frobnicate".to_owned(), OptionValue::from(true))],
    )
    .unwrap_err();
    match err {
        Error::UnsupportedOption(key) => assert_eq!(key, "frobnicate"),
        other => panic!("expected unsupported option error, got {other:?}"),
    }
}

#[test]
fn load_returns_a_decoded_result() {
    let file = with_example_file(
        br#"
          local myvar = 1;
          {
            ["foo" + myvar]: myvar,
          }
        "#,
    );
    let result: Value = jsonnet::load(file.path()).unwrap();
    assert_eq!(result, json!({"foo1": 1}));
}

#[test]
fn snippet_options_split_into_call_and_vm_scope() {
    let output = eval_snippet_with(
        "{ [std.extVar(\"name\")]: { n: 1 } }",
        vec![
            ("ext_var".to_owned(), OptionValue::bindings([("name", "a.json")])),
            ("multi".to_owned(), OptionValue::from(true)),
        ],
    )
    .unwrap();

    let fileset = output.into_multi().expect("multi output");
    let body: Value = serde_json::from_slice(fileset["a.json"].as_bytes()).unwrap();
    assert_eq!(body, json!({"n": 1}));
}

#[test]
fn snippet_filename_option_shows_up_in_errors() {
    let err = eval_snippet_with(
        "{ x: undefined_variable }",
        vec![("filename".to_owned(), OptionValue::from("renamed.jsonnet"))],
    )
    .unwrap_err();
    match err {
        Error::Evaluation(message) => {
            assert!(
                message.to_string_lossy().contains("renamed.jsonnet"),
                "got: {message}"
            );
        }
        other => panic!("expected evaluation error, got {other:?}"),
    }
}

#[test]
fn file_options_accept_an_encoding_label() {
    // [ "テスト" ] in EUC-JP
    let file = with_example_file(b"[ \"\xA5\xC6\xA5\xB9\xA5\xC8\" ]");
    let output = eval_file_with(
        file.path(),
        vec![("encoding".to_owned(), OptionValue::from("EUC-JP"))],
    )
    .unwrap();
    match output {
        Output::Single(text) => assert_eq!(text.encoding(), Encoding::EucJp),
        Output::Multi(_) => panic!("expected single output"),
    }
}

#[test]
fn file_options_reject_unknown_encoding_labels() {
    let file = with_example_file(b"{}");
    let err = eval_file_with(
        file.path(),
        vec![("encoding".to_owned(), OptionValue::from("klingon"))],
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncoding(_)), "got {err:?}");
}

#[test]
fn native_functions_register_through_the_option_mapping() {
    let result: Value = jsonnet::evaluate_with(
        "std.native('triple')(14)",
        vec![(
            "native_callbacks".to_owned(),
            OptionValue::Natives(vec![NativeFunction::new("triple", &["x"], |args| {
                let x = args[0].as_f64().ok_or("x must be a number")?;
                Ok(json!(x * 3.0))
            })]),
        )],
    )
    .unwrap();
    assert_eq!(result, json!(42));
}

#[test]
fn configure_keeps_options_applied_before_a_failure() {
    let mut vm = Vm::new();
    let err = vm
        .configure(vec![
            ("ext_var".to_owned(), OptionValue::bindings([("var1", "foo")])),
            ("no_such_option".to_owned(), OptionValue::from(true)),
            ("max_trace".to_owned(), OptionValue::from(3u32)),
        ])
        .unwrap_err();
    match err {
        Error::UnsupportedOption(key) => assert_eq!(key, "no_such_option"),
        other => panic!("expected unsupported option error, got {other:?}"),
    }

    // the binding applied before the failing key is still in effect
    let result = vm.evaluate("[std.extVar(\"var1\")]").unwrap();
    let parsed: Value = serde_json::from_slice(result.as_bytes()).unwrap();
    assert_eq!(parsed, json!(["foo"]));
}

#[test]
fn configure_rejects_ill_shaped_values() {
    let mut vm = Vm::new();
    let err = vm
        .configure(vec![("max_stack".to_owned(), OptionValue::from("deep"))])
        .unwrap_err();
    assert!(matches!(err, Error::Argument(_)), "got {err:?}");
}

#[test]
fn multi_output_cannot_be_decoded_as_one_document() {
    let err = jsonnet::evaluate_with::<Value, _>(
        "{ \"a.json\": {} }",
        vec![("multi".to_owned(), OptionValue::from(true))],
    )
    .unwrap_err();
    assert!(matches!(err, Error::Argument(_)), "got {err:?}");
}
