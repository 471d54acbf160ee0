use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use leadsign_cli::commands::{add_form_fields, config, fields, migrate, verify_contact};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn config_reports_sources_and_redacts_secrets() {
    with_env(
        &[
            ("LEADSIGN_DATABASE_URL", "sqlite::memory:"),
            ("LEADSIGN_CRM_API_KEY", "pit-1234-secret"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "config");
            assert_eq!(payload["status"], "ok");
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.contains(
                "- database.url = sqlite::memory: (source: env (LEADSIGN_DATABASE_URL))"
            ));
            assert!(
                message.contains("- crm.api_key = pit-*** (source: env (LEADSIGN_CRM_API_KEY))")
            );
            assert!(message.contains("- crm.tag = NDA_Signed (source: default)"));
            assert!(!message.contains("secret"));
        },
    );
}

#[test]
fn config_returns_validation_failure_for_enabled_crm_without_key() {
    with_env(&[("LEADSIGN_CRM_ENABLED", "true")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("crm.api_key"));
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("LEADSIGN_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_unreachable_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}/missing/dir/leadsign.db", dir.path().display());
    with_env(&[("LEADSIGN_DATABASE_URL", url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "db_connectivity");
    });
}

#[test]
fn fields_requires_crm_credentials() {
    with_env(&[], || {
        let result = fields::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "fields");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn fields_lists_location_fields_and_marks_the_configured_one() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/locations/loc-1/customFields"))
            .and(header("authorization", "Bearer pit-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"customFields": [
                {"id": "fld-1", "name": "Listing ID", "fieldKey": "contact.listing_id"},
                {"id": "fld-2", "name": "Signed NDA", "fieldKey": "contact.signed_nda"}
            ]})))
            .mount(&server)
            .await;
        server
    });
    let uri = server.uri();

    with_env(
        &[
            ("LEADSIGN_CRM_API_BASE_URL", uri.as_str()),
            ("LEADSIGN_CRM_API_KEY", "pit-test"),
            ("LEADSIGN_CRM_LOCATION_ID", "loc-1"),
        ],
        || {
            let result = fields::run();
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.starts_with("2 custom fields:"));
            assert!(message.contains("- fld-2 | Signed NDA | contact.signed_nda |   <- configured"));
        },
    );
    drop(server);
}

#[test]
fn verify_contact_requires_crm_credentials() {
    with_env(&[], || {
        let result = verify_contact::run("c-1", None);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "verify-contact");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn verify_contact_marks_the_signed_link_and_tag() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts/c-1"))
            .and(header("authorization", "Bearer pit-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"contact": {
                "id": "c-1",
                "firstName": "Dana",
                "lastName": "Buyer",
                "email": "dana@example.com",
                "tags": ["nda_signed", "buyer"],
                "customFields": [
                    {"id": "fld-nda", "value": "http://files.local/nda_signed_R1.pdf"},
                    {"id": "fld-2", "value": "2231"}
                ]
            }})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contacts/c-2"))
            .respond_with(ResponseTemplate::new(404).set_body_string("contact not found"))
            .mount(&server)
            .await;
        server
    });
    let uri = server.uri();

    with_env(
        &[
            ("LEADSIGN_CRM_API_BASE_URL", uri.as_str()),
            ("LEADSIGN_CRM_API_KEY", "pit-test"),
            ("LEADSIGN_CRM_CUSTOM_FIELD_ID", "fld-nda"),
            ("LEADSIGN_CRM_MAX_RETRIES", "0"),
        ],
        || {
            let result = verify_contact::run("c-1", None);
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.starts_with("contact c-1: Dana Buyer <dana@example.com>"));
            assert!(message.contains(
                "- fld-nda = http://files.local/nda_signed_R1.pdf  <- signed document field"
            ));
            assert!(message.contains("tag `NDA_Signed`: present"));

            let other_field = verify_contact::run("c-1", Some("fld-2"));
            let payload = parse_payload(&other_field.output);
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.contains("- fld-2 = 2231  <- signed document field"));

            let missing = verify_contact::run("c-2", None);
            assert_eq!(missing.exit_code, 6);
            assert_eq!(parse_payload(&missing.output)["error_class"], "crm_request");
        },
    );
    drop(server);
}

#[test]
fn add_form_fields_writes_a_fillable_copy_and_can_overwrite_in_place() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("nda_template.pdf");
    let output = dir.path().join("fillable.pdf");
    fs::write(&input, blank_pdf()).expect("write blank template");

    let result = add_form_fields::run(&input, Some(&output));
    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    assert_eq!(parse_payload(&result.output)["status"], "ok");
    let expected = leadsign_core::field_definitions().len();
    assert_eq!(field_count(&fs::read(&output).expect("output")), expected);
    assert_eq!(field_count(&fs::read(&input).expect("input")), 0);

    let result = add_form_fields::run(&input, None);
    assert_eq!(result.exit_code, 0);
    assert_eq!(field_count(&fs::read(&input).expect("input")), expected);
    let leftovers = fs::read_dir(dir.path()).expect("dir").count();
    assert_eq!(leftovers, 2, "temp files should not be left behind");
}

#[test]
fn add_form_fields_rejects_missing_and_invalid_input() {
    let dir = tempfile::tempdir().expect("temp dir");

    let missing = add_form_fields::run(&dir.path().join("absent.pdf"), None);
    assert_eq!(missing.exit_code, 7);
    assert_eq!(parse_payload(&missing.output)["error_class"], "input_read");

    let garbage = dir.path().join("garbage.pdf");
    fs::write(&garbage, b"definitely not a pdf").expect("write");
    let invalid = add_form_fields::run(&garbage, None);
    assert_eq!(invalid.exit_code, 8);
    assert_eq!(parse_payload(&invalid.output)["error_class"], "template");
    assert_eq!(fs::read(&garbage).expect("unchanged"), b"definitely not a pdf");
}

fn blank_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save blank pdf");
    bytes
}

fn field_count(bytes: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).expect("load pdf");
    let catalog = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .expect("catalog");
    let Ok(acroform) = catalog.get(b"AcroForm") else {
        return 0;
    };
    let acroform = match acroform {
        Object::Reference(id) => doc.get_dictionary(*id).expect("acroform"),
        Object::Dictionary(dict) => dict,
        _ => return 0,
    };
    acroform.get(b"Fields").and_then(Object::as_array).map(Vec::len).unwrap_or(0)
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LEADSIGN_DATABASE_URL",
        "LEADSIGN_DATABASE_MAX_CONNECTIONS",
        "LEADSIGN_DATABASE_TIMEOUT_SECS",
        "LEADSIGN_SERVER_BIND_ADDRESS",
        "LEADSIGN_SERVER_PORT",
        "LEADSIGN_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "LEADSIGN_SERVER_REQUEST_TIMEOUT_SECS",
        "LEADSIGN_STORAGE_ROOT",
        "LEADSIGN_STORAGE_PUBLIC_BASE_URL",
        "LEADSIGN_STORAGE_TEMPLATE_PATH",
        "LEADSIGN_PDF_MODE",
        "LEADSIGN_CRM_ENABLED",
        "LEADSIGN_CRM_API_BASE_URL",
        "LEADSIGN_CRM_API_KEY",
        "LEADSIGN_CRM_LOCATION_ID",
        "LEADSIGN_CRM_CUSTOM_FIELD_LABEL",
        "LEADSIGN_CRM_CUSTOM_FIELD_ID",
        "LEADSIGN_CRM_TAG",
        "LEADSIGN_CRM_TIMEOUT_SECS",
        "LEADSIGN_CRM_MAX_RETRIES",
        "LEADSIGN_CRM_RETRY_BACKOFF_MS",
        "LEADSIGN_LLM_ENABLED",
        "LEADSIGN_LLM_API_KEY",
        "LEADSIGN_LLM_BASE_URL",
        "LEADSIGN_LLM_MODEL",
        "LEADSIGN_LLM_TIMEOUT_SECS",
        "LEADSIGN_LOGGING_LEVEL",
        "LEADSIGN_LOGGING_FORMAT",
        "LEADSIGN_LOG_LEVEL",
        "LEADSIGN_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
