use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};
use transform_mapping::{FieldMapper, MappingDocument, TransformConfig};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../fixtures")
        .join(name)
}

fn kong_mapper() -> FieldMapper {
    let document = MappingDocument::from_file(fixture("field-mappings-kong.json"))
        .expect("kong mapping loads");
    let config = TransformConfig::from_file(fixture("transform.toml")).expect("config loads");
    FieldMapper::new(document, &config).expect("mapper builds")
}

fn products() -> Vec<Value> {
    let raw = fs::read_to_string(fixture("products.json")).expect("products fixture");
    serde_json::from_str(&raw).expect("products parse")
}

#[test]
fn config_fixture_overrides_only_what_it_names() {
    let config = TransformConfig::from_file(fixture("transform.toml")).expect("config loads");
    assert_eq!(config.max_reported_errors, 5);
    assert_eq!(config.evaluator.timeout_ms, 500);
    assert_eq!(config.evaluator.max_nodes, 60);
    assert_eq!(config.evaluator.max_depth, 50);
    assert_eq!(config.sanitization.max_depth, 10);
    assert_eq!(config.sanitization.max_string_length, 500);
    assert_eq!(config.sanitization.max_key_length, 100);
}

#[test]
fn batch_keeps_clean_products_and_reports_hostile_ones() {
    let outcome = kong_mapper().transform_batch(&products());

    assert_eq!(outcome.products.len(), 3);
    assert_eq!(outcome.error_count, 2);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[0], "Product 2: Missing required field: name");
    assert!(outcome.errors[1].starts_with("Product 4: wrong_type"));

    assert_eq!(
        outcome.products[0],
        json!({
            "id": "1001",
            "external_id": "TAL-650",
            "name": "Taladro percutor 650W",
            "sku": "TAL-650",
            "ean": "7702004003508",
            "price": 297500.0,
            "stock_quantity": 12,
            "stock_status": "in_stock",
            "status": "active",
            "active": true,
            "created_at": "2024-03-01T00:00:00Z",
            "tags": ["herramientas", "electricas"],
            "custom:color": "rojo",
        })
    );
}

#[test]
fn hostile_fields_never_reach_the_canonical_product() {
    let outcome = kong_mapper().transform_batch(&products());
    let rendered = serde_json::to_string(&outcome.products).expect("serializes");
    for fragment in ["<script", "../", "$(", "OR 1=1", "evil.example"] {
        assert!(!rendered.contains(fragment), "{fragment} leaked");
    }

    let hammer = &outcome.products[1];
    assert_eq!(hammer["price"], json!(22015.0));
    assert_eq!(hammer["stock_status"], json!("out_of_stock"));
    assert_eq!(hammer["status"], json!("inactive"));
    assert_eq!(hammer["active"], json!(false));

    let wrench = &outcome.products[2];
    assert_eq!(wrench["tags"], json!(["ok"]));
    assert_eq!(wrench["stock_status"], json!("in_stock"));
}

#[test]
fn pattern_mismatch_is_a_warning_not_a_rejection() {
    let mapper = kong_mapper();
    let source = match &products()[1] {
        Value::Object(map) => map.clone(),
        other => panic!("fixture product should be an object, got {other}"),
    };
    let transformed = mapper.transform_product(&source);
    assert_eq!(transformed.product["sku"], json!("mar-01"));
    assert!(transformed
        .warnings
        .iter()
        .any(|w| w.starts_with("Validation failed for sku")));
}

#[test]
fn yaml_mapping_runs_tenant_calculations() {
    let document = MappingDocument::from_file(fixture("field-mappings-wms.yaml"))
        .expect("wms mapping loads");
    let mapper = FieldMapper::with_defaults(document).expect("mapper builds");
    let outcome = mapper.transform_batch(&[json!({
        "f_codigo": "UBI-7",
        "f_nombre": "Estante",
        "f_ubicacion": "A-01-03",
        "f_peso": "2500",
    })]);
    assert_eq!(outcome.error_count, 0);
    assert_eq!(
        outcome.products,
        [json!({
            "id": "UBI-7",
            "external_id": "UBI-7",
            "name": "Estante",
            "sku": "UBI-7",
            "location": "A-01-03",
            "weight_kg": 2.5,
        })]
    );
}
