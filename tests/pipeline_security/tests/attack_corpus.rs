use std::collections::HashMap;

use ingestion_sanitization::{
    sanitize_log_message, SanitizationPolicy, StringOptions, ValidationErrorKind,
};
use serde_json::{json, Value};
use transform_expression::{
    apply_transform, evaluate, evaluate_condition, EvaluationErrorKind, Evaluator,
    EvaluatorLimits,
};

fn scope(value: Value) -> HashMap<String, Value> {
    HashMap::from([("value".to_string(), value)])
}

fn error_kind(text: &str, variables: &HashMap<String, Value>) -> EvaluationErrorKind {
    evaluate(text, variables)
        .expect_err("expression should be refused")
        .kind()
}

#[test]
fn escape_attempts_are_forbidden_whether_or_not_the_name_exists() {
    let bound = scope(json!(""));
    let empty = HashMap::new();
    for text in [
        "value.__class__",
        "value.__class__.__mro__[1].__subclasses__()",
        "value[0]",
        "missing.attribute",
        "__import__('os').system('id')",
        "eval('1+1')",
        "open('/etc/passwd')",
        "lambda: 1",
        "[c for c in value]",
    ] {
        assert_eq!(
            error_kind(text, &bound),
            EvaluationErrorKind::ForbiddenConstruct,
            "{text}"
        );
        assert_eq!(
            error_kind(text, &empty),
            EvaluationErrorKind::ForbiddenConstruct,
            "{text} without bindings"
        );
    }
}

#[test]
fn short_circuit_guards_dangerous_operands() {
    let empty = HashMap::new();
    assert_eq!(evaluate("false and (1/0)", &empty), Ok(json!(false)));
    assert_eq!(evaluate("true or (1/0)", &empty), Ok(json!(true)));
    assert_eq!(error_kind("10 / 0", &empty), EvaluationErrorKind::DivisionByZero);
}

#[test]
fn complexity_and_arithmetic_bounds_hold() {
    let bound = scope(json!(1));
    let long = format!("value{}", " + 1".repeat(100));
    assert_eq!(error_kind(&long, &bound), EvaluationErrorKind::TooComplex);
    assert_eq!(error_kind("9 ** 9 ** 9", &bound), EvaluationErrorKind::NumericOverflow);
    assert_eq!(evaluate("10 + 5", &bound), Ok(json!(15)));
    assert_eq!(evaluate("10 * 5", &bound), Ok(json!(50)));
    assert_eq!(evaluate("10 > 5", &bound), Ok(json!(true)));
}

#[test]
fn fallbacks_hide_every_failure_kind() {
    for text in ["value.__class__", "value / 0", "undefined + 1", "((", "9 ** 9 ** 9"] {
        assert_eq!(apply_transform(&json!(100), text), json!(100), "{text}");
        assert!(!evaluate_condition(&json!(100), text), "{text}");
    }
}

#[tokio::test]
async fn async_evaluation_respects_custom_limits() {
    let evaluator = Evaluator::new(EvaluatorLimits {
        max_nodes: 5,
        ..EvaluatorLimits::default()
    });
    let bound = scope(json!(4));
    assert_eq!(evaluator.evaluate_async("value * 2", &bound).await, Ok(json!(8)));
    let err = evaluator
        .evaluate_async("value + 1 + 2 + 3 + 4", &bound)
        .await
        .expect_err("node budget exceeded");
    assert_eq!(err.kind(), EvaluationErrorKind::TooComplex);
}

#[test]
fn sanitizer_classifies_the_canonical_payloads() {
    let policy = SanitizationPolicy::standard().expect("policy compiles");
    let cases = [
        ("SELECT * FROM users", ValidationErrorKind::SqlInjection),
        ("admin' --", ValidationErrorKind::SqlInjection),
        ("<script>alert(1)</script>", ValidationErrorKind::XssAttempt),
        ("<SCRIPT>alert(1)</SCRIPT>", ValidationErrorKind::XssAttempt),
        ("< script >alert(1)", ValidationErrorKind::XssAttempt),
        ("../../etc/passwd", ValidationErrorKind::PathTraversal),
        ("`reboot`", ValidationErrorKind::CommandInjection),
    ];
    for (payload, kind) in cases {
        let err = policy
            .sanitize_string(payload, 1000, StringOptions::default())
            .expect_err("payload should be rejected");
        assert_eq!(err.kind, kind, "{payload}");
        assert_eq!(err.status_code(), 400);
        assert!(!err.client_detail().contains(payload), "{payload} echoed");
    }
}

#[test]
fn log_lines_cannot_be_forged() {
    let forged = "user=ana\r\n2024-01-01 INFO admin login ok\u{1b}[2K";
    let cleaned = sanitize_log_message(forged, 500);
    assert!(!cleaned.chars().any(char::is_control));
    assert_eq!(cleaned, "user=ana2024-01-01 INFO admin login ok");
}
