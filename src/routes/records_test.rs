use uuid::Uuid;

use super::*;
use crate::form::FormError;

#[test]
fn parse_kind_accepts_known_kinds() {
    assert_eq!(parse_kind("crusher_production").unwrap(), RecordKind::CrusherProduction);
}

#[test]
fn parse_kind_unknown_is_not_found() {
    let api = parse_kind("boulders").unwrap_err();
    assert_eq!(api.status, StatusCode::NOT_FOUND);
    assert_eq!(api.body.code, "E_UNKNOWN_KIND");
}

#[test]
fn forbidden_maps_to_403() {
    let api = record_error_to_api(RecordError::Forbidden(RecordKind::Account));
    assert_eq!(api.status, StatusCode::FORBIDDEN);
    assert_eq!(api.body.code, "E_FORBIDDEN");
}

#[test]
fn not_reviewer_maps_to_403() {
    let api = record_error_to_api(RecordError::NotReviewer);
    assert_eq!(api.status, StatusCode::FORBIDDEN);
}

#[test]
fn not_found_maps_to_404() {
    let api = record_error_to_api(RecordError::NotFound(Uuid::nil()));
    assert_eq!(api.status, StatusCode::NOT_FOUND);
    assert_eq!(api.body.code, "E_RECORD_NOT_FOUND");
}

#[test]
fn already_reviewed_maps_to_409() {
    let api = record_error_to_api(RecordError::AlreadyReviewed(Uuid::nil()));
    assert_eq!(api.status, StatusCode::CONFLICT);
    assert_eq!(api.body.code, "E_ALREADY_REVIEWED");
}

#[test]
fn required_field_names_the_field() {
    let api = record_error_to_api(RecordError::Form(FormError::Required("holes")));
    assert_eq!(api.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.body.code, "E_REQUIRED_FIELD");
    assert_eq!(api.body.field.as_deref(), Some("holes"));
}

#[test]
fn rule_violation_has_no_field() {
    let api = record_error_to_api(RecordError::Form(FormError::Rule("closing reading is below opening".into())));
    assert_eq!(api.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.body.code, "E_RULE_VIOLATION");
    assert!(api.body.field.is_none());
}

#[test]
fn missing_reference_names_the_field() {
    let api = record_error_to_api(RecordError::MissingReference { field: "customer_id", id: Uuid::nil() });
    assert_eq!(api.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.body.field.as_deref(), Some("customer_id"));
}

#[test]
fn bad_filter_is_bad_request() {
    let api = filter_from(&ListQuery { status: Some("archived".into()), ..ListQuery::default() }).unwrap_err();
    assert_eq!(api.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.body.code, "E_BAD_FILTER");
}

#[test]
fn database_errors_hide_details() {
    let api = record_error_to_api(RecordError::Database(sqlx::Error::PoolTimedOut));
    assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(api.body.code, "E_DATABASE");
    assert_eq!(api.body.message, "database error");
}
