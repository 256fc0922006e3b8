use super::*;

#[test]
fn deserializes_record_with_and_without_id() {
    let with_id: NativeRasterInput =
        serde_json::from_str(r#"{"width":2,"height":3,"data_b64":"abc=","id":"f0"}"#).unwrap();
    assert_eq!(with_id.width, 2);
    assert_eq!(with_id.height, 3);
    assert_eq!(with_id.id.as_deref(), Some("f0"));
    assert_eq!(with_id.label(), "f0");

    let without: NativeRasterInput =
        serde_json::from_str(r#"{"width":1,"height":1,"data_b64":""}"#).unwrap();
    assert_eq!(without.id, None);
    assert_eq!(without.label(), "<anonymous>");
    assert!(!serde_json::to_string(&without).unwrap().contains("\"id\""));
}

#[test]
fn validate_rejects_zero_dimensions() {
    let mut input = NativeRasterInput {
        width: 0,
        height: 4,
        data_b64: String::new(),
        id: None,
    };
    assert!(input.validate().is_err());
    input.width = 4;
    input.validate().unwrap();
    assert_eq!(input.pixel_count().unwrap(), 16);
    assert_eq!(input.byte_len().unwrap(), 64);
}
