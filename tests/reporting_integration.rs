use partfuzz::models::{FuzzRequest, Method, PartKind};
use partfuzz::sink::GeneratedRequest;
use partfuzz::values::Scope;
use std::fs;

fn generated(url: &str, key: &str, value: &str) -> GeneratedRequest {
    GeneratedRequest {
        request: FuzzRequest::new(Method::GET, url),
        interact_urls: vec![],
        dynamic_values: Scope::new(),
        component: PartKind::Query,
        key: Some(key.to_string()),
        value: Some(value.to_string()),
        analyzer_input: None,
    }
}

#[test]
fn reporting_exports_create_files() {
    let requests = vec![generated("http://api.test/?id=1%27", "id", "1'")];

    // Use the library functions - they return filenames with timestamps
    let csv_filename = partfuzz::reporting::export_csv(&requests)
        .expect("CSV export should succeed");
    let jsonl_filename = partfuzz::reporting::export_jsonl(&requests)
        .expect("JSONL export should succeed");

    assert!(fs::metadata(&csv_filename).is_ok(), "CSV file should exist: {}", csv_filename);
    assert!(fs::metadata(&jsonl_filename).is_ok(), "JSONL file should exist: {}", jsonl_filename);

    assert!(csv_filename.starts_with("partfuzz_requests_"));
    assert!(csv_filename.ends_with(".csv"));
    assert!(jsonl_filename.starts_with("partfuzz_requests_"));
    assert!(jsonl_filename.ends_with(".jsonl"));

    // Each JSONL line is a standalone JSON document
    let content = fs::read_to_string(&jsonl_filename).expect("Should be able to read JSONL file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("valid JSON line");
    assert_eq!(parsed["component"], "query");
    assert_eq!(parsed["key"], "id");
    assert_eq!(parsed["request"]["method"], "GET");

    let _ = fs::remove_file(&csv_filename);
    let _ = fs::remove_file(&jsonl_filename);
}
