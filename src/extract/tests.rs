use super::*;

fn dispatcher() -> ExtractorDispatcher {
    ExtractorDispatcher::new()
}

#[test]
fn handler_priority_order() {
    assert_eq!(
        dispatcher().handler_names(),
        vec!["json", "yaml", "pdf", "html", "plaintext"]
    );
}

#[test]
fn plaintext_decodes_lossily() {
    let doc = dispatcher()
        .extract("notes.txt", Some("text/plain"), b"caf\xe9 time")
        .expect("plaintext extraction should succeed");

    assert_eq!(doc.meta.source_type, SourceType::Plaintext);
    assert_eq!(doc.text, "caf\u{FFFD} time");
    assert_eq!(doc.meta.source_name.as_deref(), Some("notes.txt"));
}

#[test]
fn markdown_by_extension() {
    let doc = dispatcher()
        .extract("README.md", None, b"# Title\n\nBody")
        .expect("markdown extraction should succeed");

    assert_eq!(doc.meta.source_type, SourceType::Plaintext);
    assert_eq!(doc.text, "# Title\n\nBody");
}

#[test]
fn html_strips_non_content_and_captures_title() {
    let html = br#"<html>
        <head><title> The Lighthouse </title><style>body { color: red; }</style></head>
        <body>
            <script>var hidden = true;</script>
            <noscript>Enable JavaScript</noscript>
            <h1>Keeper's Log</h1>
            <p>The lamp was lit at dusk.</p>
        </body>
    </html>"#;

    let doc = dispatcher()
        .extract("log.html", Some("text/html; charset=utf-8"), html)
        .expect("html extraction should succeed");

    assert_eq!(doc.meta.source_type, SourceType::Html);
    assert_eq!(doc.meta.title.as_deref(), Some("The Lighthouse"));
    assert_eq!(doc.meta.source_name.as_deref(), Some("The Lighthouse"));
    assert!(doc.text.contains("Keeper's Log"));
    assert!(doc.text.contains("The lamp was lit at dusk."));
    assert!(!doc.text.contains("hidden"));
    assert!(!doc.text.contains("color: red"));
    assert!(!doc.text.contains("Enable JavaScript"));
    assert!(doc.text.lines().all(|line| line == line.trim() && !line.is_empty()));
}

#[test]
fn html_is_preferred_over_plaintext_for_text_html() {
    let doc = dispatcher()
        .extract("page", Some("text/html"), b"<p>hello</p>")
        .expect("html extraction should succeed");
    assert_eq!(doc.meta.source_type, SourceType::Html);
    assert_eq!(doc.text, "hello");
}

#[test]
fn json_is_canonicalized() {
    let first = dispatcher()
        .extract("a.json", Some("application/json"), br#"{"b": 1, "a": [true, null]}"#)
        .expect("json extraction should succeed");
    let second = dispatcher()
        .extract("b.json", None, b"{\n  \"a\":[true,null],\"b\":1}")
        .expect("json extraction should succeed");

    assert_eq!(first.meta.source_type, SourceType::Json);
    assert_eq!(first.text, second.text);
    assert!(first.text.starts_with("{\n  \"a\""));
}

#[test]
fn malformed_json_is_an_error_not_a_fallback() {
    let result = dispatcher().extract("broken.json", Some("application/json"), b"{not json");

    match result {
        Err(ExtractionError::Malformed { format, .. }) => assert_eq!(format, "json"),
        other => panic!("expected malformed json error, got {:?}", other),
    }
}

#[test]
fn yaml_is_reserialized() {
    let doc = dispatcher()
        .extract("world.yml", None, b"name:   Avalon\nregions: [north, south]\n")
        .expect("yaml extraction should succeed");

    assert_eq!(doc.meta.source_type, SourceType::Yaml);
    assert!(doc.text.contains("name: Avalon"));
    assert!(doc.text.contains("- north"));
}

#[test]
fn yaml_key_order_does_not_change_text() {
    let first = dispatcher()
        .extract("a.yaml", None, b"b: 1\na:\n  z: [x, y]\n  m: true\n")
        .expect("yaml extraction should succeed");
    let second = dispatcher()
        .extract("b.yaml", None, b"a:\n  m: true\n  z: [x, y]\nb: 1\n")
        .expect("yaml extraction should succeed");

    assert_eq!(first.text, second.text);
    assert!(first.text.starts_with("a:\n  m: true\n  z:"));
    assert!(first.text.ends_with("b: 1\n"));
}

#[test]
fn yaml_content_type_beats_plaintext() {
    let doc = dispatcher()
        .extract("world", Some("text/yaml"), b"a: 1\n")
        .expect("yaml extraction should succeed");
    assert_eq!(doc.meta.source_type, SourceType::Yaml);
}

#[test]
fn malformed_pdf_is_an_error() {
    let result = dispatcher().extract("scan.pdf", Some("application/pdf"), b"not a pdf at all");
    assert!(matches!(
        result,
        Err(ExtractionError::Malformed { format: "pdf", .. })
    ));
}

#[test]
fn unknown_binary_falls_back_to_latin1() {
    let doc = dispatcher()
        .extract("blob.bin", Some("application/octet-stream"), &[0x68, 0x69, 0xff])
        .expect("fallback should never fail");

    assert_eq!(doc.meta.source_type, SourceType::FallbackText);
    assert_eq!(doc.meta.encoding.as_deref(), Some("latin-1"));
    assert_eq!(doc.text, "hi\u{ff}");
}

#[test]
fn unknown_utf8_falls_back_to_utf8() {
    let doc = dispatcher()
        .extract("data.custom", None, "naïve".as_bytes())
        .expect("fallback should never fail");

    assert_eq!(doc.meta.source_type, SourceType::FallbackText);
    assert_eq!(doc.meta.encoding.as_deref(), Some("utf-8"));
    assert_eq!(doc.text, "naïve");
}

#[test]
fn content_type_normalization() {
    assert_eq!(
        normalize_content_type("Text/HTML; charset=UTF-8").as_deref(),
        Some("text/html")
    );
    assert_eq!(normalize_content_type("  "), None);
}

#[test]
fn meta_flattens_to_payload_map() {
    let mut meta = ExtractionMeta::new(SourceType::Pdf, "atlas.pdf");
    meta.page_count = Some(3);

    let map = meta.to_map();
    assert_eq!(map.get("source_type"), Some(&serde_json::json!("pdf")));
    assert_eq!(map.get("source_name"), Some(&serde_json::json!("atlas.pdf")));
    assert_eq!(map.get("page_count"), Some(&serde_json::json!(3)));
    assert!(!map.contains_key("title"));
}
