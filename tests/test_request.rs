use tether::http::request::{Method, Request, RequestBuilder};

fn get(path: &str) -> RequestBuilder {
    RequestBuilder::new().method(Method::GET).path(path)
}

#[test]
fn test_request_header_retrieval() {
    let req = get("/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .header("Content-Length", "42")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing_or_invalid() {
    let missing = get("/").build().unwrap();
    assert_eq!(missing.content_length(), 0);

    let invalid = get("/")
        .header("Content-Length", "not-a-number")
        .build()
        .unwrap();
    assert_eq!(invalid.content_length(), 0);
}

#[test]
fn test_request_keep_alive_http11_default() {
    let req = get("/").build().unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_request_keep_alive_close() {
    let req = get("/").header("Connection", "close").build().unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_http10() {
    let plain = get("/").version("HTTP/1.0").build().unwrap();
    assert!(!plain.keep_alive());

    let explicit = get("/")
        .version("HTTP/1.0")
        .header("Connection", "Keep-Alive")
        .build()
        .unwrap();
    assert!(explicit.keep_alive());
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(Method::from_str("INVALID"), None);
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}

#[test]
fn test_request_path_and_query() {
    let req = get("/name?value=Ada%20Lovelace&x=1").build().unwrap();

    assert_eq!(req.path_only(), "/name");
    assert_eq!(req.query_param("value").as_deref(), Some("Ada Lovelace"));
    assert_eq!(req.query_param("x").as_deref(), Some("1"));
    assert_eq!(req.query_param("missing"), None);

    let bare = get("/name").build().unwrap();
    assert_eq!(bare.path_only(), "/name");
    assert_eq!(bare.query_param("value"), None);
}

#[test]
fn test_request_cookies_across_headers() {
    let req: Request = get("/")
        .header("Cookie", "a=1; b=\"two\"")
        .header("Cookie", "c=3; junk")
        .build()
        .unwrap();

    assert_eq!(
        req.cookies(),
        vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "two".to_string()),
            ("c".to_string(), "3".to_string()),
        ]
    );
}

#[test]
fn test_request_with_body() {
    let body_content = b"test body content".to_vec();
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .body(body_content.clone())
        .build()
        .unwrap();

    assert_eq!(req.body, body_content);
    assert_eq!(req.version, "HTTP/1.1");
}
