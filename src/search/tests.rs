use super::*;
use serial_test::serial;

#[test]
fn search_url_uses_base() {
    let client = TavilyClient::new("key").with_base_url("http://localhost:9999/");
    assert_eq!(client.search_url(), "http://localhost:9999/search");
    assert_eq!(TavilyClient::new("key").search_url(), "https://api.tavily.com/search");
}

#[test]
fn request_body_shape() {
    let request = SearchRequest {
        query: "reset router",
        max_results: 2,
        search_depth: "basic",
    };
    let json = serde_json::to_value(&request).expect("request should serialize");
    assert_eq!(json["query"], "reset router");
    assert_eq!(json["max_results"], 2);
}

#[test]
fn response_tolerates_missing_fields() {
    let body = r#"{
        "query": "q",
        "results": [
            {"title": "Router guide", "url": "https://example.com/router", "content": "Unplug it.", "score": 0.9},
            {"url": "https://example.com/bare"}
        ]
    }"#;
    let response: SearchResponse = serde_json::from_str(body).expect("should parse");
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[1].title, "");

    let empty: SearchResponse = serde_json::from_str("{}").expect("should parse");
    assert!(empty.results.is_empty());
}

#[test]
fn zero_results_is_rejected() {
    let result = TavilyClient::new("key").search("anything", 0);
    assert!(matches!(result, Err(AssistError::Config(_))));
}

#[test]
#[serial]
fn from_config_respects_switch_and_key() {
    let mut config = Config::default();
    config.search.api_key_env = "SUPPORT_ASSIST_TEST_TAVILY".to_string();

    // SAFETY: serialized with every other test that touches the environment
    unsafe { std::env::remove_var("SUPPORT_ASSIST_TEST_TAVILY") };
    assert!(TavilyClient::from_config(&config).is_none());

    unsafe { std::env::set_var("SUPPORT_ASSIST_TEST_TAVILY", "tvly-key") };
    assert!(TavilyClient::from_config(&config).is_some());

    config.search.enabled = false;
    assert!(TavilyClient::from_config(&config).is_none());
    unsafe { std::env::remove_var("SUPPORT_ASSIST_TEST_TAVILY") };
}
