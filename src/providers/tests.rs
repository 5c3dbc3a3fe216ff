use super::*;

#[test]
fn roles_serialize_lowercase() {
    let message = ChatMessage::assistant("ok");
    let json = serde_json::to_value(&message).expect("message should serialize");
    assert_eq!(json["role"], "assistant");
    assert_eq!(Role::System.to_string(), "system");

    let parsed: ChatMessage =
        serde_json::from_str(r#"{"role": "user", "content": "hi"}"#).expect("should parse");
    assert_eq!(parsed, ChatMessage::user("hi"));
}

#[test]
fn chat_model_follows_provider() {
    let mut config = Config::default();
    config.llm.provider = LlmProvider::Ollama;
    assert!(chat_model_from_config(&config).is_ok());

    config.llm.provider = LlmProvider::OpenAi;
    config.llm.api_key_env = "SUPPORT_ASSIST_TEST_UNSET_PROVIDER_KEY".to_string();
    assert!(matches!(
        chat_model_from_config(&config),
        Err(crate::AssistError::Config(_))
    ));
}

#[test]
fn retry_gives_up_after_attempts() {
    let mut calls = 0;
    let result = send_with_retry("http://test", 1, || {
        calls += 1;
        Err(ureq::Error::ConnectionFailed)
    });
    assert!(result.is_err());
    assert_eq!(calls, 1);
}

#[test]
fn client_errors_stop_immediately() {
    let mut calls = 0;
    let result = send_with_retry("http://test", 3, || {
        calls += 1;
        Err(ureq::Error::StatusCode(404))
    });
    assert!(result.is_err());
    assert_eq!(calls, 1);
}

#[test]
fn success_returns_body() {
    let result = send_with_retry("http://test", 2, || Ok("body".to_string()));
    assert_eq!(result.expect("should succeed"), "body");
}
