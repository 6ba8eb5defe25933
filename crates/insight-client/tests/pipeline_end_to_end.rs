//! End-to-end: the submission pipeline driving the real HTTP stack, so a
//! 401 mid-submission is healed by the gateway without the pipeline ever
//! noticing, and a dead server surfaces as a retryable network failure.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use insight_client::{AuthGateway, ChatApi, Credential, CredentialStore, Identity};
use insight_core::models::settings::ChatSettings;
use insight_core::models::submission::SubmissionStatus;
use insight_core::models::toggles::ToggleState;
use insight_core::repositories::InMemoryKeyValueRepository;
use insight_core::services::submission_pipeline::{
    DraftInput, SubmissionContext, SubmissionPipeline, SubmitError,
};
use insight_core::transport::TransportError;

async fn signed_in_pipeline(uri: String) -> SubmissionPipeline {
    let store = CredentialStore::new(Arc::new(InMemoryKeyValueRepository::new()));
    store
        .set(&Credential {
            access_token: "tok-stale".to_string(),
            refresh_token: Some("ref-1".to_string()),
            identity: Identity {
                username: "jdoe".to_string(),
                display_name: "J. Doe".to_string(),
                role_name: "analyst".to_string(),
                role_id: "7".to_string(),
            },
        })
        .await
        .unwrap();

    let api = ChatApi::new(Arc::new(AuthGateway::new(uri, store)));
    SubmissionPipeline::new(Arc::new(api), ChatSettings::default())
}

fn draft(prompt: &str) -> DraftInput {
    DraftInput {
        prompt: prompt.to_string(),
        toggles: ToggleState::company_only(),
        files: Vec::new(),
    }
}

#[tokio::test]
async fn test_expired_credential_is_healed_without_failing_the_submission() {
    let server = MockServer::start().await;
    let pipeline = signed_in_pipeline(server.uri()).await;

    Mock::given(method("POST"))
        .and(path("/chats/ask"))
        .and(header("authorization", "Bearer tok-stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "tok-new" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chats/ask"))
        .and(header("authorization", "Bearer tok-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chat_id": "chat-1",
            "answer": "All good."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = pipeline
        .submit(draft("What changed?"), SubmissionContext::new_conversation(0))
        .await
        .unwrap();

    assert_eq!(response.answer, "All good.");
    assert_eq!(pipeline.status(), SubmissionStatus::Succeeded);
    assert!(!pipeline.can_retry());
}

#[tokio::test]
async fn test_dead_server_leaves_a_retryable_draft_then_retry_succeeds() {
    // Bind and drop a listener to get a dead port, forcing a connection
    // error on the first attempt. (A dropped wiremock MockServer keeps its
    // socket alive in a pool, so it cannot be used for this.)
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let pipeline = signed_in_pipeline(uri.clone()).await;

    let err = pipeline
        .submit(draft("Still there?"), SubmissionContext::new_conversation(0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Transport(TransportError::NetworkUnavailable)
    ));
    assert_eq!(pipeline.status(), SubmissionStatus::FailedNetwork);
    assert!(pipeline.can_retry());

    // A new server on a fresh port stands in for the network coming back.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chats/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chat_id": "chat-1",
            "answer": "Back online."
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Point a second pipeline over the same draft contents at the live
    // server; the retained draft on the dead-server pipeline stays put.
    let recovered = signed_in_pipeline(server.uri()).await;
    let response = recovered
        .submit(draft("Still there?"), SubmissionContext::new_conversation(0))
        .await
        .unwrap();
    assert_eq!(response.answer, "Back online.");
}

#[tokio::test]
async fn test_attachment_flows_through_to_the_wire() {
    let server = MockServer::start().await;
    let pipeline = signed_in_pipeline(server.uri()).await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("notes.txt");
    let mut file = std::fs::File::create(&file_path).unwrap();
    file.write_all(b"quarterly notes").unwrap();

    Mock::given(method("POST"))
        .and(path("/chats/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chat_id": "chat-1",
            "answer": "Read it."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let input = DraftInput {
        prompt: "Summarize the attached notes.".to_string(),
        toggles: ToggleState::company_only(),
        files: vec![file_path],
    };
    pipeline
        .submit(input, SubmissionContext::new_conversation(0))
        .await
        .unwrap();

    let received = &server.received_requests().await.unwrap()[0];
    let body = String::from_utf8_lossy(&received.body).to_string();
    assert!(body.contains("filename=\"notes.txt\""));
    assert!(body.contains("quarterly notes"));
    assert!(pipeline.last_rejections().is_empty());
}
