//! End-to-end through the reqwest transport against a local mock server.

use std::net::TcpListener;
use std::sync::Arc;

use serde_json::{json, Value};
use sloth_client::{
    ApiError, AuthenticatedHttpClient, ClientConfig, CredentialPair, CredentialStore, ManualQuery,
    MemoryCredentialStore, OAuthProvider, Registration, SlothApi, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
use wiremock::matchers::{
    body_json, header, header_exists, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn api_for(uri: &str, store: Arc<MemoryCredentialStore>) -> SlothApi {
    let config = ClientConfig::new(uri).unwrap();
    SlothApi::connect(config, store).unwrap()
}

fn logged_in() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_credentials(&CredentialPair::new("A1", "R1")))
}

#[tokio::test]
async fn sends_bearer_and_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agent/prompt/"))
        .and(header("authorization", "Bearer A1"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prompt": "Be warm"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let prompt = api.agent().prompt().await.unwrap();
    assert_eq!(prompt["prompt"], "Be warm");
}

#[tokio::test]
async fn refreshes_once_for_concurrent_401s() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "token_not_valid"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"tokens": {"access": "A2"}}))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in();
    let api = api_for(&server.uri(), store.clone());
    let (agent, manuals, subscription) = (api.agent(), api.manuals(), api.subscription());
    let (a, b, c) = tokio::join!(agent.files(), manuals.categories(), subscription.usage());
    for result in [a, b, c] {
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("A2"));
}

#[tokio::test]
async fn rejected_refresh_clears_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in();
    let ended = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = ended.clone();
    let config = ClientConfig::new(&server.uri()).unwrap();
    let client = AuthenticatedHttpClient::builder(config, store.clone())
        .on_session_ended(move |event| sink.lock().unwrap().push(event.reason))
        .build()
        .unwrap();

    let err = client.get::<Value>("notifications/settings/").await.unwrap_err();
    assert!(err.is_session_invalid());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(ended.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_keep_status_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/subscriptions/activate-code/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid code"})))
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let err = api.subscription().activate_code("NOPE").await.unwrap_err();
    match err {
        ApiError::RequestRejected { status, payload } => {
            assert_eq!(status, 400);
            assert_eq!(payload, json!({"error": "Invalid code"}));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_is_network_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(&format!("http://{addr}")).unwrap().with_mock_mode(true);
    let api = SlothApi::connect(config, logged_in()).unwrap();

    let result = api.auth().profile().await;
    assert!(result.as_ref().unwrap_err().is_network_unavailable());

    let fallback = api.mock_fallback();
    let profile = fallback.resolve(result, || json!({"email": "demo@salon.com"})).unwrap();
    assert_eq!(profile["email"], "demo@salon.com");
}

#[tokio::test]
async fn uploads_are_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/agent/test/"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(header("authorization", "Bearer A1"))
        .respond_with(|req: &Request| {
            let body = String::from_utf8_lossy(&req.body);
            let has_photo =
                body.contains("name=\"photo\"") && body.contains("filename=\"nails.jpg\"");
            ResponseTemplate::new(200).set_body_json(json!({"has_photo": has_photo}))
        })
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let reply = api
        .agent()
        .test_chat("How much is a manicure?", Some(("nails.jpg", vec![0xff, 0xd8, 0xff])))
        .await
        .unwrap();
    assert_eq!(reply["has_photo"], true);
}

#[tokio::test]
async fn query_parameters_are_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/manuals/"))
        .and(query_param("category", "nails"))
        .and(query_param("language", "uk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let query = ManualQuery {
        category: Some("nails".into()),
        language: Some("uk".into()),
        search: None,
    };
    assert_eq!(api.manuals().list(&query).await.unwrap(), json!([]));
}

#[tokio::test]
async fn login_stores_issued_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({"email": "owner@salon.com", "password": "hunter22"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": "A1", "refresh": "R1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let api = api_for(&server.uri(), store.clone());
    assert!(!api.auth().is_authenticated().await.unwrap());

    api.auth().login("owner@salon.com", "hunter22").await.unwrap();
    assert!(api.auth().is_authenticated().await.unwrap());
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("R1"));
}

#[tokio::test]
async fn bad_login_does_not_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "No active account"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let err = api.auth().login("owner@salon.com", "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::AuthorizationExpired { .. }));
}

#[tokio::test]
async fn register_reads_nested_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "user": {"email": "owner@salon.com"},
            "tokens": {"access": "A9", "refresh": "R9"}
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let api = api_for(&server.uri(), store.clone());
    let data = api
        .auth()
        .register(&Registration::new("owner@salon.com", "hunter22").organization("Lazy Nails"))
        .await
        .unwrap();
    assert_eq!(data["user"]["email"], "owner@salon.com");
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("A9"));
}

#[tokio::test]
async fn logout_clears_tokens_even_if_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in();
    let api = api_for(&server.uri(), store.clone());
    api.auth().logout().await.unwrap();
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn notification_history_is_paged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/history/"))
        .and(query_param("limit", "20"))
        .and(query_param("offset", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let page = api.notifications().history(20, 40).await.unwrap();
    assert_eq!(page, json!({"results": []}));
}

#[tokio::test]
async fn oauth_callback_posts_the_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/integrations/google-reviews/auth/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"auth_url": "https://accounts.google.com/o/oauth2"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/integrations/calendar/callback/"))
        .and(body_json(json!({"code": "4/0Ab"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"connected": true})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let integrations = api.integrations();
    let url = integrations.auth_url(OAuthProvider::GoogleReviews).await.unwrap();
    assert!(url["auth_url"].as_str().unwrap().starts_with("https://"));
    let done = integrations.complete_oauth(OAuthProvider::Calendar, "4/0Ab").await.unwrap();
    assert_eq!(done["connected"], true);
}

#[tokio::test]
async fn channel_connects_send_their_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/integrations/whatsapp/connect/"))
        .and(body_json(json!({"phone_number_id": "1055", "access_token": "EAAG"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 4})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/integrations/email/connect/"))
        .and(body_json(json!({"provider": "gmail", "address": "salon@gmail.com"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/integrations/instagram/analytics/"))
        .and(query_param("period", "week"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reach": 120})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let integrations = api.integrations();
    assert_eq!(integrations.connect_whatsapp("1055", "EAAG").await.unwrap()["id"], 4);

    let credentials = json!({"address": "salon@gmail.com"});
    let email = integrations.connect_email("gmail", credentials.as_object().unwrap()).await;
    assert_eq!(email.unwrap()["id"], 5);

    assert_eq!(integrations.instagram_analytics("week").await.unwrap()["reach"], 120);
}

#[tokio::test]
async fn photo_provider_becomes_default_with_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/integrations/photo-recognition/configure/12/set-default/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"is_default": true})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let config = api.photo_recognition().set_default(12).await.unwrap();
    assert_eq!(config["is_default"], true);
}

#[tokio::test]
async fn booking_preferences_are_replaced() {
    let server = MockServer::start().await;
    let preferences = json!({"auto_confirm": false, "buffer_minutes": 15});
    Mock::given(method("PUT"))
        .and(path("/api/auth/booking-preferences/"))
        .and(body_json(preferences.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(preferences.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let saved = api.booking_preferences().update(&preferences).await.unwrap();
    assert_eq!(saved, preferences);
}

#[tokio::test]
async fn documents_are_paged_and_uploaded_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/documents/upload/"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .respond_with(|req: &Request| {
            let body = String::from_utf8_lossy(&req.body);
            let complete = body.contains("filename=\"prices.pdf\"")
                && body.contains("name=\"title\"")
                && body.contains("Price list");
            ResponseTemplate::new(201).set_body_json(json!({"complete": complete}))
        })
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let documents = api.documents();
    assert_eq!(documents.list(2).await.unwrap(), json!({"results": []}));

    let metadata = [("title", "Price list")];
    let uploaded = documents.upload("prices.pdf", b"%PDF".to_vec(), metadata).await.unwrap();
    assert_eq!(uploaded["complete"], true);
}

#[tokio::test]
async fn voice_messages_round_trip_through_speech_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/agent/stt/"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .respond_with(|req: &Request| {
            let body = String::from_utf8_lossy(&req.body);
            let has_audio = body.contains("name=\"audio\"") && body.contains("voice.m4a");
            ResponseTemplate::new(200).set_body_json(json!({"has_audio": has_audio}))
        })
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agent/tts/"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"text": "Welcome", "language": "uk", "voice_id": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audio_url": "/m/1.mp3"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server.uri(), logged_in());
    let agent = api.agent();
    let heard = agent.speech_to_text("voice.m4a", vec![0, 0, 0, 0x20]).await.unwrap();
    assert_eq!(heard["has_audio"], true);
    let spoken = agent.text_to_speech("Welcome", "uk", None).await.unwrap();
    assert_eq!(spoken["audio_url"], "/m/1.mp3");
}
