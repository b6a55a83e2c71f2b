//! Model gateway integration tests against a local stub of the provider API

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tutor::config::TutorConfigFile;
use tutor::session::{ConversationContext, Role, Turn};
use tutor::{Config, Error, ModelGateway, OpenAiGateway};

#[derive(Default)]
struct Captured {
    json: Vec<(String, Value)>,
    multipart: Vec<(String, Vec<u8>)>,
    auth: Vec<String>,
}

type Shared = Arc<Mutex<Captured>>;

fn record_auth(state: &Shared, headers: &HeaderMap) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.lock().unwrap().auth.push(auth);
}

async fn chat(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record_auth(&state, &headers);
    let is_vision = body["max_tokens"].is_number();
    state
        .lock()
        .unwrap()
        .json
        .push(("/chat/completions".to_string(), body));

    let content = if is_vision {
        "An image containing the equation x^2+5x+6=0"
    } else {
        "Can you factor the left-hand side?"
    };
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    }))
}

async fn transcriptions(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    record_auth(&state, &headers);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state
        .lock()
        .unwrap()
        .multipart
        .push((content_type, body.to_vec()));
    Json(json!({ "text": "I don't know where to start" }))
}

async fn speech(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    record_auth(&state, &headers);
    state
        .lock()
        .unwrap()
        .json
        .push(("/audio/speech".to_string(), body));
    ([(header::CONTENT_TYPE, "audio/mpeg")], b"ID3fake".to_vec())
}

async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn working_provider() -> (String, Shared) {
    let state = Shared::default();
    let router = Router::new()
        .route("/chat/completions", post(chat))
        .route("/audio/transcriptions", post(transcriptions))
        .route("/audio/speech", post(speech))
        .with_state(state.clone());
    (spawn_stub(router).await, state)
}

fn gateway_for(base_url: &str) -> OpenAiGateway {
    let base_url = base_url.to_string();
    let config = Config::from_sources(
        move |key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_BASE_URL" => Some(base_url.clone()),
            _ => None,
        },
        TutorConfigFile::default(),
    )
    .unwrap();
    OpenAiGateway::new(&config)
}

#[tokio::test]
async fn analyze_image_sends_prompt_data_uri_and_budget() {
    let (base, state) = working_provider().await;
    let gateway = gateway_for(&base);

    let uri = tutor::gateway::image_data_uri("png", b"abc");
    let text = gateway
        .analyze_image(&uri, "What's in this image?", 300)
        .await
        .unwrap();
    assert_eq!(text, "An image containing the equation x^2+5x+6=0");

    let captured = state.lock().unwrap();
    let (_, body) = &captured.json[0];
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 300);
    let content = &body["messages"][0]["content"];
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(content[0]["type"], "text");
    assert_eq!(content[0]["text"], "What's in this image?");
    assert_eq!(content[1]["type"], "image_url");
    assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,YWJj");
    assert_eq!(captured.auth[0], "Bearer sk-test");
}

#[tokio::test]
async fn complete_sends_full_history_with_roles() {
    let (base, state) = working_provider().await;
    let gateway = gateway_for(&base);

    let mut context = ConversationContext::seeded("an equation", "Be a tutor.", "Hello!");
    context.push_user("I don't know where to start").unwrap();

    let reply = gateway.complete(context.turns()).await.unwrap();
    assert_eq!(reply, "Can you factor the left-hand side?");

    let captured = state.lock().unwrap();
    let (_, body) = &captured.json[0];
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hello!");
    assert_eq!(messages[2]["role"], "user");
    assert!(body.get("max_tokens").is_none());
}

#[tokio::test]
async fn transcribe_uploads_wav_as_multipart() {
    let (base, state) = working_provider().await;
    let gateway = gateway_for(&base);

    let text = gateway.transcribe(b"RIFFfakewav").await.unwrap();
    assert_eq!(text, "I don't know where to start");

    let captured = state.lock().unwrap();
    let (content_type, body) = &captured.multipart[0];
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(body);
    assert!(body.contains("filename=\"recording.wav\""));
    assert!(body.contains("whisper-1"));
    assert!(body.contains("RIFFfakewav"));
}

#[tokio::test]
async fn synthesize_returns_audio_bytes() {
    let (base, state) = working_provider().await;
    let gateway = gateway_for(&base);

    let audio = gateway.synthesize_speech("Try factoring.", "nova").await.unwrap();
    assert_eq!(audio, b"ID3fake");

    let captured = state.lock().unwrap();
    let (path, body) = &captured.json[0];
    assert_eq!(path, "/audio/speech");
    assert_eq!(body["model"], "tts-1");
    assert_eq!(body["voice"], "nova");
    assert_eq!(body["input"], "Try factoring.");
}

async fn failing_provider(status: StatusCode, body: &'static str) -> String {
    let handler = move || async move { (status, body) };
    let router = Router::new()
        .route("/chat/completions", post(handler))
        .route("/audio/transcriptions", post(handler))
        .route("/audio/speech", post(handler));
    spawn_stub(router).await
}

#[tokio::test]
async fn provider_errors_carry_status_and_body() {
    let base = failing_provider(StatusCode::TOO_MANY_REQUESTS, "rate limited").await;
    let gateway = gateway_for(&base);

    let err = gateway.transcribe(b"RIFF").await.unwrap_err();
    assert!(matches!(err, Error::Stt(_)));
    assert!(err.to_string().contains("429"));
    assert!(err.to_string().contains("rate limited"));

    let turns = [Turn::new(Role::User, "hi")];
    let err = gateway.complete(&turns).await.unwrap_err();
    assert!(matches!(err, Error::Chat(_)));

    let err = gateway.synthesize_speech("hi", "nova").await.unwrap_err();
    assert!(matches!(err, Error::Tts(_)));

    let err = gateway
        .analyze_image("data:image/png;base64,YWJj", "What's in this image?", 300)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Vision(_)));
}

#[tokio::test]
async fn empty_choice_list_is_an_error() {
    let router = Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );
    let base = spawn_stub(router).await;
    let gateway = gateway_for(&base);

    let turns = [Turn::new(Role::User, "hi")];
    let err = gateway.complete(&turns).await.unwrap_err();
    assert!(err.to_string().contains("empty response"));
}

async fn unreachable_provider() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn transport_failures_map_to_the_failing_service() {
    let gateway = gateway_for(&unreachable_provider().await);

    let err = gateway.transcribe(b"RIFF").await.unwrap_err();
    assert!(matches!(err, Error::Stt(_)), "got {err:?}");
    assert!(err.to_string().contains("request failed"));

    let err = gateway
        .analyze_image("data:image/png;base64,YWJj", "What's in this image?", 300)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Vision(_)), "got {err:?}");
}

#[tokio::test]
async fn malformed_transcription_body_is_a_transcription_error() {
    let router = Router::new().route(
        "/audio/transcriptions",
        post(|| async { Json(json!({ "transcript": "wrong field" })) }),
    );
    let gateway = gateway_for(&spawn_stub(router).await);

    let err = gateway.transcribe(b"RIFF").await.unwrap_err();
    assert!(matches!(err, Error::Stt(_)), "got {err:?}");
    assert!(err.to_string().contains("parse error"));
}

#[tokio::test]
async fn empty_analysis_passes_through() {
    let router = Router::new().route(
        "/chat/completions",
        post(|| async {
            Json(json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "" } }]
            }))
        }),
    );
    let gateway = gateway_for(&spawn_stub(router).await);

    let analysis = gateway
        .analyze_image("data:image/png;base64,YWJj", "What's in this image?", 300)
        .await
        .unwrap();
    assert_eq!(analysis, "");
}
