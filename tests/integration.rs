use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gemini_watermark_eraser::{
    Config, Error, ImageEditor, ProcessingClient, RequestState, Session, REMOVAL_INSTRUCTION,
};

const MODEL: &str = "test-image-model";
const ENDPOINT: &str = "/models/test-image-model:generateContent";

fn client_for(server: &MockServer) -> ProcessingClient {
    let config = Config::new("test-key")
        .with_base_url(server.uri())
        .with_model(MODEL);
    ProcessingClient::new(Arc::new(config)).expect("client")
}

fn image_response(bytes: &[u8]) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"inlineData": {"mimeType": "image/png", "data": general_purpose::STANDARD.encode(bytes)}}]
            },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn sends_image_instruction_and_modality() {
    let server = MockServer::start().await;
    let payload = general_purpose::STANDARD.encode(b"jpeg-bytes");

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": "image/jpeg", "data": payload}},
                    {"text": REMOVAL_INSTRUCTION}
                ]
            }],
            "generationConfig": {"responseModalities": ["IMAGE"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(b"X")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .remove_watermark(&payload, "image/jpeg")
        .await
        .expect("processed image");
    assert_eq!(result, general_purpose::STANDARD.encode(b"X"));
}

#[tokio::test]
async fn first_image_part_wins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is the cleaned image."},
                {"inlineData": {"mimeType": "image/png", "data": "Zmlyc3Q="}},
                {"inlineData": {"mimeType": "image/png", "data": "c2Vjb25k"}}
            ]}}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.remove_watermark("QUJD", "image/png").await.unwrap();
    assert_eq!(result, "Zmlyc3Q=");
}

#[tokio::test]
async fn text_only_response_is_no_image_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't do that."}]}}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.remove_watermark("QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::NoImageReturned));
}

#[tokio::test]
async fn empty_candidates_is_no_image_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.remove_watermark("QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::NoImageReturned));
}

#[tokio::test]
async fn service_error_is_processing_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.remove_watermark("QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::ProcessingFailed));
    // The cause stays in the logs.
    assert!(!err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn malformed_body_is_processing_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.remove_watermark("QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::ProcessingFailed));
}

#[tokio::test]
async fn unreachable_server_is_processing_failed() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let err = client.remove_watermark("QUJD", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::ProcessingFailed));
}

#[tokio::test]
async fn session_end_to_end_writes_artifact() {
    let server = MockServer::start().await;

    let mut result_png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
        .write_to(&mut result_png, image::ImageFormat::Png)
        .unwrap();
    let result_png = result_png.into_inner();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(&result_png)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.jpg");
    std::fs::write(&input, b"\xFF\xD8\xFF\xE0 not really a jpeg").unwrap();

    let client = client_for(&server);
    let mut session = Session::new();
    session.upload(&input).await.unwrap();
    session.process(&client).await.unwrap();
    assert_eq!(session.state(), RequestState::Succeeded);

    let out_dir = dir.path().join("out");
    let saved = session.download(&out_dir).await.unwrap();
    assert_eq!(saved, out_dir.join("watermark_removed_photo.jpg.png"));
    assert_eq!(std::fs::read(saved).unwrap(), result_png);
}

#[tokio::test]
async fn non_image_upload_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(b"X")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.pdf");
    std::fs::write(&input, b"%PDF-1.4").unwrap();

    let client = client_for(&server);
    let mut session = Session::new();
    let err = session.upload(&input).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
    assert_eq!(session.state(), RequestState::Idle);

    assert!(matches!(
        session.process(&client).await,
        Err(Error::NoImageSelected)
    ));
    assert!(session.result().is_none());
}

#[tokio::test]
async fn zero_image_parts_leaves_session_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": []}}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = Session::new();
    session
        .upload_bytes("photo.png", b"\x89PNG\r\n\x1a\n".to_vec(), "image/png")
        .unwrap();

    let err = session.process(&client).await.unwrap_err();
    assert!(matches!(err, Error::NoImageReturned));
    assert_eq!(session.state(), RequestState::Failed);
    assert!(session.result().is_none());
}
