#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    clippy::cast_precision_loss,
    clippy::clone_on_ref_ptr,
    clippy::match_same_arms,
    clippy::items_after_statements,
    unreachable_pub,
    clippy::print_stdout,
    clippy::similar_names
)]
mod common;

use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_profile_form_validation() {
    let app = TestApp::spawn().await;
    let user = app.sign_in("m_arjun", "Arjun Rao").await;

    let resp = app
        .client
        .put(app.url("/profile"))
        .bearer_auth(&user.token)
        .json(&json!({ "name": "Arjun", "age": 16 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .put(app.url("/profile"))
        .bearer_auth(&user.token)
        .json(&json!({ "name": "Arjun", "bio": "x".repeat(501) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_partial_form_keeps_profile_incomplete() {
    let app = TestApp::spawn().await;
    let user = app.sign_in("m_arjun", "Arjun Rao").await;

    let resp = app
        .client
        .put(app.url("/profile"))
        .bearer_auth(&user.token)
        .json(&json!({ "name": "Arjun Rao", "age": 21, "university": "bitjpr", "gender": "Male", "interestedIn": "Women" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["profileComplete"], false);
}

#[tokio::test]
async fn test_photo_upload_completes_profile() {
    let app = TestApp::spawn().await;
    let user = app.sign_in("m_arjun", "Arjun Rao").await;
    app.client
        .put(app.url("/profile"))
        .bearer_auth(&user.token)
        .json(&json!({ "name": "Arjun Rao", "age": 21, "university": "bitjpr", "gender": "Male", "interestedIn": "Women" }))
        .send()
        .await
        .unwrap();

    let resp = app
        .client
        .post(app.url("/profile/photos?file_name=me.jpg"))
        .bearer_auth(&user.token)
        .header("content-type", "image/jpeg")
        .body(vec![0xFF, 0xD8, 0xFF, 0xE0])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["url"], "https://cdn.campus.example/users/m_arjun/me.jpg");

    let stored = app.storage.get("users/m_arjun/me.jpg").expect("object missing");
    assert_eq!(stored.content_type, "image/jpeg");
    assert_eq!(stored.body.len(), 4);

    let (status, profile) = app.get_json(&user, "/profile").await;
    assert_eq!(status, 200);
    assert_eq!(profile["photos"], json!(["https://cdn.campus.example/users/m_arjun/me.jpg"]));
    assert_eq!(profile["profileComplete"], true);
}

#[tokio::test]
async fn test_photo_upload_rejections() {
    let mut config = common::get_test_config();
    config.storage.max_photo_bytes = 8;
    let app = TestApp::spawn_with_config(config).await;
    let user = app.sign_in("m_arjun", "Arjun Rao").await;

    let upload = |file_name: &'static str, content_type: &'static str, body: Vec<u8>| {
        app.client
            .post(app.url(&format!("/profile/photos?file_name={file_name}")))
            .bearer_auth(&user.token)
            .header("content-type", content_type)
            .body(body)
            .send()
    };

    assert_eq!(upload("notes.txt", "text/plain", vec![1, 2]).await.unwrap().status(), 400);
    assert_eq!(upload("empty.jpg", "image/jpeg", vec![]).await.unwrap().status(), 400);
    assert_eq!(upload("..%2Fescape.jpg", "image/jpeg", vec![1]).await.unwrap().status(), 400);

    let too_big = upload("big.jpg", "image/jpeg", vec![0; 64]).await.unwrap().status();
    assert!(too_big == 400 || too_big == 413, "unexpected status {too_big}");
}
