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
use std::time::Duration;
use tokio_tungstenite::connect_async;

#[tokio::test]
async fn test_gateway_tracks_unread_counts() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    let b = app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;
    let id = app.make_match(&a, &b).await;

    let mut gateway = app.connect_ws("/gateway", &b.token).await;
    let matches = gateway
        .wait_for(|f| f["type"] == "matches" && f["conversations"].as_array().is_some_and(|c| c.len() == 1))
        .await
        .expect("match list was not pushed");
    assert_eq!(matches["conversations"][0]["conversationId"], id.as_str());

    let path = format!("/chats/{id}/messages");
    app.post_json(&a, &path, json!({ "text": "one" })).await;
    app.post_json(&a, &path, json!({ "text": "two" })).await;

    let unread = gateway.wait_for(|f| f["type"] == "unread" && f["total"] == 2).await.expect("unread count missing");
    assert_eq!(unread["counts"][id.as_str()], 2);

    // Messages sent by the user never count against them.
    app.post_json(&b, &path, json!({ "text": "three" })).await;

    app.post_json(&b, &format!("/chats/{id}/read"), json!({})).await;
    let cleared = gateway.wait_for(|f| f["type"] == "unread" && f["total"] == 0).await.expect("unread not cleared");
    assert_eq!(cleared["counts"][id.as_str()], 0);
}

#[tokio::test]
async fn test_gateway_picks_up_new_matches() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    let b = app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;

    let mut gateway = app.connect_ws("/gateway", &a.token).await;
    let initial = gateway.wait_for(|f| f["type"] == "matches").await.expect("no initial match list");
    assert!(initial["conversations"].as_array().unwrap().is_empty());

    let id = app.make_match(&a, &b).await;
    let updated = gateway
        .wait_for(|f| f["type"] == "matches" && f["conversations"].as_array().is_some_and(|c| !c.is_empty()))
        .await
        .expect("new match was not pushed");
    assert_eq!(updated["conversations"][0]["conversationId"], id.as_str());
    assert_eq!(updated["conversations"][0]["counterpart"]["firstName"], "Bela");
}

#[tokio::test]
async fn test_sign_out_closes_gateway() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;

    let mut gateway = app.connect_ws("/gateway", &a.token).await;
    gateway.wait_for(|f| f["type"] == "unread").await.expect("no initial unread frame");

    let resp = app.client.delete(app.url("/session")).bearer_auth(&a.token).send().await.unwrap();
    assert_eq!(resp.status(), 204);

    assert!(gateway.closed_within(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_shutdown_closes_gateway() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;

    let mut gateway = app.connect_ws("/gateway", &a.token).await;
    gateway.wait_for(|f| f["type"] == "unread").await.expect("no initial unread frame");

    app.shutdown();
    assert!(gateway.closed_within(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_gateway_rejects_bad_tokens_and_incomplete_profiles() {
    let app = TestApp::spawn().await;
    let fresh = app.sign_in("m_new", "New User").await;

    let bad = connect_async(format!("{}/v1/gateway?token=not-a-token", app.ws_url)).await;
    assert!(bad.is_err());

    let incomplete = connect_async(format!("{}/v1/gateway?token={}", app.ws_url, fresh.token)).await;
    assert!(incomplete.is_err());
}
