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

use common::{TestApp, candidate_ids, list_contains};

#[tokio::test]
async fn test_feed_shows_only_matching_gender_and_university() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;
    app.complete_user("f_chitra", "Chitra Iyer", "Female", "Men").await;
    app.complete_user("m_dev", "Dev Patel", "Male", "Women").await;

    let feed = app.feed(&a).await;
    assert_eq!(candidate_ids(&feed), vec!["f_bela", "f_chitra"]);
    assert_eq!(feed["totalEligible"], 2);
    assert_eq!(feed["likeQuota"], 2);
    assert_eq!(feed["likesUsed"], 0);
    assert_eq!(feed["catalogExhausted"], false);
}

#[tokio::test]
async fn test_feed_never_contains_the_user() {
    let app = TestApp::spawn().await;
    let f = app.complete_user("f_anya", "Anya Das", "Female", "Women").await;
    app.complete_user("f_bina", "Bina Roy", "Female", "Women").await;

    let feed = app.feed(&f).await;
    assert_eq!(candidate_ids(&feed), vec!["f_bina"]);
    assert_eq!(feed["totalEligible"], 1);
}

#[tokio::test]
async fn test_like_without_reciprocity_records_pending_like() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;
    app.complete_user("f_chitra", "Chitra Iyer", "Female", "Men").await;
    app.complete_user("f_dina", "Dina Bose", "Female", "Men").await;

    let (status, body) = app.swipe(&a, "like", "f_bela").await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "liked");
    assert!(body.get("conversationId").is_none());
    assert_eq!(body["feed"]["likesUsed"], 1);

    let bela = app.user_doc("f_bela").await;
    assert!(list_contains(&bela, "likedBy", "m_arjun"));
    assert!(list_contains(&app.user_doc("m_arjun").await, "visited_profiles", "f_bela"));
    assert!(app.match_doc("f_bela_m_arjun").await.is_none());
    assert_eq!(candidate_ids(&body["feed"]), vec!["f_chitra", "f_dina"]);
}

#[tokio::test]
async fn test_liking_the_only_candidate_rotates_and_clears_visited() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;

    let (status, body) = app.swipe(&a, "like", "f_bela").await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "liked");
    assert_eq!(body["feed"]["catalogExhausted"], true);
    assert_eq!(candidate_ids(&body["feed"]), vec!["f_bela"]);

    assert!(list_contains(&app.user_doc("f_bela").await, "likedBy", "m_arjun"));
    assert!(!list_contains(&app.user_doc("m_arjun").await, "visited_profiles", "f_bela"));
}

#[tokio::test]
async fn test_dislike_after_being_liked_is_a_missed_match() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    let b = app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;

    let (status, _) = app.swipe(&b, "like", "m_arjun").await;
    assert_eq!(status, 200);
    assert!(list_contains(&app.user_doc("m_arjun").await, "likedBy", "f_bela"));

    let (status, body) = app.swipe(&a, "dislike", "f_bela").await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "missed_match");
    assert_eq!(body["notice"], "You missed a match!");

    let arjun = app.user_doc("m_arjun").await;
    assert!(!list_contains(&arjun, "likedBy", "f_bela"));
    assert!(list_contains(&arjun, "dislikes", "f_bela"));
    assert!(app.match_doc("f_bela_m_arjun").await.is_none());
}

#[tokio::test]
async fn test_plain_dislike() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;

    let (status, body) = app.swipe(&a, "dislike", "f_bela").await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "disliked");
    assert!(body.get("notice").is_none());
    assert_eq!(body["feed"]["likesUsed"], 0);
}

#[tokio::test]
async fn test_exhausted_catalog_is_cleared_and_served_again() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    for i in 1..=5 {
        app.complete_user(&format!("f_{i}"), &format!("Friend {i}"), "Female", "Men").await;
    }

    let feed = app.feed(&a).await;
    assert_eq!(candidate_ids(&feed).len(), 5);

    let mut last = serde_json::Value::Null;
    for i in 1..=5 {
        let (status, body) = app.swipe(&a, "dislike", &format!("f_{i}")).await;
        assert_eq!(status, 200, "swipe {i} failed: {body}");
        last = body;
    }

    let feed = &last["feed"];
    assert_eq!(feed["catalogExhausted"], true);
    assert_eq!(candidate_ids(feed), vec!["f_1", "f_2", "f_3", "f_4", "f_5"]);

    let arjun = app.user_doc("m_arjun").await;
    assert!(arjun["visited_profiles"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rotation_drops_visited_profiles() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    for i in 1..=3 {
        app.complete_user(&format!("f_{i}"), &format!("Friend {i}"), "Female", "Men").await;
    }

    app.feed(&a).await;
    let (_, body) = app.swipe(&a, "dislike", "f_1").await;
    assert_eq!(candidate_ids(&body["feed"]), vec!["f_2", "f_3"]);

    // Only one visible candidate left, so selection reruns without f_1 and f_2.
    let (_, body) = app.swipe(&a, "dislike", "f_2").await;
    assert_eq!(candidate_ids(&body["feed"]), vec!["f_3"]);
    assert_eq!(body["feed"]["catalogExhausted"], false);
}

#[tokio::test]
async fn test_visited_liker_resurfaces_first() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_x", "Xena Paul", "Female", "Men").await;
    app.complete_user("f_y", "Yamini Sen", "Female", "Men").await;
    let z = app.complete_user("f_z", "Zoya Khan", "Female", "Men").await;

    app.feed(&a).await;
    let (status, _) = app.swipe(&a, "dislike", "f_z").await;
    assert_eq!(status, 200);

    // Zoya, already shown to Arjun, now likes him.
    let (status, _) = app.swipe(&z, "like", "m_arjun").await;
    assert_eq!(status, 200);

    let (status, feed) = app.get_json(&a, "/feed?refresh=true").await;
    assert_eq!(status, 200);
    assert_eq!(candidate_ids(&feed), vec!["f_z", "f_x", "f_y"]);
    assert_eq!(feed["likesReceived"], 1);
}

#[tokio::test]
async fn test_quota_exhaustion_rejects_without_mutation() {
    let mut config = common::get_test_config();
    config.feed.quota_ratio = 0.5;
    let app = TestApp::spawn_with_config(config).await;

    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;
    app.complete_user("f_chitra", "Chitra Iyer", "Female", "Men").await;

    let feed = app.feed(&a).await;
    assert_eq!(feed["likeQuota"], 1);

    let (status, _) = app.swipe(&a, "like", "f_bela").await;
    assert_eq!(status, 200);

    let (status, body) = app.swipe(&a, "like", "f_chitra").await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "You have reached your daily like limit.");

    let chitra = app.user_doc("f_chitra").await;
    assert!(!list_contains(&chitra, "likedBy", "m_arjun"));

    // Dislikes are not limited.
    let (status, _) = app.swipe(&a, "dislike", "f_chitra").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_saving_profile_does_not_reset_like_quota() {
    let mut config = common::get_test_config();
    config.feed.quota_ratio = 0.5;
    let app = TestApp::spawn_with_config(config).await;

    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;
    app.complete_user("f_chitra", "Chitra Iyer", "Female", "Men").await;

    let (status, _) = app.swipe(&a, "like", "f_bela").await;
    assert_eq!(status, 200);
    let (status, _) = app.swipe(&a, "like", "f_chitra").await;
    assert_eq!(status, 429);

    app.save_profile(&a, "Arjun Rao", "Male", "Women").await;

    let feed = app.feed(&a).await;
    assert_eq!(feed["likesUsed"], 1);
    assert_eq!(feed["likeQuota"], 1);

    let (status, _) = app.swipe(&a, "like", "f_chitra").await;
    assert_eq!(status, 429);
    assert!(!list_contains(&app.user_doc("f_chitra").await, "likedBy", "m_arjun"));
}

#[tokio::test]
async fn test_swipe_on_self_or_hidden_candidate_is_rejected() {
    let app = TestApp::spawn().await;
    let a = app.complete_user("m_arjun", "Arjun Rao", "Male", "Women").await;
    app.complete_user("f_bela", "Bela Shah", "Female", "Men").await;
    app.complete_user("m_dev", "Dev Patel", "Male", "Women").await;

    let (status, _) = app.swipe(&a, "like", "m_arjun").await;
    assert_eq!(status, 400);

    let (status, _) = app.swipe(&a, "like", "m_dev").await;
    assert_eq!(status, 404);

    let arjun = app.user_doc("m_arjun").await;
    for field in ["likedBy", "matches", "dislikes", "visited_profiles"] {
        assert!(!list_contains(&arjun, field, "m_arjun"), "self found in {field}");
    }
    assert!(!list_contains(&app.user_doc("m_dev").await, "likedBy", "m_arjun"));
}

#[tokio::test]
async fn test_feed_requires_complete_profile() {
    let app = TestApp::spawn().await;
    let user = app.sign_in("m_new", "New User").await;

    let (status, _) = app.get_json(&user, "/feed").await;
    assert_eq!(status, 403);

    let resp = app.client.get(app.url("/feed")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}
