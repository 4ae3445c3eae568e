mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use cohort_api::assistant::{Assistant, TurnRole};
use common::{FakeAssistant, app, app_with, assistant_id};

#[tokio::test]
async fn test_private_conversation_is_deduplicated() {
    let t = app();
    let (a, b) = (t.user("amal"), t.user("badr"));
    let body = json!({ "type": "private", "participant_ids": [b.id] });

    let (status, first) = t.post("/chat/conversations", &a, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["is_new"], true);

    let (status, second) = t.post("/chat/conversations", &a, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["is_new"], false);
    assert_eq!(second["conversation_id"], first["conversation_id"]);

    // Same pair from the other side.
    let (_, reverse) = t
        .post("/chat/conversations", &b, json!({ "type": "private", "participant_ids": [a.id] }))
        .await;
    assert_eq!(reverse["conversation_id"], first["conversation_id"]);
}

#[tokio::test]
async fn test_groups_are_never_deduplicated() {
    let t = app();
    let (a, b, c) = (t.user("amal"), t.user("badr"), t.user("caro"));
    let body = json!({ "type": "group", "participant_ids": [b.id, c.id], "name": "Study group" });

    let (s1, g1) = t.post("/chat/conversations", &a, body.clone()).await;
    let (s2, g2) = t.post("/chat/conversations", &a, body).await;
    assert_eq!((s1, s2), (StatusCode::CREATED, StatusCode::CREATED));
    assert_ne!(g1["conversation_id"], g2["conversation_id"]);
}

#[tokio::test]
async fn test_conversation_validation() {
    let t = app();
    let (a, b, c) = (t.user("amal"), t.user("badr"), t.user("caro"));

    let (status, _) = t
        .post("/chat/conversations", &a, json!({ "type": "private", "participant_ids": [b.id, c.id] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Talking to yourself is not a conversation.
    let (status, _) = t
        .post("/chat/conversations", &a, json!({ "type": "private", "participant_ids": [a.id] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .post(
            "/chat/conversations",
            &a,
            json!({ "type": "private", "participant_ids": [uuid::Uuid::new_v4()] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_requires_content_and_participation() {
    let t = app();
    let (a, b, outsider) = (t.user("amal"), t.user("badr"), t.user("zed"));
    let cid = t.private_chat(&a, b.id).await;
    let uri = format!("/chat/conversations/{}/messages", cid);

    let (status, _) = t.post(&uri, &a, json!({ "content": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.post(&uri, &outsider, json!({ "content": "hi" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.get(&uri, &outsider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Media alone is enough.
    let (status, body) = t
        .post(
            &uri,
            &a,
            json!({ "media": [{ "url": "/uploads/a.png", "media_type": "image" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["media"][0]["url"], "/uploads/a.png");
}

#[tokio::test]
async fn test_messages_page_in_chronological_order() {
    let t = app();
    let (a, b) = (t.user("amal"), t.user("badr"));
    let cid = t.private_chat(&a, b.id).await;
    for i in 0..5 {
        t.send(&cid, &a, &format!("m{}", i)).await;
    }

    let uri = format!("/chat/conversations/{}/messages?limit=3", cid);
    let (_, page) = t.get(&uri, &b).await;
    let texts: Vec<_> = page["items"].as_array().unwrap().iter().map(|m| m["content"].clone()).collect();
    assert_eq!(texts, [json!("m2"), json!("m3"), json!("m4")]);

    let cursor = page["next_cursor"].as_str().unwrap();
    let (_, older) = t.get(&format!("{}&cursor={}", uri, cursor), &b).await;
    let texts: Vec<_> = older["items"].as_array().unwrap().iter().map(|m| m["content"].clone()).collect();
    assert_eq!(texts, [json!("m0"), json!("m1")]);
    assert!(older["next_cursor"].is_null());
}

#[tokio::test]
async fn test_reply_preview_and_forwarded_flag() {
    let t = app();
    let (a, b) = (t.user("amal"), t.user("badr"));
    let cid = t.private_chat(&a, b.id).await;
    let original = t.send(&cid, &a, "exam is on monday").await;

    let (status, reply) = t
        .post(
            &format!("/chat/conversations/{}/messages", cid),
            &b,
            json!({ "content": "thanks", "reply_to_id": original["id"], "forwarded": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["reply_to"]["content"], "exam is on monday");
    assert_eq!(reply["reply_to"]["sender_name"], "amal");
    assert_eq!(reply["forwarded"], true);

    // Once deleted for everyone the preview loses its text.
    t.delete(&format!("/chat/messages/{}?scope=everyone", original["id"].as_str().unwrap()), &a)
        .await;
    let (_, page) = t.get(&format!("/chat/conversations/{}/messages", cid), &b).await;
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["reply_to"]["content"].is_null());
}

#[tokio::test]
async fn test_delete_for_me_and_for_everyone() {
    let t = app();
    let (a, b) = (t.user("amal"), t.user("badr"));
    let cid = t.private_chat(&a, b.id).await;
    let m1 = t.send(&cid, &a, "first").await;
    let m2 = t.send(&cid, &a, "second").await;
    let (m1, m2) = (m1["id"].as_str().unwrap(), m2["id"].as_str().unwrap());
    let list = format!("/chat/conversations/{}/messages", cid);

    // Delete for me: hidden only for the caller, and repeatable.
    for _ in 0..2 {
        let (status, _) = t.delete(&format!("/chat/messages/{}?scope=me", m1), &b).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let (_, for_b) = t.get(&list, &b).await;
    let (_, for_a) = t.get(&list, &a).await;
    assert_eq!(for_b["items"].as_array().unwrap().len(), 1);
    assert_eq!(for_a["items"].as_array().unwrap().len(), 2);

    // Delete for everyone: sender only.
    let (status, _) = t.delete(&format!("/chat/messages/{}?scope=everyone", m2), &b).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.delete(&format!("/chat/messages/{}?scope=everyone", m2), &a).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, for_a) = t.get(&list, &a).await;
    let (_, for_b) = t.get(&list, &b).await;
    assert_eq!(for_a["items"].as_array().unwrap().len(), 1);
    assert!(for_b["items"].as_array().unwrap().is_empty());

    let (status, _) = t.delete(&format!("/chat/messages/{}?scope=everyone", m2), &a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unread_counts_and_mark_read() {
    let t = app();
    let (a, b) = (t.user("amal"), t.user("badr"));
    let cid = t.private_chat(&a, b.id).await;
    t.send(&cid, &a, "one").await;
    t.send(&cid, &a, "two").await;
    t.send(&cid, &b, "mine").await;

    let (_, unread) = t.get("/chat/unread", &b).await;
    assert_eq!(unread["unread"], 2);
    let (_, unread) = t.get("/chat/unread", &a).await;
    assert_eq!(unread["unread"], 1);

    let (_, counts) = t.get("/notifications/count", &b).await;
    assert_eq!(counts["messages"], 2);
    assert_eq!(counts["total"], 2);

    let (_, list) = t.get("/chat/conversations", &b).await;
    let convo = &list["items"][0];
    assert_eq!(convo["unread_count"], 2);
    assert_eq!(convo["last_message"]["content"], "mine");
    assert_eq!(convo["participants"].as_array().unwrap().len(), 2);

    let (status, _) = t.post(&format!("/chat/conversations/{}/read", cid), &b, json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, unread) = t.get("/chat/unread", &b).await;
    assert_eq!(unread["unread"], 0);
}

#[tokio::test]
async fn test_conversation_list_follows_activity_and_cursor() {
    let t = app();
    let me = t.user("amal");
    let friends: Vec<_> = ["badr", "caro", "dina"].iter().map(|n| t.user(n)).collect();
    let mut ids = vec![];
    for f in &friends {
        ids.push(t.private_chat(&me, f.id).await);
    }
    // Oldest conversation becomes the most recent.
    t.send(&ids[0], &me, "bump").await;

    let (_, page) = t.get("/chat/conversations?limit=2", &me).await;
    let listed: Vec<_> = page["items"].as_array().unwrap().iter().map(|c| c["id"].clone()).collect();
    assert_eq!(listed, [json!(ids[0]), json!(ids[2])]);

    let cursor = page["next_cursor"].as_str().unwrap();
    let (_, rest) = t.get(&format!("/chat/conversations?limit=2&cursor={}", cursor), &me).await;
    let listed: Vec<_> = rest["items"].as_array().unwrap().iter().map(|c| c["id"].clone()).collect();
    assert_eq!(listed, [json!(ids[1])]);
    assert!(rest["next_cursor"].is_null());
}

#[tokio::test]
async fn test_group_membership() {
    let t = app();
    let (a, b, c) = (t.user("amal"), t.user("badr"), t.user("caro"));
    let (_, group) = t
        .post("/chat/conversations", &a, json!({ "type": "group", "participant_ids": [b.id] }))
        .await;
    let gid = group["conversation_id"].as_str().unwrap();

    let (status, added) = t
        .post(&format!("/chat/conversations/{}/participants", gid), &b, json!({ "user_ids": [c.id] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["added"], 1);
    t.send(gid, &c, "hello all").await;

    let (status, _) = t.post(&format!("/chat/conversations/{}/leave", gid), &c, json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.get(&format!("/chat/conversations/{}/messages", gid), &c).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Private chats have a fixed pair.
    let pid = t.private_chat(&a, b.id).await;
    let (status, _) = t
        .post(&format!("/chat/conversations/{}/participants", pid), &a, json!({ "user_ids": [c.id] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_message_reactions_toggle() {
    let t = app();
    let (a, b, outsider) = (t.user("amal"), t.user("badr"), t.user("zed"));
    let cid = t.private_chat(&a, b.id).await;
    let msg = t.send(&cid, &a, "party tonight").await;
    let uri = format!("/reactions/message/{}", msg["id"].as_str().unwrap());

    let (_, r) = t.post(&uri, &b, json!({ "kind": "heart" })).await;
    assert_eq!(r["action"], "added");
    let (_, r) = t.post(&uri, &b, json!({ "kind": "laugh" })).await;
    assert_eq!(r["action"], "updated");

    let (_, summary) = t.get(&uri, &a).await;
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["groups"][0]["kind"], "laugh");

    let (_, r) = t.post(&uri, &b, json!({ "kind": "laugh" })).await;
    assert_eq!(r["action"], "removed");
    let (_, summary) = t.get(&uri, &a).await;
    assert_eq!(summary["total"], 0);

    let (status, _) = t.post(&uri, &outsider, json!({ "kind": "like" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.post(&uri, &b, json!({ "kind": "thumbs" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_assistant_replies_inline() {
    let ai = FakeAssistant::replying("أهلاً! كيف أساعدك؟");
    let t = app_with(Some(ai.clone() as Arc<dyn Assistant>));
    let student = t.user("amal");
    let cid = t.private_chat(&student, assistant_id()).await;

    t.send(&cid, &student, "hello").await;

    let (_, page) = t.get(&format!("/chat/conversations/{}/messages", cid), &student).await;
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["sender"]["id"], assistant_id().to_string());
    assert_eq!(items[1]["content"], "أهلاً! كيف أساعدك؟");

    let calls = ai.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].last().unwrap().role, TurnRole::User);
    assert_eq!(calls[0].last().unwrap().content, "hello");
}

#[tokio::test]
async fn test_assistant_history_is_bounded() {
    let ai = FakeAssistant::replying("ok");
    let t = app_with(Some(ai.clone() as Arc<dyn Assistant>));
    let student = t.user("amal");
    let cid = t.private_chat(&student, assistant_id()).await;

    for i in 0..7 {
        t.send(&cid, &student, &format!("q{}", i)).await;
    }

    let calls = ai.calls.lock().unwrap();
    assert_eq!(calls.len(), 7);
    let last = calls.last().unwrap();
    assert_eq!(last.len(), 10);
    assert_eq!(last.last().unwrap().content, "q6");
    assert!(last.iter().any(|turn| turn.role == TurnRole::Assistant));
}

#[tokio::test]
async fn test_assistant_failure_does_not_fail_send() {
    let ai = FakeAssistant::failing();
    let t = app_with(Some(ai.clone() as Arc<dyn Assistant>));
    let student = t.user("amal");
    let cid = t.private_chat(&student, assistant_id()).await;

    let sent = t.send(&cid, &student, "hello?").await;
    assert_eq!(sent["content"], "hello?");

    let (_, page) = t.get(&format!("/chat/conversations/{}/messages", cid), &student).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(ai.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_no_assistant_call_without_ai_participant() {
    let ai = FakeAssistant::replying("should not appear");
    let t = app_with(Some(ai.clone() as Arc<dyn Assistant>));
    let (a, b) = (t.user("amal"), t.user("badr"));
    let cid = t.private_chat(&a, b.id).await;

    t.send(&cid, &a, "hi").await;
    assert!(ai.calls.lock().unwrap().is_empty());
}
