mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::app;

fn code_from(body: &str) -> String {
    body.split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_register_and_login() {
    let t = app();
    let email = "sara@uni.example";

    // Unverified email can't register.
    let register = json!({
        "name": "Sara",
        "college_id": "2021-0042",
        "email": email,
        "password": "correct horse",
    });
    let (status, _) = t.call("POST", "/auth/register", None, Some(register.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call("POST", "/auth/email/send", None, Some(json!({ "email": "Sara@Uni.Example" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = code_from(&t.mailer.last_to(email));

    let (status, _) = t
        .call("POST", "/auth/email/verify", None, Some(json!({ "email": email, "code": "000000x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = t
        .call("POST", "/auth/email/verify", None, Some(json!({ "email": email, "code": code })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.call("POST", "/auth/register", None, Some(register.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "user");
    assert!(body["token"].as_str().is_some());

    let (status, _) = t.call("POST", "/auth/register", None, Some(register)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Either identifier works.
    for identifier in [email, "2021-0042"] {
        let (status, body) = t
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "identifier": identifier, "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Sara");
    }

    let (status, _) = t
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "identifier": email, "password": "wrong horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset() {
    let t = app();
    let email = "omar@uni.example";

    t.call("POST", "/auth/email/send", None, Some(json!({ "email": email }))).await;
    let code = code_from(&t.mailer.last_to(email));
    t.call("POST", "/auth/email/verify", None, Some(json!({ "email": email, "code": code })))
        .await;
    let (status, _) = t
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "name": "Omar",
                "college_id": "2021-0077",
                "email": email,
                "password": "first password",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Unknown addresses get the same answer and no mail.
    let (status, _) = t
        .call("POST", "/auth/password/forgot", None, Some(json!({ "email": "ghost@uni.example" })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(t.mailer.sent.lock().unwrap().iter().all(|(to, _)| to != "ghost@uni.example"));

    let (status, _) = t
        .call("POST", "/auth/password/forgot", None, Some(json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let mail = t.mailer.last_to(email);
    let token = mail.split_whitespace().last().unwrap().to_string();

    let reset = json!({ "token": token, "new_password": "second password" });
    let (status, _) = t.call("POST", "/auth/password/reset", None, Some(reset.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Single use.
    let (status, _) = t.call("POST", "/auth/password/reset", None, Some(reset)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "identifier": email, "password": "second password" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_banned_user_cannot_log_in() {
    let t = app();
    let email = "banned@uni.example";

    t.call("POST", "/auth/email/send", None, Some(json!({ "email": email }))).await;
    let code = code_from(&t.mailer.last_to(email));
    t.call("POST", "/auth/email/verify", None, Some(json!({ "email": email, "code": code })))
        .await;
    let (_, body) = t
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "name": "Banned",
                "college_id": "2021-0099",
                "email": email,
                "password": "some password",
            })),
        )
        .await;
    let user_id = body["user_id"].as_str().unwrap().to_string();

    let admin = t.admin("admin");
    let (status, _) = t.post(&format!("/admin/users/{}/ban", user_id), &admin, json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "identifier": email, "password": "some password" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let t = app();
    let (status, _) = t.call("GET", "/chat/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.call("GET", "/chat/conversations", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = t.user("nour");
    let (status, _) = t.get("/admin/stats", &user).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("GET", "/memories/gallery", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_college_id_cannot_look_like_an_email() {
    let t = app();
    t.user("mona");
    let email = "lina@uni.example";

    t.call("POST", "/auth/email/send", None, Some(json!({ "email": email }))).await;
    let code = code_from(&t.mailer.last_to(email));
    t.call("POST", "/auth/email/verify", None, Some(json!({ "email": email, "code": code })))
        .await;

    // Would make "mona@uni.example" match two accounts at login.
    let (status, _) = t
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "name": "Lina",
                "college_id": "mona@uni.example",
                "email": email,
                "password": "long enough",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
