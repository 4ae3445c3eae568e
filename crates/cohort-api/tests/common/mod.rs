#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use cohort_api::assistant::{Assistant, ChatTurn};
use cohort_api::mail::Mailer;
use cohort_api::{AppState, AppStateInner, auth};
use cohort_db::Database;
use cohort_db::models::NewUser;
use cohort_types::models::Role;

pub const SECRET: &str = "test-secret";

pub fn assistant_id() -> Uuid {
    cohort_db::ASSISTANT_USER_ID.parse().unwrap()
}

/// Answers with a fixed text, or fails every call.
pub struct FakeAssistant {
    pub answer: Option<String>,
    pub calls: Mutex<Vec<Vec<ChatTurn>>>,
}

impl FakeAssistant {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self { answer: Some(text.to_string()), calls: Mutex::new(vec![]) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { answer: None, calls: Mutex::new(vec![]) })
    }
}

#[async_trait]
impl Assistant for FakeAssistant {
    async fn reply(&self, history: &[ChatTurn]) -> anyhow::Result<Option<String>> {
        self.calls.lock().unwrap().push(history.to_vec());
        match &self.answer {
            Some(text) => Ok(Some(text.clone())),
            None => anyhow::bail!("upstream returned 503"),
        }
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// Body of the last mail sent to `to`.
    pub fn last_to(&self, to: &str) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(addr, _)| addr == to)
            .map(|(_, body)| body.clone())
            .expect("no mail sent")
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
}

pub fn app_with(assistant: Option<Arc<dyn Assistant>>) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        upload_dir: std::env::temp_dir().join(format!("cohort-test-{}", Uuid::new_v4())),
        assistant,
        mailer: mailer.clone(),
    });
    TestApp { app: cohort_api::router(state.clone()), state, mailer }
}

pub fn app() -> TestApp {
    app_with(None)
}

pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    /// Inserts a user directly and mints a token, skipping the email flow.
    pub fn user(&self, name: &str) -> TestUser {
        self.user_with_role(name, Role::User)
    }

    pub fn admin(&self, name: &str) -> TestUser {
        self.user_with_role(name, Role::Admin)
    }

    fn user_with_role(&self, name: &str, role: Role) -> TestUser {
        let id = Uuid::new_v4();
        self.state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                name,
                college_id: &format!("c-{}", name),
                email: &format!("{}@uni.example", name),
                password_hash: "!",
            })
            .unwrap();
        if role == Role::Admin {
            self.state.db.set_role(&id.to_string(), "admin").unwrap();
        }
        let token = auth::create_token(SECRET, id, name, role).unwrap();
        TestUser { id, token }
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.call("GET", uri, Some(&user.token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.call("DELETE", uri, Some(&user.token), None).await
    }

    /// Creates (or fetches) the private conversation between `a` and `b`.
    pub async fn private_chat(&self, a: &TestUser, b: Uuid) -> String {
        let (status, body) = self
            .post(
                "/chat/conversations",
                a,
                serde_json::json!({ "type": "private", "participant_ids": [b] }),
            )
            .await;
        assert!(status.is_success(), "{} {}", status, body);
        body["conversation_id"].as_str().unwrap().to_string()
    }

    pub async fn send(&self, conversation_id: &str, from: &TestUser, text: &str) -> Value {
        let (status, body) = self
            .post(
                &format!("/chat/conversations/{}/messages", conversation_id),
                from,
                serde_json::json!({ "content": text }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}
