//! A canned text API served from a local axum router.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Upstream {
    texts: HashMap<String, Value>,
    slow: HashMap<String, Duration>,
    requests: Mutex<Vec<(String, HashMap<String, String>)>>,
}

pub struct MockUpstream {
    pub base_url: String,
    state: Arc<Upstream>,
}

impl MockUpstream {
    /// Every reference requested so far, with its query parameters.
    pub fn requests(&self) -> Vec<(String, HashMap<String, String>)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requested(&self, reference: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(r, _)| r == reference)
            .count()
    }
}

#[derive(Default)]
pub struct UpstreamBuilder {
    texts: HashMap<String, Value>,
    slow: HashMap<String, Duration>,
}

impl UpstreamBuilder {
    pub fn text(mut self, reference: &str, body: Value) -> Self {
        self.texts.insert(reference.to_string(), body);
        self
    }

    /// Answers `reference` only after `delay`.
    pub fn slow(mut self, reference: &str, delay: Duration, body: Value) -> Self {
        self.slow.insert(reference.to_string(), delay);
        self.text(reference, body)
    }

    pub async fn spawn(self) -> MockUpstream {
        let state = Arc::new(Upstream {
            texts: self.texts,
            slow: self.slow,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/texts/{reference}", get(serve_text))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockUpstream {
            base_url: format!("http://{}/texts", addr),
            state,
        }
    }
}

async fn serve_text(
    State(state): State<Arc<Upstream>>,
    Path(reference): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push((reference.clone(), params));

    if let Some(delay) = state.slow.get(&reference) {
        tokio::time::sleep(*delay).await;
    }
    match state.texts.get(&reference) {
        Some(body) => (StatusCode::OK, body.to_string()).into_response(),
        None => (StatusCode::NOT_FOUND, format!("no text for {}", reference)).into_response(),
    }
}

/// Berakhot 2a with one Rashi comment on the first section, and empty
/// secondary commentaries.
pub fn berakhot_2a() -> UpstreamBuilder {
    UpstreamBuilder::default()
        .text(
            "Berakhot.2a",
            json!({
                "ref": "Berakhot 2a",
                "indexTitle": "Berakhot",
                "he": ["<big>מ</big>אימתי קורין את שמע", "גמרא"],
                "text": ["From when may one recite Shema", "Gemara"],
                "commentary": [{
                    "he": "מאימתי",
                    "text": "From when",
                    "ref": "Rashi on Berakhot 2a:1:1",
                    "sourceRef": "Rashi on Berakhot 2a:1:1",
                    "sourceHeRef": "רש\"י על ברכות ב. א:א",
                    "anchorRefExpanded": ["Berakhot 2a:1"],
                    "collectiveTitle": {"en": "Rashi"}
                }]
            }),
        )
        .text(
            "Rashi_on_Berakhot.2a",
            json!({"ref": "Rashi on Berakhot 2a", "commentary": []}),
        )
        .text(
            "Tosafot_on_Berakhot.2a",
            json!({"ref": "Tosafot on Berakhot 2a", "commentary": []}),
        )
}
