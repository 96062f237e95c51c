//! Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use claroz::credential_store::{CredentialStore, MemoryCredentialStore};
use claroz::transport::{Method, Request, Response, Transport};
use claroz::{App, ClientError, Credential};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

type Route = (Method, String);

#[derive(Clone)]
enum Reply {
    Status(u16, Value),
    Fail(ClientError),
}

/// Replies are queued per (method, path). The last queued reply for a route
/// is sticky and answers every later call.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<Route, VecDeque<Reply>>>,
    gates: Mutex<HashMap<Route, Arc<Semaphore>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Reply::Status(status, body));
        self
    }

    pub fn fail(&self, method: Method, path: &str, err: ClientError) -> &Self {
        self.push(method, path, Reply::Fail(err));
        self
    }

    /// Hold every call to this route until a permit is added.
    pub fn gate(&self, method: Method, path: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert((method, path.to_string()), gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, method: Method, path: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls(method, path).len()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: Request) -> claroz::Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        let route = (request.method, request.path.clone());

        let gate = self.gates.lock().unwrap().get(&route).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&route) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Status(status, body)) => Ok(Response::new(status, body)),
            Some(Reply::Fail(err)) => Err(err),
            None => Ok(Response::new(
                404,
                json!({ "error": format!("no route for {} {}", request.method, request.path) }),
            )),
        }
    }
}

pub fn app(
    transport: &Arc<ScriptedTransport>,
    token: Option<&str>,
) -> (App, Arc<MemoryCredentialStore>) {
    let store = Arc::new(match token {
        Some(t) => MemoryCredentialStore::with_credential(Credential::new(t)),
        None => MemoryCredentialStore::new(),
    });
    let app = App::new(transport.clone(), store.clone(), 10);
    (app, store)
}

pub fn stored_token(store: &MemoryCredentialStore) -> Option<String> {
    store.get().map(|c| c.as_str().to_string())
}

pub fn bearer(request: &Request) -> Option<&str> {
    request.authorization()
}

/// Wall-clock time on a fixed day.
pub fn at(hour: u32, minute: u32) -> String {
    format!("2024-05-01T{hour:02}:{minute:02}:00Z")
}

pub fn local_post(id: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user": { "id": "u1", "username": "ana" },
        "content": format!("post {id}"),
        "createdAt": created_at,
        "likesCount": 3,
        "isLiked": false,
        "comments": []
    })
}

pub fn federated_post(id: &str, did: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user": {
            "id": format!("remote-{id}"),
            "username": "remote",
            "handle": "remote.bsky.social",
            "did": did,
            "federationType": "remote"
        },
        "content": format!("post {id}"),
        "createdAt": created_at,
        "likesCount": 0,
        "isLiked": false,
        "comments": []
    })
}

pub fn profile(did: &str, handle: &str) -> Value {
    json!({
        "id": format!("remote-{handle}"),
        "username": handle,
        "did": did,
        "handle": handle,
        "fullName": "Remote Person",
        "federationType": "remote"
    })
}

/// Empty pages for both feed sources.
pub fn empty_feed(transport: &ScriptedTransport) {
    transport
        .reply(Method::Get, "/posts", 200, json!([]))
        .reply(Method::Get, "/federation/posts", 200, json!([]));
}
