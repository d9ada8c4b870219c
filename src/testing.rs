// ABOUTME: Test doubles: a scripted gateway and a surface that records every screen
// ABOUTME: Compiled only for tests

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::RequestError;
use crate::remote::Gateway;
use crate::view::{Screen, Surface};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

type Reply = Result<Value, RequestError>;

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<(Reply, Duration)>>,
    sticky: HashMap<String, Reply>,
    calls: Vec<RecordedCall>,
}

/// Answers calls by path: queued replies first, in order, then the sticky
/// reply for that path, then a 404. Queued replies may carry a delay measured
/// on the tokio clock.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .sticky
            .insert(path.to_string(), reply);
    }

    pub fn push(&self, path: &str, reply: Reply) {
        self.push_after(path, Duration::ZERO, reply);
    }

    pub fn push_after(&self, path: &str, delay: Duration, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back((reply, delay));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.path == path)
            .count()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Reply {
        let (reply, delay) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
            match script.queued.get_mut(path).and_then(VecDeque::pop_front) {
                Some(queued) => queued,
                None => {
                    let reply = match script.sticky.get(path) {
                        Some(reply) => reply.clone(),
                        None => Err(RequestError::transport(
                            Some(404),
                            format!("Not scripted: {}", path),
                        )),
                    };
                    (reply, Duration::ZERO)
                }
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    screens: Mutex<Vec<Screen>>,
}

impl RecordingSurface {
    pub fn screens(&self) -> Vec<Screen> {
        self.screens.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Screen> {
        self.screens.lock().unwrap().last().cloned()
    }

    /// How many times the main action went from disabled to enabled.
    pub fn enable_transitions(&self) -> usize {
        self.screens
            .lock()
            .unwrap()
            .windows(2)
            .filter(|pair| !pair[0].action_enabled && pair[1].action_enabled)
            .count()
    }
}

impl Surface for RecordingSurface {
    fn show(&self, screen: &Screen) {
        self.screens.lock().unwrap().push(screen.clone());
    }
}
