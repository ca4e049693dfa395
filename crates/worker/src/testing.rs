//! In-process fakes for controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use minaret_client::Network;
use minaret_core::{AppConfig, Error, MemoryStorage, Request, Response};
use serde_json::json;
use tokio::sync::Notify;

use crate::controller::{CacheController, Deps};
use crate::notify::{Clients, Notification, Notifier, WindowClient};
use crate::scheduler::{Scheduler, Task, TaskHandle};

const ROOT_BODY: &str = "<!doctype html><title>Minaret</title><div id=\"root\"></div>";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        cache_version: "v2".into(),
        precache_urls: vec!["/".into(), "/static/js/main.js".into(), "/manifest.json".into()],
        ..AppConfig::default()
    }
}

/// Network that answers from a route table. Unrouted URLs get a 404.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeNetwork {
    /// Routes every precache asset of `config` to a 200.
    pub(crate) fn serving(config: &AppConfig) -> Self {
        let network = Self::default();
        for path in &config.precache_urls {
            let url = format!("{}{}", config.origin.trim_end_matches('/'), path);
            let body = if path == "/" { Bytes::from_static(ROOT_BODY.as_bytes()) } else { Bytes::from(format!("asset {path}")) };
            network.route(&url, Response::new(200, body));
        }
        network
    }

    pub(crate) fn route(&self, url: &str, response: Response) {
        lock(&self.routes).insert(url.to_string(), response);
    }

    pub(crate) fn fail(&self, url: &str) {
        lock(&self.failing).insert(url.to_string());
    }

    /// Requests for `url` wait until the returned gate is notified.
    pub(crate) fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).insert(url.to_string(), gate.clone());
        gate
    }

    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.gates).get(&request.url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.offline.load(Ordering::SeqCst) || lock(&self.failing).contains(&request.url) {
            return Err(Error::Network(format!("connection refused: {}", request.url)));
        }
        Ok(lock(&self.routes)
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
    closed: Mutex<Vec<String>>,
    fail_next: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub(crate) fn shown(&self) -> Vec<Notification> {
        lock(&self.shown).clone()
    }

    pub(crate) fn closed(&self) -> Vec<String> {
        lock(&self.closed).clone()
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Notification("permission denied".into()));
        }
        lock(&self.shown).push(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), Error> {
        lock(&self.closed).push(tag.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeClients {
    windows: Mutex<Vec<WindowClient>>,
    claimed: AtomicUsize,
    close_on_focus: AtomicBool,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl FakeClients {
    /// Total windows claimed so far.
    pub(crate) fn claimed(&self) -> usize {
        self.claimed.load(Ordering::SeqCst)
    }

    pub(crate) fn focused(&self) -> Vec<String> {
        lock(&self.focused).clone()
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }

    pub(crate) fn all(&self) -> Vec<WindowClient> {
        lock(&self.windows).clone()
    }

    /// The next focused window closes before it can be focused.
    pub(crate) fn close_on_next_focus(&self) {
        self.close_on_focus.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clients for FakeClients {
    async fn register(&self, client: WindowClient) -> Result<(), Error> {
        let mut windows = lock(&self.windows);
        windows.retain(|w| w.id != client.id);
        windows.push(client);
        Ok(())
    }

    async fn unregister(&self, id: &str) -> Result<bool, Error> {
        let mut windows = lock(&self.windows);
        let before = windows.len();
        windows.retain(|w| w.id != id);
        Ok(windows.len() != before)
    }

    async fn match_all(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.all())
    }

    async fn claim(&self) -> Result<usize, Error> {
        let count = lock(&self.windows).len();
        self.claimed.fetch_add(count, Ordering::SeqCst);
        Ok(count)
    }

    async fn focus(&self, id: &str) -> Result<(), Error> {
        if self.close_on_focus.swap(false, Ordering::SeqCst) {
            lock(&self.windows).retain(|w| w.id != id);
        }
        if !lock(&self.windows).iter().any(|w| w.id == id) {
            return Err(Error::InvalidInput(format!("unknown client {id}")));
        }
        lock(&self.focused).push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        lock(&self.opened).push(url.to_string());
        Ok(())
    }
}

struct Scheduled {
    delay: Duration,
    cancelled: Arc<AtomicBool>,
    task: Option<Task>,
}

/// Scheduler whose tasks only run when the test says so.
#[derive(Default)]
pub(crate) struct ManualScheduler {
    scheduled: Mutex<Vec<Scheduled>>,
}

impl ManualScheduler {
    pub(crate) fn len(&self) -> usize {
        lock(&self.scheduled).len()
    }

    pub(crate) fn delays(&self) -> Vec<Duration> {
        lock(&self.scheduled).iter().map(|s| s.delay).collect()
    }

    /// Run every task that has not been cancelled, as if its delay elapsed.
    pub(crate) async fn run_all(&self) {
        let ready: Vec<Task> = lock(&self.scheduled)
            .iter_mut()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .filter_map(|s| s.task.take())
            .collect();
        for task in ready {
            task.await;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        lock(&self.scheduled).push(Scheduled { delay, cancelled: cancelled.clone(), task: Some(task) });
        TaskHandle::new(cancelled, None)
    }
}

/// A controller wired to fakes, plus handles on each fake.
pub(crate) struct Harness {
    pub controller: CacheController,
    pub storage: Arc<MemoryStorage>,
    pub network: Arc<FakeNetwork>,
    pub notifier: Arc<RecordingNotifier>,
    pub clients: Arc<FakeClients>,
    pub scheduler: Arc<ManualScheduler>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let config = test_config();
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::serving(&config));
        let notifier = Arc::new(RecordingNotifier::default());
        let clients = Arc::new(FakeClients::default());
        let scheduler = Arc::new(ManualScheduler::default());

        let deps = Deps {
            storage: storage.clone(),
            network: network.clone(),
            notifier: notifier.clone(),
            clients: clients.clone(),
            scheduler: scheduler.clone(),
        };
        let controller = CacheController::new(config, deps).unwrap();

        Self { controller, storage, network, notifier, clients, scheduler }
    }

    pub(crate) fn deps(&self) -> Deps {
        self.controller.deps.clone()
    }

    /// Absolute URLs of every precached asset.
    pub(crate) fn manifest(&self) -> Vec<String> {
        let origin = self.controller.config().origin.trim_end_matches('/').to_string();
        self.controller.config().precache_urls.iter().map(|p| format!("{origin}{p}")).collect()
    }

    pub(crate) fn root_body(&self) -> Bytes {
        Bytes::from_static(ROOT_BODY.as_bytes())
    }

    pub(crate) async fn install_and_activate(&self) {
        self.controller.install().await.unwrap();
        self.controller.activate().await.unwrap();
    }

    /// A fresh controller over the same storage and fakes, as after a
    /// process restart.
    pub(crate) fn restart(&self) -> CacheController {
        CacheController::new(self.controller.config().clone(), self.deps()).unwrap()
    }

    pub(crate) async fn open_client(&self, id: &str, url: &str) {
        self.clients.register(WindowClient { id: id.into(), url: url.into() }).await.unwrap();
    }

    pub(crate) fn sample_notification(&self, tag: &str) -> Notification {
        let mut n = Notification::default_reminder(tag.into(), self.controller.config());
        n.title = "Asr".into();
        n.body = "Asr begins in 10 minutes".into();
        n.data = json!({"prayer": "asr"});
        n
    }
}
