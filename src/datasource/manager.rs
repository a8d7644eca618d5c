use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transport::{FetchError, FetchResponse, Transport};
use crate::util::format_latency;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    /// BI aggregation trees, refreshed periodically.
    Aggregations,
    /// Network topology, fetched on demand.
    Topology,
}

impl DatasourceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Aggregations => "aggregations",
            Self::Topology => "topology",
        }
    }

    pub fn supports_periodic_updates(self) -> bool {
        matches!(self, Self::Aggregations)
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Self::Aggregations => "ajax_fetch_aggregation_data.py",
            Self::Topology => "ajax_fetch_topology.py",
        }
    }

    pub fn default_interval_secs(self) -> f64 {
        30.0
    }
}

impl fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FetchTarget {
    pub url: String,
    #[serde(default)]
    pub params: Value,
}

impl FetchTarget {
    pub fn new(url: impl Into<String>, params: Value) -> Self {
        Self {
            url: url.into(),
            params,
        }
    }
}

pub type Subscriber = Box<dyn FnMut(DatasourceKind, &Value)>;

pub struct Datasource {
    kind: DatasourceKind,
    instance: u64,
    enabled: bool,
    update_interval: f64,
    last_update: Option<f64>,
    fetch_latency: Option<f64>,
    last_error: Option<String>,
    data: Option<Value>,
    subscribers: Vec<Subscriber>,
    target: Option<FetchTarget>,
    in_flight: usize,
}

impl Datasource {
    fn new(kind: DatasourceKind, instance: u64, target: Option<FetchTarget>) -> Self {
        Self {
            kind,
            instance,
            enabled: true,
            update_interval: kind.default_interval_secs(),
            last_update: None,
            fetch_latency: None,
            last_error: None,
            data: None,
            subscribers: Vec::new(),
            target,
            in_flight: 0,
        }
    }

    pub fn kind(&self) -> DatasourceKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn update_interval(&self) -> f64 {
        self.update_interval
    }

    pub fn last_update(&self) -> Option<f64> {
        self.last_update
    }

    pub fn fetch_latency(&self) -> Option<f64> {
        self.fetch_latency
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn target(&self) -> Option<&FetchTarget> {
        self.target.as_ref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn is_due(&self, now: f64) -> bool {
        self.last_update
            .is_none_or(|last| now - last >= self.update_interval)
    }
}

struct Completion {
    kind: DatasourceKind,
    instance: u64,
    started: f64,
    result: Result<FetchResponse, FetchError>,
}

/// At most one datasource per kind. Fetches run on worker threads and are
/// applied on the owning thread by `process_completions`.
pub struct DatasourceManager {
    datasources: HashMap<DatasourceKind, Datasource>,
    order: Vec<DatasourceKind>,
    transport: Arc<dyn Transport>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    outstanding: usize,
    next_instance: u64,
    scheduler_interval: f64,
    last_schedule: Option<f64>,
}

impl DatasourceManager {
    pub fn new(transport: Arc<dyn Transport>, scheduler_interval: f64) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            datasources: HashMap::new(),
            order: Vec::new(),
            transport,
            tx,
            rx,
            outstanding: 0,
            next_instance: 1,
            scheduler_interval,
            last_schedule: None,
        }
    }

    pub fn get(&self, kind: DatasourceKind) -> Option<&Datasource> {
        self.datasources.get(&kind)
    }

    pub fn kinds(&self) -> &[DatasourceKind] {
        &self.order
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn register(&mut self, kind: DatasourceKind) -> bool {
        self.register_with_target(kind, FetchTarget::new(kind.default_url(), Value::Null))
    }

    /// Insert-if-absent. A second registration never replaces the first; a
    /// differing target is reported and ignored.
    pub fn register_with_target(&mut self, kind: DatasourceKind, target: FetchTarget) -> bool {
        if let Some(existing) = self.datasources.get(&kind) {
            if existing.target.as_ref() != Some(&target) {
                log::warn!(
                    "datasource {kind} is already registered; ignoring new fetch target {}",
                    target.url
                );
            }
            return false;
        }

        let instance = self.next_instance;
        self.next_instance += 1;
        self.datasources
            .insert(kind, Datasource::new(kind, instance, Some(target)));
        self.order.push(kind);
        log::debug!("registered datasource {kind}");
        true
    }

    pub fn unregister(&mut self, kind: DatasourceKind) -> bool {
        self.order.retain(|registered| *registered != kind);
        self.datasources.remove(&kind).is_some()
    }

    pub fn enable(&mut self, kind: DatasourceKind) -> bool {
        self.set_enabled(kind, true)
    }

    pub fn disable(&mut self, kind: DatasourceKind) -> bool {
        self.set_enabled(kind, false)
    }

    fn set_enabled(&mut self, kind: DatasourceKind, enabled: bool) -> bool {
        match self.datasources.get_mut(&kind) {
            Some(datasource) => {
                datasource.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&mut self, kind: DatasourceKind, subscriber: Subscriber) -> bool {
        match self.datasources.get_mut(&kind) {
            Some(datasource) => {
                datasource.subscribers.push(subscriber);
                true
            }
            None => false,
        }
    }

    pub fn set_fetch_target(&mut self, kind: DatasourceKind, url: &str, params: Value) -> bool {
        match self.datasources.get_mut(&kind) {
            Some(datasource) => {
                datasource.target = Some(FetchTarget::new(url, params));
                true
            }
            None => false,
        }
    }

    pub fn clear_fetch_target(&mut self, kind: DatasourceKind) {
        if let Some(datasource) = self.datasources.get_mut(&kind) {
            datasource.target = None;
        }
    }

    pub fn set_update_interval(&mut self, kind: DatasourceKind, seconds: f64) {
        if let Some(datasource) = self.datasources.get_mut(&kind) {
            datasource.update_interval = seconds.max(0.0);
        }
    }

    /// Fixed-interval scheduler hook: runs `schedule(now, false)` at most once
    /// per scheduler interval.
    pub fn run_scheduler(&mut self, now: f64) -> usize {
        let due = self
            .last_schedule
            .is_none_or(|last| now - last >= self.scheduler_interval);
        if !due {
            return 0;
        }
        self.last_schedule = Some(now);
        self.schedule(now, false)
    }

    /// Starts a fetch for every enabled periodic datasource that is due, or
    /// for all of them with `force`. Returns the number of fetches started.
    pub fn schedule(&mut self, now: f64, force: bool) -> usize {
        let due = self
            .order
            .iter()
            .copied()
            .filter(|kind| {
                self.datasources.get(kind).is_some_and(|datasource| {
                    datasource.enabled
                        && kind.supports_periodic_updates()
                        && (force || datasource.is_due(now))
                })
            })
            .collect::<Vec<_>>();

        due.into_iter().filter(|&kind| self.fetch(kind, now)).count()
    }

    /// Hands one request to a worker thread. A datasource without a fetch
    /// target is a no-op.
    pub fn fetch(&mut self, kind: DatasourceKind, now: f64) -> bool {
        let Some(datasource) = self.datasources.get_mut(&kind) else {
            return false;
        };
        let Some(target) = datasource.target.clone() else {
            log::debug!("datasource {kind} has no fetch target");
            return false;
        };

        datasource.in_flight += 1;
        self.outstanding += 1;
        let instance = datasource.instance;
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = transport.fetch(&target.url, &target.params);
            let _ = tx.send(Completion {
                kind,
                instance,
                started: now,
                result,
            });
        });
        true
    }

    /// Applies every response that has arrived, in arrival order. Returns how
    /// many updated a datasource.
    pub fn process_completions(&mut self, now: f64) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.apply(completion, now) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(&mut self, completion: Completion, now: f64) -> bool {
        self.outstanding = self.outstanding.saturating_sub(1);
        let kind = completion.kind;
        let Some(datasource) = self
            .datasources
            .get_mut(&kind)
            .filter(|datasource| datasource.instance == completion.instance)
        else {
            log::debug!("dropping response for destroyed datasource {kind}");
            return false;
        };
        datasource.in_flight = datasource.in_flight.saturating_sub(1);

        match completion.result.and_then(FetchResponse::into_result) {
            Ok(data) => {
                let latency = (now - completion.started).max(0.0);
                datasource.data = Some(data);
                datasource.last_update = Some(now);
                datasource.fetch_latency = Some(latency);
                datasource.last_error = None;
                log::info!("datasource {kind} updated in {}", format_latency(latency));

                if datasource.enabled {
                    if let Some(data) = datasource.data.as_ref() {
                        for subscriber in &mut datasource.subscribers {
                            subscriber(kind, data);
                        }
                    }
                }
                true
            }
            Err(error) => {
                log::warn!("datasource {kind} fetch failed: {error}");
                datasource.last_error = Some(error.to_string());
                false
            }
        }
    }

    #[cfg(test)]
    fn wait_for_in_flight(&mut self, now: f64, timeout: std::time::Duration) -> usize {
        let deadline = std::time::Instant::now() + timeout;
        let mut applied = 0;
        while self.outstanding > 0 {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if self.apply(completion, now) {
                        applied += 1;
                    }
                }
                Err(_) => break,
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    struct CountingTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingTransport {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for CountingTransport {
        fn fetch(&self, url: &str, _params: &Value) -> Result<FetchResponse, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Ok(FetchResponse {
                    result_code: 1,
                    result: json!("backend down"),
                });
            }
            Ok(FetchResponse::ok(json!({"url": url, "call": call})))
        }
    }

    /// Blocks every fetch until the test releases it.
    struct GatedTransport {
        gate: Mutex<Receiver<()>>,
    }

    impl Transport for GatedTransport {
        fn fetch(&self, _url: &str, _params: &Value) -> Result<FetchResponse, FetchError> {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
            Ok(FetchResponse::ok(json!({"late": true})))
        }
    }

    fn manager(transport: Arc<dyn Transport>) -> DatasourceManager {
        let mut manager = DatasourceManager::new(transport, 10.0);
        manager.register(DatasourceKind::Aggregations);
        manager
    }

    #[test]
    fn register_is_insert_if_absent() {
        let mut manager = manager(CountingTransport::new(false));

        assert!(!manager.register(DatasourceKind::Aggregations));
        assert!(!manager.register_with_target(
            DatasourceKind::Aggregations,
            FetchTarget::new("elsewhere.py", Value::Null),
        ));

        let target = manager
            .get(DatasourceKind::Aggregations)
            .and_then(Datasource::target)
            .expect("target");
        assert_eq!(target.url, "ajax_fetch_aggregation_data.py");
        assert_eq!(manager.kinds(), &[DatasourceKind::Aggregations]);
    }

    #[test]
    fn schedule_respects_interval_unless_forced() {
        let transport = CountingTransport::new(false);
        let mut manager = manager(transport.clone());

        assert_eq!(manager.schedule(0.0, false), 1);
        manager.wait_for_in_flight(0.5, WAIT);
        assert_eq!(manager.schedule(10.0, false), 0);
        assert_eq!(manager.schedule(10.0, true), 1);
        manager.wait_for_in_flight(10.0, WAIT);
        assert_eq!(manager.schedule(39.9, false), 0);
        assert_eq!(manager.schedule(40.0, false), 1);
        manager.wait_for_in_flight(40.0, WAIT);

        assert_eq!(transport.calls(), 3);
        let datasource = manager.get(DatasourceKind::Aggregations).expect("registered");
        assert_eq!(datasource.last_update(), Some(40.0));
    }

    #[test]
    fn disabled_datasource_is_never_scheduled() {
        let transport = CountingTransport::new(false);
        let mut manager = manager(transport.clone());
        manager.disable(DatasourceKind::Aggregations);

        assert_eq!(manager.schedule(100.0, false), 0);
        assert_eq!(manager.schedule(100.0, true), 0);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn on_demand_kinds_are_skipped_by_the_scheduler() {
        let transport = CountingTransport::new(false);
        let mut manager = DatasourceManager::new(transport.clone(), 10.0);
        manager.register(DatasourceKind::Topology);

        assert_eq!(manager.schedule(0.0, true), 0);
        assert!(manager.fetch(DatasourceKind::Topology, 0.0));
        manager.wait_for_in_flight(0.0, WAIT);
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn success_updates_cache_and_notifies_subscribers() {
        let mut manager = manager(CountingTransport::new(false));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        manager.subscribe(
            DatasourceKind::Aggregations,
            Box::new(move |kind, data| sink.borrow_mut().push((kind, data.clone()))),
        );

        manager.fetch(DatasourceKind::Aggregations, 1.0);
        assert_eq!(manager.wait_for_in_flight(1.25, WAIT), 1);

        let datasource = manager.get(DatasourceKind::Aggregations).expect("registered");
        assert_eq!(datasource.last_update(), Some(1.25));
        assert_eq!(datasource.fetch_latency(), Some(0.25));
        assert_eq!(datasource.in_flight(), 0);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, DatasourceKind::Aggregations);
        assert_eq!(Some(&seen.borrow()[0].1), datasource.data());
    }

    #[test]
    fn failure_keeps_last_update_so_next_tick_retries() {
        let transport = CountingTransport::new(true);
        let mut manager = manager(transport.clone());
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        manager.subscribe(
            DatasourceKind::Aggregations,
            Box::new(move |_, _| *counter.borrow_mut() += 1),
        );

        assert_eq!(manager.schedule(0.0, false), 1);
        assert_eq!(manager.wait_for_in_flight(0.0, WAIT), 0);
        let datasource = manager.get(DatasourceKind::Aggregations).expect("registered");
        assert_eq!(datasource.last_update(), None);
        assert!(datasource.last_error().is_some_and(|error| error.contains("backend down")));

        assert_eq!(manager.schedule(1.0, false), 1);
        manager.wait_for_in_flight(1.0, WAIT);
        assert_eq!(transport.calls(), 2);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn one_failing_datasource_does_not_block_another() {
        let transport = CountingTransport::new(false);
        let mut manager = manager(transport.clone());
        manager.register(DatasourceKind::Topology);
        manager.clear_fetch_target(DatasourceKind::Aggregations);

        assert!(!manager.fetch(DatasourceKind::Aggregations, 0.0));
        assert!(manager.fetch(DatasourceKind::Topology, 0.0));
        assert_eq!(manager.wait_for_in_flight(0.0, WAIT), 1);
        assert!(
            manager
                .get(DatasourceKind::Topology)
                .is_some_and(|datasource| datasource.data().is_some())
        );
    }

    #[test]
    fn disabled_datasource_stores_response_without_callbacks() {
        let mut manager = manager(CountingTransport::new(false));
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        manager.subscribe(
            DatasourceKind::Aggregations,
            Box::new(move |_, _| *counter.borrow_mut() += 1),
        );

        manager.fetch(DatasourceKind::Aggregations, 0.0);
        manager.disable(DatasourceKind::Aggregations);
        manager.wait_for_in_flight(0.0, WAIT);

        let datasource = manager.get(DatasourceKind::Aggregations).expect("registered");
        assert!(datasource.data().is_some());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn destroyed_datasource_drops_late_response() {
        let (release, gate) = mpsc::channel();
        let transport = Arc::new(GatedTransport {
            gate: Mutex::new(gate),
        });
        let mut manager = manager(transport);

        assert!(manager.fetch(DatasourceKind::Aggregations, 0.0));
        assert!(manager.unregister(DatasourceKind::Aggregations));
        assert!(manager.register(DatasourceKind::Aggregations));
        release.send(()).expect("worker waiting");

        assert_eq!(manager.wait_for_in_flight(1.0, WAIT), 0);
        let datasource = manager.get(DatasourceKind::Aggregations).expect("re-registered");
        assert!(datasource.data().is_none());
        assert_eq!(manager.outstanding(), 0);
    }

    #[test]
    fn scheduler_runs_once_per_interval() {
        let transport = CountingTransport::new(false);
        let mut manager = manager(transport.clone());
        manager.set_update_interval(DatasourceKind::Aggregations, 0.0);

        assert_eq!(manager.run_scheduler(0.0), 1);
        manager.wait_for_in_flight(0.0, WAIT);
        assert_eq!(manager.run_scheduler(5.0), 0);
        assert_eq!(manager.run_scheduler(10.0), 1);
        manager.wait_for_in_flight(10.0, WAIT);
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn retargeted_datasource_fetches_the_new_url() {
        let transport = CountingTransport::new(false);
        let mut manager = manager(transport.clone());

        assert!(manager.set_fetch_target(
            DatasourceKind::Aggregations,
            "ajax_fetch_subset.py",
            json!({"aggr": "web"}),
        ));
        assert!(!manager.set_fetch_target(DatasourceKind::Topology, "nope.py", Value::Null));
        assert!(manager.fetch(DatasourceKind::Aggregations, 0.0));
        manager.wait_for_in_flight(0.0, WAIT);

        let datasource = manager.get(DatasourceKind::Aggregations).expect("registered");
        assert_eq!(
            datasource.target().map(|target| &target.params),
            Some(&json!({"aggr": "web"}))
        );
        assert_eq!(
            datasource.data().map(|data| data["url"].clone()),
            Some(json!("ajax_fetch_subset.py"))
        );
        assert_eq!(transport.calls(), 1);
    }
}
