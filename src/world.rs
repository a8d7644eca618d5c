use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::datasource::{DatasourceKind, DatasourceManager, Transport, parse_graph_payload};
use crate::layout::{LayoutManager, StyleKind};
use crate::simulation::{ForceSimulation, GuiLayers, TickOutcome};
use crate::viewport::{NodeRef, Viewport};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub swapped: bool,
    pub completions: usize,
    pub fetches: usize,
    pub tick: TickOutcome,
}

/// Owns every engine component and advances them one cooperative turn at a
/// time. Datasource payloads are queued by subscribers and swapped in at the
/// start of the next turn, never while the solver iterates.
pub struct World {
    config: EngineConfig,
    viewport: Viewport,
    layout: LayoutManager,
    simulation: ForceSimulation,
    datasources: DatasourceManager,
    pending: Rc<RefCell<VecDeque<Value>>>,
}

impl World {
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>, size: [f32; 2]) -> Self {
        let layout = LayoutManager::new(config.default_style, config.force);
        let datasources = DatasourceManager::new(transport, config.scheduler_interval);
        Self {
            viewport: Viewport::new(size[0], size[1]),
            layout,
            simulation: ForceSimulation::new(),
            datasources,
            pending: Rc::new(RefCell::new(VecDeque::new())),
            config,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }

    pub fn simulation(&self) -> &ForceSimulation {
        &self.simulation
    }

    pub fn datasources(&self) -> &DatasourceManager {
        &self.datasources
    }

    pub fn datasources_mut(&mut self) -> &mut DatasourceManager {
        &mut self.datasources
    }

    pub fn pending_swaps(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn add_datasource(&mut self, kind: DatasourceKind) -> bool {
        if !self.datasources.register(kind) {
            return false;
        }
        self.datasources
            .set_update_interval(kind, self.config.update_interval(kind));
        if let Some(target) = self.config.fetch_targets.get(&kind) {
            self.datasources
                .set_fetch_target(kind, &target.url, target.params.clone());
        }
        let pending = Rc::clone(&self.pending);
        self.datasources.subscribe(
            kind,
            Box::new(move |_, data| pending.borrow_mut().push_back(data.clone())),
        );
        true
    }

    pub fn request(&mut self, kind: DatasourceKind, now: f64) -> bool {
        self.datasources.fetch(kind, now)
    }

    pub fn queue_payload(&self, payload: Value) {
        self.pending.borrow_mut().push_back(payload);
    }

    /// Swaps queued payloads, drains finished fetches, runs the datasource
    /// scheduler, then advances the simulation by one tick.
    pub fn turn(&mut self, now: f64, gui: &mut dyn GuiLayers) -> TurnReport {
        let swapped = self.apply_pending_swaps();
        let completions = self.datasources.process_completions(now);
        let fetches = self.datasources.run_scheduler(now);
        let tick = self
            .simulation
            .tick(&mut self.viewport, &mut self.layout, gui);
        TurnReport {
            swapped,
            completions,
            fetches,
            tick,
        }
    }

    fn apply_pending_swaps(&mut self) -> bool {
        // Only the newest payload matters; older ones would be replaced anyway.
        let Some(latest) = self.pending.borrow_mut().drain(..).last() else {
            return false;
        };

        let payload = match parse_graph_payload(&latest) {
            Ok(payload) => payload,
            Err(error) => {
                log::warn!("keeping current graph, payload rejected: {error:#}");
                return false;
            }
        };

        self.viewport.update_chunks(payload);
        self.viewport.ensure_representations();
        self.relayout();
        true
    }

    pub fn relayout(&mut self) {
        self.layout.apply_current_layout(&mut self.viewport);
        self.simulation
            .update_nodes_and_links(&self.viewport, &self.layout);
        self.simulation.restart_with_alpha(self.config.restart_alpha);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if self.viewport.set_size(width, height) {
            self.relayout();
        }
    }

    pub fn convert_all(&mut self, kind: Option<StyleKind>) {
        self.layout.convert_all(&mut self.viewport, kind);
        self.simulation
            .update_nodes_and_links(&self.viewport, &self.layout);
        self.simulation.restart_with_alpha(self.config.restart_alpha);
    }

    pub fn convert_node(&mut self, node: NodeRef, kind: Option<StyleKind>) -> bool {
        if !self.layout.convert_node(&mut self.viewport, node, kind) {
            return false;
        }
        self.simulation
            .update_nodes_and_links(&self.viewport, &self.layout);
        self.simulation.restart_with_alpha(self.config.restart_alpha);
        true
    }

    pub fn remove_datasource(&mut self, kind: DatasourceKind) -> bool {
        self.datasources.unregister(kind)
    }

    /// Drops one chunk from the current graph until the next payload brings
    /// it back.
    pub fn hide_chunk(&mut self, chunk_id: &str) -> bool {
        if !self.viewport.remove_chunk(chunk_id) {
            return false;
        }
        self.relayout();
        true
    }

    /// Highlights the subtree under `node`, clearing any earlier highlight.
    pub fn highlight_subtree(&mut self, node: NodeRef) -> usize {
        self.viewport.clear_highlights();
        self.viewport
            .descendants(node)
            .into_iter()
            .filter(|&member| self.viewport.set_node_highlight(member, true))
            .count()
    }

    pub fn set_default_style(&mut self, kind: StyleKind) {
        self.layout.set_default_style(kind);
        self.relayout();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use serde_json::json;

    use super::*;
    use crate::datasource::{FetchError, FetchResponse, FetchTarget};

    struct StaticTransport(Value);

    impl Transport for StaticTransport {
        fn fetch(&self, _url: &str, _params: &Value) -> Result<FetchResponse, FetchError> {
            Ok(FetchResponse::ok(self.0.clone()))
        }
    }

    #[derive(Default)]
    struct CountingGui {
        refreshes: usize,
    }

    impl GuiLayers for CountingGui {
        fn update_gui_of_layers(&mut self, _viewport: &Viewport) {
            self.refreshes += 1;
        }
    }

    fn payload(chunk_id: &str) -> Value {
        json!({
            "chunks": [{
                "id": chunk_id,
                "hierarchy": {
                    "id": "root",
                    "children": [{"id": "host-a"}, {"id": "host-b", "state": 2}]
                }
            }]
        })
    }

    fn world(transport_payload: Value) -> World {
        World::new(
            EngineConfig::default(),
            Arc::new(StaticTransport(transport_payload)),
            [800.0, 600.0],
        )
    }

    #[test]
    fn queued_payload_is_swapped_before_the_tick() {
        let mut world = world(Value::Null);
        let mut gui = CountingGui::default();
        world.queue_payload(payload("first"));
        world.queue_payload(payload("second"));

        let report = world.turn(0.0, &mut gui);

        assert!(report.swapped);
        assert_eq!(world.pending_swaps(), 0);
        assert_eq!(world.viewport().get_hierarchy_list().len(), 1);
        assert_eq!(world.viewport().get_hierarchy_list()[0].id, "second");
        assert_eq!(world.simulation().node_count(), 3);
        assert!(world.simulation().is_running());
        assert_eq!(world.simulation().tick_count(), 1);
    }

    #[test]
    fn rejected_payload_keeps_the_current_graph() {
        let mut world = world(Value::Null);
        let mut gui = CountingGui::default();
        world.queue_payload(payload("bi"));
        world.turn(0.0, &mut gui);
        let revision = world.viewport().revision();

        world.queue_payload(json!(["not", "a", "graph"]));
        let report = world.turn(0.1, &mut gui);

        assert!(!report.swapped);
        assert_eq!(world.viewport().revision(), revision);
        assert_eq!(world.viewport().node_count(), 3);
    }

    #[test]
    fn fetched_payload_reaches_the_viewport() {
        let mut world = world(payload("bi"));
        let mut gui = CountingGui::default();
        assert!(world.add_datasource(DatasourceKind::Aggregations));
        assert!(!world.add_datasource(DatasourceKind::Aggregations));

        let first = world.turn(0.0, &mut gui);
        assert_eq!(first.fetches, 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while world.viewport().node_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            world.turn(0.5, &mut gui);
        }

        assert_eq!(world.viewport().node_count(), 3);
        assert!(
            world
                .viewport()
                .find_node("bi", "host-b")
                .is_some()
        );
    }

    #[test]
    fn converting_all_to_force_frees_every_node() {
        let mut world = world(Value::Null);
        let mut gui = CountingGui::default();
        world.queue_payload(payload("bi"));
        world.turn(0.0, &mut gui);

        world.convert_all(None);

        assert!(
            world
                .viewport()
                .iter_nodes()
                .all(|(_, node)| node.is_free())
        );
        assert!(world.simulation().is_running());
    }

    #[test]
    fn subtree_highlight_replaces_the_previous_one() {
        let mut world = world(Value::Null);
        let mut gui = CountingGui::default();
        world.queue_payload(payload("bi"));
        world.turn(0.0, &mut gui);
        let root = world.viewport().find_node("bi", "root").expect("root exists");
        let leaf = world.viewport().find_node("bi", "host-a").expect("leaf exists");

        assert_eq!(world.highlight_subtree(root), 3);
        assert_eq!(world.highlight_subtree(leaf), 1);

        let highlighted = world
            .viewport()
            .iter_nodes()
            .filter(|(_, node)| node.representation.is_some_and(|r| r.highlighted))
            .map(|(node_ref, _)| node_ref)
            .collect::<Vec<_>>();
        assert_eq!(highlighted, vec![leaf]);
    }

    #[test]
    fn hidden_chunk_leaves_the_solver() {
        let mut world = world(Value::Null);
        let mut gui = CountingGui::default();
        world.queue_payload(json!({
            "chunks": [
                {"id": "one", "hierarchy": {"id": "r1", "children": [{"id": "a"}]}},
                {"id": "two", "hierarchy": {"id": "r2"}}
            ]
        }));
        world.turn(0.0, &mut gui);

        assert!(world.hide_chunk("one"));
        assert!(!world.hide_chunk("one"));
        assert_eq!(world.viewport().node_count(), 1);
        assert_eq!(world.simulation().node_count(), 1);
    }

    #[test]
    fn removed_datasource_is_no_longer_scheduled() {
        let mut world = world(payload("bi"));
        world.add_datasource(DatasourceKind::Aggregations);

        assert!(world.remove_datasource(DatasourceKind::Aggregations));
        assert!(!world.remove_datasource(DatasourceKind::Aggregations));
        assert!(world.datasources().kinds().is_empty());
    }

    #[test]
    fn configured_fetch_target_replaces_the_default() {
        let mut config = EngineConfig::default();
        config.fetch_targets.insert(
            DatasourceKind::Aggregations,
            FetchTarget::new("bi_subset.py", json!({"aggr": "web"})),
        );
        let mut world = World::new(config, Arc::new(StaticTransport(Value::Null)), [800.0, 600.0]);

        world.add_datasource(DatasourceKind::Aggregations);
        world.add_datasource(DatasourceKind::Topology);

        let target = |kind| {
            world
                .datasources()
                .get(kind)
                .and_then(|datasource| datasource.target())
                .map(|target| target.url.clone())
        };
        assert_eq!(target(DatasourceKind::Aggregations).as_deref(), Some("bi_subset.py"));
        assert_eq!(
            target(DatasourceKind::Topology).as_deref(),
            Some(DatasourceKind::Topology.default_url())
        );
    }
}
