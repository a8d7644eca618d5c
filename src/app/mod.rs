use std::collections::VecDeque;
use std::time::{Duration, Instant};

use eframe::egui::Context;

use crate::simulation::GuiLayers;
use crate::toolbar::{
    LayoutingPlugin, PluginKind, SearchAggregationsPlugin, Toolbar, ToolbarEvent,
};
use crate::world::{TurnReport, World};

mod graph;
mod render_utils;
mod scene;
mod ui;

use scene::SceneSnapshot;

pub struct NodevisApp {
    world: World,
    toolbar: Toolbar,
    scene: SceneSnapshot,
    started: Instant,
    search: String,
    hovered_entry: Option<usize>,
    context_node: Option<(String, String)>,
    pending_events: Vec<(PluginKind, ToolbarEvent)>,
    pending_toggles: Vec<PluginKind>,
    show_quadtree_overlay: bool,
    show_fps_bar: bool,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
    visible_node_count: usize,
    visible_link_count: usize,
    last_turn: TurnReport,
}

impl NodevisApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, world: World) -> Self {
        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(SearchAggregationsPlugin::new()));
        toolbar.register(Box::new(LayoutingPlugin::new()));
        toolbar.update_toolbar_plugins(&world);

        Self {
            world,
            toolbar,
            scene: SceneSnapshot::default(),
            started: Instant::now(),
            search: String::new(),
            hovered_entry: None,
            context_node: None,
            pending_events: Vec::new(),
            pending_toggles: Vec::new(),
            show_quadtree_overlay: false,
            show_fps_bar: true,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
            visible_node_count: 0,
            visible_link_count: 0,
            last_turn: TurnReport::default(),
        }
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn flush_toolbar_events(&mut self) {
        for kind in std::mem::take(&mut self.pending_toggles) {
            self.toolbar.toggle(kind, &mut self.world);
        }
        for (kind, event) in std::mem::take(&mut self.pending_events) {
            self.toolbar.dispatch(kind, &mut self.world, &event);
        }
    }
}

impl eframe::App for NodevisApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let now = self.now();
        self.update_fps_counter(ctx);

        self.last_turn = self.world.turn(now, &mut self.scene);
        if !self.world.simulation().is_running() {
            self.scene.update_gui_of_layers(self.world.viewport());
        }
        self.toolbar.update_toolbar_plugins(&self.world);

        self.show(ctx, now);
        self.flush_toolbar_events();

        if self.world.simulation().is_running() || self.world.datasources().outstanding() > 0 {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(500));
        }
    }
}
