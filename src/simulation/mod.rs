mod forces;
mod quadtree;

use std::collections::HashMap;
use std::time::Instant;

use eframe::egui::Vec2;

use crate::layout::{ForceKind, LayoutManager};
use crate::util::fallback_direction;
use crate::viewport::{NodeRef, Viewport};
use forces::{ChargeParams, CollisionParams, accumulate_charge_for_node, accumulate_collision_pairs};
use quadtree::{QuadNode, collect_quadtree_cells};
pub use quadtree::QuadtreeCell;

const BARNES_HUT_THETA: f32 = 0.72;
const CHARGE_DISTANCE_MAX: f32 = 800.0;
const COLLISION_STRENGTH: f32 = 0.7;

pub const ALPHA_MIN: f32 = 0.1;
pub const ALPHA_DECAY: f32 = 0.0228;
pub const VELOCITY_DECAY: f32 = 0.4;
pub const RESTART_THRESHOLD: f32 = 0.12;

pub trait GuiLayers {
    fn update_gui_of_layers(&mut self, viewport: &Viewport);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationPhase {
    Idle,
    Running,
    Settling,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderThrottle {
    last_gui_update_ms: f64,
}

impl RenderThrottle {
    pub const BUDGET_MS: f64 = 10.0;

    pub fn should_render(&mut self) -> bool {
        if self.last_gui_update_ms > Self::BUDGET_MS {
            self.last_gui_update_ms -= Self::BUDGET_MS;
            return false;
        }
        true
    }

    pub fn record(&mut self, duration_ms: f64) {
        self.last_gui_update_ms = duration_ms;
    }

    pub fn pending_ms(&self) -> f64 {
        self.last_gui_update_ms
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub rendered: bool,
    pub ended: bool,
    pub retranslated: usize,
}

struct SimNode {
    node: NodeRef,
    charge: f32,
    radius: f32,
    center_strength: f32,
    center_target: Vec2,
}

struct SimLink {
    source: usize,
    target: usize,
    distance: f32,
    strength: f32,
    bias: f32,
}

pub struct ForceSimulation {
    alpha: f32,
    alpha_target: f32,
    running: bool,
    restarts: u64,
    ticks: u64,
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    revision: Option<u64>,
    throttle: RenderThrottle,
}

impl Default for ForceSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceSimulation {
    pub fn new() -> Self {
        Self {
            alpha: 0.0,
            alpha_target: 0.0,
            running: false,
            restarts: 0,
            ticks: 0,
            nodes: Vec::new(),
            links: Vec::new(),
            revision: None,
            throttle: RenderThrottle::default(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn restart_count(&self) -> u64 {
        self.restarts
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn phase(&self) -> SimulationPhase {
        if !self.running {
            SimulationPhase::Idle
        } else if self.alpha >= RESTART_THRESHOLD {
            SimulationPhase::Running
        } else {
            SimulationPhase::Settling
        }
    }

    pub fn restart(&mut self) {
        self.running = true;
        self.restarts += 1;
    }

    pub fn restart_with_alpha(&mut self, alpha: f32) {
        if self.alpha < RESTART_THRESHOLD {
            self.restart();
        }
        self.alpha = alpha;
    }

    pub fn update_nodes_and_links(&mut self, viewport: &Viewport, layout: &LayoutManager) {
        let mut index_of = HashMap::new();
        self.nodes = viewport
            .iter_nodes()
            .enumerate()
            .map(|(position, (node_ref, node))| {
                index_of.insert(node_ref, position);
                let center = layout.force_contribution(viewport, node_ref, ForceKind::Center);
                let divisor = if node.parent.is_some() { 300.0 } else { 100.0 };
                SimNode {
                    node: node_ref,
                    charge: layout.force_contribution(viewport, node_ref, ForceKind::Charge),
                    radius: layout.force_contribution(viewport, node_ref, ForceKind::Collide),
                    center_strength: center / divisor,
                    center_target: viewport
                        .chunk_coords_of(node_ref)
                        .map_or(Vec2::ZERO, |coords| coords.center()),
                }
            })
            .collect();

        let mut degree = vec![0usize; self.nodes.len()];
        let endpoints = viewport
            .links()
            .iter()
            .filter_map(|link| {
                let source = *index_of.get(&link.source)?;
                let target = *index_of.get(&link.target)?;
                degree[source] += 1;
                degree[target] += 1;
                Some((link.source, source, target))
            })
            .collect::<Vec<_>>();

        self.links = endpoints
            .into_iter()
            .map(|(source_ref, source, target)| SimLink {
                source,
                target,
                distance: layout.force_contribution(viewport, source_ref, ForceKind::LinkDistance),
                strength: layout.force_contribution(viewport, source_ref, ForceKind::LinkStrength)
                    / 100.0,
                bias: degree[source] as f32 / (degree[source] + degree[target]) as f32,
            })
            .collect();

        self.revision = Some(viewport.revision());
        log::debug!(
            "simulation working set: {} nodes, {} links",
            self.nodes.len(),
            self.links.len()
        );
    }

    pub fn tick(
        &mut self,
        viewport: &mut Viewport,
        layout: &mut LayoutManager,
        gui: &mut dyn GuiLayers,
    ) -> TickOutcome {
        if !self.running {
            return TickOutcome::default();
        }

        if self.revision != Some(viewport.revision()) {
            log::debug!(
                "viewport revision {} is newer than the simulation's, resyncing",
                viewport.revision()
            );
            self.update_nodes_and_links(viewport, layout);
        }

        self.alpha += (self.alpha_target - self.alpha) * ALPHA_DECAY;
        self.ticks += 1;

        let retranslated = layout.enforce_free_float_styles_retranslation(viewport);
        self.apply_forces(viewport);

        let ended = self.alpha < ALPHA_MIN;
        if ended {
            self.running = false;
            log::debug!("simulation settled after {} ticks", self.ticks);
        }

        let rendered = ended || self.throttle.should_render();
        if rendered {
            let started = Instant::now();
            gui.update_gui_of_layers(viewport);
            self.throttle.record(started.elapsed().as_secs_f64() * 1000.0);
        }

        TickOutcome {
            rendered,
            ended,
            retranslated,
        }
    }

    pub fn quadtree_cells(&self, viewport: &Viewport) -> Vec<QuadtreeCell> {
        let positions = viewport
            .iter_nodes()
            .map(|(_, node)| node.pos)
            .collect::<Vec<_>>();
        let charges = vec![0.0; positions.len()];
        let mut cells = Vec::new();
        if let Some(tree) = QuadNode::build(&positions, &charges) {
            collect_quadtree_cells(&tree, 0, &mut cells);
        }
        cells
    }

    fn apply_forces(&mut self, viewport: &mut Viewport) {
        let count = self.nodes.len();
        if count == 0 {
            return;
        }

        let mut positions = Vec::with_capacity(count);
        let mut velocities = Vec::with_capacity(count);
        let mut present = Vec::with_capacity(count);
        for sim_node in &self.nodes {
            let node = viewport.node(sim_node.node);
            positions.push(node.map_or(Vec2::ZERO, |node| node.pos));
            velocities.push(node.map_or(Vec2::ZERO, |node| node.velocity));
            present.push(node.is_some_and(|node| node.representation.is_some()));
        }

        let alpha = self.alpha;
        let charges = self
            .nodes
            .iter()
            .zip(&present)
            .map(|(node, &present)| if present { node.charge } else { 0.0 })
            .collect::<Vec<_>>();
        let radii = self
            .nodes
            .iter()
            .zip(&present)
            .map(|(node, &present)| if present { node.radius.max(0.0) } else { 0.0 })
            .collect::<Vec<_>>();

        let mut deltas = vec![Vec2::ZERO; count];
        if let Some(tree) = QuadNode::build(&positions, &charges) {
            let params = ChargeParams {
                alpha,
                theta: BARNES_HUT_THETA,
                distance_max_sq: CHARGE_DISTANCE_MAX * CHARGE_DISTANCE_MAX,
            };
            for (index, delta) in deltas.iter_mut().enumerate() {
                accumulate_charge_for_node(&tree, index, &positions, &charges, params, delta);
            }

            let max_radius = radii.iter().copied().fold(0.0_f32, f32::max);
            if max_radius > 0.0 {
                let reach = max_radius * 2.0;
                accumulate_collision_pairs(
                    &tree,
                    &tree,
                    true,
                    &positions,
                    &radii,
                    CollisionParams {
                        strength: COLLISION_STRENGTH,
                        max_collision_distance_sq: reach * reach,
                    },
                    &mut deltas,
                );
            }
        }

        for (index, sim_node) in self.nodes.iter().enumerate() {
            if present[index] {
                deltas[index] +=
                    (sim_node.center_target - positions[index]) * sim_node.center_strength * alpha;
            }
        }

        for link in &self.links {
            if !present[link.source] || !present[link.target] || link.source == link.target {
                continue;
            }
            let predicted_source = positions[link.source] + velocities[link.source] + deltas[link.source];
            let predicted_target = positions[link.target] + velocities[link.target] + deltas[link.target];
            let mut delta = predicted_target - predicted_source;
            if delta.length_sq() < 1e-6 {
                delta = fallback_direction(link.source, link.target) * 1e-3;
            }
            let distance = delta.length();
            let pull = delta * ((distance - link.distance) / distance * alpha * link.strength);
            deltas[link.target] -= pull * link.bias;
            deltas[link.source] += pull * (1.0 - link.bias);
        }

        for (index, sim_node) in self.nodes.iter().enumerate() {
            let Some(node) = viewport.node_mut(sim_node.node) else {
                continue;
            };
            if !node.is_free() {
                continue;
            }
            let velocity = (velocities[index] + deltas[index]) * (1.0 - VELOCITY_DECAY);
            node.velocity = velocity;
            node.pos += velocity;
        }
    }
}
