use std::collections::HashMap;

use eframe::egui::Vec2;

use crate::layout::StyleKind;
use crate::simulation::GuiLayers;
use crate::viewport::{ChunkCoords, LinkKind, MonitoringState, NodeRef, Viewport};

pub(super) struct SceneNode {
    pub(super) node: NodeRef,
    pub(super) name: String,
    pub(super) state: MonitoringState,
    pub(super) world_pos: Vec2,
    pub(super) radius: f32,
    pub(super) highlighted: bool,
    pub(super) free: bool,
    pub(super) style: Option<StyleKind>,
}

pub(super) struct SceneChunk {
    pub(super) id: String,
    pub(super) coords: ChunkCoords,
}

#[derive(Default)]
pub(super) struct SceneSnapshot {
    pub(super) nodes: Vec<SceneNode>,
    pub(super) links: Vec<(usize, usize, LinkKind)>,
    pub(super) chunks: Vec<SceneChunk>,
    pub(super) revision: u64,
    pub(super) refreshes: u64,
}

impl SceneSnapshot {
    pub(super) fn any_highlighted(&self) -> bool {
        self.nodes.iter().any(|node| node.highlighted)
    }
}

impl GuiLayers for SceneSnapshot {
    fn update_gui_of_layers(&mut self, viewport: &Viewport) {
        self.nodes.clear();
        self.links.clear();
        self.chunks.clear();

        let mut index_of = HashMap::with_capacity(viewport.node_count());
        for (node_ref, node) in viewport.iter_nodes() {
            // Nodes still being created have nothing to draw yet.
            let Some(representation) = node.representation else {
                continue;
            };
            index_of.insert(node_ref, self.nodes.len());
            self.nodes.push(SceneNode {
                node: node_ref,
                name: node.name.clone(),
                state: node.state,
                world_pos: node.pos,
                radius: representation.radius,
                highlighted: representation.highlighted,
                free: node.is_free(),
                style: node.current_positioning.style_type,
            });
        }

        self.links.extend(viewport.links().iter().filter_map(|link| {
            Some((
                *index_of.get(&link.source)?,
                *index_of.get(&link.target)?,
                link.kind,
            ))
        }));

        self.chunks.extend(viewport.get_hierarchy_list().iter().map(|chunk| SceneChunk {
            id: chunk.id.clone(),
            coords: chunk.coords,
        }));

        self.revision = viewport.revision();
        self.refreshes += 1;
    }
}
