mod chunk;
mod data;
mod node;

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};

pub use chunk::{Chunk, ChunkCoords};
#[cfg(test)]
pub(crate) use data::fixtures;
pub use data::{ChunkData, CrossLinkData, GraphPayload};
pub use node::{
    CurrentPositioning, MonitoringState, Node, NodeRef, PositioningEntry, Representation,
    StyleBinding,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Hierarchy,
    Declared,
    Cross,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub source: NodeRef,
    pub target: NodeRef,
    pub kind: LinkKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub pan: Vec2,
    pub zoom: f32,
}

impl Camera {
    pub const MIN_ZOOM: f32 = 0.05;
    pub const MAX_ZOOM: f32 = 6.0;

    pub fn center_on(&mut self, world: Vec2) {
        self.pan = -world * self.zoom;
    }

    pub fn focus(&self) -> Vec2 {
        -self.pan / self.zoom
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

pub struct Viewport {
    chunks: Vec<Chunk>,
    cross_links: Vec<CrossLinkData>,
    links: Vec<Link>,
    size: Vec2,
    pub camera: Camera,
    revision: u64,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        let size = vec2(width.max(1.0), height.max(1.0));
        let mut camera = Camera::default();
        camera.center_on(size / 2.0);
        Self {
            chunks: Vec::new(),
            cross_links: Vec::new(),
            links: Vec::new(),
            size,
            camera,
            revision: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }

    pub fn get_hierarchy_list(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_index(&self, chunk_id: &str) -> Option<usize> {
        self.chunks.iter().position(|chunk| chunk.id == chunk_id)
    }

    pub fn get_all_nodes(&self) -> Vec<NodeRef> {
        self.iter_nodes().map(|(node_ref, _)| node_ref).collect()
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .flat_map(|(chunk_index, chunk)| {
                chunk.nodes.iter().enumerate().map(move |(index, node)| {
                    (
                        NodeRef {
                            chunk: chunk_index,
                            index,
                        },
                        node,
                    )
                })
            })
    }

    pub fn iter_nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.chunks.iter_mut().flat_map(|chunk| chunk.nodes.iter_mut())
    }

    pub fn node_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.nodes.len()).sum()
    }

    pub fn node(&self, node_ref: NodeRef) -> Option<&Node> {
        self.chunks
            .get(node_ref.chunk)
            .and_then(|chunk| chunk.nodes.get(node_ref.index))
    }

    pub fn node_mut(&mut self, node_ref: NodeRef) -> Option<&mut Node> {
        self.chunks
            .get_mut(node_ref.chunk)
            .and_then(|chunk| chunk.nodes.get_mut(node_ref.index))
    }

    pub fn find_node(&self, chunk_id: &str, node_id: &str) -> Option<NodeRef> {
        let chunk = self.chunk_index(chunk_id)?;
        let index = self.chunks[chunk].node_index(node_id)?;
        Some(NodeRef { chunk, index })
    }

    pub fn chunk_coords_of(&self, node_ref: NodeRef) -> Option<ChunkCoords> {
        self.chunks.get(node_ref.chunk).map(|chunk| chunk.coords)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn ancestors(&self, node_ref: NodeRef) -> Vec<NodeRef> {
        self.chunks
            .get(node_ref.chunk)
            .map(|chunk| {
                chunk
                    .ancestors(node_ref.index)
                    .into_iter()
                    .map(|index| NodeRef {
                        chunk: node_ref.chunk,
                        index,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn descendants(&self, node_ref: NodeRef) -> Vec<NodeRef> {
        self.chunks
            .get(node_ref.chunk)
            .map(|chunk| {
                chunk
                    .descendants(node_ref.index)
                    .into_iter()
                    .map(|index| NodeRef {
                        chunk: node_ref.chunk,
                        index,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn children(&self, node_ref: NodeRef) -> Vec<NodeRef> {
        self.node(node_ref)
            .map(|node| {
                node.children
                    .iter()
                    .map(|&index| NodeRef {
                        chunk: node_ref.chunk,
                        index,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn update_chunks(&mut self, payload: GraphPayload) {
        let prior_by_id = self
            .chunks
            .iter()
            .map(|chunk| (chunk.id.as_str(), chunk))
            .collect::<HashMap<_, _>>();

        let next = payload
            .chunks
            .into_iter()
            .map(|data| {
                let prior = prior_by_id.get(data.id.as_str()).copied();
                let coords = prior.map(|chunk| chunk.coords).unwrap_or_default();
                Chunk::build(data, prior, coords)
            })
            .collect::<Vec<_>>();

        self.chunks = next;
        self.cross_links = payload.links;
        self.structure_changed();
    }

    pub fn replace_chunk(&mut self, data: ChunkData) {
        match self.chunk_index(&data.id) {
            Some(index) => {
                let rebuilt = Chunk::build(data, Some(&self.chunks[index]), self.chunks[index].coords);
                self.chunks[index] = rebuilt;
            }
            None => {
                let built = Chunk::build(data, None, ChunkCoords::default());
                self.chunks.push(built);
            }
        }
        self.structure_changed();
    }

    pub fn remove_chunk(&mut self, chunk_id: &str) -> bool {
        let Some(index) = self.chunk_index(chunk_id) else {
            return false;
        };
        self.chunks.remove(index);
        self.structure_changed();
        true
    }

    pub fn set_size(&mut self, width: f32, height: f32) -> bool {
        let size = vec2(width.max(1.0), height.max(1.0));
        if (size - self.size).length_sq() < 1.0 {
            return false;
        }
        self.size = size;
        self.arrange_chunks();
        true
    }

    pub fn arrange_chunks(&mut self) {
        let count = self.chunks.len();
        if count == 0 {
            return;
        }

        let columns = (count as f32).sqrt().ceil().max(1.0) as usize;
        let rows = count.div_ceil(columns);
        let cell_width = self.size.x / columns as f32;
        let cell_height = self.size.y / rows as f32;

        for (index, chunk) in self.chunks.iter_mut().enumerate() {
            chunk.coords = ChunkCoords {
                x: (index % columns) as f32 * cell_width,
                y: (index / columns) as f32 * cell_height,
                width: cell_width,
                height: cell_height,
            };
        }
    }

    pub fn zoom_to_node(&mut self, node_ref: NodeRef) -> bool {
        let Some(pos) = self.node(node_ref).map(|node| node.pos) else {
            return false;
        };
        self.camera.center_on(pos);
        true
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        let focus = self.camera.focus();
        self.camera.zoom = zoom.clamp(Camera::MIN_ZOOM, Camera::MAX_ZOOM);
        self.camera.center_on(focus);
    }

    pub fn set_node_highlight(&mut self, node_ref: NodeRef, highlighted: bool) -> bool {
        match self
            .node_mut(node_ref)
            .and_then(|node| node.representation.as_mut())
        {
            Some(representation) => {
                representation.highlighted = highlighted;
                true
            }
            None => false,
        }
    }

    pub fn clear_highlights(&mut self) {
        for chunk in &mut self.chunks {
            for node in &mut chunk.nodes {
                if let Some(representation) = node.representation.as_mut() {
                    representation.highlighted = false;
                }
            }
        }
    }

    pub fn ensure_representations(&mut self) -> usize {
        let mut created = 0;
        for chunk in &mut self.chunks {
            for node in &mut chunk.nodes {
                if node.representation.is_none() {
                    node.representation = Some(Representation {
                        radius: node.default_radius(),
                        highlighted: false,
                    });
                    created += 1;
                }
            }
        }
        created
    }

    fn structure_changed(&mut self) {
        self.arrange_chunks();
        self.rebuild_links();
        self.revision = self.revision.wrapping_add(1);
    }

    fn rebuild_links(&mut self) {
        let mut links = Vec::new();
        for (chunk_index, chunk) in self.chunks.iter().enumerate() {
            for &(source, target) in &chunk.links {
                let kind = if chunk.nodes[target].parent == Some(source) {
                    LinkKind::Hierarchy
                } else {
                    LinkKind::Declared
                };
                links.push(Link {
                    source: NodeRef {
                        chunk: chunk_index,
                        index: source,
                    },
                    target: NodeRef {
                        chunk: chunk_index,
                        index: target,
                    },
                    kind,
                });
            }
        }

        for cross in &self.cross_links {
            let source = self.resolve_link_end(cross.source_chunk.as_deref(), &cross.source);
            let target = self.resolve_link_end(cross.target_chunk.as_deref(), &cross.target);
            match (source, target) {
                (Some(source), Some(target)) if source != target => links.push(Link {
                    source,
                    target,
                    kind: LinkKind::Cross,
                }),
                _ => log::debug!(
                    "dropping cross link {} -> {} with unknown endpoint",
                    cross.source,
                    cross.target
                ),
            }
        }

        self.links = links;
    }

    fn resolve_link_end(&self, chunk_id: Option<&str>, node_id: &str) -> Option<NodeRef> {
        match chunk_id {
            Some(chunk_id) => self.find_node(chunk_id, node_id),
            None => self.chunks.iter().enumerate().find_map(|(chunk, data)| {
                data.node_index(node_id).map(|index| NodeRef { chunk, index })
            }),
        }
    }
}
