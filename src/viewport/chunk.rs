use std::collections::{BTreeMap, HashMap};

use eframe::egui::{Vec2, vec2};

use crate::layout::StyleKind;
use crate::util::stable_pair;

use super::data::{ChunkData, NodeData};
use super::node::{CurrentPositioning, MonitoringState, Node};

const SPAWN_JITTER: f32 = 24.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChunkCoords {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ChunkCoords {
    pub fn center(&self) -> Vec2 {
        vec2(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn point_at_percent(&self, percent: Vec2) -> Vec2 {
        vec2(
            self.x + (percent.x / 100.0) * self.width,
            self.y + (percent.y / 100.0) * self.height,
        )
    }
}

#[derive(Clone, Debug)]
pub struct Chunk {
    pub id: String,
    pub coords: ChunkCoords,
    pub nodes: Vec<Node>,
    pub links: Vec<(usize, usize)>,
    pub layout: Option<StyleKind>,
    index_by_id: HashMap<String, usize>,
}

impl Chunk {
    pub(super) fn build(data: ChunkData, prior: Option<&Chunk>, coords: ChunkCoords) -> Self {
        let mut nodes: Vec<Node> = Vec::new();
        let mut index_by_id = HashMap::new();
        let mut links = Vec::new();

        let mut stack: Vec<(NodeData, Option<usize>, usize)> = vec![(data.hierarchy, None, 0)];
        while let Some((node_data, parent, depth)) = stack.pop() {
            if index_by_id.contains_key(&node_data.id) {
                log::warn!(
                    "chunk {}: duplicate node id {}, skipping its subtree",
                    data.id,
                    node_data.id
                );
                continue;
            }

            let index = nodes.len();
            let prior_node = prior.and_then(|chunk| {
                chunk
                    .node_index(&node_data.id)
                    .map(|prior_index| &chunk.nodes[prior_index])
            });

            let (pos, velocity, representation) = match prior_node {
                Some(existing) => (existing.pos, existing.velocity, existing.representation),
                None => {
                    let anchor = parent
                        .map(|parent_index: usize| nodes[parent_index].pos)
                        .unwrap_or_else(|| coords.center());
                    let (jx, jy) = stable_pair(&node_data.id);
                    (anchor + vec2(jx, jy) * SPAWN_JITTER, Vec2::ZERO, None)
                }
            };

            nodes.push(Node {
                name: node_data.display_name().to_owned(),
                id: node_data.id.clone(),
                state: MonitoringState::from(node_data.state),
                chunk_id: data.id.clone(),
                parent,
                children: Vec::new(),
                depth,
                pos,
                velocity,
                node_positioning: BTreeMap::new(),
                current_positioning: CurrentPositioning::default(),
                use_style: None,
                representation,
            });
            index_by_id.insert(node_data.id, index);

            if let Some(parent_index) = parent {
                nodes[parent_index].children.push(index);
                links.push((parent_index, index));
            }

            // Reversed so the first child is visited first (pre-order).
            for child in node_data.children.into_iter().rev() {
                stack.push((child, Some(index), depth + 1));
            }
        }

        for link in &data.links {
            match (index_by_id.get(&link.source), index_by_id.get(&link.target)) {
                (Some(&source), Some(&target)) if source != target => {
                    links.push((source, target));
                }
                _ => log::debug!(
                    "chunk {}: dropping link {} -> {} with unknown endpoint",
                    data.id,
                    link.source,
                    link.target
                ),
            }
        }
        links.sort_unstable();
        links.dedup();

        Self {
            id: data.id,
            coords,
            nodes,
            links,
            layout: data.layout,
            index_by_id,
        }
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut result = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            result.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        result
    }

    pub fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut result = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            result.push(current);
            cursor = node.parent;
        }
        result
    }
}
