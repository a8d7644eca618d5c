use std::collections::{HashMap, HashSet};

use eframe::egui::{Vec2, vec2};

use crate::util::rotate_offset;
use crate::viewport::{NodeRef, PositioningEntry, Viewport};

use super::{ForceKind, ForceOptions, LayoutStyle, StyleConfig, StyleId, StyleKind, StyleOptions};

const BLOCK_CELL: f32 = 50.0;
const RADIAL_CHARGE: f32 = -500.0;

macro_rules! delegate_to_base {
    () => {
        fn id(&self) -> &StyleId {
            &self.base.id
        }

        fn style_type(&self) -> StyleKind {
            self.base.kind
        }

        fn root(&self) -> NodeRef {
            self.base.root
        }

        fn rotation(&self) -> f32 {
            self.base.rotation
        }

        fn filtered_descendants(&self) -> &[NodeRef] {
            &self.base.filtered
        }

        fn force_style_translation(&mut self) {
            self.base.translated = false;
        }
    };
}

struct StyleBase {
    id: StyleId,
    kind: StyleKind,
    root: NodeRef,
    root_depth: usize,
    options: StyleOptions,
    rotation: f32,
    anchor: Option<Vec2>,
    filtered: Vec<NodeRef>,
    offsets: Vec<(NodeRef, Vec2)>,
    translated: bool,
}

impl StyleBase {
    fn new(config: &StyleConfig, root: NodeRef, viewport: &Viewport, parent_rotation: f32) -> Self {
        let root_node = viewport.node(root);
        let root_depth = root_node.map_or(0, |node| node.depth);
        let parentless = root_node.is_some_and(|node| node.parent.is_none());
        let anchor = config
            .position
            .filter(|_| parentless)
            .zip(viewport.chunk_coords_of(root))
            .map(|([x, y], coords)| coords.point_at_percent(vec2(x, y)));

        let mut rotation = config.options.rotation_for(config.kind);
        if config.options.include_parent_rotation {
            rotation = (rotation + parent_rotation) % 360.0;
        }

        Self {
            id: config.style_id(),
            kind: config.kind,
            root,
            root_depth,
            options: config.options.clone(),
            rotation,
            anchor,
            filtered: Vec::new(),
            offsets: Vec::new(),
            translated: false,
        }
    }

    fn weight(&self) -> i32 {
        match self.kind {
            StyleKind::Force => 0,
            StyleKind::Fixed => 100,
            _ => 10 + self.root_depth as i32,
        }
    }

    /// Turns the relative offsets into fixed positioning entries. The root only
    /// gets an entry when nothing above it decides its position.
    fn apply_offsets(&mut self, viewport: &mut Viewport) {
        let Some(root) = viewport.node(self.root) else {
            return;
        };
        let origin = self.anchor.unwrap_or(root.pos);
        let position_root = root.parent.is_none() || self.options.detach_from_parent;
        let entry = |offset: Vec2| PositioningEntry {
            weight: self.weight(),
            style_type: self.kind,
            fixed: Some(origin + offset),
        };

        for &(node_ref, offset) in &self.offsets {
            if node_ref == self.root && !position_root {
                continue;
            }
            if let Some(node) = viewport.node_mut(node_ref) {
                node.node_positioning.insert(self.id.clone(), entry(offset));
            }
        }
        self.translated = true;
    }
}

/// Nodes positioned by a style rooted at `root`, pre-order. Descent stops
/// below a node carrying its own style, and a detached style root is left out
/// entirely.
fn hierarchy_filter(viewport: &Viewport, root: NodeRef) -> Vec<NodeRef> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        let Some(node) = viewport.node(current) else {
            continue;
        };
        result.push(current);
        if current != root && node.use_style.is_some() {
            continue;
        }
        for child in viewport.children(current).into_iter().rev() {
            let detached = viewport
                .node(child)
                .and_then(|child| child.use_style.as_ref())
                .is_some_and(|binding| binding.detach_from_parent);
            if !detached {
                stack.push(child);
            }
        }
    }
    result
}

fn filtered_children(
    viewport: &Viewport,
    node: NodeRef,
    members: &HashSet<NodeRef>,
) -> Vec<NodeRef> {
    viewport
        .children(node)
        .into_iter()
        .filter(|child| members.contains(child))
        .collect()
}

pub(super) fn instantiate_style(
    config: &StyleConfig,
    root: NodeRef,
    viewport: &Viewport,
    parent_rotation: f32,
) -> Box<dyn LayoutStyle> {
    let base = StyleBase::new(config, root, viewport, parent_rotation);
    match config.kind {
        StyleKind::Force => Box::new(ForceStyle { base }),
        StyleKind::Hierarchy => Box::new(HierarchyStyle { base }),
        StyleKind::Radial => Box::new(RadialStyle { base }),
        StyleKind::Block => Box::new(BlockStyle { base }),
        StyleKind::Fixed => Box::new(FixedStyle { base }),
    }
}

/// Places nothing. Its subtree floats and takes force options from here.
struct ForceStyle {
    base: StyleBase,
}

impl LayoutStyle for ForceStyle {
    delegate_to_base!();

    fn positioning_weight(&self) -> i32 {
        self.base.weight()
    }

    fn update_data(&mut self, viewport: &Viewport) {
        self.base.filtered = hierarchy_filter(viewport, self.base.root);
    }

    fn translate_coords(&mut self, _viewport: &mut Viewport) {
        self.base.translated = true;
    }

    fn force_options(&self) -> Option<&ForceOptions> {
        Some(&self.base.options.force)
    }
}

struct HierarchyStyle {
    base: StyleBase,
}

impl HierarchyStyle {
    /// Tidy tree: leaves take consecutive slots of `node_size`, parents sit
    /// centered over their first and last child, one layer per depth.
    fn place(
        &self,
        viewport: &Viewport,
        node: NodeRef,
        layer: usize,
        members: &HashSet<NodeRef>,
        next_slot: &mut f32,
        out: &mut Vec<(NodeRef, Vec2)>,
    ) -> f32 {
        let slot = out.len();
        out.push((node, Vec2::ZERO));

        let children = filtered_children(viewport, node, members);
        let x = if children.is_empty() {
            let x = *next_slot;
            *next_slot += self.base.options.node_size;
            x
        } else {
            let xs = children
                .iter()
                .map(|&child| self.place(viewport, child, layer + 1, members, next_slot, out))
                .collect::<Vec<_>>();
            (xs[0] + xs[xs.len() - 1]) / 2.0
        };

        out[slot].1 = vec2(x, layer as f32 * self.base.options.layer_height);
        x
    }
}

impl LayoutStyle for HierarchyStyle {
    delegate_to_base!();

    fn positioning_weight(&self) -> i32 {
        self.base.weight()
    }

    fn update_data(&mut self, viewport: &Viewport) {
        self.base.filtered = hierarchy_filter(viewport, self.base.root);
        let members = self.base.filtered.iter().copied().collect::<HashSet<_>>();

        let mut unrotated = Vec::with_capacity(self.base.filtered.len());
        let mut next_slot = 0.0;
        let root_x = self.place(
            viewport,
            self.base.root,
            0,
            &members,
            &mut next_slot,
            &mut unrotated,
        );

        self.base.offsets = unrotated
            .into_iter()
            .map(|(node, offset)| {
                let centered = vec2(offset.x - root_x, offset.y);
                (node, rotate_offset(centered, self.base.rotation))
            })
            .collect();
    }

    fn translate_coords(&mut self, viewport: &mut Viewport) {
        if self.base.translated && self.has_fixed_position(viewport) {
            return;
        }
        self.base.apply_offsets(viewport);
    }
}

struct RadialStyle {
    base: StyleBase,
}

impl LayoutStyle for RadialStyle {
    delegate_to_base!();

    fn positioning_weight(&self) -> i32 {
        self.base.weight()
    }

    fn update_data(&mut self, viewport: &Viewport) {
        self.base.filtered = hierarchy_filter(viewport, self.base.root);
        if self.base.filtered.len() <= 1 {
            self.base.offsets = vec![(self.base.root, Vec2::ZERO)];
            return;
        }

        let members = self.base.filtered.iter().copied().collect::<HashSet<_>>();
        let root_depth = self.base.root_depth;
        let max_depth = self
            .base
            .filtered
            .iter()
            .filter_map(|&node| viewport.node(node))
            .map(|node| node.depth - root_depth)
            .max()
            .unwrap_or(0)
            .max(1);

        let radius = self.base.options.radius;
        let outer = radius * (max_depth + 1) as f32;
        let span = self.base.options.degree.clamp(10.0, 360.0).to_radians();
        let rotation = self.base.rotation.to_radians();

        // Post-order pass: leaves spread over the arc, parents take the mean
        // angle of their children and sit at their cluster height.
        let leaves = self
            .base
            .filtered
            .iter()
            .filter(|&&node| filtered_children(viewport, node, &members).is_empty())
            .count()
            .max(1);
        let mut leaf_index = 0usize;
        let mut angle_and_height = HashMap::new();
        for &node in self.base.filtered.iter().rev() {
            let children = filtered_children(viewport, node, &members);
            let entry = if children.is_empty() {
                let angle = span * (leaves - 1 - leaf_index) as f32 / leaves as f32
                    + span / (2.0 * leaves as f32);
                leaf_index += 1;
                (angle, 0usize)
            } else {
                let resolved = children
                    .iter()
                    .filter_map(|child| angle_and_height.get(child).copied())
                    .collect::<Vec<(f32, usize)>>();
                let angle = resolved.iter().map(|(angle, _)| angle).sum::<f32>()
                    / resolved.len().max(1) as f32;
                let height = resolved.iter().map(|(_, height)| height + 1).max().unwrap_or(1);
                (angle, height)
            };
            angle_and_height.insert(node, entry);
        }

        self.base.offsets = self
            .base
            .filtered
            .iter()
            .map(|&node| {
                if node == self.base.root {
                    return (node, Vec2::ZERO);
                }
                let (angle, height) = angle_and_height.get(&node).copied().unwrap_or((0.0, 0));
                let distance = if height == 0 {
                    outer - radius
                } else {
                    outer * (1.0 - height as f32 / max_depth as f32)
                };
                let turned = angle + rotation;
                (node, vec2(turned.cos() * distance, -turned.sin() * distance))
            })
            .collect();
    }

    fn translate_coords(&mut self, viewport: &mut Viewport) {
        if self.base.translated && self.has_fixed_position(viewport) {
            return;
        }
        self.base.apply_offsets(viewport);
    }

    fn force_contribution(
        &self,
        viewport: &Viewport,
        node: NodeRef,
        kind: ForceKind,
        defaults: &ForceOptions,
    ) -> f32 {
        match kind {
            ForceKind::Charge => RADIAL_CHARGE,
            _ => viewport
                .node(node)
                .map_or(0.0, |node| defaults.value_for(node, kind)),
        }
    }
}

/// Packs the root's leaf children into a square-ish grid below it.
struct BlockStyle {
    base: StyleBase,
}

impl LayoutStyle for BlockStyle {
    delegate_to_base!();

    fn positioning_weight(&self) -> i32 {
        self.base.weight()
    }

    fn update_data(&mut self, viewport: &Viewport) {
        let leaves = viewport
            .children(self.base.root)
            .into_iter()
            .filter(|&child| viewport.node(child).is_some_and(|node| !node.is_aggregator()))
            .collect::<Vec<_>>();

        let width = (leaves.len() as f32).sqrt() * BLOCK_CELL;
        let columns = ((width / BLOCK_CELL).floor() as usize).max(1);

        self.base.filtered = std::iter::once(self.base.root)
            .chain(leaves.iter().copied())
            .collect();
        self.base.offsets = std::iter::once((self.base.root, Vec2::ZERO))
            .chain(leaves.iter().enumerate().map(|(index, &leaf)| {
                let row = index / columns + 1;
                let column = index % columns;
                let offset = vec2(
                    -width / 2.0 + BLOCK_CELL / 2.0 + column as f32 * BLOCK_CELL,
                    row as f32 * BLOCK_CELL / 2.0,
                );
                (leaf, offset)
            }))
            .collect();
    }

    fn translate_coords(&mut self, viewport: &mut Viewport) {
        if self.base.offsets.len() < 2 {
            return;
        }
        if self.base.translated && self.has_fixed_position(viewport) {
            return;
        }
        self.base.apply_offsets(viewport);
    }
}

/// Pins its root where it was when the layout was applied.
struct FixedStyle {
    base: StyleBase,
}

impl LayoutStyle for FixedStyle {
    delegate_to_base!();

    fn positioning_weight(&self) -> i32 {
        self.base.weight()
    }

    fn has_fixed_position(&self, _viewport: &Viewport) -> bool {
        true
    }

    fn update_data(&mut self, viewport: &Viewport) {
        self.base.filtered = vec![self.base.root];
        if self.base.anchor.is_none() {
            self.base.anchor = viewport.node(self.base.root).map(|node| node.pos);
        }
        self.base.offsets = vec![(self.base.root, Vec2::ZERO)];
    }

    fn translate_coords(&mut self, viewport: &mut Viewport) {
        if self.base.translated {
            return;
        }
        let Some(anchor) = self.base.anchor else {
            return;
        };
        let entry = PositioningEntry {
            weight: self.base.weight(),
            style_type: StyleKind::Fixed,
            fixed: Some(anchor),
        };
        if let Some(node) = viewport.node_mut(self.base.root) {
            node.node_positioning.insert(self.base.id.clone(), entry);
        }
        self.base.translated = true;
    }
}
