use std::cmp::Reverse;
use std::collections::HashMap;

use crate::viewport::{CurrentPositioning, NodeRef, StyleBinding, Viewport};

use super::styles::instantiate_style;
use super::{ForceKind, ForceOptions, LayoutStyle, StyleConfig, StyleId, StyleKind};

pub struct LayoutManager {
    configs: Vec<StyleConfig>,
    default_style: StyleKind,
    force_defaults: ForceOptions,
    styles: Vec<Box<dyn LayoutStyle>>,
    style_index: HashMap<StyleId, usize>,
}

impl LayoutManager {
    pub fn new(default_style: StyleKind, force_defaults: ForceOptions) -> Self {
        Self {
            configs: Vec::new(),
            default_style,
            force_defaults,
            styles: Vec::new(),
            style_index: HashMap::new(),
        }
    }

    pub fn default_style(&self) -> StyleKind {
        self.default_style
    }

    pub fn set_default_style(&mut self, kind: StyleKind) {
        self.default_style = kind;
    }

    pub fn configs(&self) -> &[StyleConfig] {
        &self.configs
    }

    pub fn save_style(&mut self, config: StyleConfig) {
        self.remove_style(&config.chunk_id, &config.node_id);
        self.configs.push(config);
    }

    pub fn remove_style(&mut self, chunk_id: &str, node_id: &str) -> bool {
        let before = self.configs.len();
        self.configs
            .retain(|config| !(config.chunk_id == chunk_id && config.node_id == node_id));
        self.configs.len() != before
    }

    pub fn clear_styles(&mut self) {
        self.configs.clear();
    }

    /// Style instances in registration order, parents before nested styles.
    pub fn active_styles(&self) -> impl Iterator<Item = &dyn LayoutStyle> + '_ {
        self.styles.iter().map(|style| style.as_ref())
    }

    pub fn style(&self, id: &StyleId) -> Option<&dyn LayoutStyle> {
        self.style_index
            .get(id)
            .and_then(|&index| self.styles.get(index))
            .map(|style| style.as_ref())
    }

    /// Rebuilds every style instance from the layout and resolves all node
    /// positions. Must run after every viewport swap.
    pub fn apply_current_layout(&mut self, viewport: &mut Viewport) {
        for node in viewport.iter_nodes_mut() {
            node.node_positioning.clear();
            node.current_positioning = CurrentPositioning::default();
            node.use_style = None;
        }
        self.styles.clear();
        self.style_index.clear();

        let mut resolved = self.resolve_configs(viewport);
        resolved.sort_by_key(|(_, _, depth)| *depth);

        for (config, root, _) in resolved {
            let parent_rotation = viewport
                .node(root)
                .and_then(|node| node.parent)
                .and_then(|parent| {
                    self.owning_style(
                        viewport,
                        NodeRef {
                            chunk: root.chunk,
                            index: parent,
                        },
                    )
                })
                .map_or(0.0, |style| style.rotation());

            let style = instantiate_style(&config, root, viewport, parent_rotation);
            if let Some(node) = viewport.node_mut(root) {
                node.use_style = Some(StyleBinding {
                    id: style.id().clone(),
                    kind: config.kind,
                    detach_from_parent: config.options.detach_from_parent,
                });
            }
            self.style_index.insert(style.id().clone(), self.styles.len());
            self.styles.push(style);
        }

        // Leaf styles first: a nested style's node set feeds its parent.
        let mut update_order = (0..self.styles.len()).collect::<Vec<_>>();
        update_order.sort_by_key(|&index| {
            Reverse(
                viewport
                    .node(self.styles[index].root())
                    .map_or(0, |node| node.depth),
            )
        });
        for index in update_order {
            self.styles[index].update_data(viewport);
        }

        for style in &mut self.styles {
            style.force_style_translation();
            style.translate_coords(viewport);
            compute_positions(viewport, style.filtered_descendants());
        }
        for node in viewport.iter_nodes_mut() {
            node.compute_position();
        }

        log::debug!(
            "applied layout: {} styles over {} nodes",
            self.styles.len(),
            viewport.node_count()
        );
    }

    /// Converts one node to `kind`, or drops its explicit style with `None`.
    /// Returns false when nothing changed.
    pub fn convert_node(
        &mut self,
        viewport: &mut Viewport,
        node_ref: NodeRef,
        kind: Option<StyleKind>,
    ) -> bool {
        let Some(node) = viewport.node(node_ref) else {
            return false;
        };
        let current = node.use_style.as_ref().map(|binding| binding.kind);
        if kind.is_some() && current == kind {
            return false;
        }
        let (chunk_id, node_id) = (node.chunk_id.clone(), node.id.clone());

        let removed = self.remove_style(&chunk_id, &node_id);
        match kind {
            Some(kind) => {
                let mut config = StyleConfig::new(kind, &chunk_id, &node_id);
                config.options.detach_from_parent = true;
                self.save_style(config);
            }
            None if !removed => return false,
            None => {}
        }

        self.apply_current_layout(viewport);
        true
    }

    /// Fixed converts every node; other kinds style each chunk root; `None`
    /// leaves everything free floating.
    pub fn convert_all(&mut self, viewport: &mut Viewport, kind: Option<StyleKind>) {
        self.clear_styles();
        match kind {
            Some(StyleKind::Fixed) => {
                let targets = viewport
                    .iter_nodes()
                    .map(|(_, node)| (node.chunk_id.clone(), node.id.clone()))
                    .collect::<Vec<_>>();
                for (chunk_id, node_id) in targets {
                    self.save_style(StyleConfig::new(StyleKind::Fixed, &chunk_id, &node_id));
                }
            }
            _ => {
                let kind = kind.unwrap_or(StyleKind::Force);
                let roots = viewport
                    .get_hierarchy_list()
                    .iter()
                    .map(|chunk| (chunk.id.clone(), chunk.root().id.clone()))
                    .collect::<Vec<_>>();
                for (chunk_id, node_id) in roots {
                    self.save_style(StyleConfig::new(kind, &chunk_id, &node_id).anchored());
                }
            }
        }
        self.apply_current_layout(viewport);
    }

    /// Retranslates every floating style that is not itself a force style, in
    /// registration order, so their subtrees follow a root the solver moved.
    /// Returns how many styles were retranslated.
    pub fn enforce_free_float_styles_retranslation(&mut self, viewport: &mut Viewport) -> usize {
        let mut retranslated = 0;
        for style in &mut self.styles {
            if style.style_type() == StyleKind::Force || style.has_fixed_position(viewport) {
                continue;
            }
            style.force_style_translation();
            style.translate_coords(viewport);
            compute_positions(viewport, style.filtered_descendants());
            retranslated += 1;
        }
        retranslated
    }

    pub fn owning_style(&self, viewport: &Viewport, node: NodeRef) -> Option<&dyn LayoutStyle> {
        viewport.ancestors(node).into_iter().find_map(|ancestor| {
            viewport
                .node(ancestor)
                .and_then(|node| node.use_style.as_ref())
                .and_then(|binding| self.style(&binding.id))
        })
    }

    pub fn force_contribution(&self, viewport: &Viewport, node: NodeRef, kind: ForceKind) -> f32 {
        match self.owning_style(viewport, node) {
            Some(style) => style.force_contribution(viewport, node, kind, &self.force_defaults),
            None => viewport
                .node(node)
                .map_or(0.0, |node| self.force_defaults.value_for(node, kind)),
        }
    }

    /// Saved configs that resolve in the current graph, plus an implicit
    /// style for every chunk root without one, plus block styles requested by
    /// `box_leaf_nodes`.
    fn resolve_configs(&self, viewport: &Viewport) -> Vec<(StyleConfig, NodeRef, usize)> {
        let mut resolved = Vec::new();
        for config in &self.configs {
            match viewport.find_node(&config.chunk_id, &config.node_id) {
                Some(node_ref) => {
                    let depth = viewport.node(node_ref).map_or(0, |node| node.depth);
                    resolved.push((config.clone(), node_ref, depth));
                }
                None => log::debug!("style {} has no node in the current graph", config.style_id()),
            }
        }

        for (chunk_index, chunk) in viewport.get_hierarchy_list().iter().enumerate() {
            let root = NodeRef {
                chunk: chunk_index,
                index: 0,
            };
            if resolved.iter().any(|(_, node_ref, _)| *node_ref == root) {
                continue;
            }
            let kind = chunk.layout.unwrap_or(self.default_style);
            resolved.push((
                StyleConfig::new(kind, &chunk.id, &chunk.root().id).anchored(),
                root,
                0,
            ));
        }

        let boxed = resolved
            .iter()
            .filter(|(config, _, _)| config.kind == StyleKind::Hierarchy && config.options.box_leaf_nodes)
            .flat_map(|(_, root, _)| viewport.descendants(*root))
            .filter(|&node_ref| {
                let children = viewport.children(node_ref);
                !children.is_empty()
                    && children.iter().all(|&child| {
                        viewport
                            .node(child)
                            .is_some_and(|child| !child.is_aggregator())
                    })
            })
            .filter(|node_ref| !resolved.iter().any(|(_, styled, _)| styled == node_ref))
            .collect::<Vec<_>>();
        for node_ref in boxed {
            if let Some(node) = viewport.node(node_ref) {
                resolved.push((
                    StyleConfig::new(StyleKind::Block, &node.chunk_id, &node.id),
                    node_ref,
                    node.depth,
                ));
            }
        }

        resolved
    }
}

fn compute_positions(viewport: &mut Viewport, nodes: &[NodeRef]) {
    for &node_ref in nodes {
        if let Some(node) = viewport.node_mut(node_ref) {
            node.compute_position();
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::viewport::fixtures::{aggregation, branch, chunk, leaf};
    use crate::viewport::{ChunkData, GraphPayload};

    fn viewport_with(chunks: Vec<ChunkData>) -> Viewport {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.update_chunks(GraphPayload {
            chunks,
            links: Vec::new(),
        });
        viewport
    }

    fn at(chunk: usize, index: usize) -> NodeRef {
        NodeRef { chunk, index }
    }

    #[test]
    fn default_hierarchy_pins_every_node() {
        let mut viewport = viewport_with(vec![aggregation("bi", 2)]);
        let mut manager = LayoutManager::new(StyleKind::Hierarchy, ForceOptions::default());

        manager.apply_current_layout(&mut viewport);

        assert_eq!(manager.active_styles().count(), 1);
        assert!(viewport.iter_nodes().all(|(_, node)| !node.is_free()));
        let root = viewport.node(at(0, 0)).expect("root");
        let anchor = viewport.get_hierarchy_list()[0]
            .coords
            .point_at_percent(vec2(50.0, 20.0));
        assert_eq!(root.pos, anchor);
        assert_eq!(manager.enforce_free_float_styles_retranslation(&mut viewport), 0);
    }

    #[test]
    fn chunk_layout_overrides_default_style() {
        let mut data = aggregation("bi", 1);
        data.layout = Some(StyleKind::Force);
        let mut viewport = viewport_with(vec![data]);
        let mut manager = LayoutManager::new(StyleKind::Hierarchy, ForceOptions::default());

        manager.apply_current_layout(&mut viewport);

        assert!(viewport.iter_nodes().all(|(_, node)| node.is_free()));
        let style = manager.owning_style(&viewport, at(0, 3)).expect("owned");
        assert_eq!(style.style_type(), StyleKind::Force);
        assert_eq!(
            manager.force_contribution(&viewport, at(0, 3), ForceKind::Charge),
            -300.0
        );
    }

    #[test]
    fn nested_style_under_force_root_follows_its_root() {
        let mut viewport = viewport_with(vec![aggregation("bi", 1)]);
        let mut manager = LayoutManager::new(StyleKind::Force, ForceOptions::default());
        manager.save_style(StyleConfig::new(StyleKind::Hierarchy, "bi", "bi-a"));

        manager.apply_current_layout(&mut viewport);

        let nested_root = at(0, 1);
        let nested_leaf = at(0, 2);
        assert!(viewport.node(nested_root).is_some_and(|node| node.is_free()));
        assert!(viewport.node(nested_leaf).is_some_and(|node| !node.is_free()));

        if let Some(node) = viewport.node_mut(nested_root) {
            node.pos = vec2(500.0, 500.0);
        }
        assert_eq!(manager.enforce_free_float_styles_retranslation(&mut viewport), 1);

        let leaf_pos = viewport.node(nested_leaf).map(|node| node.pos).expect("leaf");
        assert!((leaf_pos - vec2(500.0, 580.0)).length() < 1e-3);
    }

    #[test]
    fn convert_node_is_a_no_op_for_same_kind() {
        let mut viewport = viewport_with(vec![aggregation("bi", 1)]);
        let mut manager = LayoutManager::new(StyleKind::Force, ForceOptions::default());
        manager.apply_current_layout(&mut viewport);
        let target = at(0, 4);
        if let Some(node) = viewport.node_mut(target) {
            node.pos = vec2(7.0, 9.0);
        }

        assert!(manager.convert_node(&mut viewport, target, Some(StyleKind::Fixed)));
        assert!(!manager.convert_node(&mut viewport, target, Some(StyleKind::Fixed)));

        let node = viewport.node(target).expect("node");
        assert!(!node.is_free());
        assert_eq!(node.pos, vec2(7.0, 9.0));
        assert!(manager.configs()[0].options.detach_from_parent);

        assert!(manager.convert_node(&mut viewport, target, None));
        assert!(viewport.node(target).is_some_and(|node| node.is_free()));
        assert!(!manager.convert_node(&mut viewport, target, None));
    }

    #[test]
    fn convert_all_fixed_styles_every_node() {
        let mut viewport = viewport_with(vec![aggregation("one", 1), aggregation("two", 1)]);
        let mut manager = LayoutManager::new(StyleKind::Force, ForceOptions::default());
        manager.apply_current_layout(&mut viewport);
        let before = viewport
            .iter_nodes()
            .map(|(_, node)| node.pos)
            .collect::<Vec<_>>();

        manager.convert_all(&mut viewport, Some(StyleKind::Fixed));

        assert_eq!(manager.active_styles().count(), viewport.node_count());
        let after = viewport
            .iter_nodes()
            .map(|(_, node)| node.pos)
            .collect::<Vec<_>>();
        assert_eq!(before, after);
        assert!(viewport.iter_nodes().all(|(_, node)| !node.is_free()));

        manager.convert_all(&mut viewport, None);
        assert_eq!(manager.active_styles().count(), 2);
        assert!(viewport.iter_nodes().all(|(_, node)| node.is_free()));
    }

    #[test]
    fn box_leaf_nodes_adds_block_styles() {
        let mut viewport = viewport_with(vec![chunk(
            "c",
            branch(
                "r",
                vec![
                    branch("group", vec![leaf("x", 0), leaf("y", 0)]),
                    leaf("solo", 1),
                ],
            ),
        )]);
        let mut manager = LayoutManager::new(StyleKind::Force, ForceOptions::default());
        let mut config = StyleConfig::new(StyleKind::Hierarchy, "c", "r").anchored();
        config.options.box_leaf_nodes = true;
        manager.save_style(config);

        manager.apply_current_layout(&mut viewport);

        let kinds = manager
            .active_styles()
            .map(|style| style.style_type())
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![StyleKind::Hierarchy, StyleKind::Block]);
    }

    #[test]
    fn radial_style_overrides_charge() {
        let mut data = aggregation("bi", 1);
        data.layout = Some(StyleKind::Radial);
        let mut viewport = viewport_with(vec![data]);
        let mut manager = LayoutManager::new(StyleKind::Hierarchy, ForceOptions::default());

        manager.apply_current_layout(&mut viewport);

        assert_eq!(
            manager.force_contribution(&viewport, at(0, 2), ForceKind::Charge),
            -500.0
        );
        assert_eq!(
            manager.force_contribution(&viewport, at(0, 2), ForceKind::LinkDistance),
            30.0
        );
    }
}
