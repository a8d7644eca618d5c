mod manager;
mod styles;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::viewport::{Node, NodeRef, Viewport};

pub use manager::LayoutManager;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    Force,
    #[default]
    Hierarchy,
    Radial,
    Block,
    Fixed,
}

impl StyleKind {
    pub const ALL: [Self; 5] = [
        Self::Force,
        Self::Hierarchy,
        Self::Radial,
        Self::Block,
        Self::Fixed,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Hierarchy => "hierarchy",
            Self::Radial => "radial",
            Self::Block => "block",
            Self::Fixed => "fixed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Force => "Free floating style",
            Self::Hierarchy => "Hierarchical style",
            Self::Radial => "Radial style",
            Self::Block => "Leaf-Nodes Block style",
            Self::Fixed => "Fixed position style",
        }
    }

    /// Where a chunk root carrying this style is anchored, in percent of the
    /// chunk box.
    pub fn default_anchor(self) -> [f32; 2] {
        match self {
            Self::Hierarchy | Self::Block => [50.0, 20.0],
            _ => [50.0, 50.0],
        }
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Identity of a style instance: its kind plus the `(chunk, node)` it is rooted at.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StyleId(String);

impl StyleId {
    pub fn new(kind: StyleKind, chunk_id: &str, node_id: &str) -> Self {
        Self(format!("{kind}@{chunk_id}/{node_id}"))
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForceOptions {
    pub center_force: f32,
    pub force_node: f32,
    pub force_aggregator: f32,
    pub link_force_node: f32,
    pub link_force_aggregator: f32,
    pub link_strength: f32,
    pub collision_force_node: f32,
    pub collision_force_aggregator: f32,
}

impl Default for ForceOptions {
    fn default() -> Self {
        Self {
            center_force: 5.0,
            force_node: -300.0,
            force_aggregator: -300.0,
            link_force_node: 30.0,
            link_force_aggregator: 30.0,
            link_strength: 30.0,
            collision_force_node: 15.0,
            collision_force_aggregator: 15.0,
        }
    }
}

impl ForceOptions {
    /// Raw per-node value for `kind`. Center and link strength are returned
    /// unscaled; the solver applies its divisors.
    pub fn value_for(&self, node: &Node, kind: ForceKind) -> f32 {
        let aggregator = node.is_aggregator();
        match kind {
            ForceKind::Charge if aggregator => self.force_aggregator,
            ForceKind::Charge => self.force_node,
            ForceKind::Collide if aggregator => self.collision_force_aggregator,
            ForceKind::Collide => self.collision_force_node,
            ForceKind::Center => self.center_force,
            ForceKind::LinkDistance if aggregator => self.link_force_aggregator,
            ForceKind::LinkDistance => self.link_force_node,
            ForceKind::LinkStrength => self.link_strength,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForceKind {
    Charge,
    Collide,
    Center,
    LinkDistance,
    LinkStrength,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StyleOptions {
    pub layer_height: f32,
    pub node_size: f32,
    pub radius: f32,
    pub degree: f32,
    /// `None` uses the kind's default (270 for hierarchy, 0 otherwise).
    pub rotation: Option<f32>,
    pub include_parent_rotation: bool,
    pub detach_from_parent: bool,
    pub box_leaf_nodes: bool,
    /// Only read by the force style.
    pub force: ForceOptions,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            layer_height: 80.0,
            node_size: 25.0,
            radius: 120.0,
            degree: 360.0,
            rotation: None,
            include_parent_rotation: false,
            detach_from_parent: false,
            box_leaf_nodes: false,
            force: ForceOptions::default(),
        }
    }
}

impl StyleOptions {
    pub fn rotation_for(&self, kind: StyleKind) -> f32 {
        self.rotation.unwrap_or(match kind {
            StyleKind::Hierarchy => 270.0,
            _ => 0.0,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StyleConfig {
    #[serde(rename = "type")]
    pub kind: StyleKind,
    pub chunk_id: String,
    pub node_id: String,
    /// Anchor of a parentless style root, in percent of its chunk box.
    #[serde(default)]
    pub position: Option<[f32; 2]>,
    #[serde(default)]
    pub options: StyleOptions,
}

impl StyleConfig {
    pub fn new(kind: StyleKind, chunk_id: &str, node_id: &str) -> Self {
        Self {
            kind,
            chunk_id: chunk_id.to_owned(),
            node_id: node_id.to_owned(),
            position: None,
            options: StyleOptions::default(),
        }
    }

    pub fn anchored(mut self) -> Self {
        self.position = Some(self.kind.default_anchor());
        self
    }

    pub fn style_id(&self) -> StyleId {
        StyleId::new(self.kind, &self.chunk_id, &self.node_id)
    }
}

pub trait LayoutStyle {
    fn id(&self) -> &StyleId;

    fn style_type(&self) -> StyleKind;

    fn root(&self) -> NodeRef;

    /// Effective rotation in degrees, parent rotation included when asked for.
    fn rotation(&self) -> f32;

    fn positioning_weight(&self) -> i32;

    /// Whether the style root stays where it is between ticks. A style whose
    /// root floats must be retranslated before every tick.
    fn has_fixed_position(&self, viewport: &Viewport) -> bool {
        for node_ref in viewport.ancestors(self.root()) {
            let Some(node) = viewport.node(node_ref) else {
                break;
            };
            if node
                .use_style
                .as_ref()
                .is_some_and(|binding| binding.detach_from_parent)
            {
                return true;
            }
            if node.parent.is_none() {
                return node.use_style.as_ref().map(|binding| binding.kind)
                    != Some(StyleKind::Force);
            }
        }
        true
    }

    /// Recomputes the node set and relative offsets from the current tree.
    fn update_data(&mut self, viewport: &Viewport);

    fn translate_coords(&mut self, viewport: &mut Viewport);

    /// Makes the next `translate_coords` run even if the style is fixed.
    fn force_style_translation(&mut self);

    fn filtered_descendants(&self) -> &[NodeRef];

    fn force_options(&self) -> Option<&ForceOptions> {
        None
    }

    fn force_contribution(
        &self,
        viewport: &Viewport,
        node: NodeRef,
        kind: ForceKind,
        defaults: &ForceOptions,
    ) -> f32 {
        viewport.node(node).map_or(0.0, |node| {
            self.force_options()
                .unwrap_or(defaults)
                .value_for(node, kind)
        })
    }
}
