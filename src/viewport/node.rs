use std::collections::BTreeMap;

use eframe::egui::Vec2;

use crate::layout::{StyleId, StyleKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonitoringState {
    #[default]
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl MonitoringState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Crit => "CRIT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<i64> for MonitoringState {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Warn,
            2 => Self::Crit,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    pub chunk: usize,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositioningEntry {
    pub weight: i32,
    pub style_type: StyleKind,
    pub fixed: Option<Vec2>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurrentPositioning {
    pub free: bool,
    pub style_type: Option<StyleKind>,
}

impl Default for CurrentPositioning {
    fn default() -> Self {
        Self {
            free: true,
            style_type: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StyleBinding {
    pub id: StyleId,
    pub kind: StyleKind,
    pub detach_from_parent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Representation {
    pub radius: f32,
    pub highlighted: bool,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub state: MonitoringState,
    pub chunk_id: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    pub pos: Vec2,
    pub velocity: Vec2,
    pub node_positioning: BTreeMap<StyleId, PositioningEntry>,
    pub current_positioning: CurrentPositioning,
    pub use_style: Option<StyleBinding>,
    pub representation: Option<Representation>,
}

impl Node {
    pub fn is_aggregator(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_free(&self) -> bool {
        self.current_positioning.free
    }

    pub fn default_radius(&self) -> f32 {
        if self.parent.is_none() {
            16.0
        } else if self.is_aggregator() {
            12.0
        } else {
            8.0
        }
    }

    pub fn compute_position(&mut self) {
        let winner = self
            .node_positioning
            .values()
            .copied()
            .reduce(|best, entry| if entry.weight > best.weight { entry } else { best });

        match winner {
            Some(PositioningEntry {
                style_type,
                fixed: Some(fixed),
                ..
            }) => {
                self.pos = fixed;
                self.velocity = Vec2::ZERO;
                self.current_positioning = CurrentPositioning {
                    free: false,
                    style_type: Some(style_type),
                };
            }
            Some(entry) => {
                self.current_positioning = CurrentPositioning {
                    free: true,
                    style_type: Some(entry.style_type),
                };
            }
            None => self.current_positioning = CurrentPositioning::default(),
        }
    }
}
