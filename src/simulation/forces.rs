use eframe::egui::Vec2;

use crate::util::fallback_direction;

use super::quadtree::QuadNode;

const MIN_DISTANCE_SQ: f32 = 1.0;

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    pub(super) alpha: f32,
    pub(super) theta: f32,
    pub(super) distance_max_sq: f32,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_collision_distance_sq: f32,
}

fn charge_between(point: Vec2, source: Vec2, strength: f32, alpha: f32, index: usize, other: usize) -> Vec2 {
    let mut delta = source - point;
    if delta.length_sq() < 1e-6 {
        delta = fallback_direction(index, other) * 1e-3;
    }
    let distance_sq = delta.length_sq().max(MIN_DISTANCE_SQ);
    delta * (strength * alpha / distance_sq)
}

pub(super) fn accumulate_charge_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    charges: &[f32],
    params: ChargeParams,
    velocity: &mut Vec2,
) {
    if node.count == 0 || node.charge == 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index || charges[other] == 0.0 {
                continue;
            }
            if (positions[other] - point).length_sq() >= params.distance_max_sq {
                continue;
            }
            *velocity += charge_between(point, positions[other], charges[other], params.alpha, index, other);
        }
        return;
    }

    let delta = node.center_of_charge - point;
    let distance_sq = delta.length_sq().max(MIN_DISTANCE_SQ);
    let can_approximate = !node.bounds.contains(point)
        && (node.bounds.side_length() / distance_sq.sqrt()) < params.theta
        && node.count > 1;

    if can_approximate {
        if distance_sq < params.distance_max_sq {
            *velocity += delta * (node.charge * params.alpha / distance_sq);
        }
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_charge_for_node(child, index, positions, charges, params, velocity);
    }
}

fn resolve_overlap(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    deltas: &mut [Vec2],
) {
    let (radius_from, radius_to) = (radii[from], radii[to]);
    if radius_from <= 0.0 && radius_to <= 0.0 {
        return;
    }

    let min_distance = radius_from + radius_to;
    let mut delta = positions[from] - positions[to];
    let mut distance = delta.length();
    if distance < 1e-4 {
        delta = fallback_direction(from, to) * 1e-3;
        distance = 1e-3;
    }
    if distance >= min_distance {
        return;
    }

    let push = delta * ((min_distance - distance) / distance * strength);
    let from_sq = radius_from * radius_from;
    let to_sq = radius_to * radius_to;
    let share = to_sq / (from_sq + to_sq);
    deltas[from] += push * share;
    deltas[to] -= push * (1.0 - share);
}

pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    deltas: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_collision_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (position, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[position + 1..] {
                    resolve_overlap(from, to, positions, radii, params.strength, deltas);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    resolve_overlap(from, to, positions, radii, params.strength, deltas);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collision_pairs(child_a, child_a, true, positions, radii, params, deltas);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collision_pairs(child_a, child_b, false, positions, radii, params, deltas);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, positions, radii, params, deltas);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, positions, radii, params, deltas);
        }
    }
}
