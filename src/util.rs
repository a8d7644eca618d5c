use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use eframe::egui::{Vec2, vec2};

pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

pub fn fallback_direction(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

pub fn rotate_offset(offset: Vec2, rotation_degrees: f32) -> Vec2 {
    let rad = rotation_degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    vec2(
        offset.x * sin + offset.y * cos,
        offset.x * cos - offset.y * sin,
    )
}

pub fn format_latency(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0} ms", seconds * 1000.0)
    } else {
        format!("{seconds:.2} s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let first = stable_pair("host-a");
        let second = stable_pair("host-a");
        assert_eq!(first, second);
        assert!((-1.0..=1.0).contains(&first.0));
        assert!((-1.0..=1.0).contains(&first.1));
    }

    #[test]
    fn default_hierarchy_rotation_grows_downwards() {
        let rotated = rotate_offset(vec2(10.0, 80.0), 270.0);
        assert!((rotated.x + 10.0).abs() < 1e-3);
        assert!((rotated.y - 80.0).abs() < 1e-3);
    }

    #[test]
    fn latency_formatting_switches_units() {
        assert_eq!(format_latency(0.25), "250 ms");
        assert_eq!(format_latency(1.5), "1.50 s");
    }
}
