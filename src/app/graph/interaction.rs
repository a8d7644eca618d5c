use eframe::egui::{self, Pos2, Rect, Ui};

use crate::layout::StyleKind;
use crate::viewport::Camera;

use super::super::NodevisApp;
use super::super::render_utils::{circle_visible, screen_to_world};

impl NodevisApp {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let camera = &mut self.world.viewport_mut().camera;
        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, camera.pan, camera.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        camera.zoom = (camera.zoom * zoom_factor).clamp(Camera::MIN_ZOOM, Camera::MAX_ZOOM);
        camera.pan = pointer - rect.center() - (world_before * camera.zoom);
    }

    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.world.viewport_mut().camera.pan += response.drag_delta();
        }
    }

    pub(in crate::app) fn visible_indices(
        rect: Rect,
        screen_positions: &[Pos2],
        screen_radii: &[f32],
    ) -> Vec<usize> {
        (0..screen_positions.len())
            .filter(|&index| circle_visible(rect, screen_positions[index], screen_radii[index]))
            .collect()
    }

    pub(in crate::app) fn hovered_index(
        ui: &Ui,
        visible_indices: &[usize],
        screen_positions: &[Pos2],
        screen_radii: &[f32],
    ) -> Option<usize> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        visible_indices
            .iter()
            .filter_map(|&index| {
                let distance = screen_positions[index].distance(pointer);
                (distance <= screen_radii[index]).then_some((index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    pub(in crate::app) fn node_context_menu(&mut self, ui: &mut Ui) {
        let Some(node_ref) = self
            .context_node
            .as_ref()
            .and_then(|(chunk_id, node_id)| self.world.viewport().find_node(chunk_id, node_id))
        else {
            ui.weak("No node under the pointer.");
            return;
        };
        let current = self
            .world
            .viewport()
            .node(node_ref)
            .and_then(|node| node.use_style.as_ref())
            .map(|binding| binding.kind);

        ui.menu_button("Style", |ui| {
            if ui.radio(current.is_none(), "Free floating").clicked() {
                self.world.convert_node(node_ref, None);
                ui.close();
            }
            for kind in StyleKind::ALL.into_iter().filter(|kind| *kind != StyleKind::Force) {
                if ui.radio(current == Some(kind), kind.description()).clicked() {
                    self.world.convert_node(node_ref, Some(kind));
                    ui.close();
                }
            }
        });
        if ui.button("Highlight subtree").clicked() {
            self.world.highlight_subtree(node_ref);
            ui.close();
        }
        if ui.button("Clear highlights").clicked() {
            self.world.viewport_mut().clear_highlights();
            ui.close();
        }
    }
}
