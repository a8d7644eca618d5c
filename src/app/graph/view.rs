use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Ui, vec2};

use crate::viewport::LinkKind;

use super::super::NodevisApp;
use super::super::render_utils::{
    blend_color, dim_color, draw_background, edge_visible, screen_radius, state_color,
    world_to_screen,
};

const HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(103, 196, 255);

impl NodevisApp {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        let resized = (self.world.viewport().size() - rect.size()).length_sq() > 1.0;
        if resized {
            self.world.resize(rect.width(), rect.height());
            let middle = self.world.viewport().size() * 0.5;
            self.world.viewport_mut().camera.center_on(middle);
        }

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);

        let camera = self.world.viewport().camera;
        let (pan, zoom) = (camera.pan, camera.zoom);
        draw_background(&painter, rect, pan, zoom);

        if self.scene.nodes.is_empty() {
            self.visible_node_count = 0;
            self.visible_link_count = 0;
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Waiting for datasource payload...",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            return;
        }

        for chunk in &self.scene.chunks {
            let min = world_to_screen(rect, pan, zoom, vec2(chunk.coords.x, chunk.coords.y));
            let max = world_to_screen(
                rect,
                pan,
                zoom,
                vec2(
                    chunk.coords.x + chunk.coords.width,
                    chunk.coords.y + chunk.coords.height,
                ),
            );
            painter.rect_stroke(
                Rect::from_min_max(min, max),
                4.0,
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(90, 110, 130, 90)),
                egui::StrokeKind::Inside,
            );
            painter.text(
                min + vec2(6.0, 6.0),
                Align2::LEFT_TOP,
                &chunk.id,
                FontId::proportional(11.0),
                Color32::from_gray(150),
            );
        }

        if self.show_quadtree_overlay {
            for cell in self.world.simulation().quadtree_cells(self.world.viewport()) {
                let half = vec2(cell.half_extent, cell.half_extent);
                let min = world_to_screen(rect, pan, zoom, cell.center - half);
                let max = world_to_screen(rect, pan, zoom, cell.center + half);
                let alpha = if cell.is_leaf { 110 } else { 55 };
                let line_width = (1.4_f32 - (cell.depth as f32 * 0.09)).clamp(0.45, 1.4);
                painter.rect_stroke(
                    Rect::from_min_max(min, max),
                    0.0,
                    Stroke::new(line_width, Color32::from_rgba_unmultiplied(106, 198, 255, alpha)),
                    egui::StrokeKind::Middle,
                );
            }
        }

        let screen_positions = self
            .scene
            .nodes
            .iter()
            .map(|node| world_to_screen(rect, pan, zoom, node.world_pos))
            .collect::<Vec<Pos2>>();
        let screen_radii = self
            .scene
            .nodes
            .iter()
            .map(|node| screen_radius(node.radius, zoom))
            .collect::<Vec<_>>();
        let visible = Self::visible_indices(rect, &screen_positions, &screen_radii);
        self.visible_node_count = visible.len();

        let zoom_sqrt = zoom.sqrt();
        let mut visible_link_count = 0;
        for &(source, target, kind) in &self.scene.links {
            let (start, end) = (screen_positions[source], screen_positions[target]);
            if !edge_visible(rect, start, end, 2.5) {
                continue;
            }
            let (width, color) = match kind {
                LinkKind::Hierarchy => (
                    (1.18 * zoom_sqrt).clamp(0.6, 3.4),
                    Color32::from_rgba_unmultiplied(120, 120, 120, 200),
                ),
                LinkKind::Declared => (
                    (1.4 * zoom_sqrt).clamp(0.7, 3.6),
                    Color32::from_rgba_unmultiplied(150, 170, 190, 210),
                ),
                LinkKind::Cross => (
                    (1.6 * zoom_sqrt).clamp(0.8, 4.0),
                    Color32::from_rgba_unmultiplied(241, 146, 94, 190),
                ),
            };
            painter.line_segment([start, end], Stroke::new(width, color));
            visible_link_count += 1;
        }
        self.visible_link_count = visible_link_count;

        let hovered = Self::hovered_index(ui, &visible, &screen_positions, &screen_radii);
        if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        let highlight_active = self.scene.any_highlighted();
        for &index in &visible {
            let node = &self.scene.nodes[index];
            let position = screen_positions[index];
            let radius = screen_radii[index];
            let is_hovered = hovered == Some(index);

            let base_color = state_color(node.state);
            let color = if node.highlighted {
                blend_color(base_color, HIGHLIGHT_COLOR, 0.55)
            } else if is_hovered {
                blend_color(base_color, Color32::WHITE, 0.3)
            } else if highlight_active {
                dim_color(base_color, 0.45)
            } else {
                base_color
            };

            painter.circle_filled(position, radius, color);
            let outline = if node.free {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            } else {
                Stroke::new(1.6, Color32::from_rgba_unmultiplied(230, 230, 230, 150))
            };
            painter.circle_stroke(position, radius, outline);
            if node.highlighted {
                painter.circle_stroke(position, radius + 5.0, Stroke::new(2.0, HIGHLIGHT_COLOR));
            }

            if node.highlighted || is_hovered || radius > 14.0 || zoom > 1.35 {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    &node.name,
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
        }

        if let Some(index) = hovered {
            let node = &self.scene.nodes[index];
            let style = node
                .style
                .map_or("free floating", |style| style.type_name());
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{}  |  {}  |  {style}", node.name, node.state.label()),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );

            let target = node.node;
            if self.scene.revision == self.world.viewport().revision() {
                if response.clicked_by(egui::PointerButton::Primary) {
                    self.world.viewport_mut().zoom_to_node(target);
                }
                if response.secondary_clicked() {
                    self.context_node = self
                        .world
                        .viewport()
                        .node(target)
                        .map(|node| (node.chunk_id.clone(), node.id.clone()));
                }
            }
        }

        response.context_menu(|ui| self.node_context_menu(ui));
    }
}
