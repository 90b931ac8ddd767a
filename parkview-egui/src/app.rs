use std::sync::Arc;

use egui::{Align2, Color32, FontId, Id, Pos2, Rect, RichText, Stroke, Vec2};
use galileo::galileo_types::geo::impls::GeoPoint2d;
use galileo::galileo_types::geo::{GeoPoint, NewGeoPoint};
use galileo_egui::{EguiMap, EguiMapState};
use parkview::viewport::ScreenProjector;
use parkview::{
    Color, KeyDispatcher, KeySignal, Messenger, ParkFeature, ParkId, StyleHealth, ViewerShell,
    ViewportState,
};

use crate::engine::TileEngine;

const MARKER_RADIUS: f32 = 7.0;
const MARKER_HIT_RADIUS: f32 = MARKER_RADIUS * 1.25;
const MARKER_COLOR: Color32 = Color32::from_rgb(22, 163, 74);
const SELECTED_MARKER_COLOR: Color32 = Color32::from_rgb(234, 88, 12);

/// Wakes up the egui loop.
#[derive(Clone)]
pub(crate) struct EguiMessenger {
    context: egui::Context,
}

impl EguiMessenger {
    pub(crate) fn new(context: egui::Context) -> Self {
        Self { context }
    }
}

impl Messenger for EguiMessenger {
    fn request_redraw(&self) {
        self.context.request_repaint();
    }
}

/// The viewer window: inspector panel, map with park markers and the park popup.
pub struct ParkviewApp {
    map: EguiMapState,
    shell: ViewerShell,
    keys: KeyDispatcher,
    engine: TileEngine,
    position: GeoPoint2d,
    resolution: f64,
    rendered_generation: Option<u64>,
}

impl ParkviewApp {
    /// Creates the app and mounts the shell.
    pub fn new(
        map: EguiMapState,
        mut shell: ViewerShell,
        engine: TileEngine,
        context: &egui::Context,
    ) -> Self {
        let viewport = shell.viewport();
        let keys = KeyDispatcher::new();

        shell.set_messenger(Some(Arc::new(EguiMessenger::new(context.clone()))));
        shell.mount(&keys);

        Self {
            map,
            shell,
            keys,
            engine,
            position: GeoPoint2d::latlon(viewport.latitude, viewport.longitude),
            resolution: viewport.resolution(),
            rendered_generation: None,
        }
    }

    /// Replaces the tile layer when the style selection differs from the rendered one. Selecting
    /// the same style again reloads it.
    fn sync_layer(&mut self) {
        let generation = self.shell.surface().generation();
        if self.rendered_generation == Some(generation) {
            return;
        }

        log::debug!(
            "Rendering style {} (generation {generation})",
            self.shell.active_style()
        );

        let layer = self
            .engine
            .load_style(&self.shell, Some(self.map.messenger()));

        let layers = self.map.map_mut().layers_mut();
        layers.clear();
        if let Some(layer) = layer {
            layers.push(layer);
        }

        self.map.request_redraw();
        self.rendered_generation = Some(generation);
    }

    fn show_inspector(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Map Inspector");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Hide").clicked() {
                    self.shell.toggle_sidebar();
                }
            });
        });
        ui.separator();

        ui.label(RichText::new("Active Style").strong());
        ui.label(RichText::new(self.shell.active_style().as_str()).monospace());
        ui.horizontal(|ui| {
            ui.label("Health:");
            ui.colored_label(
                health_color(self.shell.health()),
                self.shell.health().to_string(),
            );
        });

        if let Some(fallback) = self.shell.last_fallback() {
            ui.label(
                RichText::new(format!("Fell back from {}", fallback.from))
                    .small()
                    .color(Color32::from_rgb(239, 68, 68)),
            );
        }

        ui.add_space(8.0);
        ui.label(RichText::new("Presets").strong());

        let mut selected = None;
        for preset in self.shell.presets() {
            let active = preset.style == *self.shell.active_style();
            let mut button = egui::Button::new(
                RichText::new(preset.label.as_str()).color(to_color32(preset.foreground)),
            )
            .fill(to_color32(preset.background))
            .min_size(Vec2::new(ui.available_width(), 28.0));

            if active {
                button = button.stroke(Stroke::new(2.0, Color32::WHITE));
            }

            if ui
                .add(button)
                .on_hover_text(preset.style.as_str())
                .clicked()
            {
                selected = Some(preset.style.clone());
            }
        }

        if let Some(style) = selected {
            self.shell.select_style(style);
        }

        ui.add_space(8.0);
        ui.label(format!(
            "Token present: {}",
            if self.shell.token_present() { "Yes" } else { "No" }
        ));
        ui.label(format!("Parks: {}", self.shell.dataset().len()));
    }

    fn show_map(&mut self, ui: &mut egui::Ui) {
        let rect = ui.available_rect_before_wrap();

        EguiMap::new(&mut self.map)
            .with_position(&mut self.position)
            .with_resolution(&mut self.resolution)
            .show_ui(ui);

        let viewport = ViewportState::from_resolution(
            self.position.lat(),
            self.position.lon(),
            self.resolution,
        );
        self.shell.update_viewport(viewport);

        let Some(projector) = viewport.projector([rect.center().x, rect.center().y]) else {
            return;
        };

        if let Some(id) = self.show_markers(ui, rect, &projector) {
            self.shell.select_park(&id);
        }

        self.show_popup(ui.ctx(), rect, &projector);
    }

    /// Draws the markers and returns the id of the clicked one.
    fn show_markers(
        &self,
        ui: &egui::Ui,
        rect: Rect,
        projector: &ScreenProjector,
    ) -> Option<ParkId> {
        let painter = ui.painter_at(rect);
        for marker in self.shell.markers() {
            let Some(center) = screen_position(projector, marker.park) else {
                continue;
            };
            if !rect.expand(MARKER_RADIUS).contains(center) {
                continue;
            }

            let color = if marker.selected {
                SELECTED_MARKER_COLOR
            } else {
                MARKER_COLOR
            };
            painter.circle(center, MARKER_RADIUS, color, Stroke::new(2.0, Color32::WHITE));
        }

        // Popup and inspector lie above the map and keep their clicks.
        if !ui.rect_contains_pointer(rect) {
            return None;
        }

        let (clicked, pointer) =
            ui.input(|input| (input.pointer.primary_clicked(), input.pointer.interact_pos()));
        let pointer = pointer?;
        let park = self
            .shell
            .dataset()
            .hit_test(projector, [pointer.x, pointer.y], MARKER_HIT_RADIUS)?;

        if let Some(center) = screen_position(projector, park) {
            painter.text(
                center + Vec2::new(MARKER_RADIUS + 4.0, 0.0),
                Align2::LEFT_CENTER,
                park.name.as_str(),
                FontId::proportional(13.0),
                ui.visuals().strong_text_color(),
            );
        }

        clicked.then(|| park.id.clone())
    }

    fn show_popup(&mut self, ctx: &egui::Context, rect: Rect, projector: &ScreenProjector) {
        let Some(park) = self.shell.popup().cloned() else {
            return;
        };
        let Some(anchor) = screen_position(projector, &park) else {
            return;
        };
        if !rect.contains(anchor) {
            return;
        }

        let mut open = true;
        egui::Window::new(RichText::new(park.name.as_str()).strong())
            .id(Id::new("park-popup"))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .pivot(Align2::CENTER_BOTTOM)
            .fixed_pos(anchor - Vec2::new(0.0, MARKER_RADIUS * 2.0))
            .show(ctx, |ui| {
                ui.set_max_width(260.0);
                if park.description.is_empty() {
                    ui.label(RichText::new("No description").italics());
                } else {
                    ui.label(park.description.as_str());
                }
            });

        if !open {
            self.shell.clear_selection();
        }
    }
}

impl eframe::App for ParkviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|input| input.key_pressed(egui::Key::Escape)) {
            self.keys.dispatch(KeySignal::Escape);
        }

        let update = self.shell.pump();
        if update.style_changed {
            ctx.request_repaint();
        }
        self.sync_layer();

        if self.shell.sidebar_visible() {
            egui::SidePanel::left("inspector")
                .resizable(false)
                .default_width(240.0)
                .show(ctx, |ui| self.show_inspector(ui));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.show_map(ui));

        if !self.shell.sidebar_visible() {
            egui::Area::new(Id::new("open-inspector"))
                .anchor(Align2::LEFT_TOP, [10.0, 10.0])
                .show(ctx, |ui| {
                    if ui.button("Open Inspector").clicked() {
                        self.shell.toggle_sidebar();
                    }
                });
        }
    }
}

fn screen_position(projector: &ScreenProjector, park: &ParkFeature) -> Option<Pos2> {
    projector
        .to_screen(park.latitude, park.longitude)
        .map(|[x, y]| Pos2::new(x, y))
}

fn to_color32(color: Color) -> Color32 {
    let [r, g, b, a] = color.to_u8_array();
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn health_color(health: StyleHealth) -> Color32 {
    match health {
        StyleHealth::Unknown => Color32::GRAY,
        StyleHealth::Healthy => Color32::from_rgb(22, 163, 74),
        StyleHealth::Unhealthy => Color32::from_rgb(239, 68, 68),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_colors() {
        assert_eq!(
            to_color32(Color::from_hex("#16a34a")),
            Color32::from_rgb(22, 163, 74)
        );
        assert_eq!(to_color32(Color::BLACK), Color32::BLACK);
    }
}
