use eframe::egui::{self, Color32, RichText, Ui};

use crate::pipeline::mesh::TriMesh;
use crate::state::{AppState, SliderPhase};
use crate::ui::viewport::Viewport;

// ---------------------------------------------------------------------------
// Control panel – one slider row per binding
// ---------------------------------------------------------------------------

/// Render the slider grid: label, slider, readout.
pub fn control_panel(ui: &mut Ui, state: &mut AppState) {
    let AppState {
        controller, panel, ..
    } = state;
    let mut changed = false;

    egui::Grid::new("slider_grid")
        .num_columns(3)
        .spacing([8.0, 4.0])
        .show(ui, |ui: &mut Ui| {
            for binding in panel.bindings_mut() {
                ui.label(&binding.label);

                let mut value = binding.value;
                let response = ui.add_sized(
                    [ui.available_width().max(120.0) - 60.0, 18.0],
                    egui::Slider::new(&mut value, binding.min..=binding.max).show_value(false),
                );
                binding.phase = if response.dragged() {
                    SliderPhase::Changing
                } else {
                    SliderPhase::Idle
                };
                if response.changed() {
                    binding.on_changed(value, controller);
                    changed = true;
                }

                ui.label(RichText::new(&binding.readout).monospace());
                ui.end_row();
            }
        });

    if changed {
        state.refresh_status();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top toolbar: mode, surface summary, camera reset and any
/// empty-surface warning.
pub fn top_bar(ui: &mut Ui, state: &AppState, viewport: &mut Viewport) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.strong(state.mode_name);
        ui.separator();

        ui.label(state.summary()).on_hover_ui(|ui: &mut Ui| {
            for branch in state.controller.branches() {
                let n = branch.output().map_or(0, TriMesh::triangle_count);
                ui.label(format!("{}: {n} triangles", branch.label()));
            }
        });

        ui.separator();

        if ui.button("Reset camera").clicked() {
            viewport.reset_camera();
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}
