use eframe::egui;

use crate::config::AxisClipRanges;
use crate::data::model::Axis;
use crate::pipeline::chain::{ParamId, PipelineController, RedrawSurface};

// ---------------------------------------------------------------------------
// Slider bindings
// ---------------------------------------------------------------------------

/// Interaction phase of one slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliderPhase {
    #[default]
    Idle,
    /// The user is dragging the handle.
    Changing,
}

/// One slider: its live value, the parameter it drives, and its readout.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderBinding {
    pub label: String,
    pub param: ParamId,
    pub min: i32,
    pub max: i32,
    pub value: i32,
    /// Text shown next to the slider; always the decimal `value`.
    pub readout: String,
    pub phase: SliderPhase,
}

impl SliderBinding {
    /// Bounds are `[min, max(configured_max, initial)]`. The initial value
    /// is never clamped, so it may sit below `min`.
    pub fn new(label: impl Into<String>, param: ParamId, min: i32, configured_max: i32, initial: i32) -> Self {
        Self {
            label: label.into(),
            param,
            min,
            max: configured_max.max(initial),
            value: initial,
            readout: initial.to_string(),
            phase: SliderPhase::Idle,
        }
    }

    /// Apply a new slider position: update the readout, then the pipeline.
    pub fn on_changed<R: RedrawSurface>(&mut self, value: i32, controller: &mut PipelineController<R>) {
        self.value = value;
        self.readout = value.to_string();
        controller.set(self.param, value as f64);
    }
}

/// All sliders of the window, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlPanel {
    bindings: Vec<SliderBinding>,
}

impl ControlPanel {
    pub fn new(bindings: Vec<SliderBinding>) -> Self {
        Self { bindings }
    }

    pub fn push(&mut self, binding: SliderBinding) {
        self.bindings.push(binding);
    }

    /// Append "Clip X/Y/Z" sliders with the configured bounds.
    pub fn push_axis_clips(&mut self, ranges: &AxisClipRanges, initial: [i32; 3]) {
        for axis in Axis::ALL {
            let range = ranges.get(axis);
            self.push(SliderBinding::new(
                format!("Clip {axis}"),
                ParamId::AxisClip(axis),
                range.min,
                range.max,
                initial[axis.index()],
            ));
        }
    }

    pub fn bindings(&self) -> &[SliderBinding] {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut [SliderBinding] {
        &mut self.bindings
    }

    pub fn binding(&self, param: ParamId) -> Option<&SliderBinding> {
        self.bindings.iter().find(|b| b.param == param)
    }

    /// Move the slider bound to `param` as if the user had dragged it.
    /// Returns `false` when no slider drives `param`.
    pub fn change<R: RedrawSurface>(
        &mut self,
        param: ParamId,
        value: i32,
        controller: &mut PipelineController<R>,
    ) -> bool {
        match self.bindings.iter_mut().find(|b| b.param == param) {
            Some(binding) => {
                binding.on_changed(value, controller);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Owner of the filter chain; repaints through the egui context.
    pub controller: PipelineController<egui::Context>,

    pub panel: ControlPanel,

    /// Subcommand name shown in the top bar.
    pub mode_name: &'static str,

    /// Viewport background.
    pub background: egui::Color32,

    /// Warning shown in the top bar, refreshed after every slider change.
    pub status_message: Option<String>,
}

/// Warning for the current pipeline outputs, if any.
pub fn pipeline_status<R: RedrawSurface>(controller: &PipelineController<R>) -> Option<String> {
    if controller.triangle_count() == 0 {
        return Some("Surface is empty: move the isovalue or widen the clip".to_string());
    }
    let empty: Vec<&str> = controller
        .branches()
        .iter()
        .filter(|b| !b.output().is_some_and(|m| m.triangle_count() > 0))
        .map(|b| b.label())
        .collect();
    if empty.is_empty() {
        None
    } else {
        Some(format!("Empty: {}", empty.join(", ")))
    }
}

impl AppState {
    pub fn new(
        controller: PipelineController<egui::Context>,
        panel: ControlPanel,
        mode_name: &'static str,
        background: [u8; 3],
    ) -> Self {
        let [r, g, b] = background;
        let status_message = pipeline_status(&controller);
        Self {
            controller,
            panel,
            mode_name,
            background: egui::Color32::from_rgb(r, g, b),
            status_message,
        }
    }

    pub fn refresh_status(&mut self) {
        self.status_message = pipeline_status(&self.controller);
    }

    /// Summary line for the top bar.
    pub fn summary(&self) -> String {
        format!(
            "{} surface(s), {} triangles",
            self.controller.branches().len(),
            self.controller.triangle_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ViewerConfig;
    use crate::data::model::ScalarVolume;
    use crate::pipeline::chain::tests::Counter;
    use crate::pipeline::chain::{BranchSpec, PipelineLayout, StageKind};
    use crate::pipeline::clip::BoxClip;
    use crate::color::{ColorMapping, Rgb};

    fn controller(counter: &Counter) -> PipelineController<Counter> {
        let volume = Arc::new(ScalarVolume::from_fn([8, 8, 8], [0.0; 3], [1.0; 3], |x, y, z| {
            (x + y + z) as f32
        }));
        PipelineController::build(
            volume,
            None,
            &PipelineLayout::new([StageKind::AxisClip]),
            BoxClip {
                lower: [0.0; 3],
                upper: [250.0, 250.0, 270.0],
            },
            vec![BranchSpec {
                label: "surface".into(),
                isovalues: vec![10.0],
                gradient_range: None,
                color: ColorMapping::Flat(Rgb::new(1.0, 1.0, 1.0)),
            }],
            counter.clone(),
        )
        .unwrap()
    }

    #[test]
    fn slider_max_only_widens() {
        let narrow = SliderBinding::new("Isovalue", ParamId::Isovalue(0), 0, 100, 500);
        assert_eq!((narrow.min, narrow.max, narrow.value), (0, 500, 500));
        let wide = SliderBinding::new("Isovalue", ParamId::Isovalue(0), 0, 1000, 500);
        assert_eq!((wide.min, wide.max), (0, 1000));
        // Never clamped upward either.
        let below = SliderBinding::new("Clip X", ParamId::AxisClip(Axis::X), 10, 250, 3);
        assert_eq!((below.min, below.max, below.value), (10, 250, 3));
        assert_eq!(below.readout, "3");
        assert_eq!(below.phase, SliderPhase::Idle);
    }

    #[test]
    fn on_changed_updates_readout_and_pipeline() {
        let counter = Counter::default();
        let mut c = controller(&counter);
        let mut binding = SliderBinding::new("Isovalue", ParamId::Isovalue(0), 0, 21, 10);
        binding.on_changed(12, &mut c);
        assert_eq!(binding.value, 12);
        assert_eq!(binding.readout, "12");
        assert_eq!(c.parameter(ParamId::Isovalue(0)), Some(12.0));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn axis_clip_sliders_follow_config() {
        let config = ViewerConfig::default();
        let mut panel = ControlPanel::default();
        panel.push_axis_clips(&config.axis_clips, [250, 300, 100]);
        let labels: Vec<&str> = panel.bindings().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Clip X", "Clip Y", "Clip Z"]);
        let y = panel.binding(ParamId::AxisClip(Axis::Y)).unwrap();
        assert_eq!((y.min, y.max, y.value), (1, 300, 300));
        let z = panel.binding(ParamId::AxisClip(Axis::Z)).unwrap();
        assert_eq!((z.min, z.max, z.value), (1, 270, 100));
    }

    #[test]
    fn change_drives_only_the_bound_parameter() {
        let counter = Counter::default();
        let mut c = controller(&counter);
        let mut panel = ControlPanel::default();
        panel.push_axis_clips(&ViewerConfig::default().axis_clips, [250, 250, 270]);
        assert!(panel.change(ParamId::AxisClip(Axis::X), 5, &mut c));
        assert_eq!(c.parameter(ParamId::AxisClip(Axis::X)), Some(5.0));
        assert_eq!(c.parameter(ParamId::AxisClip(Axis::Y)), Some(250.0));
        assert_eq!(panel.binding(ParamId::AxisClip(Axis::X)).unwrap().readout, "5");
        assert!(!panel.change(ParamId::GradientMin, 5, &mut c));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn status_reports_empty_surface() {
        let counter = Counter::default();
        let mut c = controller(&counter);
        assert_eq!(pipeline_status(&c), None);

        // Every vertex is at most 21, so level 100 yields nothing.
        c.set_isovalue(0, 100.0);
        assert_eq!(c.triangle_count(), 0);
        let msg = pipeline_status(&c).unwrap();
        assert!(msg.contains("empty"));

        c.set_isovalue(0, 10.0);
        assert_eq!(pipeline_status(&c), None);
    }
}
