use std::sync::Arc;

use crate::color::{ColorMapping, ColorPoint, ColorRamp, Rgb};
use crate::config::ViewerConfig;
use crate::data::model::ScalarVolume;
use crate::data::params::SurfaceParams;
use crate::pipeline::chain::{
    BranchSpec, ChainError, ParamId, PipelineController, PipelineLayout, RedrawSurface, StageKind,
};
use crate::pipeline::clip::BoxClip;
use crate::state::{ControlPanel, SliderBinding};

// ---------------------------------------------------------------------------
// Viewer modes
// ---------------------------------------------------------------------------

/// What the window shows; one variant per subcommand.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// A single isosurface.
    Surface { isovalue: Option<i32> },
    /// One isosurface coloured and clipped by gradient magnitude.
    Gradient { isovalue: Option<i32> },
    /// Several contour levels coloured by gradient magnitude.
    Transfer {
        isovalues: Vec<i32>,
        color_map: Option<Vec<ColorPoint>>,
    },
    /// Independent flat-coloured surfaces; `None` uses the tissue presets.
    Complete { surfaces: Option<Vec<SurfaceParams>> },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Surface { .. } => "surface",
            Mode::Gradient { .. } => "gradient",
            Mode::Transfer { .. } => "transfer",
            Mode::Complete { .. } => "complete",
        }
    }
}

/// Surfaces without a colour-map stage are drawn in this colour.
pub const DEFAULT_SURFACE_COLOR: [f32; 3] = [0.9, 0.9, 0.9];

// ---------------------------------------------------------------------------
// ViewerSetup: everything needed to open a window
// ---------------------------------------------------------------------------

/// Loaded inputs plus configuration, ready to assemble the pipeline and the
/// control panel.
#[derive(Debug, Clone)]
pub struct ViewerSetup {
    pub mode: Mode,
    pub source: Arc<ScalarVolume>,
    /// Gradient magnitude volume, probed onto the surfaces.
    pub secondary: Option<Arc<ScalarVolume>>,
    /// Initial clip upper bounds; `None` uses the configured maxima.
    pub clip: Option<[i32; 3]>,
    pub config: ViewerConfig,
}

impl ViewerSetup {
    pub fn layout(&self) -> PipelineLayout {
        match self.mode {
            Mode::Surface { .. } => PipelineLayout::new([StageKind::AxisClip]),
            Mode::Transfer { .. } => {
                PipelineLayout::new([StageKind::AxisClip, StageKind::Probe, StageKind::ColorMap])
            }
            Mode::Gradient { .. } | Mode::Complete { .. } => PipelineLayout::new([
                StageKind::AxisClip,
                StageKind::Probe,
                StageKind::GradientClip,
                StageKind::ColorMap,
            ]),
        }
    }

    pub fn initial_clip(&self) -> [i32; 3] {
        self.clip.unwrap_or_else(|| self.config.axis_clips.maxima())
    }

    pub fn axis_box(&self) -> BoxClip {
        BoxClip {
            lower: self.config.axis_clips.lower_bounds(),
            upper: self.initial_clip().map(f64::from),
        }
    }

    /// Isovalue for the single-level modes.
    fn isovalue(&self, explicit: Option<i32>) -> i32 {
        explicit.unwrap_or_else(|| self.source.default_isovalue())
    }

    fn secondary_range(&self) -> (f64, f64) {
        self.secondary
            .as_deref()
            .map(ScalarVolume::scalar_range)
            .unwrap_or((0.0, 0.0))
    }

    fn gradient_ramp(&self) -> ColorMapping {
        ColorMapping::Ramp(ColorRamp::inferno16(self.secondary_range()))
    }

    fn branches(&self) -> Vec<BranchSpec> {
        let [r, g, b] = DEFAULT_SURFACE_COLOR;
        let flat = ColorMapping::Flat(Rgb::new(r, g, b));
        match &self.mode {
            Mode::Surface { isovalue } => vec![BranchSpec {
                label: "isosurface".into(),
                isovalues: vec![self.isovalue(*isovalue) as f32],
                gradient_range: None,
                color: flat,
            }],
            Mode::Gradient { isovalue } => vec![BranchSpec {
                label: "isosurface".into(),
                isovalues: vec![self.isovalue(*isovalue) as f32],
                gradient_range: None,
                color: self.gradient_ramp(),
            }],
            Mode::Transfer {
                isovalues,
                color_map,
            } => vec![BranchSpec {
                label: "transfer".into(),
                isovalues: isovalues.iter().map(|&v| v as f32).collect(),
                gradient_range: None,
                color: match color_map {
                    Some(points) => ColorMapping::Ramp(ColorRamp::new(points.clone())),
                    None => self.gradient_ramp(),
                },
            }],
            Mode::Complete {
                surfaces: Some(surfaces),
            } => surfaces
                .iter()
                .enumerate()
                .map(|(i, s)| BranchSpec {
                    label: format!("surface {} ({})", i + 1, s.value),
                    isovalues: vec![s.value as f32],
                    gradient_range: Some(s.gradient_range),
                    color: ColorMapping::Flat(s.color),
                })
                .collect(),
            Mode::Complete { surfaces: None } => self
                .config
                .presets
                .iter()
                .map(|p| BranchSpec {
                    label: p.name.clone(),
                    isovalues: vec![p.value as f32],
                    gradient_range: None,
                    color: ColorMapping::Flat(p.rgb()),
                })
                .collect(),
        }
    }

    /// Check the layout against the loaded inputs without building anything.
    pub fn validate(&self) -> Result<(), ChainError> {
        self.layout().validate(self.secondary.is_some())
    }

    fn panel(&self) -> ControlPanel {
        let mut panel = ControlPanel::default();
        let (src_min, src_max) = self.source.scalar_range();
        let isovalue_slider = |label: String, index: usize, initial: i32| {
            SliderBinding::new(label, ParamId::Isovalue(index), src_min as i32, src_max as i32, initial)
        };
        match &self.mode {
            Mode::Surface { isovalue } => {
                panel.push(isovalue_slider("Isovalue".into(), 0, self.isovalue(*isovalue)));
            }
            Mode::Gradient { isovalue } => {
                panel.push(isovalue_slider("Isovalue".into(), 0, self.isovalue(*isovalue)));
                let (gmin, gmax) = self.secondary_range();
                let (gmin, gmax) = (gmin as i32, gmax as i32);
                panel.push(SliderBinding::new("gradmin", ParamId::GradientMin, gmin, gmax, gmin));
                panel.push(SliderBinding::new("gradmax", ParamId::GradientMax, gmin, gmax, gmax));
            }
            Mode::Transfer { isovalues, .. } => {
                for (i, &v) in isovalues.iter().enumerate() {
                    panel.push(isovalue_slider(format!("Isovalue {}", i + 1), i, v));
                }
            }
            Mode::Complete { .. } => {}
        }
        panel.push_axis_clips(&self.config.axis_clips, self.initial_clip());
        panel
    }

    /// Assemble the pipeline and the matching sliders.
    pub fn build<R: RedrawSurface>(
        &self,
        surface: R,
    ) -> Result<(PipelineController<R>, ControlPanel), ChainError> {
        let controller = PipelineController::build(
            Arc::clone(&self.source),
            self.secondary.clone(),
            &self.layout(),
            self.axis_box(),
            self.branches(),
            surface,
        )?;
        Ok((controller, self.panel()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Axis;
    use crate::pipeline::chain::tests::Counter;
    use crate::pipeline::chain::Stage;

    /// Values run from 0 to 2000 along x.
    fn ct() -> Arc<ScalarVolume> {
        Arc::new(ScalarVolume::from_fn([21, 11, 11], [0.0; 3], [1.0; 3], |x, _, _| {
            (x * 100.0) as f32
        }))
    }

    fn grad() -> Arc<ScalarVolume> {
        Arc::new(ScalarVolume::from_fn([21, 11, 11], [0.0; 3], [1.0; 3], |_, y, _| {
            (y * 3.0) as f32
        }))
    }

    fn setup(mode: Mode) -> ViewerSetup {
        ViewerSetup {
            mode,
            source: ct(),
            secondary: Some(grad()),
            clip: None,
            config: ViewerConfig::default(),
        }
    }

    #[test]
    fn surface_defaults_to_midpoint_and_configured_clips() {
        let counter = Counter::default();
        let (c, panel) = setup(Mode::Surface { isovalue: None })
            .build(counter.clone())
            .unwrap();
        assert_eq!(c.parameter(ParamId::Isovalue(0)), Some(1000.0));
        assert_eq!(c.axis_clip().unwrap().upper, [250.0, 250.0, 270.0]);
        assert_eq!(c.axis_clip().unwrap().lower, [0.0, 0.0, 0.0]);
        let iso = panel.binding(ParamId::Isovalue(0)).unwrap();
        assert_eq!((iso.min, iso.max, iso.value), (0, 2000, 1000));
        assert_eq!(panel.bindings().len(), 4);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn explicit_isovalue_widens_slider() {
        let (c, panel) = setup(Mode::Surface {
            isovalue: Some(2500),
        })
        .build(Counter::default())
        .unwrap();
        assert_eq!(c.parameter(ParamId::Isovalue(0)), Some(2500.0));
        assert_eq!(panel.binding(ParamId::Isovalue(0)).unwrap().max, 2500);
        assert_eq!(c.triangle_count(), 0);
    }

    #[test]
    fn gradient_mode_sliders_span_secondary_range() {
        let s = setup(Mode::Gradient { isovalue: Some(700) });
        let (c, panel) = s.build(Counter::default()).unwrap();
        let labels: Vec<&str> = panel.bindings().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Isovalue", "gradmin", "gradmax", "Clip X", "Clip Y", "Clip Z"]);
        let gmax = panel.binding(ParamId::GradientMax).unwrap();
        assert_eq!((gmax.min, gmax.max, gmax.value), (0, 30, 30));
        assert_eq!(c.parameter(ParamId::GradientMax), Some(30.0));
        assert!(c.ramp_mapping().is_some());
    }

    #[test]
    fn transfer_mode_has_one_slider_per_level() {
        let s = setup(Mode::Transfer {
            isovalues: vec![500, 1500],
            color_map: None,
        });
        assert!(!s.layout().contains(StageKind::GradientClip));
        let (c, panel) = s.build(Counter::default()).unwrap();
        assert_eq!(c.parameter(ParamId::Isovalue(1)), Some(1500.0));
        assert_eq!(panel.binding(ParamId::Isovalue(1)).unwrap().label, "Isovalue 2");
        let out = c.outputs().next().unwrap();
        assert!(!out.is_empty());
        assert!(out.colors.is_some());
    }

    #[test]
    fn complete_mode_uses_presets_and_clip_sliders_only() {
        let mut s = setup(Mode::Complete { surfaces: None });
        s.clip = Some([100, 200, 300]);
        let (c, panel) = s.build(Counter::default()).unwrap();
        assert_eq!(c.branches().len(), 3);
        assert_eq!(c.branches()[2].label(), "bone");
        assert_eq!(panel.bindings().len(), 3);
        assert_eq!(panel.binding(ParamId::AxisClip(Axis::Z)).unwrap().max, 300);
        let flat = c.branches()[0].stages().iter().any(|st| {
            matches!(st, Stage::ColorMap(ColorMapping::Flat(_)))
        });
        assert!(flat);
    }

    #[test]
    fn complete_mode_uses_params_file_ranges() {
        let s = setup(Mode::Complete {
            surfaces: Some(vec![SurfaceParams {
                value: 800,
                gradient_range: (3.0, 12.0),
                color: Rgb::new(1.0, 0.0, 0.0),
            }]),
        });
        let (c, _) = s.build(Counter::default()).unwrap();
        assert_eq!(c.parameter(ParamId::GradientMin), Some(3.0));
        assert_eq!(c.parameter(ParamId::GradientMax), Some(12.0));
        let out = c.outputs().next().unwrap();
        assert!(!out.is_empty());
        // Gradient is 3*y, so the band (3, 12] keeps 1 < y <= 4.
        assert!(out.positions.iter().all(|p| p[1] >= 1.0 - 1e-3 && p[1] <= 4.0 + 1e-3));
    }

    #[test]
    fn missing_gradient_volume_fails_validation() {
        let mut s = setup(Mode::Gradient { isovalue: None });
        s.secondary = None;
        assert_eq!(s.validate(), Err(ChainError::ProbeWithoutSecondary));
        assert!(setup(Mode::Surface { isovalue: None }).validate().is_ok());
    }
}
