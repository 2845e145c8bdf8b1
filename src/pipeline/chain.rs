use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;
use thiserror::Error;

use super::clip::{BoxClip, clip_by_scalars};
use super::contour::contour;
use super::mesh::TriMesh;
use super::probe::probe;
use crate::color::ColorMapping;
use crate::data::model::{Axis, ScalarVolume};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("a probe stage needs a secondary (gradient) volume")]
    ProbeWithoutSecondary,
    #[error("gradient clipping needs a probe stage to supply gradient values")]
    GradientClipWithoutProbe,
    #[error("the pipeline has no surfaces to extract")]
    NoSurfaces,
}

// ---------------------------------------------------------------------------
// Layout: which stages are enabled
// ---------------------------------------------------------------------------

/// Stage kinds a layout can enable, declared in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Contour,
    AxisClip,
    Probe,
    /// Expands to a lower clip followed by an inverted upper clip.
    GradientClip,
    ColorMap,
}

/// Declarative set of enabled stages. Whatever order they are listed in,
/// they are composed in [`StageKind`] order. Contour is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayout {
    stages: BTreeSet<StageKind>,
}

impl PipelineLayout {
    pub fn new(stages: impl IntoIterator<Item = StageKind>) -> Self {
        let mut stages: BTreeSet<StageKind> = stages.into_iter().collect();
        stages.insert(StageKind::Contour);
        Self { stages }
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.stages.contains(&kind)
    }

    /// Enabled stages in pipeline order.
    pub fn ordered(&self) -> impl Iterator<Item = StageKind> + '_ {
        self.stages.iter().copied()
    }

    pub fn validate(&self, has_secondary: bool) -> Result<(), ChainError> {
        if self.contains(StageKind::Probe) && !has_secondary {
            return Err(ChainError::ProbeWithoutSecondary);
        }
        if self.contains(StageKind::GradientClip) && !self.contains(StageKind::Probe) {
            return Err(ChainError::GradientClipWithoutProbe);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// One node of a surface branch and its current parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Contour { levels: Vec<f32> },
    AxisClip(BoxClip),
    Probe,
    /// Keeps scalars `> threshold`, or `<= threshold` when `inside_out`.
    ScalarClip { threshold: f32, inside_out: bool },
    ColorMap(ColorMapping),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Contour { .. } => "contour",
            Stage::AxisClip(_) => "axis-clip",
            Stage::Probe => "probe",
            Stage::ScalarClip {
                inside_out: false, ..
            } => "gradient-clip-lower",
            Stage::ScalarClip {
                inside_out: true, ..
            } => "gradient-clip-upper",
            Stage::ColorMap(_) => "color-map",
        }
    }

    fn execute(&self, input: &TriMesh, source: &ScalarVolume, secondary: Option<&ScalarVolume>) -> TriMesh {
        match self {
            Stage::Contour { levels } => contour(source, levels),
            Stage::AxisClip(clip) => clip.apply(input),
            Stage::Probe => match secondary {
                Some(volume) => probe(input, volume),
                None => input.clone(),
            },
            Stage::ScalarClip {
                threshold,
                inside_out,
            } => clip_by_scalars(input, *threshold, *inside_out),
            Stage::ColorMap(mapping) => {
                let mut out = input.clone();
                out.colors = Some(
                    input
                        .scalars
                        .iter()
                        .map(|&s| mapping.color_for(s as f64))
                        .collect(),
                );
                out
            }
        }
    }
}

/// Parameters of one surface branch before assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSpec {
    pub label: String,
    pub isovalues: Vec<f32>,
    /// Initial gradient window; defaults to the secondary scalar range.
    pub gradient_range: Option<(f64, f64)>,
    pub color: ColorMapping,
}

/// A linear stage sequence ending in one renderable surface.
///
/// Each stage caches its output; `None` marks a stage that must be
/// recomputed from its upstream neighbour.
#[derive(Debug)]
pub struct SurfaceBranch {
    label: String,
    stages: Vec<Stage>,
    outputs: Vec<Option<TriMesh>>,
}

impl SurfaceBranch {
    fn assemble(
        spec: BranchSpec,
        layout: &PipelineLayout,
        axis_clip: BoxClip,
        secondary_range: Option<(f64, f64)>,
    ) -> Self {
        let mut stages = Vec::new();
        for kind in layout.ordered() {
            match kind {
                StageKind::Contour => stages.push(Stage::Contour {
                    levels: spec.isovalues.clone(),
                }),
                StageKind::AxisClip => stages.push(Stage::AxisClip(axis_clip)),
                StageKind::Probe => stages.push(Stage::Probe),
                StageKind::GradientClip => {
                    let (lo, hi) = spec.gradient_range.or(secondary_range).unwrap_or((0.0, 0.0));
                    stages.push(Stage::ScalarClip {
                        threshold: lo as f32,
                        inside_out: false,
                    });
                    stages.push(Stage::ScalarClip {
                        threshold: hi as f32,
                        inside_out: true,
                    });
                }
                StageKind::ColorMap => stages.push(Stage::ColorMap(spec.color.clone())),
            }
        }
        let outputs = vec![None; stages.len()];
        Self {
            label: spec.label,
            stages,
            outputs,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Output of the last stage, once computed.
    pub fn output(&self) -> Option<&TriMesh> {
        self.outputs.last()?.as_ref()
    }

    /// Output of stage `index`, once computed.
    pub fn stage_output(&self, index: usize) -> Option<&TriMesh> {
        self.outputs.get(index)?.as_ref()
    }

    fn invalidate_from(&mut self, index: usize) {
        for out in &mut self.outputs[index..] {
            *out = None;
        }
    }

    /// Recompute every stage without a cached output, in order.
    fn update(&mut self, source: &ScalarVolume, secondary: Option<&ScalarVolume>) {
        let empty = TriMesh::default();
        for i in 0..self.stages.len() {
            if self.outputs[i].is_some() {
                continue;
            }
            let started = Instant::now();
            let input = match i {
                0 => &empty,
                _ => self.outputs[i - 1].as_ref().unwrap_or(&empty),
            };
            let out = self.stages[i].execute(input, source, secondary);
            log::debug!(
                "[{}] {} -> {} triangles in {:.1?}",
                self.label,
                self.stages[i].name(),
                out.triangle_count(),
                started.elapsed()
            );
            self.outputs[i] = Some(out);
        }
    }

    fn find(&self, pred: impl Fn(&Stage) -> bool) -> Option<usize> {
        self.stages.iter().position(pred)
    }
}

// ---------------------------------------------------------------------------
// Parameters and redraw
// ---------------------------------------------------------------------------

/// An externally adjustable pipeline parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    /// Contour level `n`, counted across all branches in order.
    Isovalue(usize),
    /// Upper bound of the box clip on one axis (all branches).
    AxisClip(Axis),
    GradientMin,
    GradientMax,
}

/// Display surface that can be asked to repaint.
pub trait RedrawSurface {
    fn request_redraw(&self);
}

impl RedrawSurface for egui::Context {
    fn request_redraw(&self) {
        self.request_repaint();
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the source volumes and every surface branch; the only way the UI
/// mutates the pipeline.
pub struct PipelineController<R> {
    source: Arc<ScalarVolume>,
    secondary: Option<Arc<ScalarVolume>>,
    branches: Vec<SurfaceBranch>,
    surface: R,
    revision: u64,
}

impl<R: RedrawSurface> PipelineController<R> {
    /// Assemble one branch per spec and compute the initial outputs.
    pub fn build(
        source: Arc<ScalarVolume>,
        secondary: Option<Arc<ScalarVolume>>,
        layout: &PipelineLayout,
        axis_clip: BoxClip,
        branches: Vec<BranchSpec>,
        surface: R,
    ) -> Result<Self, ChainError> {
        layout.validate(secondary.is_some())?;
        if branches.is_empty() {
            return Err(ChainError::NoSurfaces);
        }
        let secondary_range = secondary.as_deref().map(ScalarVolume::scalar_range);
        let branches: Vec<SurfaceBranch> = branches
            .into_iter()
            .map(|spec| SurfaceBranch::assemble(spec, layout, axis_clip, secondary_range))
            .collect();
        log::info!(
            "Assembled {} branch(es): {}",
            branches.len(),
            branches[0]
                .stages
                .iter()
                .map(Stage::name)
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let mut controller = Self {
            source,
            secondary,
            branches,
            surface,
            revision: 0,
        };
        controller.update();
        Ok(controller)
    }

    /// Write `value` into the stage owning `param`, recompute, and request
    /// one redraw. Nothing is validated; parameters whose stage is absent
    /// are ignored.
    pub fn set(&mut self, param: ParamId, value: f64) {
        let touched = match param {
            ParamId::Isovalue(n) => self.write_isovalue(n, value as f32),
            ParamId::AxisClip(axis) => self.write_all(
                |s| matches!(s, Stage::AxisClip(_)),
                |s| {
                    if let Stage::AxisClip(clip) = s {
                        clip.upper[axis.index()] = value;
                    }
                },
            ),
            ParamId::GradientMin => self.write_scalar_clip(false, value as f32),
            ParamId::GradientMax => self.write_scalar_clip(true, value as f32),
        };
        if !touched {
            log::debug!("{param:?} has no stage in this pipeline; ignored");
        }
        self.update();
        self.surface.request_redraw();
    }

    pub fn set_isovalue(&mut self, index: usize, value: f64) {
        self.set(ParamId::Isovalue(index), value);
    }

    pub fn set_axis_clip(&mut self, axis: Axis, upper: f64) {
        self.set(ParamId::AxisClip(axis), upper);
    }

    /// Set all three axis upper bounds with a single redraw.
    pub fn set_axis_clips(&mut self, upper: [f64; 3]) {
        self.write_all(
            |s| matches!(s, Stage::AxisClip(_)),
            |s| {
                if let Stage::AxisClip(clip) = s {
                    clip.upper = upper;
                }
            },
        );
        self.update();
        self.surface.request_redraw();
    }

    pub fn set_gradient_min(&mut self, value: f64) {
        self.set(ParamId::GradientMin, value);
    }

    pub fn set_gradient_max(&mut self, value: f64) {
        self.set(ParamId::GradientMax, value);
    }

    fn write_isovalue(&mut self, n: usize, value: f32) -> bool {
        let mut offset = 0;
        for branch in &mut self.branches {
            let Some(idx) = branch.find(|s| matches!(s, Stage::Contour { .. })) else {
                continue;
            };
            if let Stage::Contour { levels } = &mut branch.stages[idx] {
                if n < offset + levels.len() {
                    levels[n - offset] = value;
                    branch.invalidate_from(idx);
                    return true;
                }
                offset += levels.len();
            }
        }
        false
    }

    fn write_scalar_clip(&mut self, upper: bool, value: f32) -> bool {
        self.write_all(
            |s| matches!(s, Stage::ScalarClip { inside_out, .. } if *inside_out == upper),
            |s| {
                if let Stage::ScalarClip { threshold, .. } = s {
                    *threshold = value;
                }
            },
        )
    }

    /// Apply `write` to the first matching stage of every branch.
    fn write_all(&mut self, pred: impl Fn(&Stage) -> bool, write: impl Fn(&mut Stage)) -> bool {
        let mut touched = false;
        for branch in &mut self.branches {
            if let Some(idx) = branch.find(&pred) {
                write(&mut branch.stages[idx]);
                branch.invalidate_from(idx);
                touched = true;
            }
        }
        touched
    }

    fn update(&mut self) {
        let secondary = self.secondary.as_deref();
        for branch in &mut self.branches {
            branch.update(&self.source, secondary);
        }
        self.revision += 1;
    }
}

impl<R> PipelineController<R> {
    /// Current value of `param`, read from the first branch that has it.
    pub fn parameter(&self, param: ParamId) -> Option<f64> {
        match param {
            ParamId::Isovalue(n) => self
                .branches
                .iter()
                .flat_map(|b| b.stages.iter())
                .filter_map(|s| match s {
                    Stage::Contour { levels } => Some(levels.iter()),
                    _ => None,
                })
                .flatten()
                .nth(n)
                .map(|&v| v as f64),
            ParamId::AxisClip(axis) => self.axis_clip().map(|c| c.upper[axis.index()]),
            ParamId::GradientMin | ParamId::GradientMax => {
                let upper = param == ParamId::GradientMax;
                self.stages().find_map(|s| match s {
                    Stage::ScalarClip {
                        threshold,
                        inside_out,
                    } if *inside_out == upper => Some(*threshold as f64),
                    _ => None,
                })
            }
        }
    }

    /// Box clip of the first branch.
    pub fn axis_clip(&self) -> Option<&BoxClip> {
        self.stages().find_map(|s| match s {
            Stage::AxisClip(clip) => Some(clip),
            _ => None,
        })
    }

    /// Colour mapping of the first branch that has a ramp (for a legend).
    pub fn ramp_mapping(&self) -> Option<&ColorMapping> {
        self.stages().find_map(|s| match s {
            Stage::ColorMap(m @ ColorMapping::Ramp(_)) => Some(m),
            _ => None,
        })
    }

    fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.branches.iter().flat_map(|b| b.stages.iter())
    }

    pub fn branches(&self) -> &[SurfaceBranch] {
        &self.branches
    }

    /// Final outputs of all branches.
    pub fn outputs(&self) -> impl Iterator<Item = &TriMesh> {
        self.branches.iter().filter_map(SurfaceBranch::output)
    }

    pub fn triangle_count(&self) -> usize {
        self.outputs().map(TriMesh::triangle_count).sum()
    }

    pub fn source(&self) -> &ScalarVolume {
        &self.source
    }

    pub fn secondary(&self) -> Option<&ScalarVolume> {
        self.secondary.as_deref()
    }

    /// Bumped every time outputs are recomputed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }
}
