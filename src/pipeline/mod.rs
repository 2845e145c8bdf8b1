//! Filter chain: stages that turn a scalar volume into coloured surfaces.
//!
//! Architecture:
//! ```text
//!   ScalarVolume (source)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ contour   │  marching tetrahedra → TriMesh (scalar = level)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ axis clip │  box [min-1, upper] per axis
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  probe    │  scalars ← secondary volume (gradient magnitude)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────────┐
//!   │ gradient clip  │  keep > min, then keep <= max
//!   └───────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ color map │  ramp or flat colour → per-vertex colours
//!   └──────────┘
//! ```
//!
//! Only the contour stage is mandatory; [`chain::PipelineLayout`] decides
//! which of the others exist. [`chain::PipelineController`] owns the stages
//! and is the only writer of their parameters.

pub mod chain;
pub mod clip;
pub mod contour;
pub mod mesh;
pub mod probe;
