//! Data layer: volumes, loading, and the plain-text parameter files.
//!
//! Architecture:
//! ```text
//!   .vti (ascii / base64 / appended, optional zlib)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse XML + data arrays → ScalarVolume
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ ScalarVolume  │  dims, origin, spacing, f32 samples, range
//!   └──────────────┘
//!
//!   isovalues.txt / cmap.txt / params.txt
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  params   │  line parsers → Vec<i32>, ColorPoint, SurfaceParams
//!   └──────────┘
//! ```

pub mod loader;
pub mod model;
pub mod params;
