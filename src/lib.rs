//! Interactive isosurface viewer for CT-like scalar volumes.
//!
//! A [`setup::ViewerSetup`] turns loaded volumes into a
//! [`pipeline::chain::PipelineController`] and a [`state::ControlPanel`];
//! the egui front end in [`app`] and [`ui`] drives them.

pub mod app;
pub mod cli;
pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod setup;
pub mod state;
pub mod ui;
