use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};

use crate::config::ViewerConfig;
use crate::data::loader::load_file;
use crate::data::model::ScalarVolume;
use crate::data::params::{read_color_map, read_isovalues, read_surface_params};
use crate::setup::{Mode, ViewerSetup};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(
    name = "isoview",
    version,
    about = "Interactive isosurface viewer for CT volumes"
)]
pub struct Cli {
    /// Viewer configuration (JSON): window size, background, clip ranges, tissue presets
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show one isosurface with an isovalue slider
    Surface(SurfaceArgs),

    /// Show one isosurface coloured and clipped by gradient magnitude
    Gradient(GradientArgs),

    /// Show several isosurfaces coloured by a transfer function on the gradient
    Transfer(TransferArgs),

    /// Show skin, muscle and bone (or a params file) as separate surfaces
    Complete(CompleteArgs),
}

#[derive(Debug, Args)]
pub struct ClipArgs {
    /// Initial upper clip bounds on X, Y and Z (defaults to the configured maxima)
    #[arg(
        long,
        num_args = 3,
        value_names = ["X", "Y", "Z"],
        allow_negative_numbers = true
    )]
    pub clip: Option<Vec<i32>>,
}

impl ClipArgs {
    fn bounds(&self) -> Option<[i32; 3]> {
        self.clip.as_deref().and_then(|v| <[i32; 3]>::try_from(v).ok())
    }
}

#[derive(Debug, Args)]
pub struct SurfaceArgs {
    /// Scalar volume (.vti)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Isovalue (defaults to the midpoint of the scalar range)
    #[arg(short, long, allow_negative_numbers = true)]
    pub value: Option<i32>,

    #[command(flatten)]
    pub clip: ClipArgs,
}

#[derive(Debug, Args)]
pub struct GradientArgs {
    /// Scalar volume (.vti)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Gradient magnitude volume (.vti) on the same grid
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub grad: PathBuf,

    /// Isovalue (defaults to the midpoint of the scalar range)
    #[arg(short, long, allow_negative_numbers = true)]
    pub value: Option<i32>,

    #[command(flatten)]
    pub clip: ClipArgs,
}

#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Scalar volume (.vti)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Gradient magnitude volume (.vti) on the same grid
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub grad: PathBuf,

    /// A single isovalue, or a file with one isovalue per line
    #[arg(short, long, value_parser = parse_isovalue_arg, allow_negative_numbers = true)]
    pub value: IsovalueArg,

    /// Colour map file: `value r g b` per line (defaults to inferno over the gradient range)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub cmap: Option<PathBuf>,

    #[command(flatten)]
    pub clip: ClipArgs,
}

#[derive(Debug, Args)]
pub struct CompleteArgs {
    /// Scalar volume (.vti)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Gradient magnitude volume (.vti) on the same grid
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub grad: PathBuf,

    /// Surface parameters: `value gmin gmax r g b` per line (defaults to the tissue presets)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub params: Option<PathBuf>,

    #[command(flatten)]
    pub clip: ClipArgs,
}

/// The transfer mode's `--value`: a literal or a list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsovalueArg {
    Single(i32),
    List(PathBuf),
}

fn parse_isovalue_arg(s: &str) -> Result<IsovalueArg, String> {
    if s.is_empty() {
        return Err("expected an integer or a file path".to_string());
    }
    Ok(match s.parse::<i32>() {
        Ok(v) => IsovalueArg::Single(v),
        Err(_) => IsovalueArg::List(PathBuf::from(s)),
    })
}

// ---------------------------------------------------------------------------
// Arguments → ViewerSetup
// ---------------------------------------------------------------------------

fn load_volume(path: &Path) -> Result<Arc<ScalarVolume>> {
    let volume = load_file(path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(Arc::new(volume))
}

impl Cli {
    /// Load every input file and check that the pipeline can be assembled.
    pub fn into_setup(self) -> Result<ViewerSetup> {
        let config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };

        let (mode, input, grad, clip) = match self.command {
            Command::Surface(args) => (
                Mode::Surface {
                    isovalue: args.value,
                },
                args.input,
                None,
                args.clip.bounds(),
            ),
            Command::Gradient(args) => (
                Mode::Gradient {
                    isovalue: args.value,
                },
                args.input,
                Some(args.grad),
                args.clip.bounds(),
            ),
            Command::Transfer(args) => {
                let isovalues = match &args.value {
                    IsovalueArg::Single(v) => vec![*v],
                    IsovalueArg::List(path) => read_isovalues(path)
                        .with_context(|| format!("Failed to read isovalues from {}", path.display()))?,
                };
                let color_map = args
                    .cmap
                    .as_deref()
                    .map(|path| {
                        read_color_map(path)
                            .with_context(|| format!("Failed to read colour map from {}", path.display()))
                    })
                    .transpose()?;
                (
                    Mode::Transfer {
                        isovalues,
                        color_map,
                    },
                    args.input,
                    Some(args.grad),
                    args.clip.bounds(),
                )
            }
            Command::Complete(args) => {
                let surfaces = args
                    .params
                    .as_deref()
                    .map(|path| {
                        read_surface_params(path)
                            .with_context(|| format!("Failed to read surface params from {}", path.display()))
                    })
                    .transpose()?;
                (
                    Mode::Complete { surfaces },
                    args.input,
                    Some(args.grad),
                    args.clip.bounds(),
                )
            }
        };

        let source = load_volume(&input)?;
        let secondary = grad.as_deref().map(load_volume).transpose()?;
        let setup = ViewerSetup {
            mode,
            source,
            secondary,
            clip,
            config,
        };
        setup.validate()?;
        Ok(setup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{VtiEncoding, write_vti};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("isoview").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn surface_with_clip() {
        let cli = parse(&["surface", "-i", "head.vti", "--value", "500", "--clip", "10", "20", "30"]);
        match cli.command {
            Command::Surface(args) => {
                assert_eq!(args.input, PathBuf::from("head.vti"));
                assert_eq!(args.value, Some(500));
                assert_eq!(args.clip.bounds(), Some([10, 20, 30]));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn clip_needs_three_values() {
        let res = Cli::try_parse_from(["isoview", "surface", "-i", "a.vti", "--clip", "1", "2"]);
        assert!(res.is_err());
    }

    #[test]
    fn gradient_requires_grad() {
        assert!(Cli::try_parse_from(["isoview", "gradient", "-i", "a.vti"]).is_err());
    }

    #[test]
    fn transfer_value_is_literal_or_file() {
        let cli = parse(&["transfer", "-i", "a.vti", "-g", "b.vti", "-v", "700"]);
        let Command::Transfer(args) = cli.command else {
            panic!("expected transfer");
        };
        assert_eq!(args.value, IsovalueArg::Single(700));

        let cli = parse(&["--config", "c.json", "transfer", "-i", "a.vti", "-g", "b.vti", "-v", "levels.txt"]);
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        let Command::Transfer(args) = cli.command else {
            panic!("expected transfer");
        };
        assert_eq!(args.value, IsovalueArg::List(PathBuf::from("levels.txt")));
    }

    #[test]
    fn into_setup_loads_files() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("head.vti");
        let grad = dir.path().join("grad.vti");
        let vol = ScalarVolume::from_fn([5, 5, 5], [0.0; 3], [1.0; 3], |x, _, _| (x * 100.0) as f32);
        write_vti(&head, &vol, "density", VtiEncoding::Base64).unwrap();
        write_vti(&grad, &vol.gradient_magnitude(), "gradient", VtiEncoding::Ascii).unwrap();
        let levels = dir.path().join("levels.txt");
        std::fs::write(&levels, "100\n# comment\n200\n").unwrap();

        let cli = parse(&[
            "transfer",
            "-i",
            head.to_str().unwrap(),
            "-g",
            grad.to_str().unwrap(),
            "-v",
            levels.to_str().unwrap(),
        ]);
        let setup = cli.into_setup().unwrap();
        assert_eq!(
            setup.mode,
            Mode::Transfer {
                isovalues: vec![100, 200],
                color_map: None,
            }
        );
        assert_eq!(setup.source.scalar_range(), (0.0, 400.0));
        assert!(setup.secondary.is_some());
        assert_eq!(setup.initial_clip(), [250, 250, 270]);
    }

    #[test]
    fn into_setup_names_bad_colour_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("head.vti");
        let vol = ScalarVolume::from_fn([3, 3, 3], [0.0; 3], [1.0; 3], |x, _, _| x as f32);
        write_vti(&head, &vol, "density", VtiEncoding::Ascii).unwrap();
        let cmap = dir.path().join("cmap.txt");
        std::fs::write(&cmap, "# value r g b\n0 0 0 1\n100 1 0\n").unwrap();

        let cli = parse(&[
            "transfer",
            "-i",
            head.to_str().unwrap(),
            "-g",
            head.to_str().unwrap(),
            "-v",
            "1",
            "--cmap",
            cmap.to_str().unwrap(),
        ]);
        let msg = format!("{:#}", cli.into_setup().unwrap_err());
        assert!(msg.contains(cmap.to_str().unwrap()));
        assert!(msg.contains("line 3"));
    }

    #[test]
    fn into_setup_reports_missing_input() {
        let cli = parse(&["surface", "-i", "/nonexistent/head.vti"]);
        let err = cli.into_setup().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load"));
    }
}
