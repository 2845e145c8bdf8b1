use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};

use isoview::color::ColorRamp;
use isoview::config::ViewerConfig;
use isoview::data::loader::{VtiEncoding, write_vti};
use isoview::data::model::ScalarVolume;
use isoview::data::params::format_color_map;

/// Write a synthetic head phantom and matching parameter files.
#[derive(Parser)]
#[command(version, about = "Generate sample volumes for isoview")]
struct Args {
    /// Output directory
    #[arg(long, default_value = "sample_data", value_hint = ValueHint::DirPath)]
    out: PathBuf,

    /// Grid spacing in world units
    #[arg(long, default_value_t = 2.0)]
    step: f64,

    /// Standard deviation of the additive noise
    #[arg(long, default_value_t = 10.0)]
    noise: f64,

    /// PRNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Phantom
// ---------------------------------------------------------------------------

struct Ellipsoid {
    center: [f64; 3],
    axes: [f64; 3],
}

impl Ellipsoid {
    /// 1 well inside, 0 well outside, smooth over about `edge` world units.
    fn weight(&self, p: [f64; 3], edge: f64) -> f64 {
        let r = (0..3)
            .map(|a| ((p[a] - self.center[a]) / self.axes[a]).powi(2))
            .sum::<f64>()
            .sqrt();
        let w = edge / self.axes.iter().cloned().fold(f64::INFINITY, f64::min);
        1.0 - smoothstep(1.0 - w, 1.0 + w, r)
    }
}

fn smoothstep(lo: f64, hi: f64, x: f64) -> f64 {
    let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Soft tissue ≈ 900, muscle ≈ 1050, bone ≈ 1300 on an air background.
fn head_phantom(dims: [usize; 3], spacing: f64, noise: f64, rng: &mut SimpleRng) -> ScalarVolume {
    let body = Ellipsoid {
        center: [125.0, 125.0, 135.0],
        axes: [90.0, 100.0, 120.0],
    };
    let muscle = Ellipsoid {
        center: [125.0, 125.0, 130.0],
        axes: [75.0, 85.0, 100.0],
    };
    let skull_outer = Ellipsoid {
        center: [125.0, 125.0, 170.0],
        axes: [60.0, 70.0, 70.0],
    };
    let skull_inner = Ellipsoid {
        center: [125.0, 125.0, 170.0],
        axes: [50.0, 60.0, 60.0],
    };
    let edge = 2.0 * spacing;

    ScalarVolume::from_fn(dims, [0.0; 3], [spacing; 3], |x, y, z| {
        let p = [x, y, z];
        let bone = skull_outer.weight(p, edge) * (1.0 - skull_inner.weight(p, edge));
        let value = 900.0 * body.weight(p, edge)
            + 150.0 * muscle.weight(p, edge)
            + 250.0 * bone
            + rng.gauss(0.0, noise);
        value.max(0.0) as f32
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);
    let config = ViewerConfig::default();

    // Cover the default clip box: X, Y up to 250 and Z up to 270.
    let [mx, my, mz] = config.axis_clips.maxima();
    let dims = [mx, my, mz].map(|m| (m as f64 / args.step).ceil() as usize + 1);

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let head = head_phantom(dims, args.step, args.noise, &mut rng);
    let grad = head.gradient_magnitude();
    log::info!(
        "Phantom {:?}: range {:?}, gradient range {:?}",
        head.dims,
        head.scalar_range(),
        grad.scalar_range()
    );

    write_vti(&args.out.join("head.vti"), &head, "density", VtiEncoding::Base64Zlib)?;
    write_vti(&args.out.join("head_grad.vti"), &grad, "gradient", VtiEncoding::Base64Zlib)?;

    let isovalues: String = config
        .presets
        .iter()
        .map(|p| format!("{}\n", p.value))
        .collect();
    std::fs::write(args.out.join("isovalues.txt"), isovalues)?;

    let ramp = ColorRamp::inferno16(grad.scalar_range());
    std::fs::write(args.out.join("cmap.txt"), format_color_map(ramp.points()))?;

    // Keep only well-defined boundaries: drop the weakest tenth of gradients.
    let (gmin, gmax) = grad.scalar_range();
    let floor = gmin + (gmax - gmin) * 0.1;
    let mut params = String::from("# value gmin gmax r g b\n");
    for p in &config.presets {
        let [r, g, b] = p.color;
        writeln!(params, "{} {floor:.1} {gmax:.1} {r:.4} {g:.4} {b:.4}", p.value)?;
    }
    std::fs::write(args.out.join("params.txt"), params)?;

    println!("Wrote sample data to {}", args.out.display());
    Ok(())
}
