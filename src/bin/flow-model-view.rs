//! Loads a model, builds a shader program, prints the loaded textures and
//! renders one frame into a PNG.
//!
//! ```text
//! flow-model-view <model> <vertex.glsl> <fragment.glsl> [--geometry <geometry.glsl>]
//!                 [--out <image.png>] [--size <width>x<height>] [--no-gamma]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3, perspective};
use flow_model::{LoaderConfig, Model, ShaderProgram, WgpuBackend, context::Context};

#[rustfmt::skip]
const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug)]
struct Args {
    model: PathBuf,
    vertex: PathBuf,
    fragment: PathBuf,
    geometry: Option<PathBuf>,
    out: PathBuf,
    size: (u32, u32),
    gamma: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut geometry = None;
        let mut out = PathBuf::from("model.png");
        let mut size = (800, 600);
        let mut gamma = true;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--geometry" => geometry = Some(PathBuf::from(value(&mut args, "--geometry")?)),
                "--out" => out = PathBuf::from(value(&mut args, "--out")?),
                "--size" => {
                    let raw = value(&mut args, "--size")?;
                    let (w, h) = raw
                        .split_once('x')
                        .with_context(|| format!("size must look like 800x600, got {raw}"))?;
                    size = (w.parse()?, h.parse()?);
                }
                "--no-gamma" => gamma = false,
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        let [model, vertex, fragment]: [PathBuf; 3] = match positional.try_into() {
            Ok(paths) => paths,
            Err(_) => bail!(
                "usage: flow-model-view <model> <vertex.glsl> <fragment.glsl> \
                 [--geometry <geometry.glsl>] [--out <image.png>] [--size WxH] [--no-gamma]"
            ),
        };
        Ok(Self {
            model,
            vertex,
            fragment,
            geometry,
            out,
            size,
            gamma,
        })
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next().with_context(|| format!("{flag} needs a value"))
}

/// Camera placed in front of the model's bounding sphere.
fn camera(model: &Model<WgpuBackend>, aspect: f32) -> (Matrix4<f32>, Matrix4<f32>) {
    let positions: Vec<Point3<f32>> = model
        .meshes()
        .iter()
        .flat_map(|mesh| mesh.vertices().iter().map(|v| Point3::from(v.position)))
        .collect();
    let center = if positions.is_empty() {
        Point3::origin()
    } else {
        Point3::centroid(&positions)
    };
    let radius = positions
        .iter()
        .map(|p| (p - center).magnitude())
        .fold(1.0f32, f32::max);

    let eye = center + Vector3::new(0.0, radius * 0.5, radius * 2.5);
    let view = Matrix4::look_at_rh(eye, center, Vector3::unit_y());
    let projection =
        OPENGL_TO_WGPU_MATRIX * perspective(Deg(45.0), aspect, radius * 0.05, radius * 10.0);
    (projection, view)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let ctx = Context::new(args.size.0, args.size.1).await?;
    let mut backend = ctx.backend();

    let config = LoaderConfig {
        gamma: args.gamma,
        ..Default::default()
    };
    let model = Model::load_with(&mut backend, &args.model, &config);
    if model.is_empty() {
        log::warn!("{} produced no meshes", args.model.display());
    }
    model.info();

    let program = ShaderProgram::build(
        &mut backend,
        &args.vertex,
        &args.fragment,
        args.geometry.as_deref(),
    );
    if !program.is_linked() {
        bail!("shader program {} could not be built", program.id());
    }

    let (projection, view) = camera(&model, args.size.0 as f32 / args.size.1 as f32);
    program.set_mat4(&mut backend, "projection", projection);
    program.set_mat4(&mut backend, "view", view);
    program.set_mat4(&mut backend, "model", Matrix4::from_scale(1.0));
    program.set_vec3_xyz(&mut backend, "light.direction", -0.3, -1.0, -0.5);
    program.set_float(&mut backend, "light.ambient", 0.15);

    let image = ctx
        .render_to_image(wgpu::Color::BLACK, |pass| {
            model.draw(&mut backend, pass, &program);
        })
        .await?;
    save(&image, &args.out)?;
    log::info!("wrote {}", args.out.display());
    Ok(())
}

fn save(image: &image::RgbaImage, path: &Path) -> anyhow::Result<()> {
    image
        .save(path)
        .with_context(|| format!("could not write {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };
    let args = Args::parse(std::env::args().skip(1))?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args))
}
