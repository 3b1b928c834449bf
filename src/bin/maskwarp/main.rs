//! Maskwarp CLI - composite a mask texture onto landmark fixtures.
//!
//! Usage: maskwarp <COMMAND> [OPTIONS]
//!
//! Run `maskwarp --help` for available commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use maskwarp::gpu::GpuCompositor;
use maskwarp::io;
use maskwarp::prelude::*;
use maskwarp::warp::DEGENERACY_EPS;

#[derive(Parser)]
#[command(name = "maskwarp")]
#[command(author, version, about = "Face-mesh texture warping CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite a mask onto a landmark fixture and write a PNG
    Composite {
        /// UV table file
        #[arg(long)]
        uv: PathBuf,

        /// Triangulation file
        #[arg(long)]
        tris: PathBuf,

        /// Landmark fixture file
        #[arg(long)]
        landmarks: PathBuf,

        /// Mask image file
        #[arg(long)]
        mask: PathBuf,

        /// Output image file
        output: PathBuf,

        /// Base image to composite over (sets the frame size)
        #[arg(long)]
        base: Option<PathBuf>,

        /// Frame width when no base image is given
        #[arg(long, default_value = "640")]
        width: u32,

        /// Frame height when no base image is given
        #[arg(long, default_value = "480")]
        height: u32,

        /// Treat the capture source as a mirrored front camera
        #[arg(long)]
        mirror: bool,

        /// Draw the wireframe layer
        #[arg(long)]
        wireframe: bool,

        /// Use the GPU strategy instead of the raster one
        #[arg(long)]
        gpu: bool,
    },

    /// Display topology and fixture information
    Info {
        /// UV table file
        #[arg(long)]
        uv: PathBuf,

        /// Triangulation file
        #[arg(long)]
        tris: PathBuf,

        /// Optional landmark fixture to check against the topology
        #[arg(long)]
        landmarks: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Composite {
            uv,
            tris,
            landmarks,
            mask,
            output,
            base,
            width,
            height,
            mirror,
            wireframe,
            gpu,
        } => {
            let topology = Arc::new(io::load_topology(&uv, &tris)?);
            let frame_landmarks = io::load_landmarks(&landmarks)?;

            let mut session = Session::new();
            if mirror {
                session.begin_video_frame(0.0);
            } else {
                session.begin_image_frame();
            }
            session.set_wireframe_visible(wireframe);

            let mask_image = session.load_mask(&fs::read(&mask)?)?;

            let base_image = match &base {
                Some(path) => Some(image::open(path)?.to_rgba8()),
                None => None,
            };
            let (frame_w, frame_h) = match &base_image {
                Some(img) => img.dimensions(),
                None => (width, height),
            };

            let start = Instant::now();
            let mut compositor: Box<dyn Compositor> = if gpu {
                Box::new(GpuCompositor::new(Arc::clone(&topology), frame_w, frame_h)?)
            } else if let Some(img) = base_image.clone() {
                Box::new(RasterCompositor::with_base(Arc::clone(&topology), img))
            } else {
                Box::new(RasterCompositor::new(Arc::clone(&topology), frame_w, frame_h))
            };

            compositor.set_mask(&mask_image)?;
            compositor.render(&frame_landmarks, &session.render_state())?;
            let mut frame = compositor.frame()?;

            // The GPU strategy renders the overlay alone; composite it
            // over the base here.
            if gpu {
                if let Some(base_img) = base_image {
                    let mut out = base_img;
                    image::imageops::overlay(&mut out, &frame, 0, 0);
                    frame = out;
                }
            }

            frame.save(&output)?;
            println!(
                "Composited {} triangles onto {}x{} in {:.2?} ({})",
                topology.num_triangles(),
                frame_w,
                frame_h,
                start.elapsed(),
                if gpu { "gpu" } else { "raster" },
            );
            Ok(())
        }

        Commands::Info {
            uv,
            tris,
            landmarks,
        } => {
            let topology = io::load_topology(&uv, &tris)?;
            println!("Vertices:  {}", topology.num_vertices());
            println!("Triangles: {}", topology.num_triangles());
            println!("Edges:     {}", topology.edges().len());
            println!("Canonical: {}", topology.is_canonical());

            let degenerate = topology
                .triangles()
                .iter()
                .filter(|tri| {
                    let src = [
                        topology.uv(tri[0]),
                        topology.uv(tri[1]),
                        topology.uv(tri[2]),
                    ];
                    AffineMap::source_determinant(&src).abs() < DEGENERACY_EPS
                })
                .count();
            println!("Degenerate source triangles: {degenerate}");

            if let Some(path) = landmarks {
                let frame = io::load_landmarks(path)?;
                println!("Landmarks: {}", frame.len());
                if frame.len() != topology.num_vertices() {
                    println!(
                        "WARNING: fixture does not match topology ({} != {})",
                        frame.len(),
                        topology.num_vertices()
                    );
                }
            }
            Ok(())
        }
    }
}
