//! Demo viewer for the Aster engine.
//!
//! Opens a fixed 1700x900 window and renders a rotating mesh. Space cycles
//! between the mesh, colored triangle, and red triangle pipelines; Escape
//! quits.
//!
//! Run with `cargo run -p aster-viewer`. Options:
//!
//! * `--shaders <DIR>` - compiled SPIR-V location, `shaders` by default
//! * `--mesh <PATH>` - Wavefront OBJ to render, `assets/monkey_smooth.obj`
//!   by default
//! * `--no-mesh` - builtin triangle only
//! * `--no-validation` - skip the Vulkan validation layer
//!
//! The SPIR-V binaries are compiled from the GLSL sources next to them:
//!
//! ```bash
//! for s in shaders/*.vert shaders/*.frag; do
//!     glslangValidator -V "$s" -o "$s.spv"
//! done
//! ```
//!
//! `RUST_LOG` controls the log filter, `info` if unset.

use aster_app::{Engine, EngineConfig};

const WIDTH: u32 = 1700;
const HEIGHT: u32 = 900;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Help never boots the engine
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut engine = Engine::new(config_from_args(&args));

    // Cleanup runs whether or not the loop ended in an error
    let result = engine.run();
    engine.cleanup();
    result
}

/// Fold command line options into an [`EngineConfig`].
fn config_from_args(args: &[String]) -> EngineConfig {
    let mut config = EngineConfig::new("Aster Engine").with_size(WIDTH, HEIGHT);

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--shaders" => {
                if i + 1 < args.len() {
                    config = config.with_shader_dir(args[i + 1].as_str());
                    i += 1;
                }
            }
            "--mesh" => {
                if i + 1 < args.len() {
                    config = config.with_mesh(args[i + 1].as_str());
                    i += 1;
                }
            }
            "--no-mesh" => {
                config = config.without_mesh();
            }
            "--no-validation" => {
                config = config.with_validation(false);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    eprintln!(
        "Aster engine demo viewer

USAGE:
    cargo run -p aster-viewer -- [OPTIONS]

OPTIONS:
    --shaders <DIR>      compiled SPIR-V location (default: shaders)
    --mesh <PATH>        Wavefront OBJ to render (default: assets/monkey_smooth.obj)
    --no-mesh            builtin triangle only
    --no-validation      skip the Vulkan validation layer
    -h, --help           print this help

CONTROLS:
    Space                cycle pipeline (mesh, colored triangle, red triangle)
    Escape               quit

RUST_LOG sets the log filter (info when unset)."
    );
}
