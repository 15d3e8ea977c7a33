//! dvm-export - DevilModel scene export tool
//!
//! Converts scene descriptions (.json, .gltf, .glb) to .dvm containers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dvm_common::{ExportFlags, DVM_EXT};
use std::path::PathBuf;

use dvm_export::{build, import, serialize, ExportOptions};

#[derive(Parser)]
#[command(name = "dvm-export")]
#[command(about = "DevilModel scene export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a single scene file
    Export {
        /// Input scene (.json, .gltf or .glb)
        input: PathBuf,

        /// Output .dvm file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mesh flags applied to every mesh (e.g., NORMALS|TANGENTS)
        #[arg(short, long)]
        flags: Option<String>,

        /// Weld meshes on the calling thread
        #[arg(long)]
        sequential: bool,
    },

    /// Build every scene listed in a manifest
    Build {
        /// Path to dvm.toml manifest
        #[arg(default_value = "dvm.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate every scene in a manifest without writing anything
    Check {
        /// Path to dvm.toml manifest
        #[arg(default_value = "dvm.toml")]
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            output,
            flags,
            sequential,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(DVM_EXT));
            tracing::info!("Exporting {:?} -> {:?}", input, output);

            let mut doc = import::load_document(&input)?;
            if let Some(flags) = flags {
                let parsed = ExportFlags::parse(&flags)
                    .with_context(|| format!("Invalid --flags '{}'", flags))?;
                for mesh in &mut doc.meshes {
                    mesh.options.set_flags(parsed);
                }
            }

            let options = ExportOptions {
                parallel: !sequential,
            };
            let report = serialize::export_with(&doc, &output, &options)?;
            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }
            tracing::info!(
                "Done! {} vertices, {} triangles, {} bytes",
                report.vertices,
                report.triangles,
                report.bytes
            );
        }

        Commands::Build {
            manifest,
            output,
            verbose,
        } => {
            if verbose {
                tracing::info!("Building scenes from {:?}", manifest);
            }
            let built = build::build_all(&manifest, output.as_deref())?;
            for scene in &built {
                for warning in &scene.report.warnings {
                    tracing::warn!("{}: {}", scene.id, warning);
                }
                if verbose {
                    for (kind, count) in &scene.report.sections {
                        tracing::info!("  {}: {} {}", scene.id, count, kind);
                    }
                }
            }
            tracing::info!("Build complete! {} scene(s)", built.len());
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            for (id, warnings) in build::check_all(&manifest)? {
                for warning in &warnings {
                    tracing::warn!("{}: {}", id, warning);
                }
            }
            tracing::info!("All scenes are exportable!");
        }
    }

    Ok(())
}
