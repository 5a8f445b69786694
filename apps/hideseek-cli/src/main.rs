use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use hideseek_assets::{AssetCatalog, StorageKind};
use hideseek_common::{resolve_image, Config, ExecMode, ExportSlot, ImageKind, EXPORT_SCHEMA_VERSION};
use hideseek_manager::Manager;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hideseek-cli", about = "CLI for the hide & seek batch simulator")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file; flags override its fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Asset directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Host,
    Accelerator,
}

#[derive(Subcommand)]
enum Commands {
    /// Print versions and a catalog summary
    Info,
    /// Print the export table resolved for a world count
    Tensors {
        #[arg(short, long, default_value = "1")]
        worlds: u32,
        /// Also list depth and rgb at this view size
        #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
        render: Option<Vec<u32>>,
    },
    /// Build a manager and step it
    Run {
        /// Ticks to simulate
        #[arg(short, long, default_value = "240")]
        ticks: u64,
        #[arg(short, long)]
        worlds: Option<u32>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        #[arg(long)]
        min_entities: Option<u32>,
        #[arg(long)]
        max_entities: Option<u32>,
        #[arg(long)]
        threads: Option<usize>,
        /// Enable per-agent rendering
        #[arg(long)]
        render: bool,
    },
}

fn load_config(path: Option<&PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = load_config(cli.config.as_ref(), cli.data_dir)?;

    match cli.command {
        Commands::Info => {
            println!("hideseek-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", hideseek_common::crate_info());
            println!("assets: {}", hideseek_assets::crate_info());
            println!("kernel: {}", hideseek_kernel::crate_info());
            println!("render: {}", hideseek_render::crate_info());
            println!("manager: {}", hideseek_manager::crate_info());
            println!(
                "accelerator support: {}",
                if cfg!(feature = "accelerator") { "yes" } else { "no" }
            );

            let catalog = AssetCatalog::load(&config.data_dir, StorageKind::Host)
                .with_context(|| format!("failed to load assets from {}", config.data_dir.display()))?;
            let fingerprint: String = catalog
                .objects
                .fingerprint()
                .iter()
                .take(8)
                .map(|b| format!("{b:02x}"))
                .collect();
            println!(
                "catalog: {} objects, {} render assets, fingerprint {fingerprint}",
                catalog.objects.len(),
                catalog.render.len()
            );
            for (i, asset) in catalog.render.assets().iter().enumerate() {
                println!(
                    "  [{i}] {:<14} {:>5} triangles, height {:.2}",
                    asset.name,
                    asset.mesh.triangle_count(),
                    asset.mesh.height()
                );
            }
        }
        Commands::Tensors { worlds, render } => {
            println!("export schema v{EXPORT_SCHEMA_VERSION}, {worlds} worlds");
            for slot in ExportSlot::ALL {
                println!(
                    "  {:>2} {:<18} {:<8} {:?}{}",
                    slot.index(),
                    slot.name(),
                    format!("{:?}", slot.element_type()),
                    slot.shape(worlds as usize),
                    if slot.is_writable() { "  (writable)" } else { "" }
                );
            }
            if let Some(&[width, height]) = render.as_deref() {
                for kind in [ImageKind::Depth, ImageKind::Rgb] {
                    let (ty, shape) = resolve_image(kind, worlds as usize, width as usize, height as usize);
                    println!("   - {:<18} {:<8} {:?}", kind.name(), format!("{ty:?}"), shape);
                }
            }
        }
        Commands::Run {
            ticks,
            worlds,
            mode,
            min_entities,
            max_entities,
            threads,
            render,
        } => {
            if let Some(worlds) = worlds {
                config.num_worlds = worlds;
            }
            if let Some(mode) = mode {
                config.exec_mode = match mode {
                    Mode::Host => ExecMode::HostParallel,
                    Mode::Accelerator => ExecMode::Accelerator,
                };
            }
            if let Some(min) = min_entities {
                config.min_entities_per_world = min;
            }
            if let Some(max) = max_entities {
                config.max_entities_per_world = max;
            }
            if threads.is_some() {
                config.worker_threads = threads;
            }
            config.enable_render |= render;
            info!(config = %serde_json::to_string(&config)?, "starting run");

            let mut manager = Manager::new(config).context("failed to construct manager")?;
            let start = Instant::now();
            let mut episodes_done = 0u64;
            let mut reward_sum = 0.0f64;
            for _ in 0..ticks {
                manager.step();
                let done = manager.download(&manager.done())?;
                episodes_done += done
                    .chunks_exact(4)
                    .filter(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) != 0)
                    .count() as u64;
                let reward = manager.download(&manager.reward())?;
                reward_sum += reward
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                    .sum::<f64>();
            }
            let elapsed = start.elapsed().as_secs_f64();
            let world_steps = ticks * manager.num_worlds() as u64;
            println!(
                "{ticks} ticks x {} worlds on {:?} in {elapsed:.3}s ({:.0} world-steps/s)",
                manager.num_worlds(),
                manager.device(),
                world_steps as f64 / elapsed.max(1e-9)
            );
            println!("episodes finished: {episodes_done}, reward sum: {reward_sum:.1}");
        }
    }

    Ok(())
}
