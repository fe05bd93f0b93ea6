use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use cruel_assets::{
    codec,
    library::{MESH_INDEX_EXTENSION, SUBMESH_EXTENSION, TEXTURE_EXTENSION},
    HeadlessDevice, PipelineConfig, ResourceManager,
};

#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Imports every new or changed asset into the Library.
    Import,
    /// Prints the header of a Library artifact.
    Inspect {
        #[arg(value_name = "artifact")]
        artifact: PathBuf,
    },
    /// Imports, then loads every asset on a headless device and lists the cache.
    Status,
    /// Removes Library artifacts whose source asset is gone.
    Clean,
}

#[derive(Debug, Parser)]
#[command(name = "cruel_assets")]
#[command(about = "Cruel engine asset pipeline")]
#[command(rename_all = "kebab-case")]
struct Cli {
    /// RON pipeline config.
    #[arg(long = "config", value_name = "file", global = true)]
    config: Option<PathBuf>,

    /// Source asset directory.
    #[arg(long = "assets", value_name = "dir", global = true)]
    assets: Option<PathBuf>,

    /// Library directory. Defaults to `<assets>/Library`.
    #[arg(long = "library", value_name = "dir", global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_ron_file(path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(assets) = &self.assets {
            config.assets_root = assets.clone();
        }
        if let Some(library) = &self.library {
            config.library_dir = Some(library.clone());
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.pipeline_config()?;

    match &cli.command {
        Command::Import => import(config),
        Command::Inspect { artifact } => inspect(artifact),
        Command::Status => status(config),
        Command::Clean => clean(config),
    }
}

fn import(config: PipelineConfig) -> Result<()> {
    let root = config.assets_root.clone();
    let mut manager = ResourceManager::new(config, Rc::new(HeadlessDevice::new()));
    let batch = manager
        .import_batch(&root)
        .with_context(|| format!("Failed to scan '{}'", root.display()))?;

    let pb = ProgressBar::new(batch.total() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} assets ({percent}%) {msg}")
            .context("Invalid progress template")?
            .progress_chars("█▉▊▋▌▍▎▏"),
    );

    let report = batch.run(&mut manager, |progress| {
        pb.set_message(progress.path.display().to_string());
        pb.inc(1);
    });
    pb.finish_with_message("Assets processed");

    println!(
        "{} imported, {} up to date, {} failed, {} unsupported, {} missing",
        report.imported, report.up_to_date, report.failed, report.unsupported, report.missing
    );
    for (path, reason) in &report.failures {
        println!("  {}: {}", path.display(), reason);
    }

    Ok(())
}

fn inspect(artifact: &Path) -> Result<()> {
    let ext = artifact
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    match ext {
        MESH_INDEX_EXTENSION => {
            let headers = codec::read_mesh_index(artifact)?;
            println!("{}: mesh index, {} sub-meshes", artifact.display(), headers.len());
            for (index, header) in headers.iter().enumerate() {
                println!(
                    "  [{}] {} vertices, {} indices",
                    index, header.vertex_count, header.index_count
                );
            }
        }
        SUBMESH_EXTENSION => {
            let mesh = codec::read_mesh(artifact)?;
            println!(
                "{}: mesh, {} vertices, {} indices",
                artifact.display(),
                mesh.vertex_count(),
                mesh.index_count()
            );
        }
        TEXTURE_EXTENSION => {
            let texture = codec::read_texture(artifact)?;
            println!(
                "{}: texture, {}x{}, {} channels, {} bytes",
                artifact.display(),
                texture.width,
                texture.height,
                texture.format.channels(),
                texture.pixels.len()
            );
        }
        _ => anyhow::bail!("'{}' is not a Library artifact", artifact.display()),
    }

    Ok(())
}

fn status(mut config: PipelineConfig) -> Result<()> {
    config.preload_on_scan = true;
    let root = config.assets_root.clone();
    let device = Rc::new(HeadlessDevice::new());
    let mut manager = ResourceManager::new(config, device.clone());

    let report = manager.import_all_assets(&root);

    println!("{:<20} {:<8} {:<7} {:<5} source", "uid", "kind", "loaded", "refs");
    for entry in manager.entries() {
        println!(
            "{:<20} {:<8} {:<7} {:<5} {}",
            entry.uid,
            entry.kind.name(),
            entry.loaded,
            entry.references,
            entry
                .source_path
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_default()
        );
    }

    let stats = device.stats();
    println!(
        "{} resources, {} failed imports, {} bytes uploaded",
        manager.len(),
        report.failed,
        stats.bytes_uploaded
    );

    Ok(())
}

fn clean(config: PipelineConfig) -> Result<()> {
    let root = config.assets_root.clone();
    let mut manager = ResourceManager::new(config, Rc::new(HeadlessDevice::new()));

    let purged = manager
        .purge_orphans(&root)
        .with_context(|| format!("Failed to clean the Library of '{}'", root.display()))?;
    println!("Removed {} orphaned artifacts", purged);

    Ok(())
}
