//! Kiln CLI - archive converted files and pack GLB containers.
//!
//! This is the main entry point for the kiln command-line application.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use kiln::prelude::*;
use kiln::xml::config::COMMON_SECTION;
use kiln::{reflect_class, reflect_enum};

/// Kiln - asset archiving and GLB packing tool
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, env = "KILN_CONFIG", default_value = "kiln.config")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a directory tree in a ZIP archive
    Zip {
        /// Input directory
        #[arg(short, long, env = "INPUT_FOLDER")]
        input: PathBuf,

        /// Output archive
        #[arg(short, long)]
        output: PathBuf,

        /// Number of part archives built in parallel and merged
        #[arg(short, long)]
        parts: Option<u32>,

        /// Write a `<output>.cache` index
        #[arg(long)]
        cache: bool,

        /// Folder prepended to every entry name
        #[arg(long)]
        prefix: Option<String>,
    },

    /// List the entries of an archive's cache index
    CacheList {
        /// Archive whose `.cache` sidecar is read
        #[arg(short, long)]
        archive: PathBuf,

        /// Check the index against the archive's checkpoint
        #[arg(long)]
        verify: bool,
    },

    /// Convert a .gltf document to a .glb container
    GltfToGlb {
        /// Input .gltf file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .glb file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Wrap a raw payload as the binary chunk of a .glb container
    GlbStream {
        /// Payload file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .glb file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON document to embed (defaults to an empty one)
        #[arg(short, long)]
        document: Option<PathBuf>,
    },

    /// Show the buffers of a .glb container
    GlbInfo {
        /// Input .glb file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show or change the shared settings
    Config {
        /// Set a field, `name=value`
        #[arg(short, long)]
        set: Vec<String>,
    },
}

reflect_enum! {
    /// Default log level when RUST_LOG is unset.
    pub enum LogLevel: u8 {
        Error = 0,
        Warn = 1,
        Info = 2,
        Debug = 3,
        Trace = 4,
    }
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Shared settings, stored in the `common` section of the settings file.
struct Settings {
    parts: u32,
    write_cache: bool,
    prefix: String,
    log_level: LogLevel,
    max_buffer_count: u32,
    max_buffer_mib: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parts: 1,
            write_cache: false,
            prefix: String::new(),
            log_level: LogLevel::Info,
            max_buffer_count: 8,
            max_buffer_mib: 32,
        }
    }
}

reflect_class! {
    Settings {
        parts => ["Part archives built in parallel"],
        write_cache as "cache" => ["Write a cache sidecar next to archives"],
        prefix => ["Folder prepended to entry names"],
        log_level => ["Default log level"],
        max_buffer_count => ["GLB buffer count limit"],
        max_buffer_mib => ["GLB buffer size limit", "MiB"],
    }
}

impl Settings {
    fn load(config: &ConfigFile) -> Result<Self> {
        let mut settings = Settings::default();
        let found = config
            .load_section(COMMON_SECTION, &mut ReflectedMut::new(&mut settings))
            .context("Failed to read settings")?;
        if !found {
            debug!(path = %config.path().display(), "no common section, using defaults");
        }
        Ok(settings)
    }

    fn quotas(&self) -> ReadQuotas {
        let max = self.max_buffer_mib.saturating_mul(1024 * 1024);
        ReadQuotas {
            max_file_size: max as u64,
            max_buffer_count: self.max_buffer_count as usize,
            max_buffer_byte_length: max,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    register_enum::<LogLevel>();
    register::<Settings>();

    let config = ConfigFile::open(&cli.config).context("Failed to open settings file")?;
    let settings = Settings::load(&config)?;
    init_logging(if cli.verbose { LogLevel::Debug } else { settings.log_level });

    match cli.command {
        Commands::Zip {
            input,
            output,
            parts,
            cache,
            prefix,
        } => {
            let parts = parts.unwrap_or(settings.parts).max(1);
            let prefix = prefix.unwrap_or_else(|| settings.prefix.clone());
            cmd_zip(&input, &output, parts, cache || settings.write_cache, &prefix)?;
        }
        Commands::CacheList { archive, verify } => {
            cmd_cache_list(&archive, verify)?;
        }
        Commands::GltfToGlb { input, output } => {
            cmd_gltf_to_glb(&input, &output, &settings.quotas())?;
        }
        Commands::GlbStream {
            input,
            output,
            document,
        } => {
            cmd_glb_stream(&input, &output, document.as_deref())?;
        }
        Commands::GlbInfo { input } => {
            cmd_glb_info(&input, &settings.quotas())?;
        }
        Commands::Config { set } => {
            cmd_config(config, settings, &set)?;
        }
    }

    Ok(())
}

fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Files under `root` as (entry name, path), sorted by name.
fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.context("Failed to walk input directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?;
        let name = relative.to_string_lossy().replace('\\', "/");
        files.push((name, entry.into_path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn store_file<W: Write + std::io::Seek>(zip: &mut ZipWriter<W>, name: &str, path: &Path) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    zip.new_file(name)?;
    zip.send_data(&data)?;
    Ok(())
}

fn cmd_zip(input: &Path, output: &Path, parts: u32, cache: bool, prefix: &str) -> Result<()> {
    let files = collect_files(input)?;
    println!("Archiving {} files from {}", files.len(), input.display());

    let pb = progress_bar(files.len() as u64)?;
    let start = Instant::now();

    let sidecar = sidecar_path(output);
    let finish = |sink: &mut BufWriter<File>| {
        sink.flush()?;
        sink.get_ref().sync_all()
    };

    let entries = if parts <= 1 || files.len() < 2 {
        let mut zip = ZipWriter::create(output)
            .context("Failed to create archive")?
            .with_prefix(prefix);
        if cache {
            zip = zip.with_cache(&sidecar);
        }
        for (name, path) in &files {
            store_file(&mut zip, name, path)?;
            pb.inc(1);
        }
        zip.finish_file()?;
        let entries = zip.num_entries();
        zip.finish_with(finish)?;
        entries
    } else {
        let mut merger = ZipMerger::create(output).context("Failed to create archive")?;
        if cache {
            merger = merger.with_cache(&sidecar);
        }

        let chunk = files.len().div_ceil(parts as usize);
        files.par_chunks(chunk).try_for_each(|chunk| -> Result<()> {
            let sink = tempfile::tempfile().context("Failed to create part file")?;
            let mut zip = ZipWriter::new(sink)?.with_prefix(prefix);
            for (name, path) in chunk {
                store_file(&mut zip, name, path)?;
                pb.inc(1);
            }
            let part = zip.into_part()?;
            debug!(entries = part.num_entries(), bytes = part.data_len(), "merging part");
            merger.merge(part)?;
            Ok(())
        })?;

        let entries = merger.num_entries();
        merger.finish_with(finish)?;
        entries
    };

    pb.finish_with_message("Done");
    info!(entries, parts, cache, "archive written");
    println!("Wrote {} entries to {} in {:?}", entries, output.display(), start.elapsed());
    if cache {
        println!("Cache index: {}", sidecar.display());
    }

    Ok(())
}

fn cmd_cache_list(archive: &Path, verify: bool) -> Result<()> {
    let sidecar = sidecar_path(archive);
    let cache = CacheIndex::open(&sidecar).with_context(|| format!("Failed to read {}", sidecar.display()))?;

    for entry in cache.entries() {
        println!("{:>12} {:>12} {}", entry.offset, entry.size, entry.name);
    }

    let header = cache.header();
    println!(
        "\nTotal: {} entries, archive size {}, crc {:#010x}",
        cache.len(),
        { header.zip_size },
        { header.zip_crc }
    );

    if verify {
        let mut file = BufReader::new(File::open(archive).context("Failed to open archive")?);
        if cache.matches_archive(&mut file)? {
            println!("Checkpoint matches");
        } else {
            warn!(archive = %archive.display(), "cache checkpoint does not match");
            anyhow::bail!("Cache index is stale");
        }
    }

    Ok(())
}

fn cmd_gltf_to_glb(input: &Path, output: &Path, quotas: &ReadQuotas) -> Result<()> {
    println!("Converting: {} -> {}", input.display(), output.display());

    let mut document = kiln::gltf::load_from_text_file(input, quotas).context("Failed to read glTF document")?;

    // the first buffer moves into the binary chunk
    if let Some(first) = document.buffers.first_mut() {
        first.uri.clear();
    }

    kiln::gltf::save_file(&document, output, true).context("Failed to write GLB")?;
    println!("Conversion complete");

    Ok(())
}

fn cmd_glb_stream(input: &Path, output: &Path, document: Option<&Path>) -> Result<()> {
    println!("Streaming: {} -> {}", input.display(), output.display());

    let mut doc = match document {
        Some(path) => {
            let json = fs::read(path).context("Failed to read document")?;
            Document::from_json(&json).context("Failed to parse document")?
        }
        None => Document::default(),
    };

    let size = fs::metadata(input)?.len();
    let size = u32::try_from(size).context("Payload does not fit a GLB container")?;
    let mut payload = BufReader::new(File::open(input).context("Failed to open payload")?);
    let mut out = BufWriter::new(File::create(output).context("Failed to create output file")?);

    let root = output.parent().unwrap_or(Path::new(""));
    kiln::gltf::stream_binary_full(&mut doc, &mut payload, size, &mut out, root).context("Failed to write GLB")?;
    out.flush()?;

    println!("Wrote {} payload bytes", size);

    Ok(())
}

fn cmd_glb_info(input: &Path, quotas: &ReadQuotas) -> Result<()> {
    let document = kiln::gltf::load_from_binary_file(input, quotas).context("Failed to read GLB")?;

    println!("glTF {}", document.asset.version);
    if let Some(generator) = &document.asset.generator {
        println!("Generator: {}", generator);
    }
    for (index, buffer) in document.buffers.iter().enumerate() {
        let source = if buffer.uri.is_empty() {
            "binary chunk"
        } else if buffer.is_embedded_resource() {
            "data uri"
        } else {
            buffer.uri.as_str()
        };
        println!("  buffer {}: {} bytes ({})", index, buffer.byte_length, source);
    }
    println!(
        "Meshes: {}, nodes: {}, materials: {}, accessors: {}",
        document.meshes.len(),
        document.nodes.len(),
        document.materials.len(),
        document.accessors.len()
    );

    Ok(())
}

fn cmd_config(mut config: ConfigFile, mut settings: Settings, set: &[String]) -> Result<()> {
    if !set.is_empty() {
        let mut view = ReflectedMut::new(&mut settings);
        for assignment in set {
            let (name, value) = assignment
                .split_once('=')
                .with_context(|| format!("Expected name=value, got {assignment}"))?;
            view.set_value_by_hash(JenHash::new(name.trim()), value.trim())
                .with_context(|| format!("Failed to set {name}"))?;
        }

        config.store_section(COMMON_SECTION, ReflectedRef::new(&settings))?;
        config.save().context("Failed to write settings file")?;
        println!("Saved {}", config.path().display());
    }

    let view = ReflectedRef::new(&settings);
    let class = view.class();
    for index in 0..view.num_fields() {
        let name = class.alias(index).map(Cow::Borrowed).unwrap_or_else(|| class.field_name(index));
        println!("{:>18} = {}", name, view.value(index)?);
    }

    Ok(())
}
