use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::debug;
use serde::Serialize;

use adlc::cache::{
    cache_relevant_options, model_cacheable, Cache, CacheMode, CachedValue, FileSet, Key,
};
use adlc::ir::analysis::reference_checker;
use adlc::ir::ast::Model;
use adlc::ir::transform::{conn_namer, flatten};

#[derive(Parser, Serialize, Debug)]
#[command(version, about = "adlc architecture description compiler", long_about = None)]
struct Args {
    /// The resolved model (*.json) handed over by the parser front end
    #[arg(name = "MODEL_FILE")]
    model_file: PathBuf,

    /// Output item to produce
    #[arg(short, long, default_value = "model")]
    item: String,

    /// Target platform
    #[arg(short, long, default_value = "seL4")]
    platform: String,

    /// Compilation cache mode (off, on, readonly, writeonly)
    #[arg(long, default_value = "off")]
    cache: CacheMode,

    /// Compilation cache directory
    #[arg(long, default_value = ".adlc-cache")]
    cache_dir: PathBuf,

    /// Write output here instead of stdout
    #[arg(short, long)]
    outfile: Option<PathBuf>,

    /// Emit compact rather than pretty-printed output
    #[arg(long, default_value_t = false)]
    compact: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn write_output(output: &str, outfile: Option<&PathBuf>) -> Result<()> {
    match outfile {
        Some(path) => fs::write(path, output)?,
        None => std::io::stdout().write_all(output.as_bytes())?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    adlc::init_logger();

    let source = fs::read_to_string(&args.model_file)?;
    let source_path = fs::canonicalize(&args.model_file)?.display().to_string();
    let options = cache_relevant_options(&args)?;
    let version = env!("CARGO_PKG_VERSION");

    let cache = match args.cache {
        CacheMode::Off => None,
        _ => Some(Cache::new(&args.cache_dir)?),
    };

    // First cache checkpoint: hits when these exact source bytes were
    // compiled before under these options, saving the parse entirely.
    if let Some(cache) = cache.as_ref().filter(|_| args.cache.readable()) {
        let key = Key::Input {
            version,
            source_path: &source_path,
            source: &source,
            options: &options,
            platform: &args.platform,
            item: &args.item,
        };
        match cache.get(&key)? {
            Some(CachedValue::Files(file_set)) if file_set.valid() => {
                debug!("retrieved {}.{} from cache", args.platform, args.item);
                return write_output(&file_set.output, args.outfile.as_ref());
            }
            Some(CachedValue::Files(_)) | None => {}
            Some(CachedValue::Text(_)) => {
                bail!(
                    "illegally cached a value for {} that is not a file set",
                    args.item
                );
            }
        }
    }

    let mut model: Model = serde_json::from_str(&source)?;
    reference_checker::check_model(&model)?;
    flatten::flatten(&mut model)?;

    // Canonical connection names before anything downstream sees the
    // model, so separate invocations over one build agree on allocation
    // order.
    let assembly = model.assembly_mut()?;
    conn_namer::assign_connection_names(&mut assembly.composition)?;

    // Second checkpoint: hits when a textually different input (say, one
    // differing only in comments) flattened to an identical model.
    if model_cacheable(&args.item) {
        if let Some(cache) = cache.as_ref().filter(|_| args.cache.readable()) {
            let key = Key::Model {
                version,
                model: &model,
                options: &options,
                platform: &args.platform,
                item: &args.item,
            };
            if let Some(CachedValue::Text(output)) = cache.get(&key)? {
                debug!("retrieved {}.{} from cache", args.platform, args.item);
                return write_output(&output, args.outfile.as_ref());
            }
        }
    }

    let output = if args.compact {
        serde_json::to_string(&model)?
    } else {
        let mut pretty = serde_json::to_string_pretty(&model)?;
        pretty.push('\n');
        pretty
    };

    // Both tiers are written together, and only on full success.
    if let Some(cache) = cache.as_ref().filter(|_| args.cache.writable()) {
        let input_key = Key::Input {
            version,
            source_path: &source_path,
            source: &source,
            options: &options,
            platform: &args.platform,
            item: &args.item,
        };
        let file_set = FileSet::new(output.clone(), &[args.model_file.as_path()])?;
        cache.set(&input_key, &CachedValue::Files(file_set))?;
        if model_cacheable(&args.item) {
            let model_key = Key::Model {
                version,
                model: &model,
                options: &options,
                platform: &args.platform,
                item: &args.item,
            };
            cache.set(&model_key, &CachedValue::Text(output.clone()))?;
        }
    }

    write_output(&output, args.outfile.as_ref())
}
