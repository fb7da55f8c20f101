#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for building map partitions and running viewport
//! searches over them.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use geo::{Coord, Rect};
use map_search_mwm::{MwmContainer, MwmRegistry, MwmSet, RegResult, load_dataset};
use map_search_mwm_models::{FeatureId, Lang, MwmId};
use map_search_retrieval::{Callback, Retrieval, RetrievalError, build_query_params};
use map_search_retrieval_models::SearchConfig;

#[derive(Parser)]
#[command(name = "map_search", about = "Viewport-driven map feature search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build partition files from a TOML dataset
    Build {
        /// Dataset definition (TOML with `[[mwm]]` tables)
        #[arg(long)]
        dataset: PathBuf,
        /// Directory to write `<name>.mwm` files into
        #[arg(long)]
        out: PathBuf,
    },
    /// Search registered partitions around a viewport
    Query {
        /// Query text, e.g. "whiskey bar"
        #[arg(long)]
        query: String,
        /// Viewport as `minx,miny,maxx,maxy`
        #[arg(long, value_parser = parse_viewport, allow_hyphen_values = true)]
        viewport: Rect<f64>,
        /// Dataset definitions to build in memory and search
        #[arg(long)]
        dataset: Vec<PathBuf>,
        /// Partition files written by `build`
        #[arg(long)]
        mwm: Vec<PathBuf>,
        /// Search configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Languages to search (e.g. "en"). Overrides the config file.
        #[arg(long, value_parser = parse_lang)]
        lang: Vec<Lang>,
        /// Stop once this many features were found
        #[arg(long)]
        min_features: Option<u64>,
        /// Never grow the viewport beyond this factor
        #[arg(long)]
        max_viewport_scale: Option<f64>,
        /// Lookup scale, clamped to each partition's range
        #[arg(long)]
        scale: Option<u8>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { dataset, out } => {
            let definition = load_dataset(&dataset)?;
            std::fs::create_dir_all(&out)?;
            for container in definition.build()? {
                let path = out.join(format!("{}.mwm", container.name()));
                container.write_to_file(&path)?;
                log::info!("Wrote {}", path.display());
            }
        }
        Commands::Query {
            query,
            viewport,
            dataset,
            mwm,
            config,
            lang,
            min_features,
            max_viewport_scale,
            scale,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => SearchConfig::default(),
            };
            if !lang.is_empty() {
                config.langs = lang;
            }
            if scale.is_some() {
                config.scale = scale;
            }
            if let Some(min) = min_features {
                config.limits.set_min_num_features(min);
            }
            if let Some(max) = max_viewport_scale {
                config.limits.set_max_viewport_scale(max);
            }

            let mut mwms = MwmSet::new();
            for path in &dataset {
                for container in load_dataset(path)?.build()? {
                    register(&mut mwms, container);
                }
            }
            for path in &mwm {
                let container = MwmContainer::read_from_file(path)?;
                register(&mut mwms, container);
            }
            if mwms.is_empty() {
                return Err("no partitions to search; pass --dataset or --mwm".into());
            }

            let mut params = build_query_params(&query, config.langs.iter().copied());
            if let Some(scale) = config.scale {
                params.scale = scale;
            }

            let mut retrieval = Retrieval::new();
            retrieval.init(&mwms, viewport, params, config.limits);

            let mut printer = ResultPrinter::new(&mwms);
            retrieval.go(&mut printer);

            println!("{}", "-".repeat(60));
            println!(
                "{} features in {} mwms ({} failed)",
                printer.features, printer.mwms, printer.failed
            );
        }
    }

    Ok(())
}

fn register(mwms: &mut MwmSet, container: MwmContainer) {
    let name = container.name().to_string();
    match mwms.register_map(container).1 {
        RegResult::Success => {}
        RegResult::VersionAlreadyExists => log::warn!("mwm '{name}' given twice"),
        RegResult::VersionTooOld => log::warn!("Ignoring older copy of mwm '{name}'"),
    }
}

fn load_config(path: &Path) -> Result<SearchConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::de::from_str(&contents)?)
}

fn parse_viewport(value: &str) -> Result<Rect<f64>, String> {
    let coords = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid viewport coordinate: {e}"))?;

    let &[min_x, min_y, max_x, max_y] = coords.as_slice() else {
        return Err(format!(
            "expected 4 comma-separated numbers, got {}",
            coords.len()
        ));
    };

    if min_x > max_x || min_y > max_y {
        return Err("viewport minimum exceeds its maximum".to_string());
    }

    Ok(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}

fn parse_lang(value: &str) -> Result<Lang, String> {
    value
        .parse()
        .map_err(|_| format!("unknown language code '{value}'"))
}

/// Prints every reported partition with its features.
struct ResultPrinter<'a> {
    registry: &'a MwmSet,
    features: usize,
    mwms: usize,
    failed: usize,
}

impl<'a> ResultPrinter<'a> {
    const fn new(registry: &'a MwmSet) -> Self {
        Self {
            registry,
            features: 0,
            mwms: 0,
            failed: 0,
        }
    }
}

impl Callback for ResultPrinter<'_> {
    fn on_mwm_processed(&mut self, id: &MwmId, features: &[FeatureId]) {
        self.mwms += 1;
        self.features += features.len();

        println!("{id} ({} features)", features.len());

        let records = self
            .registry
            .handle(id)
            .value()
            .map(map_search_mwm::MwmValue::features);

        match records {
            Some(Ok(records)) => {
                for &feature in features {
                    let Some(record) = usize::try_from(feature)
                        .ok()
                        .and_then(|index| records.get(index))
                    else {
                        println!("  {feature:>6}  <missing record>");
                        continue;
                    };
                    println!(
                        "  {feature:>6}  ({:>10.4}, {:>10.4})  {}",
                        record.point.x,
                        record.point.y,
                        record.any_name().unwrap_or("")
                    );
                }
            }
            Some(Err(e)) => {
                log::warn!("Cannot read feature records of mwm {id}: {e}");
                println!("  {features:?}");
            }
            None => println!("  {features:?}"),
        }
    }

    fn on_mwm_failed(&mut self, id: &MwmId, error: &RetrievalError) {
        self.failed += 1;
        eprintln!("{id} skipped: {error}");
    }
}
