use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use rust_graph_gen::layout::GraphvizLayout;
use rust_graph_gen::osm_fetcher::load_or_fetch;
use rust_graph_gen::{init_logger, Generator, GeneratorConfig};

#[derive(Parser, Debug)]
#[command(name = "graph-gen")]
#[command(about = "Generate annotated graph images sampled from OpenStreetMap paths")]
struct Cli {
    /// JSON file with generator settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of sample attempts (rejected attempts write nothing)
    #[arg(short = 'n', long)]
    attempts: Option<usize>,
    #[arg(long)]
    area: Option<String>,
    #[arg(long)]
    highway: Option<String>,
    #[arg(long)]
    overpass_url: Option<String>,
    #[arg(long)]
    response_cache: Option<PathBuf>,
    /// Always query Overpass, never read or write the response cache
    #[arg(long)]
    no_cache: bool,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    layout_program: Option<String>,
    /// Also write <sample>_bboxes.png with every box drawn
    #[arg(long)]
    debug_overlay: bool,
    /// Also write <sample>_sample.geojson with the sampled segments
    #[arg(long)]
    geojson: bool,
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

impl Cli {
    fn into_config(self) -> Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => GeneratorConfig::default(),
        };
        if let Some(attempts) = self.attempts {
            config.attempts = attempts;
        }
        if let Some(area) = self.area {
            config.area = area;
        }
        if let Some(highway) = self.highway {
            config.highway = highway;
        }
        if let Some(url) = self.overpass_url {
            config.overpass_url = url;
        }
        if let Some(cache) = self.response_cache {
            config.response_cache = Some(cache);
        }
        if self.no_cache {
            config.response_cache = None;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(program) = self.layout_program {
            config.layout_program = program;
        }
        config.debug_overlay |= self.debug_overlay;
        config.geojson |= self.geojson;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level);
    let config = cli.into_config()?;
    log::debug!("{:?}", config);

    let data = load_or_fetch(&config.query(), config.response_cache.as_deref())
        .context("loading path network")?;
    let layout = GraphvizLayout { program: config.layout_program.clone() };
    let mut generator = Generator::new(&config, &data, layout)?;
    let summary = generator.run().context("generating samples")?;

    println!("{} of {} attempts written to {}", summary.written, summary.attempts, config.output_dir.display());
    Ok(())
}
