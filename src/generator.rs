use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotations::{self, CocoRecord};
use crate::bbox::{edge_bboxes, node_bboxes};
use crate::error::{Error, Rejection, Result};
use crate::graph::{is_connected, AdjacencyBuilder};
use crate::layout::{map_layout, LayoutEngine};
use crate::names::NamePool;
use crate::osm_fetcher::{OverpassQuery, DEFAULT_OVERPASS_URL};
use crate::sampler::{NeighborhoodSampler, NEIGHBOURHOOD_HALF_WIDTH};
use crate::types::{AdjacencyGraph, OsmData, OsmNodeId};

pub const MIN_NUMBER_OF_NODES: usize = 6;
pub const MAX_NUMBER_OF_NODES: usize = 13;

/// Run parameters. Every field has a default, so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub area: String,
    pub highway: String,
    pub overpass_url: String,
    pub timeout_s: u64,
    pub response_cache: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub attempts: usize,
    pub seed: Option<u64>,
    pub min_nodes: usize,
    pub max_nodes: usize,
    pub neighbourhood_half_width: f64,
    pub layout_program: String,
    pub debug_overlay: bool,
    pub geojson: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            area: "Москва".to_string(),
            highway: "path".to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            timeout_s: 180,
            response_cache: Some(PathBuf::from("response.json")),
            output_dir: PathBuf::from("data"),
            attempts: 1000,
            seed: None,
            min_nodes: MIN_NUMBER_OF_NODES,
            max_nodes: MAX_NUMBER_OF_NODES,
            neighbourhood_half_width: NEIGHBOURHOOD_HALF_WIDTH,
            layout_program: "sfdp".to_string(),
            debug_overlay: false,
            geojson: false,
        }
    }
}

impl GeneratorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn query(&self) -> OverpassQuery {
        OverpassQuery {
            url: self.overpass_url.clone(),
            area: self.area.clone(),
            highway: self.highway.clone(),
            timeout_s: self.timeout_s,
        }
    }
}

/// Size window (both ends exclusive) and connectivity check on a built graph.
pub fn accept(graph: &AdjacencyGraph, min_nodes: usize, max_nodes: usize) -> std::result::Result<(), Rejection> {
    let nodes = graph.node_count();
    if !(min_nodes < nodes && nodes < max_nodes) {
        return Err(Rejection::SizeRejected { nodes });
    }
    if !is_connected(graph) {
        return Err(Rejection::DisconnectedRejected);
    }
    Ok(())
}

/// Files written for one sample. Removed again unless the sample completes.
struct SampleFiles {
    paths: Vec<PathBuf>,
    keep: bool,
}

impl SampleFiles {
    fn new() -> Self {
        SampleFiles { paths: Vec::new(), keep: false }
    }

    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for SampleFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => log::debug!("Removed partial output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove partial output {}: {}", path.display(), e),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub prefix: PathBuf,
    pub graph: AdjacencyGraph,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempts: usize,
    pub written: usize,
    pub name_space_exhausted: usize,
    pub size_rejected: usize,
    pub disconnected: usize,
}

impl RunSummary {
    fn count(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::NameSpaceExhausted => self.name_space_exhausted += 1,
            Rejection::SizeRejected { .. } => self.size_rejected += 1,
            Rejection::DisconnectedRejected => self.disconnected += 1,
        }
    }
}

/// Outcome of one attempt that did not fail hard.
pub enum Attempt {
    Written(Sample),
    Rejected(Rejection),
}

/// Drives sampling, layout and annotation over one fetched data set.
pub struct Generator<'a, L: LayoutEngine> {
    config: &'a GeneratorConfig,
    data: &'a OsmData,
    layout: L,
    sampler: NeighborhoodSampler,
    pool: NamePool,
    rng: StdRng,
}

impl<'a, L: LayoutEngine> Generator<'a, L> {
    pub fn new(config: &'a GeneratorConfig, data: &'a OsmData, layout: L) -> Result<Self> {
        if data.nodes.is_empty() {
            return Err(Error::Response("no nodes to sample from".to_string()));
        }
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        log::info!("Using seed {}", seed);
        let mut rng = StdRng::seed_from_u64(seed);
        // one shuffle per run, shared by every sample
        let pool = NamePool::shuffled(&mut rng);
        let sampler = NeighborhoodSampler::new(data, config.neighbourhood_half_width);
        Ok(Generator { config, data, layout, sampler, pool, rng })
    }

    /// Samples and gates a graph without touching the file system.
    pub fn sample_graph(&mut self) -> std::result::Result<(AdjacencyGraph, Vec<OsmNodeId>), Rejection> {
        let sampled = self.sampler.sample(&mut self.rng).ok_or(Rejection::SizeRejected { nodes: 0 })?;
        let graph = AdjacencyBuilder::new(&self.pool).build(&self.data.ways, &sampled, &mut self.rng)?;
        accept(&graph, self.config.min_nodes, self.config.max_nodes)?;
        let mut ids: Vec<OsmNodeId> = sampled.into_iter().collect();
        ids.sort_unstable();
        Ok((graph, ids))
    }

    /// One attempt: rejections come back as [`Attempt::Rejected`], collaborator
    /// failures as errors (with any files of this attempt removed).
    pub fn attempt(&mut self, prefix: &Path) -> Result<Attempt> {
        let (graph, sampled) = match self.sample_graph() {
            Ok(accepted) => accepted,
            Err(rejection) => return Ok(Attempt::Rejected(rejection)),
        };

        let mut files = SampleFiles::new();
        // tracked before rendering so a half-written image is cleaned up too
        files.track(annotations::with_suffix(prefix, ".png"));
        let rendered = self.layout.render(&graph, prefix)?;
        let positions = map_layout(&rendered.nodes);
        let (width, height) = annotations::image_dimensions(&rendered.image_path)?;

        let node_boxes = node_bboxes(&positions, width, height);
        let edge_boxes = edge_bboxes(&graph, &positions, height)?;

        files.track(annotations::adjacency_path(prefix));
        annotations::write_adjacency(prefix, &graph)?;
        let record = CocoRecord::new(prefix, width, height, &node_boxes, &edge_boxes);
        files.track(annotations::manifest_path(prefix));
        annotations::write_manifest(prefix, &record)?;

        if self.config.debug_overlay {
            files.track(annotations::overlay_path(prefix));
            annotations::write_overlay(prefix, &node_boxes, &edge_boxes)?;
        }
        if self.config.geojson {
            let path = files.track(annotations::with_suffix(prefix, "_sample.geojson"));
            let geojson = crate::sample_to_geojson(self.data, &sampled);
            fs::write(&path, geojson.to_string()).map_err(|e| Error::io(&path, e))?;
        }

        files.keep();
        Ok(Attempt::Written(Sample { prefix: prefix.to_path_buf(), graph }))
    }

    /// `attempts` tries, written as `<output_dir>/graph_<timestamp>_<i>.*`.
    pub fn run(&mut self) -> Result<RunSummary> {
        fs::create_dir_all(&self.config.output_dir).map_err(|e| Error::io(&self.config.output_dir, e))?;
        let mut summary = RunSummary { attempts: self.config.attempts, ..RunSummary::default() };

        for i in 0..self.config.attempts {
            let time_str = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let prefix = self.config.output_dir.join(format!("graph_{time_str}_{i}"));
            match self.attempt(&prefix)? {
                Attempt::Written(sample) => {
                    summary.written += 1;
                    log::info!(
                        "[{}/{}] wrote {} ({} nodes)",
                        i + 1,
                        self.config.attempts,
                        sample.prefix.display(),
                        sample.graph.node_count()
                    );
                }
                Attempt::Rejected(rejection) => {
                    summary.count(&rejection);
                    log::debug!("[{}/{}] rejected: {}", i + 1, self.config.attempts, rejection);
                }
            }
        }

        log::info!(
            "Done: {} of {} attempts written ({} out of names, {} wrong size, {} disconnected)",
            summary.written,
            summary.attempts,
            summary.name_space_exhausted,
            summary.size_rejected,
            summary.disconnected
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeType, NodeName};

    fn path_graph(n: usize) -> AdjacencyGraph {
        let mut graph = AdjacencyGraph::new();
        for i in 1..n {
            graph.insert_edge(NodeName::new(format!("A{}", i - 1)), NodeName::new(format!("A{i}")), EdgeType::Type1);
        }
        graph
    }

    #[test]
    fn window_is_exclusive_at_both_ends() {
        for n in [2, 6, 13, 20] {
            assert_eq!(
                accept(&path_graph(n), MIN_NUMBER_OF_NODES, MAX_NUMBER_OF_NODES),
                Err(Rejection::SizeRejected { nodes: n })
            );
        }
        for n in 7..13 {
            assert_eq!(accept(&path_graph(n), MIN_NUMBER_OF_NODES, MAX_NUMBER_OF_NODES), Ok(()));
        }
    }

    #[test]
    fn disconnected_graph_is_rejected() {
        let mut graph = path_graph(4);
        graph.insert_edge(NodeName::new("B0"), NodeName::new("B1"), EdgeType::Type2);
        graph.insert_edge(NodeName::new("B1"), NodeName::new("B2"), EdgeType::Type2);
        assert_eq!(graph.node_count(), 7);
        assert_eq!(accept(&graph, MIN_NUMBER_OF_NODES, MAX_NUMBER_OF_NODES), Err(Rejection::DisconnectedRejected));
    }

    #[test]
    fn config_file_overrides_only_given_fields() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"area": "Санкт-Петербург", "seed": 4}"#).unwrap();
        assert_eq!(config.area, "Санкт-Петербург");
        assert_eq!(config.seed, Some(4));
        assert_eq!(config.min_nodes, 6);
        assert_eq!(config.max_nodes, 13);
        assert_eq!(config.neighbourhood_half_width, 0.001);
        assert_eq!(config.highway, "path");
    }

    #[test]
    fn unfinished_sample_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.json");
        let dropped = dir.path().join("dropped.json");

        let mut files = SampleFiles::new();
        fs::write(files.track(kept.clone()), "{}").unwrap();
        files.keep();
        assert!(kept.exists());

        let mut files = SampleFiles::new();
        fs::write(files.track(dropped.clone()), "{}").unwrap();
        drop(files);
        assert!(!dropped.exists());
    }
}
