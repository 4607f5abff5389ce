use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{OsmData, RawNode, RawWay};

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// What to download: every way with the given highway tag inside a named area.
#[derive(Debug, Clone)]
pub struct OverpassQuery {
    pub url: String,
    pub area: String,
    pub highway: String,
    pub timeout_s: u64,
}

impl OverpassQuery {
    /// Ways first, then (`>`) every node they reference.
    pub fn to_ql(&self) -> String {
        format!(
            r#"[out:json][timeout:{}];area[name="{}"];way(area)[highway={}];(._;>;);out body;"#,
            self.timeout_s, self.area, self.highway
        )
    }
}

fn element_u64(element: &Value, key: &str) -> Result<u64> {
    element[key]
        .as_u64()
        .ok_or_else(|| Error::Response(format!("element without numeric `{key}`: {element}")))
}

fn element_f64(element: &Value, key: &str) -> Result<f64> {
    element[key]
        .as_f64()
        .ok_or_else(|| Error::Response(format!("element without numeric `{key}`: {element}")))
}

/// Splits an Overpass JSON response into nodes and ways. Other element types
/// (relations, areas) are ignored.
pub fn parse_elements(json: &Value) -> Result<OsmData> {
    let elements = json
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Response("response has no `elements` array".to_string()))?;

    let mut nodes = HashMap::new();
    let mut ways = Vec::new();
    for element in elements {
        match element.get("type").and_then(Value::as_str) {
            Some("node") => {
                let id = element_u64(element, "id")?;
                let node = RawNode::new(id, element_f64(element, "lat")?, element_f64(element, "lon")?);
                nodes.insert(id, node);
            }
            Some("way") => {
                let id = element_u64(element, "id")?;
                let node_ids = element
                    .get("nodes")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::Response(format!("way {id} has no node list")))?
                    .iter()
                    .map(|n| n.as_u64().ok_or_else(|| Error::Response(format!("way {id} has a bad node id: {n}"))))
                    .collect::<Result<Vec<u64>>>()?;
                ways.push(RawWay { id, node_ids });
            }
            other => {
                log::debug!("Skipping element of type {:?}", other);
            }
        }
    }

    log::info!("Parsed {} nodes and {} ways", nodes.len(), ways.len());
    Ok(OsmData { nodes, ways })
}

/// Raw Overpass JSON for `query`.
pub fn fetch_raw(query: &OverpassQuery) -> Result<Value> {
    log::info!("Querying {} for highway={} in {}", query.url, query.highway, query.area);
    let client = Client::builder()
        // leave the server a little longer than the timeout it was asked to honour
        .timeout(Duration::from_secs(query.timeout_s + 30))
        .build()?;
    let response = client
        .post(&query.url)
        .form(&[("data", query.to_ql())])
        .send()?
        .error_for_status()?
        .json::<Value>()?;
    Ok(response)
}

pub fn fetch(query: &OverpassQuery) -> Result<OsmData> {
    parse_elements(&fetch_raw(query)?)
}

/// Reads the cached response if there is one, otherwise queries Overpass and
/// stores the raw response at `cache` for the next run.
pub fn load_or_fetch(query: &OverpassQuery, cache: Option<&Path>) -> Result<OsmData> {
    let Some(cache) = cache else {
        return fetch(query);
    };
    if cache.exists() {
        log::info!("Reading cached response from {}", cache.display());
        let text = fs::read_to_string(cache).map_err(|e| Error::io(cache, e))?;
        return parse_elements(&serde_json::from_str(&text)?);
    }
    let raw = fetch_raw(query)?;
    fs::write(cache, serde_json::to_vec(&raw)?).map_err(|e| Error::io(cache, e))?;
    log::info!("Cached response in {}", cache.display());
    parse_elements(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> OverpassQuery {
        OverpassQuery {
            url: DEFAULT_OVERPASS_URL.to_string(),
            area: "Москва".to_string(),
            highway: "path".to_string(),
            timeout_s: 60,
        }
    }

    #[test]
    fn query_text() {
        assert_eq!(
            query().to_ql(),
            r#"[out:json][timeout:60];area[name="Москва"];way(area)[highway=path];(._;>;);out body;"#
        );
    }

    #[test]
    fn parses_nodes_and_ways() {
        let response = json!({
            "version": 0.6,
            "elements": [
                {"type": "way", "id": 10, "nodes": [1, 2, 3], "tags": {"highway": "path"}},
                {"type": "node", "id": 1, "lat": 55.75, "lon": 37.61},
                {"type": "node", "id": 2, "lat": 55.7501, "lon": 37.6102},
                {"type": "relation", "id": 99, "members": []}
            ]
        });
        let data = parse_elements(&response).unwrap();
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[&2].latitude(), 55.7501);
        assert_eq!(data.nodes[&2].longitude(), 37.6102);
        assert_eq!(data.ways, vec![RawWay { id: 10, node_ids: vec![1, 2, 3] }]);
    }

    #[test]
    fn missing_elements_is_an_error() {
        assert!(matches!(parse_elements(&json!({"remark": "timeout"})), Err(Error::Response(_))));
    }

    #[test]
    fn node_without_coordinates_is_an_error() {
        let response = json!({"elements": [{"type": "node", "id": 1, "lat": 55.0}]});
        assert!(matches!(parse_elements(&response), Err(Error::Response(_))));
    }

    #[test]
    fn cached_response_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("response.json");
        let response = json!({"elements": [{"type": "node", "id": 7, "lat": 1.0, "lon": 2.0}]});
        fs::write(&cache, response.to_string()).unwrap();

        // the url is unreachable on purpose; the cache must short-circuit it
        let mut offline = query();
        offline.url = "http://127.0.0.1:9/interpreter".to_string();
        let data = load_or_fetch(&offline, Some(&cache)).unwrap();
        assert_eq!(data.nodes.len(), 1);
        assert!(data.ways.is_empty());
    }

    #[test]
    #[ignore = "needs network access"]
    fn fetch_small_area() {
        let mut q = query();
        q.area = "Andorra la Vella".to_string();
        let data = fetch(&q).unwrap();
        assert!(!data.nodes.is_empty());
    }
}
