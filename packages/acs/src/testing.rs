//! In-memory transport and dictionary source for tests.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lowe_acs_models::VariableDictionary;
use lowe_geography::Resolver;
use percent_encoding::percent_decode_str;
use serde_json::{Value, json};

use crate::AcsError;
use crate::dictionary::{DictionaryKey, DictionarySource};
use crate::transport::Transport;

/// Directory of the small lookup tables kept alongside the geography
/// crate for tests.
pub const SAMPLE_TABLES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../geography/testdata");

/// Resolver over [`SAMPLE_TABLES_DIR`].
pub fn sample_resolver() -> Resolver {
    Resolver::from_dir(Path::new(SAMPLE_TABLES_DIR)).unwrap()
}

/// Table ids the fixture dictionary documents.
pub const FIXTURE_TABLES: &[&str] = &["S1701", "S2801", "B01001", "DP05"];

/// A `variables.json` document covering [`FIXTURE_TABLES`].
///
/// Each table has a total and a percent series, plus a third series whose
/// label repeats the total's.
pub fn fixture_variables() -> Value {
    let mut variables = serde_json::Map::new();
    for table in FIXTURE_TABLES {
        let concept = format!("{table} CONCEPT");
        for (line, label) in [
            ("001", "Estimate!!Total"),
            ("002", "Estimate!!Percent"),
            ("003", "Estimate!!Total"),
        ] {
            variables.insert(
                format!("{table}_C01_{line}E"),
                json!({"label": label, "concept": concept, "group": table}),
            );
        }
    }
    json!({ "variables": variables })
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let prefix = format!("{name}=");
    query
        .split('&')
        .find_map(|param| param.strip_prefix(prefix.as_str()))
        .map(|value| percent_decode_str(value).decode_utf8_lossy().into_owned())
}

/// The value the fake serves for a table's total series.
pub fn fixture_total(table: &str, year: &str, for_clause: &str) -> String {
    format!("{table}-{year}-{for_clause}")
}

/// Records requests and answers them with canned two-row responses.
#[derive(Default)]
pub struct FakeTransport {
    requests: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, u16, usize)>>,
    overrides: Mutex<Vec<(String, Value)>>,
}

impl FakeTransport {
    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Fails the next `times` requests whose URL contains `needle` with
    /// `status`.
    pub fn fail(&self, needle: &str, status: u16, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), status, times));
    }

    /// Answers requests whose URL contains `needle` with `body`.
    pub fn respond(&self, needle: &str, body: Value) {
        self.overrides.lock().unwrap().push((needle.to_string(), body));
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, url: &str) -> Result<Value, AcsError> {
        self.requests.lock().unwrap().push(url.to_string());
        tokio::time::sleep(Duration::from_millis(5)).await;

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(failure) = failures
                .iter_mut()
                .find(|(needle, _, remaining)| *remaining > 0 && url.contains(needle.as_str()))
            {
                failure.2 -= 1;
                return Err(AcsError::HttpStatus {
                    status: failure.1,
                    url: url.to_string(),
                });
            }
        }

        if let Some((_, body)) = self
            .overrides
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
        {
            return Ok(body.clone());
        }

        if url.ends_with("/variables.json") {
            return Ok(fixture_variables());
        }

        let year = url
            .split("/data/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
            .to_string();
        let get = query_param(url, "get").unwrap_or_default();
        let table = get
            .trim_start_matches("group(")
            .trim_end_matches(')')
            .trim_end_matches(',')
            .to_string();
        let for_clause = query_param(url, "for").unwrap_or_default();

        Ok(json!([
            [
                "NAME",
                format!("{table}_C01_001E"),
                format!("{table}_C01_002E"),
                format!("{table}_C01_003E"),
                format!("{table}_C01_001EA"),
                "state",
                "place"
            ],
            [
                "Somewhere",
                fixture_total(&table, &year, &for_clause),
                2,
                "duplicate",
                null,
                "06",
                "55254"
            ]
        ]))
    }
}

/// Serves [`fixture_variables`] for every key, counting loads.
#[derive(Default)]
pub struct StaticDictionaries {
    pub loads: AtomicUsize,
    fail_first: usize,
}

impl StaticDictionaries {
    /// A source whose first `n` loads fail.
    pub fn failing_first(n: usize) -> Self {
        Self {
            loads: AtomicUsize::new(0),
            fail_first: n,
        }
    }
}

#[async_trait]
impl DictionarySource for StaticDictionaries {
    async fn load(&self, key: DictionaryKey) -> Result<VariableDictionary, AcsError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let n = self.loads.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(AcsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{key} unavailable"),
            )));
        }
        Ok(VariableDictionary::from_json_value(fixture_variables())?)
    }
}
