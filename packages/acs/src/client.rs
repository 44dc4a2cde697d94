//! The fan-out client.
//!
//! [`AcsClient::fetch_table`] expands a [`FetchRequest`] into one cell per
//! (variable, year, location), runs every cell concurrently and stitches
//! the decoded rows back together:
//!
//! 1. Validate the request and infer each variable's kind.
//! 2. Resolve every location to short codes and display names. Any
//!    resolution failure aborts before a single request is sent.
//! 3. For each cell: load the dictionary (cached per year and kind), wait
//!    for the rate limiter, send the request (retrying transient
//!    failures), decode the response.
//! 4. Concatenate each variable's rows into one table, sorted by year and
//!    location.
//! 5. Left-join the per-variable tables, or return them separately.
//!
//! The first cell that fails terminally cancels the remaining cells and
//! is returned as [`AcsError::Cell`].

use std::sync::Arc;

use futures::future::try_join_all;
use lowe_acs_models::{Estimate, ResultRow, Table, TableKind, VariableDictionary, VariableGroup};
use lowe_geography::{GeographyError, Resolver};
use lowe_geography_models::{LocationDescriptor, NormalizedLocation, ResolvedLocation};

use crate::dictionary::{
    DictionaryCache, DictionaryKey, DictionarySource, DirectoryDictionaries, FallbackDictionaries,
    RemoteDictionaries,
};
use crate::progress::{ProgressCallback, null_progress};
use crate::rate_limit::RateLimiter;
use crate::request::{self, redact_key};
use crate::transport::{HttpTransport, Transport};
use crate::{AcsConfig, AcsError, decode, retry};

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Variable groups; one table each.
    pub vars: Vec<VariableGroup>,
    /// First survey year (inclusive).
    pub start_year: u16,
    /// Last survey year (inclusive).
    pub end_year: u16,
    /// Locations, as any mix of names and codes.
    pub locations: Vec<LocationDescriptor>,
    /// Estimate window.
    pub estimate: Estimate,
    /// Join the per-variable tables into one.
    pub join: bool,
}

impl FetchRequest {
    /// A joined, 5-year request.
    #[must_use]
    pub fn new(
        vars: impl IntoIterator<Item = VariableGroup>,
        years: std::ops::RangeInclusive<u16>,
        locations: impl IntoIterator<Item = LocationDescriptor>,
    ) -> Self {
        Self {
            vars: vars.into_iter().collect(),
            start_year: *years.start(),
            end_year: *years.end(),
            locations: locations.into_iter().collect(),
            estimate: Estimate::default(),
            join: true,
        }
    }

    /// Sets the estimate window.
    #[must_use]
    pub fn estimate(mut self, estimate: Estimate) -> Self {
        self.estimate = estimate;
        self
    }

    /// Sets whether the per-variable tables are joined.
    #[must_use]
    pub fn join(mut self, join: bool) -> Self {
        self.join = join;
        self
    }

    /// Number of request cells this expands to.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.vars.len() * self.year_count() * self.locations.len()
    }

    fn year_count(&self) -> usize {
        usize::from(self.end_year.saturating_sub(self.start_year)) + 1
    }

    fn validate(&self) -> Result<(), AcsError> {
        let invalid = |message: String| Err(AcsError::InvalidRequest { message });
        if self.vars.is_empty() {
            return invalid("no variables requested".to_string());
        }
        if self.locations.is_empty() {
            return invalid("no locations requested".to_string());
        }
        if self.start_year > self.end_year {
            return invalid(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            ));
        }
        if let Some(var) = self.vars.iter().find(|var| var.id.is_empty()) {
            return invalid(format!("empty variable id in {var:?}"));
        }
        if self.locations.iter().any(LocationDescriptor::is_empty) {
            return invalid("empty location descriptor".to_string());
        }
        Ok(())
    }
}

/// Result of [`AcsClient::fetch_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutput {
    /// All variables left-joined into one table.
    Joined(Table),
    /// One table per requested variable, in request order.
    PerVariable(Vec<Table>),
}

impl FetchOutput {
    /// The tables, one element when joined.
    #[must_use]
    pub fn into_tables(self) -> Vec<Table> {
        match self {
            Self::Joined(table) => vec![table],
            Self::PerVariable(tables) => tables,
        }
    }
}

struct PreparedLocation {
    label: String,
    codes: NormalizedLocation,
    names: ResolvedLocation,
}

struct Cell<'a> {
    var: usize,
    group: &'a VariableGroup,
    kind: TableKind,
    year: u16,
    location: &'a PreparedLocation,
}

struct Inner {
    config: AcsConfig,
    transport: Arc<dyn Transport>,
    resolver: Arc<Resolver>,
    limiter: Arc<RateLimiter>,
    dictionaries: DictionaryCache,
}

/// Fetches ACS tables. Cheap to clone; clones share the dictionary cache
/// and rate limiter.
#[derive(Clone)]
pub struct AcsClient {
    inner: Arc<Inner>,
}

/// Builder for [`AcsClient`]; every component has a default.
pub struct AcsClientBuilder {
    config: AcsConfig,
    transport: Option<Arc<dyn Transport>>,
    resolver: Option<Arc<Resolver>>,
    limiter: Option<Arc<RateLimiter>>,
    dictionaries: Option<Arc<dyn DictionarySource>>,
}

impl AcsClientBuilder {
    /// Replaces the HTTP transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `resolver` instead of loading one from
    /// [`AcsConfig::geography_dir`].
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces the process-wide rate limiter.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Replaces the default dictionary source (directory, then download).
    #[must_use]
    pub fn dictionaries(mut self, source: Arc<dyn DictionarySource>) -> Self {
        self.dictionaries = Some(source);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// * [`AcsError::MissingApiKey`] / [`AcsError::Config`] for invalid
    ///   configuration.
    /// * [`AcsError::Http`] if the default transport cannot be built.
    /// * [`AcsError::Geography`] if no resolver was given and
    ///   [`AcsConfig::geography_dir`] is unset or holds unreadable tables.
    pub fn build(self) -> Result<AcsClient, AcsError> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => {
                let dir = config.geography_dir.as_deref().ok_or(
                    GeographyError::TablesNotConfigured {
                        var: lowe_geography::TABLES_DIR_ENV,
                    },
                )?;
                Arc::new(Resolver::from_dir(dir)?)
            }
        };
        let limiter = self
            .limiter
            .unwrap_or_else(|| RateLimiter::process_wide(&config.rate_limit));
        let source = self.dictionaries.unwrap_or_else(|| {
            Arc::new(FallbackDictionaries::new(
                Arc::new(DirectoryDictionaries::new(&config.dictionary_dir)),
                Arc::new(RemoteDictionaries::new(
                    Arc::clone(&transport),
                    config.base_url.clone(),
                    config.retry,
                    Arc::clone(&limiter),
                )),
            ))
        });

        Ok(AcsClient {
            inner: Arc::new(Inner {
                config,
                transport,
                resolver,
                limiter,
                dictionaries: DictionaryCache::new(source),
            }),
        })
    }
}

impl AcsClient {
    /// A client with default components.
    ///
    /// # Errors
    ///
    /// See [`AcsClientBuilder::build`].
    pub fn new(config: AcsConfig) -> Result<Self, AcsError> {
        Self::builder(config).build()
    }

    /// A builder for customizing components.
    #[must_use]
    pub fn builder(config: AcsConfig) -> AcsClientBuilder {
        AcsClientBuilder {
            config,
            transport: None,
            resolver: None,
            limiter: None,
            dictionaries: None,
        }
    }

    /// The resolver used for locations.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    /// The client's configuration.
    #[must_use]
    pub fn config(&self) -> &AcsConfig {
        &self.inner.config
    }

    /// The variable dictionary for a year, kind and estimate window,
    /// through the client's cache.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError`] if no source can provide the dictionary.
    pub async fn fetch_dictionary(
        &self,
        year: u16,
        kind: TableKind,
        estimate: Estimate,
    ) -> Result<Arc<VariableDictionary>, AcsError> {
        self.inner
            .dictionaries
            .get(DictionaryKey {
                year,
                kind,
                estimate,
            })
            .await
    }

    /// Fetches `request` without progress reporting.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_table_with_progress`].
    pub async fn fetch_table(&self, request: &FetchRequest) -> Result<FetchOutput, AcsError> {
        self.fetch_table_with_progress(request, &null_progress())
            .await
    }

    /// Fetches every cell of `request` concurrently and assembles the
    /// result, advancing `progress` once per completed cell.
    ///
    /// # Errors
    ///
    /// * [`AcsError::InvalidRequest`] / [`AcsError::UnknownVariableKind`]
    ///   if the request is unusable.
    /// * [`AcsError::Geography`] if a location cannot be resolved.
    /// * [`AcsError::Cell`] for the first cell that fails terminally.
    /// * [`AcsError::Join`] if the per-variable tables cannot be joined.
    pub async fn fetch_table_with_progress(
        &self,
        request: &FetchRequest,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<FetchOutput, AcsError> {
        request.validate()?;

        let kinds = request
            .vars
            .iter()
            .map(|group| {
                group
                    .kind_or_infer()
                    .ok_or_else(|| AcsError::UnknownVariableKind {
                        variable: group.id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let locations = request
            .locations
            .iter()
            .map(|descriptor| self.prepare_location(descriptor))
            .collect::<Result<Vec<_>, _>>()?;

        let mut cells = Vec::with_capacity(request.cell_count());
        for (var, (group, kind)) in request.vars.iter().zip(&kinds).enumerate() {
            for year in request.start_year..=request.end_year {
                for location in &locations {
                    cells.push(Cell {
                        var,
                        group,
                        kind: *kind,
                        year,
                        location,
                    });
                }
            }
        }

        log::info!(
            "Fetching {} cells ({} variables x {} years x {} locations)",
            cells.len(),
            request.vars.len(),
            request.year_count(),
            locations.len()
        );
        progress.set_total(cells.len() as u64);
        progress.set_message(format!(
            "{} {}-{}",
            request
                .vars
                .iter()
                .map(|group| group.id.as_str())
                .collect::<Vec<_>>()
                .join(","),
            request.start_year,
            request.end_year
        ));

        let rows = try_join_all(cells.iter().map(|cell| async move {
            let row = self
                .fetch_cell(cell, request.estimate)
                .await
                .map_err(|e| AcsError::Cell {
                    variable: cell.group.id.clone(),
                    year: cell.year,
                    location: cell.location.label.clone(),
                    source: Box::new(e),
                })?;
            progress.cell_finished(&cell.group.id, cell.year, &cell.location.label);
            Ok::<_, AcsError>(row)
        }))
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                progress.finish_and_clear();
                log::error!("{e}");
                return Err(e);
            }
        };

        let mut per_var: Vec<Vec<Table>> = vec![Vec::new(); request.vars.len()];
        for (cell, row) in cells.iter().zip(rows) {
            per_var[cell.var].push(Table::from(row));
        }
        let tables: Vec<Table> = per_var.into_iter().map(Table::concat).collect();

        progress.finish(format!("Fetched {} cells", cells.len()));

        if !request.join {
            return Ok(FetchOutput::PerVariable(tables));
        }

        let mut tables = tables.into_iter();
        let first = tables.next().unwrap_or_default();
        let joined = tables.try_fold(first, |joined, table| joined.left_join(&table))?;
        log::info!(
            "Joined {} variables into {} rows x {} columns",
            request.vars.len(),
            joined.len(),
            joined.columns().len()
        );
        Ok(FetchOutput::Joined(joined))
    }

    fn prepare_location(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<PreparedLocation, AcsError> {
        let codes = self.inner.resolver.normalize_codes(descriptor)?;
        let names = self.inner.resolver.resolve_to_names(&codes.to_descriptor())?;
        log::debug!("Resolved {descriptor} to codes {codes} and names {names}");
        // Reject locations that cannot be expressed as clauses before any
        // request goes out.
        request::geography_clauses(&codes)?;
        Ok(PreparedLocation {
            label: descriptor.to_string(),
            codes,
            names: ResolvedLocation::from_names(&names),
        })
    }

    async fn fetch_cell(&self, cell: &Cell<'_>, estimate: Estimate) -> Result<ResultRow, AcsError> {
        let inner = &self.inner;
        let dictionary = inner
            .dictionaries
            .get(DictionaryKey {
                year: cell.year,
                kind: cell.kind,
                estimate,
            })
            .await?;

        let url = request::cell_url(
            &inner.config.base_url,
            cell.year,
            cell.kind,
            estimate,
            &cell.group.id,
            &cell.location.codes,
            &inner.config.api_key,
        )?;
        let label = format!("{} {} {}", cell.group.id, cell.year, cell.location.label);

        let body = retry::with_backoff(&inner.config.retry, &label, || async {
            inner.limiter.acquire().await;
            inner.transport.get_json(&url).await
        })
        .await?;

        let values = decode::decode_response(&body, &dictionary).inspect_err(|e| {
            log::debug!("{label}: failed to decode response from {}: {e}", redact_key(&url));
        })?;
        log::trace!("{label}: decoded {} series", values.len());

        Ok(ResultRow {
            year: cell.year,
            location: cell.location.names.clone(),
            values,
        })
    }
}
