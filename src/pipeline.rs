//! The four-step mechanism search pipeline.
//!
//! Each search runs a strictly ordered chain of dependent requests:
//!
//! ```text
//! query ──▶ FactsInfo search ──▶ manifest ──▶ categoryOptions ──▶ groups
//!           (tabular rows)       (base URL)   (mechanism match)   (agency/
//!                                                                 partner)
//! ```
//!
//! Every invocation gets a monotonically increasing generation token and
//! builds one immutable [`SearchReport`]. The report is published to session
//! state only if its generation is still current, so a slow search that
//! resolves after a newer one can never overwrite the newer result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use reqwest::Url;

use crate::client::ApiClient;
use crate::config::{Config, GroupPolicy};
use crate::error::{PipelineError, Step};
use crate::format::{dhis_date, short_header_label};
use crate::models::{
    CategoryOption, CategoryOptionGroup, CategoryOptionsResponse, DatimInfo, GroupRole, Manifest,
    SearchReport, SearchRow, TabularResponse,
};

/// Field selection requested from the metadata lookup.
const CATEGORY_OPTION_FIELDS: &str = ":owner,displayName,name,categories[:owner],categoryOptionCombos[:owner],categoryOptionGroups[:owner],organisationUnits[:owner]";

/// Stylesheet served by the metadata host, recorded once per distinct URL.
const STYLESHEET_PATH: &str = "dhis-web-commons/font-awesome/css/font-awesome.min.css";

/// Write-through mirror for the active query (the original UI mirrored it
/// into the page's query string so searches were shareable).
pub trait QuerySink: Send + Sync {
    fn record_query(&self, query: &str);
}

/// Sink for surfaces with no query mirror (plain CLI runs).
pub struct NoopQuerySink;

impl QuerySink for NoopQuerySink {
    fn record_query(&self, _query: &str) {}
}

/// Canonicalize a raw query: strip double quotes, trim whitespace. An empty
/// result is legal and will be searched.
pub fn canonicalize_query(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

struct SessionState {
    /// Column headers kept from the first successful search when
    /// `keep_first_headers` is on.
    headers: Option<Vec<String>>,
    latest: Option<SearchReport>,
    /// Injected stylesheet links, insertion-ordered and deduplicated.
    stylesheets: Vec<String>,
}

/// Owns search-session state and executes the pipeline.
pub struct MechanismFinder {
    client: ApiClient,
    config: Config,
    sink: Box<dyn QuerySink>,
    generation: AtomicU64,
    state: Mutex<SessionState>,
}

impl MechanismFinder {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_sink(config, Box::new(NoopQuerySink))
    }

    pub fn with_sink(config: Config, sink: Box<dyn QuerySink>) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        Ok(Self {
            client,
            config,
            sink,
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                headers: None,
                latest: None,
                stylesheets: Vec::new(),
            }),
        })
    }

    /// Run the full chain for `raw_query` and return the resulting report.
    ///
    /// The report is also published as [`latest`](Self::latest) unless a
    /// newer search started while this one was in flight, in which case the
    /// stale report is returned to the caller but discarded from session
    /// state.
    pub async fn search(&self, raw_query: &str) -> Result<SearchReport, PipelineError> {
        let query = canonicalize_query(raw_query);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.sink.record_query(&query);

        let tabular = self.fetch_search_rows(&query).await?;
        let (headers, rows) = split_tabular(tabular);

        let first = rows.first();
        let found_in_facts_info = first.is_some();
        let code = first
            .and_then(|row| row.mechanism_code())
            .unwrap_or(query.as_str())
            .to_string();

        let api_base = self.resolve_api_base().await?;
        self.register_stylesheet(&api_base);

        let option = self.fetch_category_option(&api_base, &code).await?;

        let mut datim = DatimInfo::default();
        let found_in_datim = option.is_some();
        if let Some(option) = option {
            let policy = self.config.pipeline.ambiguous_groups;
            datim.agency = pick_group(&option.category_option_groups, GroupRole::Agency, policy)?;
            datim.partner = pick_group(&option.category_option_groups, GroupRole::Partner, policy)?;
            datim.mechanism = Some(option);
        }

        let report = SearchReport {
            generation,
            query,
            headers,
            rows,
            found_in_facts_info,
            found_in_datim,
            datim,
        };

        Ok(self.publish(report))
    }

    /// The most recently published report, if any search has completed
    /// without being superseded.
    pub fn latest(&self) -> Option<SearchReport> {
        self.state.lock().unwrap().latest.clone()
    }

    /// Stylesheet links injected so far, deduplicated in insertion order.
    pub fn stylesheets(&self) -> Vec<String> {
        self.state.lock().unwrap().stylesheets.clone()
    }

    async fn fetch_search_rows(&self, query: &str) -> Result<TabularResponse, PipelineError> {
        let url = Url::parse(&self.config.search.endpoint).map_err(|e| PipelineError::Parse {
            step: Step::Search,
            detail: e.to_string(),
        })?;
        self.client
            .get_json(Step::Search, url, &[("search", query)])
            .await
    }

    /// Discover the metadata API base URL. In development mode the
    /// configured fixed URL is used and the manifest fetch is skipped.
    async fn resolve_api_base(&self) -> Result<String, PipelineError> {
        if let Some(base) = self.config.development_base_url() {
            return Ok(base.to_string());
        }

        let url =
            Url::parse(&self.config.search.manifest_url).map_err(|e| PipelineError::Parse {
                step: Step::Manifest,
                detail: e.to_string(),
            })?;
        let manifest: Manifest = self.client.get_json(Step::Manifest, url, &[]).await?;
        Ok(manifest.activities.dhis.href)
    }

    async fn fetch_category_option(
        &self,
        api_base: &str,
        code: &str,
    ) -> Result<Option<CategoryOption>, PipelineError> {
        let endpoint = format!(
            "{}/api/categoryOptions.json",
            api_base.trim_end_matches('/')
        );
        let url = Url::parse(&endpoint).map_err(|e| PipelineError::Parse {
            step: Step::CategoryOptions,
            detail: e.to_string(),
        })?;

        let filter = format!("code:eq:{}", code);
        let response: CategoryOptionsResponse = self
            .client
            .get_json(
                Step::CategoryOptions,
                url,
                &[("filter", filter.as_str()), ("fields", CATEGORY_OPTION_FIELDS)],
            )
            .await?;

        Ok(response.category_options.into_iter().next())
    }

    fn register_stylesheet(&self, api_base: &str) {
        let href = format!("{}/{}", api_base.trim_end_matches('/'), STYLESHEET_PATH);
        let mut state = self.state.lock().unwrap();
        if !state.stylesheets.contains(&href) {
            state.stylesheets.push(href);
        }
    }

    /// Publish a finished report with a single assignment, unless a newer
    /// search has started since this one began. Returns the report as the
    /// caller should see it (session headers substituted under the
    /// first-wins policy).
    fn publish(&self, mut report: SearchReport) -> SearchReport {
        let mut state = self.state.lock().unwrap();

        if report.generation != self.generation.load(Ordering::SeqCst) {
            return report;
        }

        if self.config.pipeline.keep_first_headers {
            match &state.headers {
                None => state.headers = Some(report.headers.clone()),
                Some(first) => report.headers = first.clone(),
            }
        }

        state.latest = Some(report.clone());
        report
    }
}

fn split_tabular(tabular: TabularResponse) -> (Vec<String>, Vec<SearchRow>) {
    let mut data = tabular.data.into_iter();
    let headers = data.next().unwrap_or_default();
    let rows = data.map(SearchRow::parse).collect();
    (headers, rows)
}

fn pick_group(
    groups: &[CategoryOptionGroup],
    role: GroupRole,
    policy: GroupPolicy,
) -> Result<Option<CategoryOptionGroup>, PipelineError> {
    let matches: Vec<&CategoryOptionGroup> = groups
        .iter()
        .filter(|g| {
            g.code
                .as_deref()
                .is_some_and(|code| code.starts_with(role.prefix()) && code.len() > role.prefix().len())
        })
        .collect();

    match (matches.len(), policy) {
        (0, _) => Ok(None),
        (1, _) => Ok(Some(matches[0].clone())),
        (count, GroupPolicy::Error) => Err(PipelineError::AmbiguousGroup { role, count }),
        (_, GroupPolicy::First) => Ok(Some(matches[0].clone())),
    }
}

/// CLI entry point — runs one search and prints the result.
pub async fn run_search(config: Config, raw_query: &str, json: bool) -> Result<()> {
    let finder = MechanismFinder::new(config)?;
    let report = match finder.search(raw_query).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("--- Mechanism search ---");
    println!("query:              {}", report.query);
    println!(
        "found in FactsInfo: {}",
        if report.found_in_facts_info { "yes" } else { "no" }
    );
    println!(
        "found in DATIM:     {}",
        if report.found_in_datim { "yes" } else { "no" }
    );
    println!();

    match report.rows.first() {
        Some(row) => {
            println!("--- FactsInfo match ({} rows total) ---", report.rows.len());
            for (header, field) in report.headers.iter().zip(row.fields.iter()) {
                println!("{:<16} {}", format!("{}:", short_header_label(header)), dhis_date(field));
            }
        }
        None => println!("No FactsInfo rows matched."),
    }
    println!();

    if report.found_in_datim {
        println!("--- DATIM ---");
        if let Some(mechanism) = &report.datim.mechanism {
            println!("mechanism:  {}", mechanism.label());
            if let Some(code) = &mechanism.code {
                println!("code:       {}", code);
            }
        }
        if let Some(agency) = &report.datim.agency {
            println!("agency:     {}", agency.code.as_deref().unwrap_or("(no code)"));
        }
        if let Some(partner) = &report.datim.partner {
            println!("partner:    {}", partner.code.as_deref().unwrap_or("(no code)"));
        }
    } else {
        println!("No DATIM category option matched.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(code: &str) -> CategoryOptionGroup {
        CategoryOptionGroup {
            id: None,
            name: Some(code.to_string()),
            display_name: None,
            code: Some(code.to_string()),
        }
    }

    #[test]
    fn test_canonicalize_strips_quotes_and_whitespace() {
        assert_eq!(canonicalize_query("  \"abc\"  "), "abc");
        assert_eq!(canonicalize_query("ab\"cd"), "abcd");
        assert_eq!(canonicalize_query(""), "");
        assert_eq!(canonicalize_query("  "), "");
    }

    #[test]
    fn test_split_tabular_coerces_rows() {
        let tabular = TabularResponse {
            data: vec![
                vec!["H1".into(), "H2".into()],
                vec!["a".into(), "1".into()],
                vec!["b".into(), "n/a".into()],
            ],
        };
        let (headers, rows) = split_tabular(tabular);
        assert_eq!(headers, vec!["H1", "H2"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].active, Some(1));
        assert_eq!(rows[1].active, None);
    }

    #[test]
    fn test_split_tabular_empty_payload() {
        let (headers, rows) = split_tabular(TabularResponse { data: vec![] });
        assert!(headers.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_pick_group_single_match() {
        let groups = vec![group("Agency_USAID"), group("Partner_XYZ")];
        let agency = pick_group(&groups, GroupRole::Agency, GroupPolicy::First)
            .unwrap()
            .unwrap();
        assert_eq!(agency.code.as_deref(), Some("Agency_USAID"));
        let partner = pick_group(&groups, GroupRole::Partner, GroupPolicy::First)
            .unwrap()
            .unwrap();
        assert_eq!(partner.code.as_deref(), Some("Partner_XYZ"));
    }

    #[test]
    fn test_pick_group_no_match() {
        let groups = vec![group("Other_ABC")];
        assert!(pick_group(&groups, GroupRole::Agency, GroupPolicy::First)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pick_group_bare_prefix_is_not_a_match() {
        // The role pattern requires at least one character after the prefix.
        let groups = vec![group("Agency_")];
        assert!(pick_group(&groups, GroupRole::Agency, GroupPolicy::First)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pick_group_multiple_first_policy() {
        let groups = vec![group("Agency_USAID"), group("Agency_HHS")];
        let picked = pick_group(&groups, GroupRole::Agency, GroupPolicy::First)
            .unwrap()
            .unwrap();
        assert_eq!(picked.code.as_deref(), Some("Agency_USAID"));
    }

    #[test]
    fn test_pick_group_multiple_error_policy() {
        let groups = vec![group("Agency_USAID"), group("Agency_HHS")];
        let err = pick_group(&groups, GroupRole::Agency, GroupPolicy::Error).unwrap_err();
        match err {
            PipelineError::AmbiguousGroup { role, count } => {
                assert_eq!(role, GroupRole::Agency);
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_pick_group_missing_code_is_not_a_match() {
        let groups = vec![CategoryOptionGroup {
            id: None,
            name: Some("unnamed".into()),
            display_name: None,
            code: None,
        }];
        assert!(pick_group(&groups, GroupRole::Partner, GroupPolicy::First)
            .unwrap()
            .is_none());
    }
}
