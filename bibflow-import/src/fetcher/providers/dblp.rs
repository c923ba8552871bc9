//! DBLP publication search

use super::{fetch_body, parse_json, url_with_params};
use crate::error::FetcherError;
use crate::fetcher::transport::{Transport, TransportRequest};
use crate::fetcher::{HelpFile, SearchBasedFetcher, SearchResults, WebFetcher};
use async_trait::async_trait;
use bibflow_common::{Field, Record};
use serde_json::Value;
use std::sync::Arc;

const SEARCH_URL: &str = "https://dblp.org/search/publ/api";

/// DBLP answers with one object or a list, depending on the count
fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(text),
        _ => None,
    }
}

fn entry_type(dblp_type: &str) -> &'static str {
    match dblp_type {
        "Journal Articles" => "article",
        "Conference and Workshop Papers" => "inproceedings",
        "Books and Theses" => "book",
        "Parts in Books or Collections" => "incollection",
        _ => "misc",
    }
}

/// Map one `result.hits.hit[].info` object
fn record_from_hit(info: &Value) -> Record {
    let kind = entry_type(info.get("type").and_then(Value::as_str).unwrap_or(""));
    let mut record = Record::new(kind);

    if let Some(key) = info.get("key").and_then(text) {
        record.citation_key = Some(format!("DBLP:{}", key));
    }
    if let Some(title) = info.get("title").and_then(text) {
        // DBLP terminates titles with a period
        record.set_field(Field::Title, title.strip_suffix('.').unwrap_or(&title));
    }
    if let Some(authors) = info.pointer("/authors/author") {
        let names: Vec<String> = one_or_many(authors)
            .into_iter()
            .filter_map(|a| a.get("text").and_then(text).or_else(|| text(a)))
            .collect();
        if !names.is_empty() {
            record.set_field(Field::Author, names.join(" and "));
        }
    }
    if let Some(venue) = info.get("venue").and_then(text) {
        let field = if kind == "inproceedings" { Field::BookTitle } else { Field::Journal };
        record.set_field(field, venue);
    }
    for (key, field) in [
        ("year", Field::Year),
        ("volume", Field::Volume),
        ("number", Field::Number),
        ("pages", Field::Pages),
        ("doi", Field::Doi),
        ("ee", Field::Url),
    ] {
        if let Some(value) = info.get(key).and_then(text) {
            record.set_field(field, value);
        }
    }
    record
}

pub struct DblpFetcher {
    transport: Arc<dyn Transport>,
}

impl DblpFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl WebFetcher for DblpFetcher {
    fn name(&self) -> &str {
        "DBLP"
    }

    fn help_page(&self) -> Option<HelpFile> {
        Some(HelpFile::FetcherDblp)
    }
}

#[async_trait]
impl SearchBasedFetcher for DblpFetcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResults, FetcherError> {
        if query.trim().is_empty() || max_results == 0 {
            return Ok(SearchResults::default());
        }
        let hits = max_results.to_string();
        let url = url_with_params(
            self.name(),
            SEARCH_URL,
            &[("q", query), ("format", "json"), ("h", &hits)],
        )?;
        let request = TransportRequest::get(url);
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(SearchResults::default());
        };

        let document = parse_json(self.name(), &body)?;
        let hits = document
            .pointer("/result/hits")
            .ok_or_else(|| FetcherError::malformed(self.name(), "missing result.hits"))?;
        let records = hits
            .get("hit")
            .map(one_or_many)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hit| hit.get("info"))
            .map(record_from_hit)
            .take(max_results)
            .collect();
        Ok(SearchResults::complete(records))
    }
}
