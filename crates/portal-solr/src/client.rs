//! HTTP client for Apache Solr.
//!
//! Talks to a single core through the JSON schema, update and select
//! APIs. Write operations are buffered by the engine until an explicit
//! commit; the build pipeline batches documents and commits once per run.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use portal_types::config::SolrSettings;

use crate::document::IndexDocument;
use crate::engine::SearchEngine;
use crate::error::SolrError;
use crate::schema::{
    self, FieldDefinition, GeometryValidationRule, DISPLAY_FIELD, GEOMETRY_FIELD, ID_FIELD,
    SEARCH_FIELD, SEARCH_LAYER_FIELD, SPATIAL_FIELD_TYPE,
};

/// Connection timeout for the engine HTTP client.
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Per-request timeout; bulk updates on large batches can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connection settings for one Solr core.
#[derive(Debug, Clone)]
pub struct SolrConfig {
    url: String,
    core: String,
    query_timeout: Duration,
    geometry_validation_rule: GeometryValidationRule,
}

impl SolrConfig {
    pub fn new(url: impl Into<String>, core: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            core: core.into(),
            query_timeout: Duration::from_secs(7),
            geometry_validation_rule: GeometryValidationRule::default(),
        }
    }

    /// Build a config from application settings.
    ///
    /// Fails when the configured geometry validation rule is not one the
    /// engine understands.
    pub fn from_settings(settings: &SolrSettings) -> Result<Self, SolrError> {
        let rule: GeometryValidationRule = settings.geometry_validation_rule.parse()?;
        let mut config = Self::new(&settings.url, &settings.core);
        config.query_timeout = Duration::from_secs(settings.query_timeout_secs);
        config.geometry_validation_rule = rule;
        Ok(config)
    }
}

/// One document returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Feature identifier.
    pub fid: String,
    /// Display values, in configured field order.
    pub display_values: Vec<String>,
    /// Feature geometry as WKT, when the document has one.
    pub geometry: Option<String>,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Total number of matching documents, across all pages.
    pub total: u64,
    /// Offset of the first returned document.
    pub start: u64,
    /// Highest relevance score in the result set.
    pub max_score: Option<f32>,
    pub documents: Vec<SearchHit>,
}

/// Client for one Solr core.
#[derive(Debug, Clone)]
pub struct SolrClient {
    http: Client,
    config: SolrConfig,
}

impl SolrClient {
    /// Create a client. Fails when the HTTP client cannot be built.
    pub fn new(config: SolrConfig) -> Result<Self, SolrError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SolrError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Search one index.
    ///
    /// `query` matches against the search values and defaults to
    /// match-all. `filter` is passed through as an engine filter query.
    /// When `point` and `distance` are given, results are limited to a
    /// radius around the point, unless `filter` already carries a spatial
    /// filter of its own.
    pub async fn search(
        &self,
        index_id: i64,
        query: Option<&str>,
        filter: Option<&str>,
        point: Option<&str>,
        distance: Option<f64>,
        start: u64,
        rows: u64,
    ) -> Result<SearchResult, SolrError> {
        #[derive(Deserialize)]
        struct SelectResponse {
            response: SelectBody,
        }

        #[derive(Deserialize)]
        struct SelectBody {
            #[serde(rename = "numFound")]
            num_found: u64,
            start: u64,
            #[serde(rename = "maxScore", default)]
            max_score: Option<f32>,
            docs: Vec<SelectDoc>,
        }

        #[derive(Deserialize)]
        struct SelectDoc {
            id: String,
            #[serde(rename = "displayFields", default)]
            display_fields: Vec<String>,
            #[serde(default)]
            geometry: Option<String>,
        }

        let mut params: Vec<(&str, String)> = vec![
            ("q", format!("{SEARCH_FIELD}:{}", query.unwrap_or("*"))),
            ("q.op", "AND".to_string()),
            ("fq", format!("{SEARCH_LAYER_FIELD}:{index_id}")),
            (
                "fl",
                format!("{ID_FIELD},{DISPLAY_FIELD},{GEOMETRY_FIELD},score"),
            ),
            ("sort", format!("score desc, {ID_FIELD} asc")),
            ("start", start.to_string()),
            ("rows", rows.to_string()),
            ("timeAllowed", self.config.query_timeout.as_millis().to_string()),
        ];
        if let Some(filter) = filter {
            params.push(("fq", filter.to_string()));
        }
        let has_spatial_filter = filter
            .map(|f| f.starts_with("{!geofilt") || f.starts_with("{!bbox"))
            .unwrap_or(false);
        if let (Some(point), Some(distance)) = (point, distance) {
            if !has_spatial_filter {
                params.push(("fq", format!("{{!geofilt sfield={GEOMETRY_FIELD}}}")));
                params.push(("pt", point.to_string()));
                params.push(("d", distance.to_string()));
            }
        }

        debug!(index_id, query = query.unwrap_or("*"), "Searching index");
        let response = self
            .http
            .get(self.core_url("select"))
            .query(&params)
            .send()
            .await?;
        let body: SelectResponse = check(response).await?.json().await?;

        let documents = body
            .response
            .docs
            .into_iter()
            .map(|doc| SearchHit {
                fid: doc.id,
                display_values: doc.display_fields,
                geometry: doc.geometry,
            })
            .collect();
        Ok(SearchResult {
            total: body.response.num_found,
            start: body.response.start,
            max_score: body.response.max_score,
            documents,
        })
    }

    fn core_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.config.url, self.config.core, path)
    }

    async fn field_exists(&self, name: &str) -> Result<bool, SolrError> {
        let url = self.core_url(&format!("schema/fields/{name}"));
        let response = self.http.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(engine_error(status, response).await),
        }
    }

    async fn field_type_exists(&self, name: &str) -> Result<bool, SolrError> {
        let url = self.core_url(&format!("schema/fieldtypes/{name}"));
        let response = self.http.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(engine_error(status, response).await),
        }
    }

    async fn add_field(&self, field: &FieldDefinition) -> Result<(), SolrError> {
        let response = self
            .http
            .post(self.core_url("schema"))
            .json(&json!({ "add-field": field }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn add_field_type(&self, field_type: &serde_json::Value) -> Result<(), SolrError> {
        let response = self
            .http
            .post(self.core_url("schema"))
            .json(&json!({ "add-field-type": field_type }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn count_documents(&self, index_id: i64) -> Result<u64, SolrError> {
        #[derive(Deserialize)]
        struct CountResponse {
            response: CountBody,
        }

        #[derive(Deserialize)]
        struct CountBody {
            #[serde(rename = "numFound")]
            num_found: u64,
        }

        let response = self
            .http
            .get(self.core_url("select"))
            .query(&[
                ("q", format!("{SEARCH_LAYER_FIELD}:{index_id}")),
                ("rows", "0".to_string()),
            ])
            .send()
            .await?;
        let body: CountResponse = check(response).await?.json().await?;
        Ok(body.response.num_found)
    }
}

#[async_trait]
impl SearchEngine for SolrClient {
    /// Create any missing schema fields, and the spatial field type the
    /// geometry field needs. Schema changes apply immediately; existing
    /// fields are left untouched.
    async fn ensure_schema(&self) -> Result<(), SolrError> {
        let mut created = 0usize;
        for field in schema::field_definitions() {
            if field.field_type == SPATIAL_FIELD_TYPE
                && !self.field_type_exists(SPATIAL_FIELD_TYPE).await?
            {
                info!(field_type = SPATIAL_FIELD_TYPE, "Creating spatial field type");
                let definition = schema::spatial_field_type(self.config.geometry_validation_rule);
                self.add_field_type(&definition).await?;
            }
            if !self.field_exists(&field.name).await? {
                info!(field = %field.name, "Creating schema field");
                self.add_field(&field).await?;
                created += 1;
            }
        }
        if created == 0 {
            debug!("Schema already complete");
        }
        Ok(())
    }

    /// Delete all documents of one search index.
    ///
    /// Counts first; a clear on an index without documents is a no-op and
    /// does not trigger a commit.
    async fn clear_index(&self, index_id: i64) -> Result<(), SolrError> {
        let count = self.count_documents(index_id).await?;
        if count == 0 {
            info!(index_id, "No index to clear");
            return Ok(());
        }
        info!(index_id, count, "Clearing index");
        let body = json!({ "delete": { "query": format!("{SEARCH_LAYER_FIELD}:{index_id}") } });
        let response = self
            .http
            .post(self.core_url("update"))
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        self.commit().await
    }

    async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), SolrError> {
        if documents.is_empty() {
            return Ok(());
        }
        debug!(count = documents.len(), "Submitting documents");
        let response = self
            .http
            .post(self.core_url("update"))
            .json(&documents)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), SolrError> {
        let response = self
            .http
            .post(self.core_url("update"))
            .json(&json!({ "commit": {} }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), SolrError> {
        let response = self.http.get(self.core_url("admin/ping")).send().await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, SolrError> {
    let status = response.status();
    if !status.is_success() {
        return Err(engine_error(status, response).await);
    }
    Ok(response)
}

async fn engine_error(status: StatusCode, response: Response) -> SolrError {
    SolrError::Engine {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> SolrClient {
        SolrClient::new(SolrConfig::new(server.uri(), "test")).unwrap()
    }

    async fn mock_field(server: &MockServer, name: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/test/schema/fields/{name}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_field_exists() {
        let server = MockServer::start().await;
        mock_field(&server, "searchLayer", 200).await;
        mock_field(&server, "missing", 404).await;
        let client = test_client(&server);

        assert!(client.field_exists("searchLayer").await.unwrap());
        assert!(!client.field_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_field_exists_propagates_engine_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/schema/fields/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("core is loading"))
            .mount(&server)
            .await;
        let client = test_client(&server);

        let err = client.field_exists("broken").await.unwrap_err();
        match err {
            SolrError::Engine { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "core is loading");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/test/schema/(fields|fieldtypes)/.+$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/schema"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_schema_creates_missing_field() {
        let server = MockServer::start().await;
        for name in ["searchLayer", "geometry", "searchFields"] {
            mock_field(&server, name, 200).await;
        }
        mock_field(&server, "displayFields", 404).await;
        Mock::given(method("GET"))
            .and(path("/test/schema/fieldtypes/geometry_rpt"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/schema"))
            .and(body_partial_json(json!({ "add-field": { "name": "displayFields" } })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_schema_creates_spatial_field_type() {
        let server = MockServer::start().await;
        for name in ["searchLayer", "searchFields", "displayFields"] {
            mock_field(&server, name, 200).await;
        }
        mock_field(&server, "geometry", 404).await;
        Mock::given(method("GET"))
            .and(path("/test/schema/fieldtypes/geometry_rpt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/schema"))
            .and(body_partial_json(
                json!({ "add-field-type": { "name": "geometry_rpt", "format": "WKT" } }),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/schema"))
            .and(body_partial_json(json!({ "add-field": { "name": "geometry" } })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_index_skips_when_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/select"))
            .and(query_param("q", "searchLayer:5"))
            .and(query_param("rows", "0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "numFound": 0, "docs": [] } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/update"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.clear_index(5).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_index_deletes_and_commits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/select"))
            .and(query_param("q", "searchLayer:5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "numFound": 42, "docs": [] } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/update"))
            .and(body_partial_json(
                json!({ "delete": { "query": "searchLayer:5" } }),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test/update"))
            .and(body_json(json!({ "commit": {} })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.clear_index(5).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_documents_posts_bare_array() {
        let server = MockServer::start().await;
        let mut doc = IndexDocument::new("roads.1", 5);
        doc.search_fields = vec!["Main Street".to_string()];
        doc.display_fields = vec!["Main Street, Springfield".to_string()];
        Mock::given(method("POST"))
            .and(path("/test/update"))
            .and(body_json(json!([{
                "id": "roads.1",
                "searchLayer": 5,
                "searchFields": ["Main Street"],
                "displayFields": ["Main Street, Springfield"]
            }])))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.add_documents(vec![doc]).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_documents_skips_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test/update"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.add_documents(Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/admin/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
            .mount(&server)
            .await;
        let client = test_client(&server);

        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/admin/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = test_client(&server);

        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, SolrError::Engine { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_search_builds_query_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/select"))
            .and(query_param("q", "searchFields:water"))
            .and(query_param("q.op", "AND"))
            .and(query_param("fq", "searchLayer:7"))
            .and(query_param("sort", "score desc, id asc"))
            .and(query_param("timeAllowed", "7000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {
                    "numFound": 2,
                    "start": 0,
                    "maxScore": 1.5,
                    "docs": [
                        {
                            "id": "roads.1",
                            "displayFields": ["Main Street"],
                            "geometry": "POINT (1 2)",
                            "score": 1.5
                        },
                        { "id": "roads.2", "displayFields": ["Side Street"], "score": 0.5 }
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        let result = client
            .search(7, Some("water"), None, None, None, 0, 10)
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.max_score, Some(1.5));
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.documents[0].fid, "roads.1");
        assert_eq!(result.documents[0].geometry.as_deref(), Some("POINT (1 2)"));
        assert!(result.documents[1].geometry.is_none());
    }

    #[tokio::test]
    async fn test_search_defaults_to_match_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/select"))
            .and(query_param("q", "searchFields:*"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "numFound": 0, "start": 0, "docs": [] } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        let result = client.search(7, None, None, None, None, 0, 10).await.unwrap();
        assert_eq!(result.total, 0);
        assert!(result.max_score.is_none());
    }

    #[tokio::test]
    async fn test_search_adds_spatial_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/select"))
            .and(query_param("fq", "{!geofilt sfield=geometry}"))
            .and(query_param("pt", "4.8,52.3"))
            .and(query_param("d", "10"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "numFound": 0, "start": 0, "docs": [] } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client
            .search(7, None, None, Some("4.8,52.3"), Some(10.0), 0, 10)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_keeps_user_spatial_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/select"))
            .and(query_param("fq", "{!bbox sfield=geometry}"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "numFound": 0, "start": 0, "docs": [] } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        client
            .search(
                7,
                None,
                Some("{!bbox sfield=geometry}"),
                Some("4.8,52.3"),
                Some(10.0),
                0,
                10,
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default();
        assert!(!query.contains("pt="));
    }

    #[test]
    fn test_from_settings_rejects_unknown_rule() {
        let settings = SolrSettings {
            geometry_validation_rule: "repairEverything".to_string(),
            ..SolrSettings::default()
        };
        assert!(matches!(
            SolrConfig::from_settings(&settings),
            Err(SolrError::Config(_))
        ));
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = SolrConfig::new("http://localhost:8983/solr/", "geoportal");
        assert_eq!(config.url, "http://localhost:8983/solr");
    }
}
