use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tfplug::Context;

use super::common::{ApiErrorDetails, ApiErrorResponse, ApiQueryParams, ApiResponse, NOT_FOUND_CODES};
use super::error::ApiError;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionStats};
use super::{AlterOptions, CreateOptions, ObjectDetails, ObjectKind, Parameter, PlatformClient};
use crate::identifier::{Identifier, ObjectIdentifier};

const API_PREFIX: &str = "/api/v2";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Platform REST client
///
/// Every call is issued exactly once; failures surface to the caller.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    pool_manager: ConnectionPoolManager,
}

impl RestClient {
    /// Create a new API client with the default request timeout
    pub fn new(endpoint: &str, token: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::with_timeout(endpoint, token, insecure, Duration::from_secs(30))
    }

    pub fn with_timeout(
        endpoint: &str,
        token: &str,
        insecure: bool,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let pool_manager = ConnectionPoolManager::new(ConnectionPoolConfig {
            request_timeout,
            ..Default::default()
        });
        let http_client = pool_manager.build_client(insecure)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: endpoint.trim_end_matches('/').to_string(),
                auth_header: format!("Bearer {}", token),
                pool_manager,
            }),
        })
    }

    pub async fn get_connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// Execute a request and decode the (possibly `data`-wrapped) body
    async fn execute<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        body: Option<&B>,
        object: &Identifier,
    ) -> Result<T, ApiError> {
        let response = self.send(ctx, method, path, body, object).await?;
        self.parse_success_response(response).await
    }

    /// Execute a request whose response body carries nothing of interest
    async fn execute_empty<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        body: Option<&B>,
        object: &Identifier,
    ) -> Result<(), ApiError> {
        self.send(ctx, method, path, body, object).await.map(|_| ())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        body: Option<&B>,
        object: &Identifier,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request_id = uuid::Uuid::new_v4();

        tracing::debug!(%method, %url, %request_id, "platform request");

        let mut request = self
            .inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(body) = body {
            request = request.json(body);
        }
        // A deadline on the context tightens the client-wide timeout
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining.min(self.inner.pool_manager.request_timeout()));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.inner.pool_manager.record_request(false).await;
                if e.is_timeout() {
                    return Err(ApiError::Timeout(
                        self.inner.pool_manager.request_timeout().as_secs(),
                    ));
                }
                return Err(ApiError::RequestError(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            self.inner.pool_manager.record_request(true).await;
            return Ok(response);
        }

        self.inner.pool_manager.record_request(false).await;
        tracing::debug!(%request_id, status = status.as_u16(), "platform request failed");

        match status {
            reqwest::StatusCode::UNAUTHORIZED => Err(ApiError::AuthError),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited),
            reqwest::StatusCode::SERVICE_UNAVAILABLE => Err(ApiError::ServiceUnavailable),
            _ => self.handle_error_response(response, object).await,
        }
    }

    /// Parse successful response
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::trace!("API response body: {}", text);

        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(wrapper) => Ok(wrapper.data),
            Err(_) => match serde_json::from_str::<T>(&text) {
                Ok(data) => Ok(data),
                Err(e) => {
                    tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                    Err(ApiError::ParseError(format!(
                        "Failed to parse response: {}",
                        e
                    )))
                }
            },
        }
    }

    /// Handle error response
    async fn handle_error_response<T>(
        &self,
        response: reqwest::Response,
        object: &Identifier,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let parsed = serde_json::from_str::<ApiErrorResponse>(&text).ok();
        let is_not_found = status == 404
            || parsed
                .as_ref()
                .and_then(|p| p.code.as_deref())
                .is_some_and(|code| NOT_FOUND_CODES.contains(&code));
        if is_not_found {
            return Err(ApiError::NotFound(object.fully_qualified_name()));
        }

        let (message, details) = match parsed {
            Some(err_resp) => (
                err_resp.message.clone().unwrap_or_else(|| text.clone()),
                Some(Box::new(ApiErrorDetails {
                    code: err_resp.code,
                    errors: err_resp.errors,
                    field_errors: err_resp.data,
                })),
            ),
            None => (text, None),
        };

        Err(ApiError::ApiError {
            status,
            message,
            details,
        })
    }
}

fn segment(part: &str) -> String {
    urlencoding::encode(part).into_owned()
}

fn schema_collection(kind: ObjectKind) -> Option<&'static str> {
    match kind {
        ObjectKind::Service => Some("services"),
        ObjectKind::Stream => Some("streams"),
        ObjectKind::Procedure => Some("procedures"),
        _ => None,
    }
}

/// Path of the collection an object lives in plus the object's own segment
fn locate(kind: ObjectKind, id: &Identifier) -> Result<(String, String), ApiError> {
    let mismatch = || {
        ApiError::Rejected(format!(
            "{} cannot address a {}",
            id.fully_qualified_name(),
            kind
        ))
    };

    match (kind, id) {
        (ObjectKind::Account, Identifier::Current) => {
            Ok((format!("{}/accounts", API_PREFIX), "current".to_string()))
        }
        (ObjectKind::OrganizationAccount, Identifier::Current) => Ok((
            format!("{}/organization-accounts", API_PREFIX),
            "current".to_string(),
        )),
        (ObjectKind::Warehouse, Identifier::Account(id)) => {
            Ok((format!("{}/warehouses", API_PREFIX), segment(id.name())))
        }
        (ObjectKind::Database, Identifier::Account(id)) => {
            Ok((format!("{}/databases", API_PREFIX), segment(id.name())))
        }
        (ObjectKind::User, Identifier::Account(id)) => {
            Ok((format!("{}/users", API_PREFIX), segment(id.name())))
        }
        (kind, Identifier::SchemaObject(id)) => {
            let collection = schema_collection(kind).ok_or_else(mismatch)?;
            Ok((
                format!(
                    "{}/databases/{}/schemas/{}/{}",
                    API_PREFIX,
                    segment(id.database()),
                    segment(id.schema()),
                    collection
                ),
                segment(id.name()),
            ))
        }
        (ObjectKind::Procedure, Identifier::SchemaObjectWithArguments(id)) => Ok((
            format!(
                "{}/databases/{}/schemas/{}/procedures",
                API_PREFIX,
                segment(id.database()),
                segment(id.schema())
            ),
            segment(&format!("{}({})", id.name(), id.argument_types().join(","))),
        )),
        _ => Err(mismatch()),
    }
}

fn object_path(kind: ObjectKind, id: &Identifier) -> Result<String, ApiError> {
    let (collection, name) = locate(kind, id)?;
    Ok(format!("{}/{}", collection, name))
}

#[async_trait::async_trait]
impl PlatformClient for RestClient {
    async fn create(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        opts: &CreateOptions,
    ) -> Result<(), ApiError> {
        let (collection, _) = locate(kind, id)?;
        let mut body = opts.properties.clone();
        body.insert("name".to_string(), serde_json::Value::String(id.name().to_string()));
        self.execute_empty(ctx, Method::POST, &collection, Some(&body), id)
            .await
    }

    async fn alter(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        alter: &AlterOptions,
    ) -> Result<(), ApiError> {
        let path = format!("{}:alter", object_path(kind, id)?);
        self.execute_empty(ctx, Method::POST, &path, Some(alter), id).await
    }

    async fn drop_safely(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<(), ApiError> {
        let path = format!(
            "{}{}",
            object_path(kind, id)?,
            ApiQueryParams::new().add("ifExists", true).to_query_string()
        );
        match self
            .execute_empty::<()>(ctx, Method::DELETE, &path, None, id)
            .await
        {
            Err(ApiError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn get_by_id(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<ObjectDetails, ApiError> {
        let path = object_path(kind, id)?;
        self.execute::<ObjectDetails, ()>(ctx, Method::GET, &path, None, id)
            .await
    }

    async fn show_parameters(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<Vec<Parameter>, ApiError> {
        let path = format!("{}/parameters", object_path(kind, id)?);
        self.execute::<Vec<Parameter>, ()>(ctx, Method::GET, &path, None, id)
            .await
    }

    async fn create_or_alter(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        opts: &CreateOptions,
    ) -> Result<(), ApiError> {
        let path = object_path(kind, id)?;
        self.execute_empty(ctx, Method::PUT, &path, Some(&opts.properties), id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{AccountObjectIdentifier, SchemaObjectIdentifier};
    use crate::parameters::ParameterLevel;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(url: &str) -> RestClient {
        RestClient::new(url, "secret", true).unwrap()
    }

    fn warehouse() -> Identifier {
        AccountObjectIdentifier::new("WH").into()
    }

    #[test]
    fn schema_objects_nest_under_their_schema() {
        let id: Identifier = SchemaObjectIdentifier::new("DB", "SCH", "SVC").into();
        assert_eq!(
            object_path(ObjectKind::Service, &id).unwrap(),
            "/api/v2/databases/DB/schemas/SCH/services/SVC"
        );
    }

    #[test]
    fn procedure_paths_carry_the_signature() {
        let id: Identifier = SchemaObjectIdentifier::new("DB", "SCH", "P")
            .with_arguments(vec!["VARCHAR".into(), "NUMBER".into()])
            .into();
        assert_eq!(
            object_path(ObjectKind::Procedure, &id).unwrap(),
            "/api/v2/databases/DB/schemas/SCH/procedures/P%28VARCHAR%2CNUMBER%29"
        );
    }

    #[test]
    fn mismatched_kind_is_rejected() {
        let err = object_path(ObjectKind::Service, &warehouse()).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
    }

    #[tokio::test]
    async fn create_posts_name_and_properties() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/warehouses")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({
                "name": "WH",
                "warehouse_size": "XSMALL"
            })))
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let mut opts = CreateOptions::default();
        opts.properties
            .insert("warehouse_size".to_string(), json!("XSMALL"));

        client(&server.url())
            .create(&Context::new(), ObjectKind::Warehouse, &warehouse(), &opts)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn alter_posts_tagged_action() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/warehouses/WH:alter")
            .match_body(Matcher::Json(json!({
                "action": "unset",
                "properties": ["comment"]
            })))
            .with_status(200)
            .create_async()
            .await;

        client(&server.url())
            .alter(
                &Context::new(),
                ObjectKind::Warehouse,
                &warehouse(),
                &AlterOptions::Unset {
                    properties: vec!["comment".to_string()],
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_unwraps_data_envelope() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v2/warehouses/WH")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"name": "WH", "auto_suspend": 600}}"#)
            .create_async()
            .await;

        let details = client(&server.url())
            .get_by_id(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap();
        assert_eq!(details.string("name").as_deref(), Some("WH"));
        assert_eq!(details.number("auto_suspend"), Some(600));
    }

    #[tokio::test]
    async fn missing_object_maps_to_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v2/warehouses/WH")
            .with_status(404)
            .with_body(r#"{"code": "002003", "message": "Warehouse 'WH' does not exist"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .get_by_id(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn not_found_code_on_bad_request_maps_to_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v2/warehouses/WH")
            .with_status(400)
            .with_body(r#"{"code": "002003", "message": "does not exist or not authorized"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .get_by_id(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn platform_rejection_keeps_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v2/warehouses/WH:alter")
            .with_status(400)
            .with_body(r#"{"code": "000001", "message": "invalid value for auto_suspend"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .alter(
                &Context::new(),
                ObjectKind::Warehouse,
                &warehouse(),
                &AlterOptions::Unset {
                    properties: vec!["auto_suspend".to_string()],
                },
            )
            .await
            .unwrap_err();
        match err {
            ApiError::ApiError { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid value for auto_suspend");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_auth_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v2/warehouses/WH")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server.url())
            .get_by_id(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthError));
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/warehouses/WH")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let c = client(&server.url());
        let err = c
            .get_by_id(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable));
        mock.assert_async().await;

        let stats = c.get_connection_stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_requests, 1);
    }

    #[tokio::test]
    async fn drop_tolerates_missing_object() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", Matcher::Regex(r"^/api/v2/warehouses/WH".to_string()))
            .match_query(Matcher::UrlEncoded("ifExists".into(), "true".into()))
            .with_status(404)
            .create_async()
            .await;

        client(&server.url())
            .drop_safely(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn parameters_accept_bare_arrays() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v2/warehouses/WH/parameters")
            .with_status(200)
            .with_body(
                r#"[
                    {"key": "MAX_CONCURRENCY_LEVEL", "value": "8", "level": "", "default": "8"},
                    {"key": "STATEMENT_TIMEOUT_IN_SECONDS", "value": "60", "level": "WAREHOUSE"}
                ]"#,
            )
            .create_async()
            .await;

        let params = client(&server.url())
            .show_parameters(&Context::new(), ObjectKind::Warehouse, &warehouse())
            .await
            .unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].level, ParameterLevel::PlatformDefault);
        assert_eq!(params[1].level, ParameterLevel::Warehouse);
    }

    #[tokio::test]
    async fn create_or_alter_puts_properties() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v2/databases/DB/schemas/SCH/services/SVC")
            .match_body(Matcher::PartialJson(json!({"compute_pool": "POOL"})))
            .with_status(200)
            .create_async()
            .await;

        let mut opts = CreateOptions::default();
        opts.properties.insert("compute_pool".to_string(), json!("POOL"));
        let id: Identifier = SchemaObjectIdentifier::new("DB", "SCH", "SVC").into();

        client(&server.url())
            .create_or_alter(&Context::new(), ObjectKind::Service, &id, &opts)
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
