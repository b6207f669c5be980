use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use gallery_core::{ErrorKind, GalleryWorkflow, ListQuery, WorkflowError};
use gallery_db::{keys::is_valid_key, Database, GalleryRecord, ObjectStore, Pagination};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use utoipa::{IntoParams, Modify, OpenApi, ToSchema};
use uuid::Uuid;

use crate::{
    form::GalleryForm,
    storage::{ObjectBackend, StorageBackendKind, StorageConfig},
};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_STORAGE_ROOT: &str = "./.gallery_storage";
const DEFAULT_BUCKET: &str = "gallery-images";
const DEFAULT_MAX_UPLOAD_MIB: u64 = 10;

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.store_url)
        .await
        .context("failed to open record store")?;
    let objects = ObjectBackend::open(&config.storage)
        .await
        .context("failed to open object store")?;

    let state = Arc::new(AppState {
        workflow: GalleryWorkflow::new(db, objects),
        service_key: config.service_key.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listen socket")?;

    info!(addr = %config.listen_addr, "gallery-daemon listening");
    axum::serve(listener, app)
        .await
        .context("HTTP server exited")?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/gallery", get(list_images).post(create_image))
        .route("/gallery/:id", patch(update_image).delete(delete_image))
        .route("/storage/:bucket/:key", get(serve_object))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

struct AppState {
    workflow: GalleryWorkflow<Database, ObjectBackend>,
    service_key: String,
    max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
struct AppConfig {
    listen_addr: SocketAddr,
    store_url: String,
    service_key: String,
    storage: StorageConfig,
    max_upload_bytes: usize,
}

impl AppConfig {
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let listen_addr: SocketAddr = non_empty("GALLERY_API_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("invalid GALLERY_API_ADDR")?;

        let store_url = non_empty("GALLERY_STORE_URL")
            .or_else(|| non_empty("DATABASE_URL"))
            .ok_or_else(|| anyhow!("GALLERY_STORE_URL or DATABASE_URL must be configured"))?;

        let service_key = non_empty("GALLERY_SERVICE_KEY")
            .ok_or_else(|| anyhow!("GALLERY_SERVICE_KEY must be configured"))?;

        let kind = match non_empty("GALLERY_STORAGE_BACKEND") {
            Some(value) => value
                .parse::<StorageBackendKind>()
                .context("invalid GALLERY_STORAGE_BACKEND")?,
            None => StorageBackendKind::Fs,
        };

        let storage = StorageConfig {
            kind,
            root: non_empty("GALLERY_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT)),
            bucket: non_empty("GALLERY_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            public_base: non_empty("GALLERY_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://{listen_addr}/storage")),
        };

        let max_upload_mib = match non_empty("GALLERY_MAX_UPLOAD_MIB") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .context("invalid GALLERY_MAX_UPLOAD_MIB")?,
            None => DEFAULT_MAX_UPLOAD_MIB,
        };

        Ok(Self {
            listen_addr,
            store_url,
            service_key,
            storage,
            max_upload_bytes: mi_bytes(max_upload_mib)
                .context("GALLERY_MAX_UPLOAD_MIB is too large")?,
        })
    }
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is healthy"))
)]
async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[utoipa::path(
    get,
    path = "/gallery",
    params(GalleryListQuery),
    responses(
        (status = 200, description = "Gallery images fetched", body = ApiEnvelope),
        (status = 400, description = "Invalid query or store failure", body = ApiEnvelope)
    )
)]
async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GalleryListQuery>,
) -> Result<(StatusCode, Json<ApiEnvelope>), ApiError> {
    let query = query.into_list_query()?;
    let records = state.workflow.list(query).await?;
    let images: Vec<GalleryImageResponse> =
        records.into_iter().map(GalleryImageResponse::from).collect();
    success(
        StatusCode::OK,
        "Gallery images fetched successfully",
        images,
    )
}

#[utoipa::path(
    post,
    path = "/gallery",
    request_body(content = GalleryUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image uploaded", body = ApiEnvelope),
        (status = 400, description = "Invalid form or workflow failure", body = ApiEnvelope),
        (status = 401, description = "Missing or invalid credentials", body = ApiEnvelope),
        (status = 413, description = "Upload exceeds the configured limit")
    ),
    security(("bearerAuth" = []))
)]
async fn create_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiEnvelope>), ApiError> {
    authorize(&state, &headers)?;
    let form = GalleryForm::read(multipart.map_err(ApiError::from)?).await?;
    let record = state.workflow.create(form.into_create()?).await?;
    success(
        StatusCode::CREATED,
        "Image uploaded successfully",
        GalleryImageResponse::from(record),
    )
}

#[utoipa::path(
    patch,
    path = "/gallery/{id}",
    params(("id" = Uuid, Path, description = "Gallery item identifier")),
    request_body(content = GalleryUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image updated", body = ApiEnvelope),
        (status = 400, description = "Invalid form or workflow failure", body = ApiEnvelope),
        (status = 401, description = "Missing or invalid credentials", body = ApiEnvelope)
    ),
    security(("bearerAuth" = []))
)]
async fn update_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiEnvelope>), ApiError> {
    authorize(&state, &headers)?;
    let id = parse_id(&id)?;
    let form = GalleryForm::read(multipart.map_err(ApiError::from)?).await?;
    let record = state.workflow.update(id, form.into_update()).await?;
    success(
        StatusCode::OK,
        "Image updated successfully",
        GalleryImageResponse::from(record),
    )
}

#[utoipa::path(
    delete,
    path = "/gallery/{id}",
    params(("id" = Uuid, Path, description = "Gallery item identifier")),
    responses(
        (status = 200, description = "Image deleted", body = ApiEnvelope),
        (status = 400, description = "Unknown id or workflow failure", body = ApiEnvelope),
        (status = 401, description = "Missing or invalid credentials", body = ApiEnvelope)
    ),
    security(("bearerAuth" = []))
)]
async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ApiEnvelope>), ApiError> {
    authorize(&state, &headers)?;
    let id = parse_id(&id)?;
    let deleted = state.workflow.delete(id).await?;
    success(
        StatusCode::OK,
        "Image deleted successfully",
        json!({ "id": deleted }),
    )
}

#[utoipa::path(
    get,
    path = "/storage/{bucket}/{key}",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Blob key")
    ),
    responses(
        (status = 200, description = "Stored blob", content_type = "application/octet-stream"),
        (status = 404, description = "No such object", body = ApiEnvelope)
    )
)]
async fn serve_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let objects = state.workflow.objects();
    if bucket != objects.bucket() || !is_valid_key(&key) {
        return Err(ApiError::not_found("Object not found"));
    }

    let object = objects
        .download(&key)
        .await
        .map_err(|err| ApiError::internal(format!("{err:#}")))?
        .ok_or_else(|| ApiError::not_found("Object not found"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, object.content_type)],
        object.bytes,
    )
        .into_response())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = require_bearer(headers)?;
    let matches: bool = token.as_bytes().ct_eq(state.service_key.as_bytes()).into();
    if !matches {
        return Err(ApiError::unauthorized("invalid service key"));
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<Uuid, WorkflowError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| WorkflowError::InvalidInput(format!("'{raw}' is not a valid id")))
}

fn success(
    status: StatusCode,
    message: &str,
    data: impl Serialize,
) -> Result<(StatusCode, Json<ApiEnvelope>), ApiError> {
    let data = serde_json::to_value(data).map_err(ApiError::internal)?;
    Ok((
        status,
        Json(ApiEnvelope {
            status_code: status.as_u16(),
            success: true,
            message: message.to_string(),
            data: Some(data),
            error: None,
            kind: None,
        }),
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct GalleryListQuery {
    /// Exact item id.
    #[serde(default)]
    id: Option<String>,
    /// Case-insensitive substring of the title.
    #[serde(default)]
    title: Option<String>,
    /// Case-insensitive substring of the description.
    #[serde(default)]
    description: Option<String>,
    /// Exact category tag.
    #[serde(default, rename = "type")]
    tag: Option<String>,
    /// 1-based page number (default 1).
    #[serde(default)]
    page: Option<String>,
    /// Page size (default 10, capped at 100).
    #[serde(default)]
    limit: Option<String>,
}

impl GalleryListQuery {
    fn into_list_query(self) -> Result<ListQuery, WorkflowError> {
        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_id(raw)?),
        };
        let page = parse_count(self.page.as_deref(), "page", Pagination::DEFAULT_PAGE)?;
        let limit = parse_count(self.limit.as_deref(), "limit", Pagination::DEFAULT_LIMIT)?;
        let pagination = Pagination::new(page, limit)
            .map_err(|err| WorkflowError::InvalidInput(err.to_string()))?;

        Ok(ListQuery {
            id,
            title: self.title,
            description: self.description,
            tag: self.tag,
            pagination,
        })
    }
}

fn parse_count(raw: Option<&str>, name: &str, default: u32) -> Result<u32, WorkflowError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| WorkflowError::InvalidInput(format!("{name} must be a positive integer"))),
    }
}

/// Multipart fields accepted by the create and update routes.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
struct GalleryUploadForm {
    #[schema(value_type = Option<String>, format = Binary)]
    file: Option<Vec<u8>>,
    title: Option<String>,
    description: Option<String>,
    /// Repeat the part (or send `type[]`) once per tag, or send a JSON array.
    #[schema(rename = "type")]
    tags: Option<Vec<String>>,
    /// Used only on create when no file is sent.
    #[schema(rename = "imageUrl")]
    image_url: Option<String>,
}

/// Body of every gallery response, success or failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
struct ApiEnvelope {
    status_code: u16,
    success: bool,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct GalleryImageResponse {
    id: Uuid,
    title: String,
    description: String,
    #[serde(rename = "type")]
    tags: Vec<String>,
    image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GalleryRecord> for GalleryImageResponse {
    fn from(record: GalleryRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            tags: record.tags,
            image_url: record.image_url,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
    kind: Option<ErrorKind>,
    detail: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            kind: None,
            detail: None,
        }
    }

    fn internal<E: std::fmt::Display>(err: E) -> Self {
        let mut api = Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error occurred");
        api.kind = Some(ErrorKind::Unexpected);
        api.detail = Some(err.to_string());
        api
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.message().to_string(),
            kind: Some(err.kind()),
            detail: err.detail(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: "Invalid request".to_string(),
            kind: Some(ErrorKind::InvalidInput),
            detail: Some(err.body_text()),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request".to_string(),
            kind: Some(ErrorKind::InvalidInput),
            detail: Some(err.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(
            status = %self.status,
            message = %self.message,
            kind = self.kind.map(|kind| kind.as_str()),
            detail = self.detail.as_deref(),
            "api error"
        );
        let body = Json(ApiEnvelope {
            status_code: self.status.as_u16(),
            success: false,
            message: self.message,
            data: None,
            error: self.detail,
            kind: self.kind.map(|kind| kind.as_str().to_string()),
        });
        (self.status, body).into_response()
    }
}

fn mi_bytes(value: u64) -> Result<usize> {
    value
        .checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or_else(|| anyhow!("{value} MiB does not fit in memory limits"))
}

pub mod docs {
    use super::*;
    use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

    #[derive(OpenApi)]
    #[openapi(
        info(title = "Gallery API", version = "0.1.0"),
        paths(
            healthz,
            list_images,
            create_image,
            update_image,
            delete_image,
            serve_object
        ),
        components(schemas(
            ApiEnvelope,
            GalleryImageResponse,
            GalleryUploadForm
        )),
        modifiers(&SecurityAddon)
    )]
    pub struct ApiDoc;

    struct SecurityAddon;

    impl Modify for SecurityAddon {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let components = openapi.components.get_or_insert_with(Default::default);
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Service key configured via GALLERY_SERVICE_KEY"))
                        .build(),
                ),
            );
        }
    }
}

fn require_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing Authorization bearer token"))?;
    let header_value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid Authorization header encoding"))?;
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| ApiError::unauthorized("Authorization header must be a Bearer token"))
}
