use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use lancar_core::{CoaDirectory, CoaError, CompanyId, DateRange, ImportUpload, tree};
use lancar_memstore::{InMemoryDirectory, seed_demo_company};
use lancar_platform::{
    AccountView, CreateAccountRequest, ImportResultView, LedgerEntryView, MessageResponse,
    ServiceConfig, UpdateAccountRequest,
};

const COMPANY_HEADER: &str = "x-company-id";

#[derive(Clone)]
struct AppState {
    directory: Arc<InMemoryDirectory>,
    default_company: CompanyId,
}

#[derive(Debug, Clone, Deserialize)]
struct TransactionsQuery {
    #[serde(rename = "startDate")]
    start_date: Option<NaiveDate>,
    #[serde(rename = "endDate")]
    end_date: Option<NaiveDate>,
}

type ApiError = (StatusCode, Json<Value>);

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lancar_server=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8200")?;
    let directory = Arc::new(InMemoryDirectory::new());
    let default_company = if config.seed_demo {
        let company = seed_demo_company(&directory, &config.company_name).await?;
        info!("seeded demo company {} ({})", config.company_name, company);
        company
    } else {
        let company = directory.register_company(&config.company_name).await;
        info!("registered company {} ({})", config.company_name, company);
        company
    };

    let state = AppState {
        directory,
        default_company,
    };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/coa", get(get_tree).post(create_account))
        .route("/coa/export", get(export_tree))
        .route("/coa/import", post(import_tree))
        .route("/coa/{id}", put(update_account).delete(delete_account))
        .route("/coa/{id}/transactions", get(account_transactions))
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("coa service listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    let company = company_from_headers(&state, &headers)?;
    let roots = state
        .directory
        .fetch_tree(company)
        .await
        .map_err(api_error)?;
    Ok(Json(roots.into_iter().map(AccountView::from).collect()))
}

async fn create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let company = company_from_headers(&state, &headers)?;
    let id = state
        .directory
        .create_account(company, payload.into_draft())
        .await
        .map_err(api_error)?;

    let roots = state
        .directory
        .fetch_tree(company)
        .await
        .map_err(api_error)?;
    let node = tree::find_node(&roots, id).cloned().ok_or_else(|| {
        api_error(CoaError::Server(
            "created account missing from tree".to_string(),
        ))
    })?;
    Ok((StatusCode::CREATED, Json(AccountView::from(node))))
}

async fn update_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let company = company_from_headers(&state, &headers)?;
    state
        .directory
        .update_account(company, id, payload.into_patch())
        .await
        .map_err(api_error)?;
    Ok(Json(MessageResponse {
        message: "account updated".to_string(),
    }))
}

async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let company = company_from_headers(&state, &headers)?;
    state
        .directory
        .delete_account(company, id)
        .await
        .map_err(api_error)?;
    Ok(Json(MessageResponse {
        message: "account deleted".to_string(),
    }))
}

async fn export_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let company = company_from_headers(&state, &headers)?;
    let blob = state
        .directory
        .export_tree(company)
        .await
        .map_err(api_error)?;

    let disposition = format!("attachment; filename=\"{}\"", blob.filename);
    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        blob.bytes,
    ))
}

async fn import_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ImportResultView>, ApiError> {
    let company = company_from_headers(&state, &headers)?;

    let mut upload: Option<ImportUpload> = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        api_error(CoaError::validation(format!("invalid multipart body: {err}")))
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("import.csv").to_string();
            let bytes = field.bytes().await.map_err(|err| {
                api_error(CoaError::validation(format!("failed to read upload: {err}")))
            })?;
            upload = Some(ImportUpload {
                filename,
                bytes: bytes.to_vec(),
            });
        }
    }
    let upload = upload
        .ok_or_else(|| api_error(CoaError::validation("multipart field \"file\" is required")))?;

    let summary = state
        .directory
        .import_tree(company, upload)
        .await
        .map_err(api_error)?;
    Ok(Json(ImportResultView::from(summary)))
}

async fn account_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<LedgerEntryView>>, ApiError> {
    let company = company_from_headers(&state, &headers)?;
    let range = DateRange {
        start: query.start_date,
        end: query.end_date,
    };
    let entries = state
        .directory
        .account_transactions(company, id, range)
        .await
        .map_err(api_error)?;
    Ok(Json(entries.into_iter().map(LedgerEntryView::from).collect()))
}

fn company_from_headers(state: &AppState, headers: &HeaderMap) -> Result<CompanyId, ApiError> {
    let Some(value) = headers.get(COMPANY_HEADER) else {
        return Ok(state.default_company);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(CompanyId)
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "X-Company-Id must be a UUID" })),
        ))
}

fn api_error(err: CoaError) -> ApiError {
    let status = match &err {
        CoaError::Validation { .. } => StatusCode::BAD_REQUEST,
        CoaError::Conflict(_) => StatusCode::CONFLICT,
        CoaError::NotFound(_) => StatusCode::NOT_FOUND,
        CoaError::Network(_) => StatusCode::BAD_GATEWAY,
        CoaError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "message": err.to_string() })))
}
