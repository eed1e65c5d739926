use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::SystemTime;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::downloader::EXPORT_FILE_NAME;
use crate::error::SessionError;
use crate::loader::DEFAULT_HEADER_ROW;
use crate::lookup::ReferencePanel;
use crate::master::{MasterStatus, MasterTable};
use crate::production::{EntryForm, LogTable};
use crate::session::{Mode, Session};
use crate::settings::Settings;
use crate::view::{self, PanelView, Selection};

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "weld_session";

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type SharedSession = Arc<Mutex<Session>>;

struct SessionEntry {
    session: SharedSession,
    /// Pushed forward on every request that presents the cookie.
    expires_at: SystemTime,
}

/// Server-wide state: configuration plus one isolated `Session` per browser.
pub struct AppState {
    config: AppConfig,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
    message: Option<String>,
}

impl ApiResponse {
    fn ok(message: Option<String>) -> Self {
        ApiResponse {
            status: "ok".to_string(),
            message,
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    master: MasterStatus,
    mode: Mode,
}

#[derive(Deserialize)]
struct ModeRequest {
    mode: Mode,
}

#[derive(Serialize)]
struct EntryResponse {
    status: String,
    row: usize,
}

#[derive(Serialize)]
struct EditResponse {
    status: String,
    changed: bool,
}

#[derive(Serialize)]
struct ReferenceResponse {
    items: ReferencePanel,
    rows: PanelView,
}

#[derive(Deserialize)]
struct MappingRequest {
    line_column: String,
    weld_column: String,
}

#[derive(Deserialize)]
struct ColumnsRequest {
    columns: Vec<String>,
}

#[derive(Deserialize)]
struct CustomRequest {
    text: String,
}

/// Error returned by handlers, rendered as `{status: "error", message}`.
#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    Upload(MultipartError),
    BadRequest(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            // 413 when the body limit is hit, 400 for malformed forms
            AppError::Upload(err) => (err.status(), err.body_text()),
            AppError::Session(err) => {
                let code = match err {
                    SessionError::Settings(_) | SessionError::Export(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (code, err.to_string())
            }
        };
        let body = ApiResponse {
            status: "error".to_string(),
            message: Some(message),
        };
        (code, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        AppState {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Session for the request's cookie, starting a new one when needed
    ///
    /// A session lives until it goes `session_idle` without a request. Expired
    /// sessions are dropped whenever a new one is registered, and an expired
    /// cookie gets a fresh session.
    async fn session(&self, jar: CookieJar) -> (CookieJar, SharedSession) {
        let idle = self.config.session_idle();
        if let Some(id) = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()) {
            let now = SystemTime::now();
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = sessions.get_mut(&id).filter(|entry| entry.expires_at > now) {
                entry.expires_at = now + idle;
                return (jar, Arc::clone(&entry.session));
            }
        }

        // Settings and the master workbook are read from disk.
        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || Session::start(&config))
            .await
            .unwrap_or_else(|err| {
                error!("session start failed: {err}");
                let settings = Settings::load(&self.config.settings);
                Session::new(settings, self.config.settings.clone())
            });
        let session = Arc::new(Mutex::new(session));

        let id = Uuid::new_v4().to_string();
        {
            let now = SystemTime::now();
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let before = sessions.len();
            sessions.retain(|_, entry| entry.expires_at > now);
            if sessions.len() < before {
                debug!("dropped {} idle sessions", before - sessions.len());
            }
            let entry = SessionEntry {
                session: Arc::clone(&session),
                expires_at: now + idle,
            };
            sessions.insert(id.clone(), entry);
        }
        info!("started session {id}");

        let cookie = Cookie::build((SESSION_COOKIE, id)).path("/").http_only(true);
        (jar.add(cookie), session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the router with all API routes and the static file service.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.static_dir);
    let upload_limit = DefaultBodyLimit::max(state.config.upload_limit());
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/mode", post(set_mode))
        .route("/api/view", get(get_view))
        .route("/api/lines", get(get_lines))
        .route("/api/welds", get(get_welds))
        .route("/api/reference", get(get_reference))
        .route("/api/record", get(get_record))
        .route("/api/entries", post(submit_entry))
        .route("/api/log", get(get_log).put(edit_log))
        .route("/api/log/export", get(export_log))
        .route("/api/master", post(upload_master).layer(upload_limit))
        .route("/api/settings", get(get_settings))
        .route("/api/settings/mapping", put(set_mapping))
        .route("/api/settings/auto-fill", put(set_auto_fill))
        .route("/api/settings/reference", put(set_reference))
        .route("/api/settings/custom", put(set_custom))
        .route("/api/settings/save", post(save_settings))
        .nest_service("/static", static_dir)
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind = config.bind;
    let app = router(Arc::new(AppState::new(config)));

    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{bind}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn get_status(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let session = lock(&session);
    let body = StatusResponse {
        master: session.master_status(),
        mode: session.mode(),
    };
    (jar, Json(body))
}

async fn set_mode(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ModeRequest>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    lock(&session).set_mode(payload.mode);
    (jar, Json(ApiResponse::ok(None)))
}

async fn get_view(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(selection): Query<Selection>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let view = view::build(&lock(&session), &selection);
    (jar, Json(view))
}

async fn get_lines(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let session = lock(&session);
    let lines = session
        .lookup()
        .map(|lookup| lookup.distinct_lines())
        .unwrap_or_default();
    (jar, Json(lines))
}

async fn get_welds(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(selection): Query<Selection>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let session = lock(&session);
    let welds = match (session.lookup(), selection.line()) {
        (Some(lookup), Some(line)) => lookup.distinct_welds(line),
        _ => Vec::new(),
    };
    (jar, Json(welds))
}

async fn get_reference(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(selection): Query<Selection>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let session = lock(&session);
    let items = match (session.lookup(), selection.both()) {
        (Some(lookup), Some((line, weld))) => {
            lookup.reference_panel(line, weld, &session.settings().reference_columns)
        }
        _ => ReferencePanel::default(),
    };
    let rows = PanelView::from(&items);
    (jar, Json(ReferenceResponse { items, rows }))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(selection): Query<Selection>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let session = lock(&session);
    let result: ApiResult<_> = session
        .lookup()
        .ok_or(AppError::Session(SessionError::MasterNotLoaded))
        .map(|lookup| {
            let record = selection
                .both()
                .and_then(|(line, weld)| lookup.find_row(line, weld));
            Json(record)
        });
    (jar, result)
}

async fn submit_entry(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<EntryForm>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result: ApiResult<_> = lock(&session)
        .submit_entry(form)
        .map(|row| {
            Json(EntryResponse {
                status: "ok".to_string(),
                row,
            })
        })
        .map_err(AppError::from);
    (jar, result)
}

async fn get_log(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let table = lock(&session).log().table().clone();
    (jar, Json(table))
}

async fn edit_log(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(table): Json<LogTable>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let changed = lock(&session).edit_log(table);
    let body = EditResponse {
        status: "ok".to_string(),
        changed,
    };
    (jar, Json(body))
}

async fn export_log(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result: ApiResult<_> = lock(&session)
        .export_log()
        .map(|bytes| {
            (
                [
                    (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
                    ),
                ],
                bytes,
            )
        })
        .map_err(AppError::from);
    (jar, result)
}

// Pull the workbook bytes and the optional header row out of the form.
async fn read_upload(mut multipart: Multipart) -> ApiResult<(Vec<u8>, usize)> {
    let mut file_data = Vec::new();
    let mut header_row = DEFAULT_HEADER_ROW;

    while let Some(field) = multipart.next_field().await.map_err(AppError::Upload)? {
        let field_name = field.name().unwrap_or("unknown").to_string();
        match field_name.as_str() {
            "file" => {
                file_data = field.bytes().await.map_err(AppError::Upload)?.to_vec();
            }
            "header_row" => {
                let text = field.text().await.map_err(AppError::Upload)?;
                header_row = text
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("invalid header row '{text}'")))?;
            }
            _ => {}
        }
    }

    if file_data.is_empty() {
        return Err(AppError::BadRequest("No file data received".to_string()));
    }
    Ok((file_data, header_row))
}

async fn upload_master(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result = parse_upload(multipart)
        .await
        .map(|master| Json(lock(&session).install_upload(master)));
    (jar, result)
}

// The session keeps its current master until the new one parses.
async fn parse_upload(multipart: Multipart) -> ApiResult<MasterTable> {
    let (bytes, header_row) = read_upload(multipart).await?;
    tokio::task::spawn_blocking(move || MasterTable::from_bytes(bytes, header_row))
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?
        .map_err(|err| AppError::Session(err.into()))
}

async fn get_settings(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let view = view::settings_view(&lock(&session));
    (jar, Json(view))
}

fn acknowledge(result: Result<(), SessionError>) -> ApiResult<Json<ApiResponse>> {
    result
        .map(|()| Json(ApiResponse::ok(Some("Settings saved".to_string()))))
        .map_err(AppError::from)
}

async fn set_mapping(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<MappingRequest>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result = lock(&session).set_mapping(&payload.line_column, &payload.weld_column);
    (jar, acknowledge(result))
}

async fn set_auto_fill(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ColumnsRequest>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result = lock(&session).set_auto_fill(payload.columns);
    (jar, acknowledge(result))
}

async fn set_reference(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ColumnsRequest>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result = lock(&session).set_reference(payload.columns);
    (jar, acknowledge(result))
}

async fn set_custom(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<CustomRequest>,
) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result = lock(&session).set_custom_columns(&payload.text);
    (jar, acknowledge(result))
}

async fn save_settings(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = state.session(jar).await;
    let result = lock(&session).save_settings();
    (jar, acknowledge(result))
}
