use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use drawdeck_shared::{
    ApiError, ApiMessage, Credentials, RenameDiagramRequest, SaveDiagramRequest,
    SaveDiagramResponse, Snapshot, TokenResponse,
};

use crate::auth::{hash_password, new_salt, verify_password};
use crate::state::{AppState, StoreError, UserRecord, MAX_CONTENT_LEN};

fn error_response(status: StatusCode, detail: &str) -> Response {
    (
        status,
        Json(ApiError {
            detail: detail.to_string(),
        }),
    )
        .into_response()
}

fn message_response(msg: &str) -> Response {
    Json(ApiMessage {
        msg: msg.to_string(),
    })
    .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves the bearer token to a username, or an error response ready to
/// return.
async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let Some(token) = bearer_token(headers) else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    };
    let mut tokens = state.tokens.write().await;
    tokens.authorize(token).ok_or_else(|| {
        warn!("rejected expired or unknown token");
        error_response(StatusCode::UNAUTHORIZED, "Invalid credentials")
    })
}

pub async fn register_handler(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Response {
    if credentials.username.trim().is_empty()
        || credentials.username.len() > 64
        || credentials.password.is_empty()
    {
        return error_response(StatusCode::BAD_REQUEST, "Invalid username or password");
    }
    let salt = new_salt();
    let user = UserRecord {
        username: credentials.username.clone(),
        password_digest: hash_password(&credentials.password, &salt),
        salt,
    };
    let mut store = state.store.write().await;
    match store.register_user(user) {
        Ok(()) => {
            info!(username = %credentials.username, "registered user");
            message_response("Registered successfully")
        }
        Err(StoreError::UsernameTaken) => {
            error_response(StatusCode::BAD_REQUEST, "Username already exists")
        }
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Response {
    let verified = {
        let store = state.store.read().await;
        store
            .user(&credentials.username)
            .map(|user| verify_password(&credentials.password, &user.salt, &user.password_digest))
            .unwrap_or(false)
    };
    if !verified {
        return error_response(StatusCode::BAD_REQUEST, "Invalid username or password");
    }
    let token = state.tokens.write().await.issue(&credentials.username);
    info!(username = %credentials.username, "logged in");
    Json(TokenResponse { token }).into_response()
}

pub async fn save_diagram_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SaveDiagramRequest>,
) -> Response {
    let username = match require_user(&state, &headers).await {
        Ok(username) => username,
        Err(response) => return response,
    };
    if username != request.username {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let snapshot = match Snapshot::from_data_url(request.content.clone()) {
        Ok(snapshot) => snapshot,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid diagram content"),
    };
    if request.content.len() > MAX_CONTENT_LEN || snapshot.decode_bytes().is_err() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid diagram content");
    }
    let mut store = state.store.write().await;
    match store.save_diagram(&username, request.title, request.content, request.id) {
        Ok(id) => {
            info!(%username, id, "saved diagram");
            Json(SaveDiagramResponse {
                msg: "Diagram saved".to_string(),
                id,
            })
            .into_response()
        }
        Err(StoreError::DiagramNotFound) => {
            error_response(StatusCode::NOT_FOUND, "Diagram not found")
        }
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
    }
}

pub async fn get_diagrams_handler(
    Path(username): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let caller = match require_user(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if caller != username {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let store = state.store.read().await;
    Json(store.diagrams_for(&username)).into_response()
}

pub async fn delete_diagram_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let username = match require_user(&state, &headers).await {
        Ok(username) => username,
        Err(response) => return response,
    };
    let mut store = state.store.write().await;
    if store.diagram_owner(id) != Some(username.as_str()) {
        return error_response(StatusCode::NOT_FOUND, "Diagram not found");
    }
    match store.delete_diagram(id) {
        Ok(()) => {
            info!(%username, id, "deleted diagram");
            message_response("Diagram deleted")
        }
        Err(_) => error_response(StatusCode::NOT_FOUND, "Diagram not found"),
    }
}

pub async fn rename_diagram_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RenameDiagramRequest>,
) -> Response {
    let username = match require_user(&state, &headers).await {
        Ok(username) => username,
        Err(response) => return response,
    };
    let mut store = state.store.write().await;
    if store.diagram_owner(id) != Some(username.as_str()) {
        return error_response(StatusCode::NOT_FOUND, "Diagram not found");
    }
    match store.rename_diagram(id, request.title) {
        Ok(()) => message_response("Diagram renamed"),
        Err(_) => error_response(StatusCode::NOT_FOUND, "Diagram not found"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use crate::auth::TokenStore;
    use crate::state::Store;
    use crate::storage::FileStorage;

    use super::*;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(RwLock::new(Store::default())),
            tokens: Arc::new(RwLock::new(TokenStore::default())),
            storage: Arc::new(FileStorage::new(std::env::temp_dir())),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    fn save_request(content: &str) -> SaveDiagramRequest {
        SaveDiagramRequest {
            username: "ada".to_string(),
            title: None,
            content: content.to_string(),
            id: None,
        }
    }

    #[tokio::test]
    async fn save_rejects_undecodable_content() {
        let state = test_state();
        let token = state.tokens.write().await.issue("ada");
        // Well-shaped data URL, but the payload is not base64.
        let request = save_request("data:image/png;base64,!!not-base64!!");
        let response =
            save_diagram_handler(State(state), bearer(&token), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_accepts_a_decodable_snapshot() {
        let state = test_state();
        let token = state.tokens.write().await.issue("ada");
        let request = save_request(Snapshot::blank().as_data_url());
        let response =
            save_diagram_handler(State(state.clone()), bearer(&token), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.read().await.diagrams_for("ada").len(), 1);
    }

    #[test]
    fn bearer_tokens_are_extracted_from_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn error_bodies_use_detail_shape() {
        let body = serde_json::to_string(&ApiError {
            detail: "Diagram not found".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"detail":"Diagram not found"}"#);
    }
}
