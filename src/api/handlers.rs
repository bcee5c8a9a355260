//! API Handlers
//!
//! HTTP request handlers for the cache management endpoints. Every cache
//! served here maps `String` keys to `String` values.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::cache::{Cache, ParameterUpdate};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CachesResponse, ClearResponse, DeleteEntryResponse, EntriesResponse, EntryResponse,
    HealthResponse, ParametersResponse, PutEntryRequest, PutEntryResponse, StatsResponse,
    SweepResponse,
};
use crate::registry::CacheManager;

/// The cache type exposed over HTTP
pub type StringCache = Cache<String, String>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry of every named cache
    pub manager: Arc<CacheManager>,
}

impl AppState {
    /// Creates a new AppState around an existing manager.
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    /// Creates a new AppState from configuration.
    ///
    /// New caches start from the configured default parameters.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(CacheManager::new(config.default_settings())))
    }

    fn existing(&self, name: &str) -> Result<StringCache> {
        self.manager.existing_cache(name)
    }
}

/// Handler for GET /caches
pub async fn list_caches_handler(State(state): State<AppState>) -> Json<CachesResponse> {
    Json(CachesResponse {
        caches: state.manager.cache_names(),
    })
}

/// Handler for GET /caches/:name/entries
///
/// Returns a point-in-time snapshot of every entry.
pub async fn list_entries_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EntriesResponse>> {
    let cache = state.existing(&name)?;
    Ok(Json(EntriesResponse::new(name, cache.cache_views())))
}

/// Handler for PUT /caches/:name/entries
///
/// Stores a key-value pair, creating the cache on first use.
pub async fn put_entry_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PutEntryRequest>,
) -> Result<Json<PutEntryResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg));
    }

    let cache: StringCache = state.manager.get_cache(&name)?;
    if cache.parameters().is_disabled() {
        return Ok(Json(PutEntryResponse::disabled(req.key)));
    }

    let response = if req.if_absent {
        if cache.put_if_absent(req.key.clone(), req.value) {
            PutEntryResponse::stored(req.key, None)
        } else {
            PutEntryResponse::kept(req.key)
        }
    } else {
        let previous = cache.get_and_put(req.key.clone(), req.value);
        PutEntryResponse::stored(req.key, previous)
    };

    Ok(Json(response))
}

/// Handler for DELETE /caches/:name/entries
pub async fn clear_entries_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>> {
    state.existing(&name)?.clear();
    info!(cache = %name, "Cache cleared");
    Ok(Json(ClearResponse::new(name)))
}

/// Handler for GET /caches/:name/entries/:key
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<EntryResponse>> {
    let value = state
        .existing(&name)?
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(format!("key '{key}' in cache '{name}'")))?;

    Ok(Json(EntryResponse::new(key, value)))
}

/// Handler for DELETE /caches/:name/entries/:key
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<DeleteEntryResponse>> {
    let removed = state.existing(&name)?.remove(&key);
    Ok(Json(DeleteEntryResponse::new(key, removed)))
}

/// Handler for GET /caches/:name/parameters
///
/// Works for names with no cache yet; those report `attached: false`
/// and the values a new cache would start from. Read-only.
pub async fn get_parameters_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<ParametersResponse> {
    let response = match state.manager.find_parameters(&name) {
        Some(params) => ParametersResponse::new(name, &params),
        None => ParametersResponse::from_settings(name, &state.manager.defaults(), false),
    };
    Json(response)
}

/// Handler for PUT /caches/:name/parameters
///
/// Applies the fields present in the body. A live cache sweeps before
/// the response is sent.
pub async fn put_parameters_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(change): Json<ParameterUpdate>,
) -> Json<ParametersResponse> {
    let params = state.manager.parameters(&name);
    params.apply_update(&change);
    info!(cache = %name, ?change, "Parameters updated");

    Json(ParametersResponse::new(name, &params))
}

/// Handler for POST /caches/:name/sweep
pub async fn sweep_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SweepResponse>> {
    let removed = state.manager.clear_expired(&name)?;
    Ok(Json(SweepResponse { cache: name, removed }))
}

/// Handler for GET /caches/:name/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>> {
    let stats = state.manager.stats(&name)?;
    Ok(Json(StatsResponse::new(name, &stats)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.manager.cache_names().len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ParameterSettings;

    fn state() -> AppState {
        AppState::new(Arc::new(CacheManager::new(ParameterSettings::default())))
    }

    fn put_request(key: &str, value: &str) -> PutEntryRequest {
        PutEntryRequest {
            key: key.to_string(),
            value: value.to_string(),
            if_absent: false,
        }
    }

    fn path(name: &str, key: &str) -> Path<(String, String)> {
        Path((name.to_string(), key.to_string()))
    }

    #[tokio::test]
    async fn test_put_and_get_handler() {
        let state = state();

        let result = put_entry_handler(
            State(state.clone()),
            Path("c".to_string()),
            Json(put_request("test_key", "test_value")),
        )
        .await;
        assert!(result.is_ok());

        let response = get_entry_handler(State(state.clone()), path("c", "test_key"))
            .await
            .unwrap();
        assert_eq!(response.value, "test_value");
    }

    #[tokio::test]
    async fn test_put_returns_previous() {
        let state = state();
        put_entry_handler(State(state.clone()), Path("c".into()), Json(put_request("k", "v1")))
            .await
            .unwrap();

        let response =
            put_entry_handler(State(state.clone()), Path("c".into()), Json(put_request("k", "v2")))
                .await
                .unwrap();

        assert_eq!(response.previous.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_put_if_absent_keeps_existing() {
        let state = state();
        put_entry_handler(State(state.clone()), Path("c".into()), Json(put_request("k", "v1")))
            .await
            .unwrap();

        let mut req = put_request("k", "v2");
        req.if_absent = true;
        let response = put_entry_handler(State(state.clone()), Path("c".into()), Json(req))
            .await
            .unwrap();

        assert!(!response.stored);
        let current = get_entry_handler(State(state), path("c", "k")).await.unwrap();
        assert_eq!(current.value, "v1");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = state();
        let _: StringCache = state.manager.get_cache("c").unwrap();

        let result = get_entry_handler(State(state), path("c", "nonexistent")).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_cache_is_not_found() {
        let state = state();
        let result = list_entries_handler(State(state), Path("missing".into())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = state();
        put_entry_handler(State(state.clone()), Path("c".into()), Json(put_request("gone", "v")))
            .await
            .unwrap();

        let response = delete_entry_handler(State(state.clone()), path("c", "gone"))
            .await
            .unwrap();
        assert!(response.removed);

        // A second delete is a no-op, not an error
        let response = delete_entry_handler(State(state.clone()), path("c", "gone"))
            .await
            .unwrap();
        assert!(!response.removed);

        let result = get_entry_handler(State(state), path("c", "gone")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_type_mismatch_surfaces_as_error() {
        let state = state();
        let _: Cache<u64, u64> = state.manager.get_cache("numbers").unwrap();

        let result = put_entry_handler(
            State(state),
            Path("numbers".into()),
            Json(put_request("k", "v")),
        )
        .await;
        assert!(matches!(result, Err(CacheError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_parameters_handlers() {
        let state = state();
        let change = ParameterUpdate {
            maximum_size: Some(1),
            ..Default::default()
        };

        let pending = put_parameters_handler(State(state.clone()), Path("c".into()), Json(change)).await;
        assert!(!pending.attached);
        assert_eq!(pending.maximum_size, 1);

        let _: StringCache = state.manager.get_cache("c").unwrap();
        let live = get_parameters_handler(State(state), Path("c".into())).await;
        assert!(live.attached);
        assert_eq!(live.maximum_size, 1);
    }

    #[tokio::test]
    async fn test_get_parameters_leaves_registry_alone() {
        let state = state();

        for n in 0..100 {
            let response = get_parameters_handler(State(state.clone()), Path(format!("ghost-{n}"))).await;
            assert!(!response.attached);
        }

        assert!(state.manager.find_parameters("ghost-0").is_none());
        assert!(state.manager.cache_names().is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state();
        let _: StringCache = state.manager.get_cache("c").unwrap();

        let response = stats_handler(State(state), Path("c".into())).await.unwrap();
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(state())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.caches, 0);
    }

    #[tokio::test]
    async fn test_put_invalid_request() {
        let state = state();

        let result =
            put_entry_handler(State(state.clone()), Path("c".into()), Json(put_request("", "value")))
                .await;
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        // Rejected before the cache was created
        assert!(!state.manager.contains("c"));
    }
}
