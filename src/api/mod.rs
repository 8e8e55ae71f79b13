//! Gesture HTTP resources.
//!
//! | Method         | Path                             | Outcome                                   |
//! |----------------|----------------------------------|-------------------------------------------|
//! | `POST`, `PUT`  | `/api/gestures/{gestureType}`    | `201` + `Location`, or `200` + previous   |
//! | `GET`          | `/api/gestures/{gestureType}`    | `200` + `Content-Location`, or `404`      |
//! | `GET`          | `/api/gestures/all`              | `200` + `Content-Location`, JSON array    |
//! | `DELETE`       | `/api/gestures/{gestureType}`    | `204`                                     |
//! | `DELETE`       | `/api/gestures`                  | `204`                                     |
//!
//! Handlers are plain functions returning [`ApiResult`]; [`endpoint`] adapts
//! them to the router and applies [`respond`] to every result, which is the
//! only place errors are turned into responses.

use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::{ApiError, ApiResult, respond};
use crate::http::headers::names;
use crate::http::response::APPLICATION_JSON;
use crate::middleware::{LoggerMiddleware, RecoverMiddleware};
use crate::router::IntoHandler;
use crate::store::GestureStore;
use crate::{Method, Response, Router, StatusCode};

pub const GESTURES_PATH: &str = "/api/gestures";
pub const GESTURE_PATH: &str = "/api/gestures/:gestureType";
pub const ALL_GESTURES_PATH: &str = "/api/gestures/all";

pub const GESTURE_TYPE_PARAM: &str = "gestureType";
pub const TARGET_PARAM: &str = "target";

/// Builds the service router: request logging outermost, panic recovery
/// inside it, then the gesture routes bound to `store`.
pub fn router(store: Arc<GestureStore>) -> Router {
    let mut router = Router::new();
    router.layer(LoggerMiddleware);
    router.layer(RecoverMiddleware);

    router.on(
        &[Method::Post, Method::Put],
        GESTURE_PATH,
        endpoint(&store, upsert_gesture),
    );
    // Registered before GESTURE_PATH, which would otherwise capture "all".
    router.get(ALL_GESTURES_PATH, endpoint(&store, get_all_gestures));
    router.get(GESTURE_PATH, endpoint(&store, get_gesture));
    router.delete(GESTURE_PATH, endpoint(&store, delete_gesture));
    router.delete(GESTURES_PATH, endpoint(&store, delete_all_gestures));
    router
}

/// Binds a handler to the store and maps its result through [`respond`].
pub fn endpoint(
    store: &Arc<GestureStore>,
    handler: fn(&GestureStore, &Context) -> ApiResult,
) -> impl IntoHandler {
    let store = Arc::clone(store);
    move |ctx: Context| {
        let response = respond(handler(&store, &ctx));
        async move { response }
    }
}

fn gesture_type(ctx: &Context) -> Result<&str, ApiError> {
    ctx.param(GESTURE_TYPE_PARAM)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("gesture type is required".to_owned()))
}

/// `POST|PUT /api/gestures/{gestureType}`
pub fn upsert_gesture(store: &GestureStore, ctx: &Context) -> ApiResult {
    let gesture_type = gesture_type(ctx)?;
    let request = ctx.request();

    if let Some(content_type) = request.headers().get(names::CONTENT_TYPE) {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if !essence.eq_ignore_ascii_case("text/plain") {
            return Err(ApiError::UnsupportedMediaType(content_type.to_owned()));
        }
    }

    let gesture = std::str::from_utf8(request.body())
        .map_err(|e| ApiError::InvalidInput(format!("gesture must be UTF-8 text: {e}")))?;

    let result = store.upsert(gesture_type, gesture);
    debug!(
        %gesture_type,
        %gesture,
        created = result.created,
        previous = ?result.previous,
        "upserted gesture"
    );

    if result.created {
        return Ok(Response::new(StatusCode::Created).header(names::LOCATION, ctx.request_url()));
    }
    Ok(Response::text(
        StatusCode::Ok,
        result.previous.unwrap_or_default(),
    ))
}

/// `GET /api/gestures/{gestureType}?target=`
pub fn get_gesture(store: &GestureStore, ctx: &Context) -> ApiResult {
    let gesture_type = gesture_type(ctx)?;
    let target = ctx.request().query_param(TARGET_PARAM);

    let gesture = store.get(gesture_type)?;
    let body = match target {
        Some(target) => format!("{gesture}, {target}"),
        None => gesture,
    };
    debug!(%gesture_type, ?target, %body, "returning gesture");

    Ok(Response::text(StatusCode::Ok, body).header(names::CONTENT_LOCATION, ctx.request_url()))
}

/// `GET /api/gestures/all`
pub fn get_all_gestures(store: &GestureStore, ctx: &Context) -> ApiResult {
    let gestures = store.list_all();
    let body = serde_json::to_string(&gestures)
        .map_err(|e| ApiError::Internal(format!("failed to render gesture list: {e}")))?;

    Ok(Response::new(StatusCode::Ok)
        .header(names::CONTENT_TYPE, APPLICATION_JSON)
        .header(names::CONTENT_LOCATION, ctx.request_url())
        .body(body))
}

/// `DELETE /api/gestures/{gestureType}`
pub fn delete_gesture(store: &GestureStore, ctx: &Context) -> ApiResult {
    store.delete(gesture_type(ctx)?);
    Ok(Response::new(StatusCode::NoContent))
}

/// `DELETE /api/gestures`
pub fn delete_all_gestures(store: &GestureStore, _ctx: &Context) -> ApiResult {
    store.delete_all();
    Ok(Response::new(StatusCode::NoContent))
}
