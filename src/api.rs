//! HTTP surface: rooms, tracked addresses, aggregated market data, feed.
//!
//! Caller identity comes from the `x-user-id` header set by whatever sits in
//! front of this service; `/public/*` and `/health` need none.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::polymarket::aggregate::{
    aggregate_positions, filter_activities, group_activities, merge_activities, summarize,
    ActivityFilter, ActivityGroup, ActivityPage, AggregatedPosition, PositionSort, Summary,
};
use crate::polymarket::types::ActivityKind;
use crate::rooms::model::{
    normalize_address, FeedQuery, LabelPatch, NewAddress, NewComment, NewPost, NewRoom, RoomPatch,
};
use crate::rooms::{PublicRoom, Room};
use crate::AppState;

pub const USER_HEADER: &str = "x-user-id";

const DEFAULT_ACTIVITY_LIMIT: usize = 50;
const MAX_ACTIVITY_LIMIT: usize = 500;

// ─────────────────────────────────────────────────────────
// Router / server
// ─────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_room).patch(update_room).delete(delete_room))
        .route("/rooms/:id/share", post(rotate_share))
        .route("/rooms/:id/addresses", post(add_address))
        .route(
            "/rooms/:id/addresses/:address",
            patch(relabel_address).delete(remove_address),
        )
        .route("/rooms/:id/activity", get(room_activity))
        .route("/rooms/:id/activity/grouped", get(room_grouped))
        .route("/rooms/:id/positions", get(room_positions))
        .route("/rooms/:id/summary", get(room_summary))
        .route("/public/rooms", get(list_public_rooms))
        .route("/public/rooms/:slug", get(public_room))
        .route("/public/rooms/:slug/activity", get(public_activity))
        .route("/public/rooms/:slug/activity/grouped", get(public_grouped))
        .route("/public/rooms/:slug/positions", get(public_positions))
        .route("/public/rooms/:slug/summary", get(public_summary))
        .route("/addresses/:address/activity", get(address_activity))
        .route("/addresses/:address/positions", get(address_positions))
        .route("/addresses/:address/refresh", post(refresh_address))
        .route("/feed", get(feed))
        .route("/posts", post(create_post))
        .route("/posts/:id", axum::routing::delete(delete_post))
        .route("/posts/:id/comments", get(list_comments).post(add_comment))
        .route(
            "/posts/:id/comments/:comment_id",
            axum::routing::delete(delete_comment),
        )
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🌐 Listening on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("🛑 Shutdown signal received");
}

// ─────────────────────────────────────────────────────────
// Caller identity
// ─────────────────────────────────────────────────────────

/// Opaque id of the calling user.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}

// ─────────────────────────────────────────────────────────
// Extractors that reject with the JSON error body
// ─────────────────────────────────────────────────────────

#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

// ─────────────────────────────────────────────────────────
// Query params / response bodies
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ActivityParams {
    pub kind: Option<String>,
    pub since: Option<i64>,
    pub wallet: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ActivityParams {
    fn to_filter(&self) -> AppResult<ActivityFilter> {
        let kind = parse_kind(self.kind.as_deref())?;
        let wallet = self
            .wallet
            .as_deref()
            .map(normalize_address)
            .transpose()?
            .map(|(lower, _)| lower);
        Ok(ActivityFilter {
            kind,
            since: self.since,
            wallet,
            offset: self.offset.unwrap_or(0),
            limit: Some(
                self.limit
                    .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
                    .min(MAX_ACTIVITY_LIMIT),
            ),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupParams {
    /// Seconds; a gap longer than this starts a new group.
    pub window: Option<i64>,
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PositionParams {
    pub sort: Option<String>,
}

fn parse_kind(raw: Option<&str>) -> AppResult<Option<ActivityKind>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ActivityKind::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("unknown activity kind: {}", s))),
    }
}

fn parse_sort(raw: Option<&str>) -> AppResult<PositionSort> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(PositionSort::default()),
        Some(s) => PositionSort::parse(s)
            .ok_or_else(|| AppError::validation(format!("unknown sort key: {}", s))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    #[serde(flatten)]
    pub page: ActivityPage,
    pub failed_addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedResponse {
    pub groups: Vec<ActivityGroup>,
    pub failed_addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub positions: Vec<AggregatedPosition>,
    pub failed_addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: Summary,
    pub failed_addresses: Vec<String>,
}

// ─────────────────────────────────────────────────────────
// Room-scoped views (shared by private and public routes)
// ─────────────────────────────────────────────────────────

async fn activity_view(
    state: &AppState,
    room: &Room,
    params: &ActivityParams,
) -> AppResult<ActivityResponse> {
    let filter = params.to_filter()?;
    let fetched = state.tracker.room_activity(&room.address_labels()).await;
    Ok(ActivityResponse {
        page: filter_activities(fetched.items, &filter),
        failed_addresses: fetched.failed_addresses,
    })
}

async fn grouped_view(
    state: &AppState,
    room: &Room,
    params: &GroupParams,
) -> AppResult<GroupedResponse> {
    if params.window.is_some_and(|w| w <= 0) {
        return Err(AppError::validation("window must be a positive number of seconds"));
    }
    let kind = parse_kind(params.kind.as_deref())?;
    let fetched = state.tracker.room_activity(&room.address_labels()).await;
    let items: Vec<_> = fetched
        .items
        .into_iter()
        .filter(|a| kind.map_or(true, |k| a.kind == k))
        .collect();
    Ok(GroupedResponse {
        groups: group_activities(&items, params.window),
        failed_addresses: fetched.failed_addresses,
    })
}

async fn positions_view(
    state: &AppState,
    room: &Room,
    params: &PositionParams,
) -> AppResult<PositionsResponse> {
    let sort = parse_sort(params.sort.as_deref())?;
    let fetched = state.tracker.room_positions(&room.address_labels()).await;
    Ok(PositionsResponse {
        positions: aggregate_positions(&fetched.items, sort),
        failed_addresses: fetched.failed_addresses,
    })
}

async fn summary_view(state: &AppState, room: &Room) -> SummaryResponse {
    let labels = room.address_labels();
    let (activity, positions) = tokio::join!(
        state.tracker.room_activity(&labels),
        state.tracker.room_positions(&labels),
    );
    let failed: BTreeSet<String> = activity
        .failed_addresses
        .into_iter()
        .chain(positions.failed_addresses)
        .collect();
    SummaryResponse {
        summary: summarize(&labels, &activity.items, &positions.items),
        failed_addresses: failed.into_iter().collect(),
    }
}

// ─────────────────────────────────────────────────────────
// Handlers: health + rooms
// ─────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_rooms(State(state): State<AppState>, Caller(user): Caller) -> Json<Vec<Room>> {
    Json(state.store.list_rooms(&user).await)
}

async fn create_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiJson(body): ApiJson<NewRoom>,
) -> AppResult<impl IntoResponse> {
    let room = state.store.create_room(&user, body).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn get_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Room>> {
    Ok(Json(state.store.get_room(&user, id).await?))
}

async fn update_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RoomPatch>,
) -> AppResult<Json<Room>> {
    Ok(Json(state.store.update_room(&user, id, body).await?))
}

async fn delete_room(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.store.delete_room(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rotate_share(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Room>> {
    Ok(Json(state.store.rotate_share_slug(&user, id).await?))
}

async fn add_address(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewAddress>,
) -> AppResult<impl IntoResponse> {
    let tracked = state.store.add_address(&user, id, body).await?;
    Ok((StatusCode::CREATED, Json(tracked)))
}

async fn relabel_address(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath((id, address)): ApiPath<(Uuid, String)>,
    ApiJson(body): ApiJson<LabelPatch>,
) -> AppResult<impl IntoResponse> {
    let tracked = state
        .store
        .update_address_label(&user, id, &address, body.label)
        .await?;
    Ok(Json(tracked))
}

async fn remove_address(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath((id, address)): ApiPath<(Uuid, String)>,
) -> AppResult<StatusCode> {
    state.store.remove_address(&user, id, &address).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn room_activity(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> AppResult<Json<ActivityResponse>> {
    let room = state.store.get_room(&user, id).await?;
    Ok(Json(activity_view(&state, &room, &params).await?))
}

async fn room_grouped(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<GroupParams>,
) -> AppResult<Json<GroupedResponse>> {
    let room = state.store.get_room(&user, id).await?;
    Ok(Json(grouped_view(&state, &room, &params).await?))
}

async fn room_positions(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PositionParams>,
) -> AppResult<Json<PositionsResponse>> {
    let room = state.store.get_room(&user, id).await?;
    Ok(Json(positions_view(&state, &room, &params).await?))
}

async fn room_summary(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<SummaryResponse>> {
    let room = state.store.get_room(&user, id).await?;
    Ok(Json(summary_view(&state, &room).await))
}

// ─────────────────────────────────────────────────────────
// Handlers: public rooms
// ─────────────────────────────────────────────────────────

async fn list_public_rooms(State(state): State<AppState>) -> Json<Vec<PublicRoom>> {
    Json(state.store.list_public_rooms().await)
}

async fn public_room(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> AppResult<Json<PublicRoom>> {
    let room = state.store.room_by_slug(&slug).await?;
    Ok(Json(PublicRoom::from(&room)))
}

async fn public_activity(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> AppResult<Json<ActivityResponse>> {
    let room = state.store.room_by_slug(&slug).await?;
    Ok(Json(activity_view(&state, &room, &params).await?))
}

async fn public_grouped(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<GroupParams>,
) -> AppResult<Json<GroupedResponse>> {
    let room = state.store.room_by_slug(&slug).await?;
    Ok(Json(grouped_view(&state, &room, &params).await?))
}

async fn public_positions(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<PositionParams>,
) -> AppResult<Json<PositionsResponse>> {
    let room = state.store.room_by_slug(&slug).await?;
    Ok(Json(positions_view(&state, &room, &params).await?))
}

async fn public_summary(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> AppResult<Json<SummaryResponse>> {
    let room = state.store.room_by_slug(&slug).await?;
    Ok(Json(summary_view(&state, &room).await))
}

// ─────────────────────────────────────────────────────────
// Handlers: single address lookups
// ─────────────────────────────────────────────────────────

async fn address_activity(
    State(state): State<AppState>,
    ApiPath(address): ApiPath<String>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> AppResult<Json<ActivityPage>> {
    let (lower, _) = normalize_address(&address)?;
    let filter = params.to_filter()?;
    let items = state
        .tracker
        .address_activity(&lower)
        .await
        .map_err(AppError::Upstream)?;
    let merged = merge_activities([(*items).clone()]);
    Ok(Json(filter_activities(merged, &filter)))
}

async fn address_positions(
    State(state): State<AppState>,
    ApiPath(address): ApiPath<String>,
    ApiQuery(params): ApiQuery<PositionParams>,
) -> AppResult<Json<Vec<AggregatedPosition>>> {
    let (lower, _) = normalize_address(&address)?;
    let sort = parse_sort(params.sort.as_deref())?;
    let positions = state
        .tracker
        .address_positions(&lower)
        .await
        .map_err(AppError::Upstream)?;
    Ok(Json(aggregate_positions(&positions, sort)))
}

async fn refresh_address(
    State(state): State<AppState>,
    ApiPath(address): ApiPath<String>,
) -> AppResult<StatusCode> {
    let (lower, _) = normalize_address(&address)?;
    state.tracker.refresh(&lower).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────
// Handlers: feed
// ─────────────────────────────────────────────────────────

async fn feed(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> Json<Vec<crate::rooms::PostView>> {
    Json(state.store.feed(&query).await)
}

async fn create_post(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiJson(body): ApiJson<NewPost>,
) -> AppResult<impl IntoResponse> {
    let post = state.store.create_post(&user, body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn delete_post(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.store.delete_post(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<crate::rooms::Comment>>> {
    Ok(Json(state.store.comments(id).await?))
}

async fn add_comment(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewComment>,
) -> AppResult<impl IntoResponse> {
    let comment = state.store.add_comment(&user, id, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiPath((id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.store.delete_comment(&user, id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
