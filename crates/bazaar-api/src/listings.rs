use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{debug, warn};

use bazaar_db::models::ListingRow;
use bazaar_db::parse_timestamp;
use bazaar_types::api::{Claims, ListingKind, ListingResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::fanout::{self, NotificationDraft};
use crate::store::blocking;

/// Fetch a listing for an authenticated viewer and tell the owner about the
/// view. Owners looking at their own listing generate nothing. A failed
/// notification leaves the view intact and sets `warning`.
pub async fn view(
    state: &AppState,
    listing_id: i64,
    kind: ListingKind,
    viewer_id: i64,
) -> Result<ListingResponse, ApiError> {
    let mut listing = blocking(state, move |db| db.get_listing(listing_id))
        .await?
        .and_then(listing_from_row)
        .filter(|listing| listing.kind == kind)
        .ok_or_else(|| match kind {
            ListingKind::Ad => ApiError::not_found("Ad not found"),
            ListingKind::Service => ApiError::not_found("Service not found"),
        })?;

    debug!("User {} viewing {} {}", viewer_id, kind.as_str(), listing_id);

    if let Some(draft) =
        NotificationDraft::listing_viewed(listing.owner_id, viewer_id, listing.id, kind, &listing.title)
    {
        listing.warning = fanout::emit_best_effort(state, draft).await;
    }

    Ok(listing)
}

fn listing_from_row(row: ListingRow) -> Option<ListingResponse> {
    let Some(kind) = ListingKind::parse(&row.kind) else {
        warn!("Listing {} has unknown kind '{}'", row.id, row.kind);
        return None;
    };
    let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on listing {}", row.created_at, row.id);
        chrono::DateTime::default()
    });

    Some(ListingResponse {
        id: row.id,
        owner_id: row.owner_id,
        owner_username: row.owner_username,
        kind,
        title: row.title,
        description: row.description,
        price: row.price,
        created_at,
        warning: None,
    })
}

// -- Handlers --

pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = view(&state, listing_id, ListingKind::Ad, claims.sub).await?;
    Ok(Json(listing))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(service_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = view(&state, service_id, ListingKind::Service, claims.sub).await?;
    Ok(Json(service))
}
