use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::{can_modify, AuthUser};
use crate::models::event::{Event, EventChanges, EventFilters, EventInput, EventSummary};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::json::JsonBody;
use crate::utils::response::{created, no_content, success};

#[derive(Serialize)]
pub struct EventPage {
    pub count: i64,
    pub results: Vec<EventSummary>,
}

/// GET /events/ — open to anonymous callers.
pub async fn list_events(
    State(state): State<AppState>,
    Query(filters): Query<EventFilters>,
) -> Result<Response, AppError> {
    let (count, results) = Event::list(&state.pool, &filters).await?;
    Ok(success(EventPage { count, results }, "Events retrieved").into_response())
}

/// GET /events/{id}/ — open to anonymous callers; expands the creator.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let detail = Event::detail(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(success(detail, "Event retrieved").into_response())
}

/// POST /events/ — the creator is always the authenticated caller,
/// whatever the body says.
pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    JsonBody(input): JsonBody<EventInput>,
) -> Result<Response, AppError> {
    input.validate()?;

    let event = Event::insert(&state.pool, &input, caller).await?;
    let summary = load_summary(&state.pool, event.id).await?;

    Ok(created(summary, "Event created").into_response())
}

/// PUT /events/{id}/ — full update, owner only.
pub async fn replace_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    JsonBody(input): JsonBody<EventInput>,
) -> Result<Response, AppError> {
    input.validate()?;
    authorize_write(&state.pool, id, caller).await?;

    let event = Event::apply_changes(&state.pool, id, &input.into_changes()).await?;
    let summary = load_summary(&state.pool, event.id).await?;

    Ok(success(summary, "Event updated").into_response())
}

/// PATCH /events/{id}/ — partial update, owner only.
pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    JsonBody(changes): JsonBody<EventChanges>,
) -> Result<Response, AppError> {
    changes.validate()?;
    authorize_write(&state.pool, id, caller).await?;

    let event = Event::apply_changes(&state.pool, id, &changes).await?;
    let summary = load_summary(&state.pool, event.id).await?;

    Ok(success(summary, "Event updated").into_response())
}

/// DELETE /events/{id}/ — owner only, 204 on success.
pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    authorize_write(&state.pool, id, caller).await?;
    let rows = Event::delete(&state.pool, id).await?;
    ensure_deleted(rows, id)?;

    Ok(no_content().into_response())
}

/// Resolves the target and applies the ownership rule before any write.
async fn authorize_write(pool: &PgPool, id: i64, caller: i64) -> Result<Event, AppError> {
    let event = Event::find(pool, id).await?.ok_or_else(|| not_found(id))?;
    check_ownership(&event, caller)?;
    Ok(event)
}

fn check_ownership(event: &Event, caller: i64) -> Result<(), AppError> {
    if !can_modify(Some(caller), event.created_by) {
        return Err(AppError::Forbidden(
            "You do not have permission to modify this event".into(),
        ));
    }
    Ok(())
}

/// The row can vanish between the ownership check and the delete; zero
/// affected rows means the record was already gone.
fn ensure_deleted(rows: u64, id: i64) -> Result<(), AppError> {
    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

async fn load_summary(pool: &PgPool, id: i64) -> Result<EventSummary, AppError> {
    Event::summary(pool, id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("event disappeared mid-request".into()))
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Event with id '{}' was not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;

    fn event_owned_by(owner: i64) -> Event {
        Event {
            id: 1,
            title: "Test Event".into(),
            description: "Description".into(),
            date: Utc::now(),
            location: "Downtown".into(),
            created_by: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_passes_ownership_check() {
        assert!(check_ownership(&event_owned_by(1), 1).is_ok());
    }

    #[test]
    fn test_other_caller_gets_forbidden() {
        let err = check_ownership(&event_owned_by(1), 2).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_delete_of_vanished_row_is_not_found() {
        let err = ensure_deleted(0, 5).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_delete_of_existing_row_succeeds() {
        assert!(ensure_deleted(1, 5).is_ok());
    }
}
