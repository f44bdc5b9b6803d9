use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::models::user::PublicUser;
use crate::utils::error::AppError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Fields the list endpoint may be ordered by.
const ORDERABLE_FIELDS: &[&str] = &["date", "created_at", "title"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List/write responses carry the creator as a bare id plus their username.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub created_by: i64,
    pub created_by_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The detail view expands the creator into a nested user object.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub created_by: PublicUser,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full write payload (create and PUT). `created_by`, `created_at` and `id`
/// are not part of the payload, so any values supplied for them are ignored.
#[derive(Debug, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
}

impl EventInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::ValidationError("title may not be blank".into()));
        }
        if self.location.trim().is_empty() {
            return Err(AppError::ValidationError("location may not be blank".into()));
        }
        Ok(())
    }

    pub fn into_changes(self) -> EventChanges {
        EventChanges {
            title: Some(self.title),
            description: Some(self.description),
            date: Some(self.date),
            location: Some(self.location),
        }
    }
}

/// Partial write payload (PATCH); only the supplied fields are applied.
#[derive(Debug, Default, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

impl EventChanges {
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(AppError::ValidationError("title may not be blank".into()));
        }
        if matches!(&self.location, Some(l) if l.trim().is_empty()) {
            return Err(AppError::ValidationError("location may not be blank".into()));
        }
        Ok(())
    }
}

/// Query parameters accepted by the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct EventFilters {
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub created_by: Option<i64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl EventFilters {
    fn page(&self) -> i64 {
        i64::from(self.page.unwrap_or(1).max(1))
    }

    fn page_size(&self) -> i64 {
        i64::from(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE))
    }
}

/// Resolves the `ordering` parameter against the whitelist, a leading `-`
/// meaning descending. The default is most recent events first.
pub fn parse_ordering(raw: Option<&str>) -> Result<(&'static str, bool), AppError> {
    let raw = match raw {
        None | Some("") => return Ok(("date", true)),
        Some(raw) => raw,
    };

    let (field, descending) = match raw.strip_prefix('-') {
        Some(field) => (field, true),
        None => (raw, false),
    };

    ORDERABLE_FIELDS
        .iter()
        .find(|candidate| **candidate == field)
        .map(|candidate| (*candidate, descending))
        .ok_or_else(|| {
            AppError::ValidationError(format!("cannot order by field '{}'", field))
        })
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &EventFilters) {
    builder.push(" WHERE TRUE");

    if let Some(min_date) = filters.min_date {
        builder.push(" AND e.date >= ").push_bind(min_date);
    }
    if let Some(max_date) = filters.max_date {
        builder.push(" AND e.date <= ").push_bind(max_date);
    }
    if let Some(location) = &filters.location {
        builder
            .push(" AND e.location ILIKE ")
            .push_bind(format!("%{}%", escape_like(location)));
    }
    if let Some(created_by) = filters.created_by {
        builder.push(" AND e.created_by = ").push_bind(created_by);
    }
    if let Some(term) = &filters.search {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (e.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.location ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

const SUMMARY_COLUMNS: &str = "e.id, e.title, e.description, e.date, e.location, \
     e.created_by, u.username AS created_by_username, e.created_at, e.updated_at";

impl Event {
    /// Filtered, ordered, paginated listing together with the total count of
    /// matching rows.
    pub async fn list(
        pool: &PgPool,
        filters: &EventFilters,
    ) -> Result<(i64, Vec<EventSummary>), AppError> {
        let (order_field, descending) = parse_ordering(filters.ordering.as_deref())?;

        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        push_filters(&mut count_query, filters);
        let count: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM events e JOIN users u ON u.id = e.created_by",
            SUMMARY_COLUMNS
        ));
        push_filters(&mut query, filters);

        // order_field comes from the whitelist, never from raw input
        query
            .push(" ORDER BY e.")
            .push(order_field)
            .push(if descending { " DESC" } else { " ASC" });

        let page_size = filters.page_size();
        let offset = (filters.page() - 1) * page_size;
        query
            .push(" LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(offset);

        let results = query
            .build_query_as::<EventSummary>()
            .fetch_all(pool)
            .await?;

        Ok((count, results))
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn summary(pool: &PgPool, id: i64) -> Result<Option<EventSummary>, sqlx::Error> {
        sqlx::query_as::<_, EventSummary>(&format!(
            "SELECT {} FROM events e JOIN users u ON u.id = e.created_by WHERE e.id = $1",
            SUMMARY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn detail(pool: &PgPool, id: i64) -> Result<Option<EventDetail>, sqlx::Error> {
        let Some(event) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        let creator = sqlx::query_as::<_, PublicUser>(
            "SELECT id, username, email, first_name, last_name FROM users WHERE id = $1",
        )
        .bind(event.created_by)
        .fetch_one(pool)
        .await?;

        Ok(Some(EventDetail {
            id: event.id,
            title: event.title,
            description: event.description,
            date: event.date,
            location: event.location,
            created_by: creator,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }))
    }

    pub async fn insert(
        pool: &PgPool,
        input: &EventInput,
        created_by: i64,
    ) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, description, date, location, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.date)
        .bind(&input.location)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    /// Applies only the supplied fields and refreshes `updated_at`. The id,
    /// creator and creation timestamp are never touched.
    pub async fn apply_changes(
        pool: &PgPool,
        id: i64,
        changes: &EventChanges,
    ) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                date = COALESCE($4, date),
                location = COALESCE($5, location),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.date)
        .bind(&changes.location)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ordering_is_most_recent_first() {
        assert_eq!(parse_ordering(None).unwrap(), ("date", true));
        assert_eq!(parse_ordering(Some("")).unwrap(), ("date", true));
    }

    #[test]
    fn test_ordering_whitelist() {
        assert_eq!(parse_ordering(Some("date")).unwrap(), ("date", false));
        assert_eq!(parse_ordering(Some("-date")).unwrap(), ("date", true));
        assert_eq!(parse_ordering(Some("title")).unwrap(), ("title", false));
        assert_eq!(
            parse_ordering(Some("-created_at")).unwrap(),
            ("created_at", true)
        );
    }

    #[test]
    fn test_ordering_rejects_unknown_fields() {
        for raw in ["id", "-location", "date; DROP TABLE events"] {
            assert!(matches!(
                parse_ordering(Some(raw)),
                Err(AppError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Downtown"), "Downtown");
    }

    #[test]
    fn test_push_filters_date_bounds_are_inclusive() {
        let filters = EventFilters {
            min_date: Some(Utc::now()),
            max_date: Some(Utc::now()),
            ..Default::default()
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        push_filters(&mut builder, &filters);
        let sql = builder.sql();
        assert!(sql.contains("e.date >= "));
        assert!(sql.contains("e.date <= "));
    }

    #[test]
    fn test_push_filters_location_is_case_insensitive_substring() {
        let filters = EventFilters {
            location: Some("Downtown".into()),
            ..Default::default()
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        push_filters(&mut builder, &filters);
        assert!(builder.sql().contains("e.location ILIKE "));
    }

    #[test]
    fn test_push_filters_search_spans_three_fields() {
        let filters = EventFilters {
            search: Some("meetup".into()),
            ..Default::default()
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        push_filters(&mut builder, &filters);
        let sql = builder.sql();
        assert!(sql.contains("e.title ILIKE "));
        assert!(sql.contains("e.description ILIKE "));
        assert!(sql.contains("e.location ILIKE "));
    }

    #[test]
    fn test_push_filters_without_filters_restricts_nothing() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        push_filters(&mut builder, &EventFilters::default());
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM events e WHERE TRUE");
    }

    #[test]
    fn test_page_size_is_clamped() {
        let filters = EventFilters {
            page_size: Some(100_000),
            ..Default::default()
        };
        assert_eq!(filters.page_size(), i64::from(MAX_PAGE_SIZE));

        let filters = EventFilters {
            page_size: Some(0),
            ..Default::default()
        };
        assert_eq!(filters.page_size(), 1);

        assert_eq!(EventFilters::default().page_size(), i64::from(DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_blank_title_rejected() {
        let input = EventInput {
            title: "   ".into(),
            description: "desc".into(),
            date: Utc::now(),
            location: "Somewhere".into(),
        };
        assert!(matches!(
            input.validate(),
            Err(AppError::ValidationError(_))
        ));

        let changes = EventChanges {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            changes.validate(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_payloads_ignore_protected_fields() {
        // created_by / id / created_at in the body are simply not part of
        // the payload types and deserialize away silently
        let changes: EventChanges = serde_json::from_str(
            r#"{"title": "New title", "created_by": 99, "id": 5, "created_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(changes.title.as_deref(), Some("New title"));
        assert!(changes.description.is_none());
    }
}
