use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::pagination::{ListQuery, Paginated};
use uuid::Uuid;

use super::like_pattern;

/// Reference data a deal form picks from by name.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "reference_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReferenceKind {
    Party,
    Broker,
    Committee,
}

impl ReferenceKind {
    /// Plural path segment used by the REST routes.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Party => "parties",
            Self::Broker => "brokers",
            Self::Committee => "committees",
        }
    }

    pub fn from_collection(segment: &str) -> Option<Self> {
        match segment {
            "parties" => Some(Self::Party),
            "brokers" => Some(Self::Broker),
            "committees" => Some(Self::Committee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    pub id: Uuid,
    pub mill_id: String,
    pub kind: ReferenceKind,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReferenceEntry {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

impl ReferenceEntry {
    pub async fn create(
        pool: &SqlitePool,
        mill_id: &str,
        kind: ReferenceKind,
        data: &CreateReferenceEntry,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let name = data.name.trim();
        let now = Utc::now();
        sqlx::query_as!(
            ReferenceEntry,
            r#"INSERT INTO reference_entries (id, mill_id, kind, name, created_at)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING
                   id         as "id!: Uuid",
                   mill_id    as "mill_id!",
                   kind       as "kind!: ReferenceKind",
                   name       as "name!",
                   created_at as "created_at!: DateTime<Utc>""#,
            id,
            mill_id,
            kind,
            name,
            now
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        mill_id: &str,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            ReferenceEntry,
            r#"SELECT
                   id         as "id!: Uuid",
                   mill_id,
                   kind       as "kind!: ReferenceKind",
                   name,
                   created_at as "created_at!: DateTime<Utc>"
               FROM reference_entries
               WHERE mill_id = $1 AND id = $2"#,
            mill_id,
            id
        )
        .fetch_optional(pool)
        .await
    }

    /// One page of entries of `kind` for a mill, filtered by a substring search on the name.
    pub async fn list(
        pool: &SqlitePool,
        mill_id: &str,
        kind: ReferenceKind,
        query: &ListQuery,
    ) -> Result<Paginated<Self>, sqlx::Error> {
        let pattern = query.search_term().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*)
               FROM reference_entries
               WHERE mill_id = $1
                 AND kind = $2
                 AND ($3 IS NULL OR name LIKE $3 ESCAPE '\')"#,
        )
        .bind(mill_id)
        .bind(kind)
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

        // Only whitelisted column names reach the ORDER BY clause.
        let sort_column = match query.sort_by.as_deref() {
            Some("createdAt" | "created_at") => "created_at",
            _ => "name COLLATE NOCASE",
        };
        let sql = format!(
            r#"SELECT id, mill_id, kind, name, created_at
               FROM reference_entries
               WHERE mill_id = $1
                 AND kind = $2
                 AND ($3 IS NULL OR name LIKE $3 ESCAPE '\')
               ORDER BY {sort_column} {direction}, rowid ASC
               LIMIT $4 OFFSET $5"#,
            direction = query.sort_order().as_sql(),
        );

        let rows = sqlx::query_as::<_, ReferenceEntry>(&sql)
            .bind(mill_id)
            .bind(kind)
            .bind(pattern.as_deref())
            .bind(i64::from(query.limit()))
            .bind(query.offset() as i64)
            .fetch_all(pool)
            .await?;

        Ok(Paginated::new(rows, query, total.max(0) as u64))
    }

    pub async fn delete(
        pool: &SqlitePool,
        mill_id: &str,
        kind: ReferenceKind,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query!(
            "DELETE FROM reference_entries WHERE mill_id = $1 AND kind = $2 AND id = $3",
            mill_id,
            kind,
            id
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn bulk_delete(
        pool: &SqlitePool,
        mill_id: &str,
        kind: ReferenceKind,
        ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM reference_entries WHERE mill_id = ");
        builder
            .push_bind(mill_id.to_string())
            .push(" AND kind = ")
            .push_bind(kind)
            .push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;
    use utils::pagination::SortOrder;

    async fn seed(pool: &SqlitePool, mill_id: &str, kind: ReferenceKind, names: &[&str]) {
        for name in names {
            ReferenceEntry::create(
                pool,
                mill_id,
                kind,
                &CreateReferenceEntry {
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
        }
    }

    #[test]
    fn collection_segments_map_to_kinds() {
        for kind in [ReferenceKind::Party, ReferenceKind::Broker, ReferenceKind::Committee] {
            assert_eq!(ReferenceKind::from_collection(kind.collection()), Some(kind));
        }
        assert_eq!(ReferenceKind::from_collection("gunnies"), None);
    }

    #[tokio::test]
    async fn list_pages_through_entries_in_name_order() {
        let db = DBService::new_in_memory().await.unwrap();
        seed(
            &db.pool,
            "mill-1",
            ReferenceKind::Party,
            &["Cedar Agro", "acme Traders", "Bharat Rice", "Durga Mills", "Eagle Co"],
        )
        .await;

        let first = ReferenceEntry::list(
            &db.pool,
            "mill-1",
            ReferenceKind::Party,
            &ListQuery {
                page: Some(1),
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let names: Vec<_> = first.data.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["acme Traders", "Bharat Rice"]);
        assert_eq!(first.pagination.total, 5);
        assert_eq!(first.pagination.total_pages, 3);
        assert!(first.pagination.has_more());

        let last = ReferenceEntry::list(
            &db.pool,
            "mill-1",
            ReferenceKind::Party,
            &ListQuery {
                page: Some(3),
                limit: Some(2),
                sort_order: Some(SortOrder::Asc),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(last.data.len(), 1);
        assert_eq!(last.data[0].name, "Eagle Co");
        assert!(!last.pagination.has_more());
    }

    #[tokio::test]
    async fn list_is_scoped_by_mill_and_kind_and_filtered_by_search() {
        let db = DBService::new_in_memory().await.unwrap();
        seed(&db.pool, "mill-1", ReferenceKind::Party, &["Acme Traders", "Bharat Rice"]).await;
        seed(&db.pool, "mill-1", ReferenceKind::Broker, &["Acme Brokers"]).await;
        seed(&db.pool, "mill-2", ReferenceKind::Party, &["Acme Overseas"]).await;

        let page = ReferenceEntry::list(
            &db.pool,
            "mill-1",
            ReferenceKind::Party,
            &ListQuery {
                search: Some("acme".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].name, "Acme Traders");
        assert_eq!(page.data[0].mill_id, "mill-1");
    }

    #[tokio::test]
    async fn bulk_delete_only_touches_the_owning_mill() {
        let db = DBService::new_in_memory().await.unwrap();
        seed(&db.pool, "mill-1", ReferenceKind::Committee, &["North", "South"]).await;
        seed(&db.pool, "mill-2", ReferenceKind::Committee, &["East"]).await;

        let all = ReferenceEntry::list(&db.pool, "mill-1", ReferenceKind::Committee, &ListQuery::default())
            .await
            .unwrap();
        let foreign = ReferenceEntry::list(&db.pool, "mill-2", ReferenceKind::Committee, &ListQuery::default())
            .await
            .unwrap();
        let mut ids: Vec<Uuid> = all.data.iter().map(|e| e.id).collect();
        ids.push(foreign.data[0].id);

        let deleted = ReferenceEntry::bulk_delete(&db.pool, "mill-1", ReferenceKind::Committee, &ids)
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let remaining =
            ReferenceEntry::find_by_id(&db.pool, "mill-2", foreign.data[0].id).await.unwrap();
        assert!(remaining.is_some());
        assert_eq!(
            ReferenceEntry::bulk_delete(&db.pool, "mill-1", ReferenceKind::Committee, &[])
                .await
                .unwrap(),
            0
        );
    }
}
