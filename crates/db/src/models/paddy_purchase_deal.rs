use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::pagination::{ListQuery, Paginated};
use uuid::Uuid;

use super::like_pattern;

/// How the paddy was procured. DO purchases carry a delivery order and committee.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "purchase_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PurchaseType {
    Do,
    #[default]
    Market,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PaddyPurchaseDeal {
    pub id: Uuid,
    pub mill_id: String,
    pub deal_date: NaiveDate,
    pub party_name: String,
    pub broker_name: Option<String>,
    pub purchase_type: PurchaseType,
    pub do_number: Option<String>,
    pub committee_name: Option<String>,
    pub dhan_mota: f64,
    pub dhan_patla: f64,
    pub dhan_sarna: f64,
    pub total: f64, // dhan_mota + dhan_patla + dhan_sarna
    pub rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for create and update, after form derivation has filled `total`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPaddyPurchaseDeal {
    pub deal_date: NaiveDate,
    pub party_name: String,
    pub broker_name: Option<String>,
    #[serde(default)]
    pub purchase_type: PurchaseType,
    pub do_number: Option<String>,
    pub committee_name: Option<String>,
    #[serde(default)]
    pub dhan_mota: f64,
    #[serde(default)]
    pub dhan_patla: f64,
    #[serde(default)]
    pub dhan_sarna: f64,
    #[serde(default)]
    pub total: f64,
    pub rate: Option<f64>,
}

const COLUMNS: &str = "id, mill_id, deal_date, party_name, broker_name, purchase_type, do_number, \
     committee_name, dhan_mota, dhan_patla, dhan_sarna, total, rate, created_at, updated_at";

impl PaddyPurchaseDeal {
    pub async fn create(
        pool: &SqlitePool,
        mill_id: &str,
        data: &UpsertPaddyPurchaseDeal,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let party_name = data.party_name.trim();
        let now = Utc::now();
        sqlx::query_as!(
            PaddyPurchaseDeal,
            r#"INSERT INTO paddy_purchase_deals
                   (id, mill_id, deal_date, party_name, broker_name, purchase_type, do_number,
                    committee_name, dhan_mota, dhan_patla, dhan_sarna, total, rate, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
               RETURNING
                   id             as "id!: Uuid",
                   mill_id        as "mill_id!",
                   deal_date      as "deal_date!: NaiveDate",
                   party_name     as "party_name!",
                   broker_name    as "broker_name?",
                   purchase_type  as "purchase_type!: PurchaseType",
                   do_number      as "do_number?",
                   committee_name as "committee_name?",
                   dhan_mota      as "dhan_mota!: f64",
                   dhan_patla     as "dhan_patla!: f64",
                   dhan_sarna     as "dhan_sarna!: f64",
                   total          as "total!: f64",
                   rate           as "rate?: f64",
                   created_at     as "created_at!: DateTime<Utc>",
                   updated_at     as "updated_at!: DateTime<Utc>""#,
            id,
            mill_id,
            data.deal_date,
            party_name,
            data.broker_name,
            data.purchase_type,
            data.do_number,
            data.committee_name,
            data.dhan_mota,
            data.dhan_patla,
            data.dhan_sarna,
            data.total,
            data.rate,
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
            PaddyPurchaseDeal,
            r#"SELECT
                   id             as "id!: Uuid",
                   mill_id        as "mill_id!",
                   deal_date      as "deal_date!: NaiveDate",
                   party_name     as "party_name!",
                   broker_name    as "broker_name?",
                   purchase_type  as "purchase_type!: PurchaseType",
                   do_number      as "do_number?",
                   committee_name as "committee_name?",
                   dhan_mota      as "dhan_mota!: f64",
                   dhan_patla     as "dhan_patla!: f64",
                   dhan_sarna     as "dhan_sarna!: f64",
                   total          as "total!: f64",
                   rate           as "rate?: f64",
                   created_at     as "created_at!: DateTime<Utc>",
                   updated_at     as "updated_at!: DateTime<Utc>"
               FROM paddy_purchase_deals
               WHERE mill_id = $1 AND id = $2"#,
            mill_id,
            id
        )
        .fetch_optional(pool)
        .await
    }

    /// Deals for a mill, searchable by party name, newest deal date first unless sorted otherwise.
    pub async fn list(
        pool: &SqlitePool,
        mill_id: &str,
        query: &ListQuery,
    ) -> Result<Paginated<Self>, sqlx::Error> {
        let pattern = query.search_term().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*)
               FROM paddy_purchase_deals
               WHERE mill_id = $1
                 AND ($2 IS NULL OR party_name LIKE $2 ESCAPE '\')"#,
        )
        .bind(mill_id)
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

        let (sort_column, direction) = match query.sort_by.as_deref() {
            Some("partyName") => ("party_name COLLATE NOCASE", query.sort_order()),
            Some("total") => ("total", query.sort_order()),
            Some("createdAt") => ("created_at", query.sort_order()),
            Some("dealDate") => ("deal_date", query.sort_order()),
            _ => ("deal_date", query.sort_order.unwrap_or(utils::pagination::SortOrder::Desc)),
        };
        let sql = format!(
            r#"SELECT {COLUMNS}
               FROM paddy_purchase_deals
               WHERE mill_id = $1
                 AND ($2 IS NULL OR party_name LIKE $2 ESCAPE '\')
               ORDER BY {sort_column} {direction}, rowid ASC
               LIMIT $3 OFFSET $4"#,
            direction = direction.as_sql(),
        );

        let rows = sqlx::query_as::<_, PaddyPurchaseDeal>(&sql)
            .bind(mill_id)
            .bind(pattern.as_deref())
            .bind(i64::from(query.limit()))
            .bind(query.offset() as i64)
            .fetch_all(pool)
            .await?;

        Ok(Paginated::new(rows, query, total.max(0) as u64))
    }

    pub async fn update(
        pool: &SqlitePool,
        mill_id: &str,
        id: Uuid,
        data: &UpsertPaddyPurchaseDeal,
    ) -> Result<Option<Self>, sqlx::Error> {
        let party_name = data.party_name.trim();
        let now = Utc::now();
        sqlx::query_as!(
            PaddyPurchaseDeal,
            r#"UPDATE paddy_purchase_deals
               SET deal_date = $3,
                   party_name = $4,
                   broker_name = $5,
                   purchase_type = $6,
                   do_number = $7,
                   committee_name = $8,
                   dhan_mota = $9,
                   dhan_patla = $10,
                   dhan_sarna = $11,
                   total = $12,
                   rate = $13,
                   updated_at = $14
               WHERE mill_id = $1 AND id = $2
               RETURNING
                   id             as "id!: Uuid",
                   mill_id        as "mill_id!",
                   deal_date      as "deal_date!: NaiveDate",
                   party_name     as "party_name!",
                   broker_name    as "broker_name?",
                   purchase_type  as "purchase_type!: PurchaseType",
                   do_number      as "do_number?",
                   committee_name as "committee_name?",
                   dhan_mota      as "dhan_mota!: f64",
                   dhan_patla     as "dhan_patla!: f64",
                   dhan_sarna     as "dhan_sarna!: f64",
                   total          as "total!: f64",
                   rate           as "rate?: f64",
                   created_at     as "created_at!: DateTime<Utc>",
                   updated_at     as "updated_at!: DateTime<Utc>""#,
            mill_id,
            id,
            data.deal_date,
            party_name,
            data.broker_name,
            data.purchase_type,
            data.do_number,
            data.committee_name,
            data.dhan_mota,
            data.dhan_patla,
            data.dhan_sarna,
            data.total,
            data.rate,
            now
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, mill_id: &str, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query!(
            "DELETE FROM paddy_purchase_deals WHERE mill_id = $1 AND id = $2",
            mill_id,
            id
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn bulk_delete(
        pool: &SqlitePool,
        mill_id: &str,
        ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("DELETE FROM paddy_purchase_deals WHERE mill_id = ");
        builder.push_bind(mill_id.to_string()).push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }
}
