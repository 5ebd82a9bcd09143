//! Catalog source over SQLite reporting mirrors of the ERP databases
//!
//! Mirror tables keep the ERP names (`<prefix>$Sales Price`, `<prefix>$Item`,
//! `<prefix>$Item Attribute Value Mapping`, ...), one pool per source database.
//! A live ERP driver plugs in behind the same `CatalogSource` trait.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::models::{attr, AttributeLayout, AttributeTriple, CompanyProfile, ItemDetail, PricedItem};
use crate::services::catalog_fetcher::CatalogSource;

/// ERP table id of the Item table in attribute mappings
const ITEM_TABLE_ID: i64 = 27;

/// Item-table columns every company has, with their canonical keys
const BASE_COLUMNS: [(&str, &str); 6] = [
    ("Description", attr::DESCRIPTION),
    ("Product Group Code", attr::BRAND),
    ("Vendor Item No_", attr::STYLE),
    ("Base Unit of Measure", attr::UNIT_OF_MEASURE),
    ("Net Weight", attr::NET_WEIGHT),
    ("Gross Weight", attr::GROSS_WEIGHT),
];

/// Extra item-table columns of companies storing attributes as columns
const ATTRIBUTE_COLUMNS: [(&str, &str); 3] = [
    ("Pricepoint", attr::PRICE_POINT),
    ("Dial Color", attr::COLOR),
    ("Case _Frame Size", attr::SIZE),
];

#[derive(Clone, Default)]
pub struct SqliteCatalogSource {
    pools: HashMap<String, SqlitePool>,
}

impl SqliteCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool for a source database name (e.g. "NICREP")
    pub fn with_database(mut self, database: &str, pool: SqlitePool) -> Self {
        self.pools.insert(database.to_uppercase(), pool);
        self
    }

    /// Connect every configured mirror
    ///
    /// A mirror that cannot be opened is skipped with a warning; jobs against
    /// it fail with a connection error instead of the service refusing to start.
    pub async fn connect(urls: &HashMap<String, String>) -> Self {
        let mut source = Self::new();
        for (database, url) in urls {
            match listgen_common::db::open_url(url, 4).await {
                Ok(pool) => {
                    info!(database = %database, "Catalog mirror connected");
                    source = source.with_database(database, pool);
                }
                Err(e) => warn!(database = %database, error = %e, "Catalog mirror unavailable"),
            }
        }
        source
    }

    fn pool(&self, company: &CompanyProfile) -> Result<&SqlitePool, CatalogError> {
        self.pools
            .get(&company.database.to_uppercase())
            .ok_or_else(|| CatalogError::Connection {
                database: company.database.to_string(),
                message: "no catalog database configured".to_string(),
            })
    }
}

fn push_item_list(qb: &mut QueryBuilder<'_, Sqlite>, item_nos: &[String]) {
    let mut separated = qb.separated(", ");
    for item_no in item_nos {
        separated.push_bind(item_no.clone());
    }
    qb.push(")");
}

#[async_trait]
impl CatalogSource for SqliteCatalogSource {
    async fn priced_items(
        &self,
        company: &CompanyProfile,
        sales_code: &str,
        price_memo: &str,
    ) -> Result<Vec<PricedItem>, CatalogError> {
        let pool = self.pool(company)?;
        let sql = format!(
            r#"
            SELECT CAST("Item No_" AS TEXT) AS item_no,
                   COALESCE(CAST("Unit Price" AS REAL), 0.0) AS unit_price
            FROM {}
            WHERE "Sales Code" = ? AND "PC Memo No" = ?
            "#,
            company.table("Sales Price")
        );

        let rows = sqlx::query(&sql)
            .bind(sales_code)
            .bind(price_memo)
            .fetch_all(pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(company.database, e))?;

        rows.iter()
            .map(|row| {
                Ok(PricedItem {
                    item_no: row.try_get::<String, _>("item_no")?.trim().to_string(),
                    unit_price: row.try_get("unit_price")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| CatalogError::from_sqlx(company.database, e))
    }

    async fn count_priced_items(
        &self,
        company: &CompanyProfile,
        sales_code: &str,
        price_memo: &str,
    ) -> Result<u64, CatalogError> {
        let pool = self.pool(company)?;
        let sql = format!(
            r#"SELECT COUNT(DISTINCT "Item No_") FROM {} WHERE "Sales Code" = ? AND "PC Memo No" = ?"#,
            company.table("Sales Price")
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(sales_code)
            .bind(price_memo)
            .fetch_one(pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(company.database, e))?;

        Ok(count.max(0) as u64)
    }

    async fn item_details(
        &self,
        company: &CompanyProfile,
        item_nos: &[String],
    ) -> Result<Vec<ItemDetail>, CatalogError> {
        if item_nos.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool(company)?;

        let mut columns: Vec<(&str, &str)> = BASE_COLUMNS.to_vec();
        if company.attribute_layout == AttributeLayout::Columns {
            columns.extend(ATTRIBUTE_COLUMNS);
        }

        let select_list = columns
            .iter()
            .map(|(column, _)| format!("CAST(\"{}\" AS TEXT)", column))
            .collect::<Vec<_>>()
            .join(", ");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT CAST(\"No_\" AS TEXT), {} FROM {} WHERE \"No_\" IN (",
            select_list,
            company.table("Item")
        ));
        push_item_list(&mut qb, item_nos);

        let rows = qb
            .build()
            .fetch_all(pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(company.database, e))?;

        rows.iter()
            .map(|row| {
                let item_no: String = row.try_get(0)?;
                let mut attributes = BTreeMap::new();
                for (idx, (_, key)) in columns.iter().enumerate() {
                    let value: Option<String> = row.try_get(idx + 1)?;
                    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                        attributes.insert(key.to_string(), value.trim().to_string());
                    }
                }
                Ok(ItemDetail {
                    item_no: item_no.trim().to_string(),
                    attributes,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| CatalogError::from_sqlx(company.database, e))
    }

    async fn item_attributes(
        &self,
        company: &CompanyProfile,
        item_nos: &[String],
    ) -> Result<Vec<AttributeTriple>, CatalogError> {
        if company.attribute_layout != AttributeLayout::Triples || item_nos.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool(company)?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT CAST(a."No_" AS TEXT) AS item_no,
                   CAST(b."Name" AS TEXT) AS name,
                   CAST(c."Value" AS TEXT) AS value
            FROM {mapping} a
            LEFT JOIN {attribute} b ON a."Item Attribute ID" = b."ID"
            LEFT JOIN {value} c ON a."Item Attribute ID" = c."Attribute ID"
                 AND a."Item Attribute Value ID" = c."ID"
            WHERE a."Table ID" = "#,
            mapping = company.table("Item Attribute Value Mapping"),
            attribute = company.table("Item Attribute"),
            value = company.table("Item Attribute Value"),
        ));
        qb.push_bind(ITEM_TABLE_ID);
        qb.push(" AND a.\"No_\" IN (");
        push_item_list(&mut qb, item_nos);

        let rows = qb
            .build()
            .fetch_all(pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(company.database, e))?;

        let mut triples = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: Option<String> = row
                .try_get("name")
                .map_err(|e| CatalogError::from_sqlx(company.database, e))?;
            let Some(name) = name else {
                continue;
            };
            let item_no: String = row
                .try_get("item_no")
                .map_err(|e| CatalogError::from_sqlx(company.database, e))?;
            let value: Option<String> = row
                .try_get("value")
                .map_err(|e| CatalogError::from_sqlx(company.database, e))?;

            triples.push(AttributeTriple {
                item_no: item_no.trim().to_string(),
                name,
                value,
            });
        }
        Ok(triples)
    }
}

/// Create a company's mirror tables (fresh mirrors and tests)
pub async fn create_mirror_tables(
    pool: &SqlitePool,
    company: &CompanyProfile,
) -> Result<(), sqlx::Error> {
    let attribute_columns = match company.attribute_layout {
        AttributeLayout::Columns => {
            r#", "Pricepoint" TEXT, "Dial Color" TEXT, "Case _Frame Size" TEXT"#
        }
        AttributeLayout::Triples => "",
    };

    let mut statements = vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                "Item No_" TEXT NOT NULL,
                "Sales Code" TEXT NOT NULL,
                "PC Memo No" TEXT NOT NULL,
                "Unit Price" REAL
            )"#,
            company.table("Sales Price")
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                "No_" TEXT PRIMARY KEY,
                "Description" TEXT,
                "Product Group Code" TEXT,
                "Vendor Item No_" TEXT,
                "Base Unit of Measure" TEXT,
                "Net Weight" REAL,
                "Gross Weight" REAL{}
            )"#,
            company.table("Item"),
            attribute_columns
        ),
    ];

    if company.attribute_layout == AttributeLayout::Triples {
        statements.push(format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                "Table ID" INTEGER NOT NULL,
                "No_" TEXT NOT NULL,
                "Item Attribute ID" INTEGER NOT NULL,
                "Item Attribute Value ID" INTEGER NOT NULL
            )"#,
            company.table("Item Attribute Value Mapping")
        ));
        statements.push(format!(
            r#"CREATE TABLE IF NOT EXISTS {} ("ID" INTEGER PRIMARY KEY, "Name" TEXT)"#,
            company.table("Item Attribute")
        ));
        statements.push(format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                "Attribute ID" INTEGER NOT NULL,
                "ID" INTEGER NOT NULL,
                "Value" TEXT,
                PRIMARY KEY ("Attribute ID", "ID")
            )"#,
            company.table("Item Attribute Value")
        ));
    }

    for statement in statements {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn source_for(company: &CompanyProfile) -> (SqliteCatalogSource, SqlitePool) {
        let pool = listgen_common::db::open_in_memory().await.unwrap();
        create_mirror_tables(&pool, company).await.unwrap();
        (
            SqliteCatalogSource::new().with_database(company.database, pool.clone()),
            pool,
        )
    }

    #[tokio::test]
    async fn test_unconfigured_database_is_connection_error() {
        let nic = CompanyProfile::lookup("NIC").unwrap();
        let result = SqliteCatalogSource::new().priced_items(&nic, "S1", "M1").await;
        assert!(matches!(result, Err(CatalogError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_priced_items_are_bound_and_scoped() {
        let nic = CompanyProfile::lookup("NIC").unwrap();
        let (source, pool) = source_for(&nic).await;
        let table = nic.table("Sales Price");
        for (item, code, memo, price) in [
            ("W100", "S1", "M1", 10.0),
            ("W100", "S1", "M1", 12.5),
            ("W300", "S1", "M2", 3.0),
        ] {
            sqlx::query(&format!("INSERT INTO {} VALUES (?, ?, ?, ?)", table))
                .bind(item)
                .bind(code)
                .bind(memo)
                .bind(price)
                .execute(&pool)
                .await
                .unwrap();
        }

        let items = source.priced_items(&nic, "S1", "M1").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(source.count_priced_items(&nic, "S1", "M1").await.unwrap(), 1);

        // Quotes in codes are data, not SQL
        let none = source.priced_items(&nic, "S1' OR '1'='1", "M1").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_column_layout_details() {
        let nic = CompanyProfile::lookup("NIC").unwrap();
        let (source, pool) = source_for(&nic).await;
        sqlx::query(&format!(
            r#"INSERT INTO {} ("No_", "Description", "Product Group Code", "Vendor Item No_",
               "Base Unit of Measure", "Net Weight", "Gross Weight", "Pricepoint", "Dial Color", "Case _Frame Size")
               VALUES ('W100', 'Chrono Watch', 'CASIO', 'ST-1', 'PCS', 0.5, 0.75, 'P2', 'Black', '40mm')"#,
            nic.table("Item")
        ))
        .execute(&pool)
        .await
        .unwrap();

        let details = source
            .item_details(&nic, &["W100".to_string(), "MISSING".to_string()])
            .await
            .unwrap();

        assert_eq!(details.len(), 1);
        let attrs = &details[0].attributes;
        assert_eq!(attrs[attr::BRAND], "CASIO");
        assert_eq!(attrs[attr::PRICE_POINT], "P2");
        assert_eq!(attrs[attr::SIZE], "40mm");
        assert_eq!(attrs[attr::NET_WEIGHT], "0.5");
        assert!(source.item_attributes(&nic, &["W100".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_triple_layout_attributes() {
        let atc = CompanyProfile::lookup("ATC").unwrap();
        let (source, pool) = source_for(&atc).await;
        sqlx::query(&format!(
            "INSERT INTO {} VALUES (1, 'Pricepoint'), (2, 'Gender')",
            atc.table("Item Attribute")
        ))
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(&format!(
            "INSERT INTO {} VALUES (1, 10, 'P5'), (2, 20, 'Women')",
            atc.table("Item Attribute Value")
        ))
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(&format!(
            "INSERT INTO {} VALUES (27, 'A1', 1, 10), (27, 'A1', 2, 20), (18, 'A1', 2, 20)",
            atc.table("Item Attribute Value Mapping")
        ))
        .execute(&pool)
        .await
        .unwrap();

        let triples = source.item_attributes(&atc, &["A1".to_string()]).await.unwrap();

        assert_eq!(triples.len(), 2);
        assert!(triples.iter().any(|t| t.name == "Pricepoint" && t.value.as_deref() == Some("P5")));
    }
}
