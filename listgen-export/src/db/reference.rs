//! Reference store over SQLite
//!
//! Tables: `vendors`, `vendors_rds`, `vendor_chain_mappings`, `brands`,
//! `sub_classes`. Maintained by the portal's admin screens; read-only here.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::ReferenceError;
use crate::models::HierarchyRow;
use crate::services::reference_resolver::ReferenceStore;

#[derive(Clone)]
pub struct SqliteReferenceStore {
    pool: SqlitePool,
}

impl SqliteReferenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Create the reference tables if they don't exist (fresh installs and tests)
pub async fn init_reference_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS vendors (
            vendor_code TEXT PRIMARY KEY,
            vendor_name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS vendors_rds (
            vendor_code TEXT PRIMARY KEY,
            mfg_part_no TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS vendor_chain_mappings (
            chain_name TEXT NOT NULL,
            company_selection TEXT NOT NULL,
            vendor_code TEXT NOT NULL,
            PRIMARY KEY (chain_name, company_selection)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS brands (
            brand_name TEXT PRIMARY KEY,
            product_group TEXT NOT NULL,
            dept_code TEXT,
            sub_dept_code TEXT,
            class_code TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sub_classes (
            product_group TEXT NOT NULL,
            subclass_code TEXT NOT NULL,
            subclass_name TEXT,
            PRIMARY KEY (product_group, subclass_code)
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[async_trait]
impl ReferenceStore for SqliteReferenceStore {
    async fn chain_vendor_code(
        &self,
        chain: &str,
        company: &str,
    ) -> Result<Option<String>, ReferenceError> {
        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT CAST(vendor_code AS TEXT)
            FROM vendor_chain_mappings
            WHERE UPPER(chain_name) = UPPER(?) AND UPPER(company_selection) = UPPER(?)
            LIMIT 1
            "#,
        )
        .bind(chain)
        .bind(company)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    async fn vendor_code_by_name(&self, vendor_name: &str) -> Result<Option<String>, ReferenceError> {
        let code: Option<String> = sqlx::query_scalar(
            "SELECT CAST(vendor_code AS TEXT) FROM vendors WHERE UPPER(vendor_name) = UPPER(?) LIMIT 1",
        )
        .bind(vendor_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    async fn mfg_part_no(&self, vendor_code: &str) -> Result<Option<String>, ReferenceError> {
        let part: Option<Option<String>> = sqlx::query_scalar(
            "SELECT CAST(mfg_part_no AS TEXT) FROM vendors_rds WHERE vendor_code = ? LIMIT 1",
        )
        .bind(vendor_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(part.flatten())
    }

    async fn hierarchy_rows(&self, brands: &[String]) -> Result<Vec<HierarchyRow>, ReferenceError> {
        let keys: Vec<String> = brands
            .iter()
            .map(|b| b.trim().to_uppercase())
            .filter(|b| !b.is_empty())
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT b.brand_name, b.product_group,
                   CAST(b.dept_code AS TEXT) AS dept_code,
                   CAST(b.sub_dept_code AS TEXT) AS sub_dept_code,
                   CAST(b.class_code AS TEXT) AS class_code,
                   CAST(s.subclass_code AS TEXT) AS subclass_code,
                   s.subclass_name
            FROM brands b
            LEFT JOIN sub_classes s ON b.product_group = s.product_group
            WHERE UPPER(b.product_group) IN (
            "#,
        );
        let mut separated = qb.separated(", ");
        for key in &keys {
            separated.push_bind(key.clone());
        }
        qb.push(") OR UPPER(b.brand_name) IN (");
        let mut separated = qb.separated(", ");
        for key in &keys {
            separated.push_bind(key.clone());
        }
        qb.push(")");

        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(HierarchyRow {
                    brand_name: row.try_get("brand_name")?,
                    product_group: row.try_get("product_group")?,
                    dept_code: row.try_get("dept_code")?,
                    sub_dept_code: row.try_get("sub_dept_code")?,
                    class_code: row.try_get("class_code")?,
                    subclass_code: row.try_get("subclass_code")?,
                    subclass_name: row.try_get("subclass_name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(ReferenceError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteReferenceStore {
        let pool = listgen_common::db::open_in_memory().await.unwrap();
        init_reference_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO vendors VALUES ('123456', 'NEWTRENDS INTERNATIONAL CORP.')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO vendors_rds VALUES ('654321', 'MFG-77')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO vendor_chain_mappings VALUES ('RDS', 'ATC', '654321')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO brands VALUES ('Casio', 'CAS', '054', '012', '101')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO sub_classes VALUES ('CAS', '002', 'Digital')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO sub_classes VALUES ('CAS', '001', 'Analog')")
            .execute(&pool)
            .await
            .unwrap();

        SqliteReferenceStore::new(pool)
    }

    #[tokio::test]
    async fn test_chain_vendor_code() {
        let store = setup_store().await;
        assert_eq!(
            store.chain_vendor_code("rds", "atc").await.unwrap().as_deref(),
            Some("654321")
        );
        assert!(store.chain_vendor_code("SM", "ATC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vendor_by_name_and_mfg_part() {
        let store = setup_store().await;
        assert_eq!(
            store
                .vendor_code_by_name("Newtrends International Corp.")
                .await
                .unwrap()
                .as_deref(),
            Some("123456")
        );
        assert_eq!(store.mfg_part_no("654321").await.unwrap().as_deref(), Some("MFG-77"));
        assert!(store.mfg_part_no("000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hierarchy_rows_match_group_or_name() {
        let store = setup_store().await;

        let by_group = store.hierarchy_rows(&["cas".to_string()]).await.unwrap();
        assert_eq!(by_group.len(), 2);

        let by_name = store.hierarchy_rows(&["CASIO".to_string()]).await.unwrap();
        assert_eq!(by_name.len(), 2);
        assert_eq!(by_name[0].dept_code.as_deref(), Some("054"));

        assert!(store.hierarchy_rows(&[]).await.unwrap().is_empty());
    }
}
