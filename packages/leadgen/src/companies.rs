//! Company rows and their storage seam.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Columns the persistence layer knows; everything else is dropped
/// before an upsert.
pub const COMPANY_COLUMNS: &[&str] = &[
    "company_name",
    "city",
    "website",
    "phone",
    "email",
    "address",
    "postal_code",
    "description",
    "industry",
    "lead_source",
];

/// A persisted company row, keyed by (company_name, city).
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub company_name: String,
    pub city: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub lead_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Build a fresh row from a validated field map.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_name: get("company_name").unwrap_or_default(),
            city: get("city"),
            website: get("website"),
            phone: get("phone"),
            email: get("email"),
            address: get("address"),
            postal_code: get("postal_code"),
            description: get("description"),
            industry: get("industry"),
            lead_source: get("lead_source"),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage seam for company rows.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn find_by_name_city(&self, name: &str, city: Option<&str>) -> Result<Option<Company>>;

    /// Insert a new row built from a validated field map.
    async fn insert(&self, fields: &HashMap<String, String>) -> Result<Company>;

    /// Overwrite the given columns of an existing row.
    async fn update_fields(&self, id: Uuid, fields: &HashMap<String, String>) -> Result<()>;
}

/// Postgres-backed company store.
pub struct PgCompanyStore {
    pool: PgPool,
}

impl PgCompanyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyStore for PgCompanyStore {
    async fn find_by_name_city(&self, name: &str, city: Option<&str>) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            SELECT id, company_name, city, website, phone, email, address, postal_code,
                   description, industry, lead_source, created_at, updated_at
            FROM companies
            WHERE company_name = $1 AND city IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(name)
        .bind(city)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up company by name and city")?;

        Ok(company)
    }

    async fn insert(&self, fields: &HashMap<String, String>) -> Result<Company> {
        let company = Company::from_fields(fields);

        sqlx::query(
            r#"
            INSERT INTO companies (
                id, company_name, city, website, phone, email, address, postal_code,
                description, industry, lead_source, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(company.id)
        .bind(&company.company_name)
        .bind(&company.city)
        .bind(&company.website)
        .bind(&company.phone)
        .bind(&company.email)
        .bind(&company.address)
        .bind(&company.postal_code)
        .bind(&company.description)
        .bind(&company.industry)
        .bind(&company.lead_source)
        .bind(company.created_at)
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert company")?;

        Ok(company)
    }

    async fn update_fields(&self, id: Uuid, fields: &HashMap<String, String>) -> Result<()> {
        // Only known columns; the SET list is built from the allow-list,
        // never from caller-supplied names.
        let updates: Vec<(&str, &String)> = COMPANY_COLUMNS
            .iter()
            .filter_map(|column| fields.get(*column).map(|value| (*column, value)))
            .collect();

        if updates.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = updates
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ${}", column, i + 2))
            .collect();

        let sql = format!(
            "UPDATE companies SET {}, updated_at = NOW() WHERE id = $1",
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(id);
        for (_, value) in updates {
            query = query.bind(value);
        }

        query
            .execute(&self.pool)
            .await
            .context("Failed to update company fields")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fields_maps_known_columns() {
        let mut fields = HashMap::new();
        fields.insert("company_name".to_string(), "Acme GmbH".to_string());
        fields.insert("city".to_string(), "Berlin".to_string());
        fields.insert("email".to_string(), "info@acme.example".to_string());
        fields.insert("bogus_column".to_string(), "ignored".to_string());

        let company = Company::from_fields(&fields);
        assert_eq!(company.company_name, "Acme GmbH");
        assert_eq!(company.city.as_deref(), Some("Berlin"));
        assert_eq!(company.email.as_deref(), Some("info@acme.example"));
        assert!(company.website.is_none());
    }
}
