use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One desk inside an office. Value object owned by the office row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workstation {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
}

/// Office reference data. Never physically deleted so old tickets keep a
/// valid office reference.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Office {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub workstations: Json<Vec<Workstation>>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub struct NewOffice {
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub workstations: Vec<Workstation>,
}

const OFFICE_COLUMNS: &str =
    "id, name, address, city, country, workstations, is_active, created_at, updated_at";

pub async fn list_active(db: &PgPool) -> anyhow::Result<Vec<Office>> {
    let offices = sqlx::query_as::<_, Office>(&format!(
        "SELECT {OFFICE_COLUMNS} FROM offices WHERE is_active = TRUE ORDER BY name"
    ))
    .fetch_all(db)
    .await?;
    Ok(offices)
}

pub async fn fetch(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Office>> {
    let office = sqlx::query_as::<_, Office>(&format!(
        "SELECT {OFFICE_COLUMNS} FROM offices WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(office)
}

pub async fn insert(db: &PgPool, new: NewOffice) -> anyhow::Result<Office> {
    let office = sqlx::query_as::<_, Office>(&format!(
        "INSERT INTO offices (name, address, city, country, workstations)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {OFFICE_COLUMNS}"
    ))
    .bind(&new.name)
    .bind(&new.address)
    .bind(&new.city)
    .bind(&new.country)
    .bind(Json(&new.workstations))
    .fetch_one(db)
    .await?;
    Ok(office)
}

impl Office {
    pub async fn save(&self, db: &PgPool) -> anyhow::Result<Office> {
        let office = sqlx::query_as::<_, Office>(&format!(
            "UPDATE offices
             SET name = $2, address = $3, city = $4, country = $5, workstations = $6,
                 is_active = $7, updated_at = now()
             WHERE id = $1
             RETURNING {OFFICE_COLUMNS}"
        ))
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.address)
        .bind(&self.city)
        .bind(&self.country)
        .bind(&self.workstations)
        .bind(self.is_active)
        .fetch_one(db)
        .await?;
        Ok(office)
    }
}

/// Soft delete, mirroring users: the office disappears from listings but
/// stays referencable.
pub async fn deactivate(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result =
        sqlx::query("UPDATE offices SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workstation_floor_is_optional_in_payloads() {
        let ws: Workstation =
            serde_json::from_str(r#"{"id": "ws-1", "name": "Desk 1"}"#).unwrap();
        assert!(ws.floor.is_none());

        let ws: Workstation =
            serde_json::from_str(r#"{"id": "ws-2", "name": "Desk 2", "floor": "3"}"#).unwrap();
        assert_eq!(ws.floor.as_deref(), Some("3"));
    }

    #[test]
    fn office_serializes_workstations_as_plain_array() {
        let office = Office {
            id: Uuid::new_v4(),
            name: "Malaga".into(),
            address: "Calle Larios 1".into(),
            city: "Malaga".into(),
            country: "Spain".into(),
            workstations: Json(vec![Workstation {
                id: "ws-1".into(),
                name: "Desk 1".into(),
                floor: None,
            }]),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(&office).unwrap();
        assert_eq!(json["workstations"][0]["id"], "ws-1");
        assert_eq!(json["is_active"], true);
    }
}
