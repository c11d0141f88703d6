use serde::Deserialize;

use crate::offices::repo::Workstation;

#[derive(Debug, Deserialize)]
pub struct CreateOfficeRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub workstations: Vec<Workstation>,
}

/// Partial update; omitted fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct UpdateOfficeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub workstations: Option<Vec<Workstation>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}
