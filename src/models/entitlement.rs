use serde::{Deserialize, Serialize};

/// A named permission grant controlling access to an application feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: i64,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Identity record. Name and email are never advertised to the query
/// agent; they exist for the direct holdings lookup only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role_id: Option<i64>,
}
