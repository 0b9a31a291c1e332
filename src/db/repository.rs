use rusqlite::{params, Connection};

use super::DatabaseError;
use crate::models::{Application, Employee, Entitlement, Project, Role};

// ═══════════════════════════════════════════
// Reference entities
// ═══════════════════════════════════════════

pub fn insert_project(conn: &Connection, project: &Project) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO projects (id, name, description) VALUES (?1, ?2, ?3)",
        params![project.id, project.name, project.description],
    )?;
    Ok(())
}

pub fn insert_role(conn: &Connection, role: &Role) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO roles (id, name, level) VALUES (?1, ?2, ?3)",
        params![role.id, role.name, role.level],
    )?;
    Ok(())
}

pub fn insert_application(conn: &Connection, app: &Application) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO applications (id, name, description) VALUES (?1, ?2, ?3)",
        params![app.id, app.name, app.description],
    )?;
    Ok(())
}

pub fn insert_entitlement(conn: &Connection, ent: &Entitlement) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO entitlements (id, code, description) VALUES (?1, ?2, ?3)",
        params![ent.id, ent.code, ent.description],
    )?;
    Ok(())
}

pub fn insert_employee(conn: &Connection, emp: &Employee) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO employees (id, name, email, role_id) VALUES (?1, ?2, ?3, ?4)",
        params![emp.id, emp.name, emp.email, emp.role_id],
    )?;
    Ok(())
}

pub fn map_app_entitlement(
    conn: &Connection,
    app_id: i64,
    entitlement_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO app_entitlement_mappings (app_id, entitlement_id) VALUES (?1, ?2)",
        params![app_id, entitlement_id],
    )?;
    Ok(())
}

pub fn assign_project(
    conn: &Connection,
    employee_id: i64,
    project_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO employee_project_assignments (employee_id, project_id) VALUES (?1, ?2)",
        params![employee_id, project_id],
    )?;
    Ok(())
}

pub fn grant_holding(
    conn: &Connection,
    employee_id: i64,
    entitlement_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO employee_entitlement_holdings (employee_id, entitlement_id) VALUES (?1, ?2)",
        params![employee_id, entitlement_id],
    )?;
    Ok(())
}

// ═══════════════════════════════════════════
// Lookups
// ═══════════════════════════════════════════

pub fn get_entitlement_by_code(
    conn: &Connection,
    code: &str,
) -> Result<Option<Entitlement>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, code, description FROM entitlements WHERE code = ?1",
        params![code],
        |row| {
            Ok(Entitlement {
                id: row.get(0)?,
                code: row.get(1)?,
                description: row.get(2)?,
            })
        },
    );

    match result {
        Ok(ent) => Ok(Some(ent)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All entitlements ordered by code — the corpus fed to the vector index.
pub fn list_entitlements(conn: &Connection) -> Result<Vec<Entitlement>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, code, description FROM entitlements ORDER BY code")?;
    let rows = stmt.query_map([], |row| {
        Ok(Entitlement {
            id: row.get(0)?,
            code: row.get(1)?,
            description: row.get(2)?,
        })
    })?;

    let mut entitlements = Vec::new();
    for row in rows {
        entitlements.push(row?);
    }
    Ok(entitlements)
}

pub fn find_employee_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Employee>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, email, role_id FROM employees WHERE email = ?1",
        params![email],
        |row| {
            Ok(Employee {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role_id: row.get(3)?,
            })
        },
    );

    match result {
        Ok(emp) => Ok(Some(emp)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Entitlement codes directly held by an employee, resolved by email.
/// Returns `None` when the email is unknown. A pure read — no LLM is
/// involved anywhere on this path.
pub fn get_holdings_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<(i64, Vec<String>)>, DatabaseError> {
    let Some(employee) = find_employee_by_email(conn, email)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT e.code
         FROM employee_entitlement_holdings h
         JOIN entitlements e ON h.entitlement_id = e.id
         WHERE h.employee_id = ?1
         ORDER BY e.code",
    )?;
    let rows = stmt.query_map(params![employee.id], |row| row.get::<_, String>(0))?;

    let mut codes = Vec::new();
    for row in rows {
        codes.push(row?);
    }
    Ok(Some((employee.id, codes)))
}
