use super::entity::{Description, Value};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn insert(description: &Description) -> Statement {
    let data: Vec<_> = description.fields.iter().filter(|f| !f.identity).collect();
    let returning = description.identity().unwrap_or("rowid");

    if data.is_empty() {
        return Statement {
            sql: format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {returning}",
                description.storage_name
            ),
            params: Vec::new(),
        };
    }

    let columns: Vec<_> = data.iter().map(|f| f.name).collect();
    let placeholders: Vec<_> = (1..=data.len()).map(|i| format!("?{i}")).collect();
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {returning}",
            description.storage_name,
            columns.join(", "),
            placeholders.join(", ")
        ),
        params: data.into_iter().map(|f| f.value.clone()).collect(),
    }
}

pub fn select(description: &Description, conditions: &[&str]) -> Result<Statement, StoreError> {
    require_conditions("load", conditions)?;
    let mut params = all_values(description);
    let predicates = bound_predicates(description, conditions, &mut params);
    let columns: Vec<_> = description.fields.iter().map(|f| f.name).collect();

    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {}",
            columns.join(", "),
            description.storage_name,
            predicates.join(" AND ")
        ),
        params,
    })
}

pub fn update(description: &Description, conditions: &[&str]) -> Result<Statement, StoreError> {
    require_conditions("update", conditions)?;
    let mut params = all_values(description);
    let predicates = bound_predicates(description, conditions, &mut params);
    let assignments: Vec<_> = description
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.identity)
        .map(|(i, f)| format!("{} = ?{}", f.name, i + 1))
        .collect();
    if assignments.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "update: {} has no writable fields",
            description.storage_name
        )));
    }

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            description.storage_name,
            assignments.join(", "),
            predicates.join(" AND ")
        ),
        params,
    })
}

pub fn delete(description: &Description, conditions: &[&str]) -> Result<Statement, StoreError> {
    require_conditions("delete", conditions)?;
    let mut params = Vec::with_capacity(conditions.len());
    let predicates = appended_predicates(description, conditions, &mut params);

    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            description.storage_name,
            predicates.join(" AND ")
        ),
        params,
    })
}

/// Moves `field` to the record's value only when that is strictly greater
/// than what is stored.
pub fn advance(
    description: &Description,
    field: &str,
    conditions: &[&str],
) -> Result<Statement, StoreError> {
    require_conditions("advance", conditions)?;
    let target = description
        .fields
        .iter()
        .find(|f| f.name == field && !f.identity)
        .ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "advance: `{field}` is not a writable field of {}",
                description.storage_name
            ))
        })?;

    let mut params = vec![target.value.clone()];
    let mut predicates = appended_predicates(description, conditions, &mut params);
    predicates.push(format!("{} < ?1", target.name));

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} = ?1 WHERE {}",
            description.storage_name,
            target.name,
            predicates.join(" AND ")
        ),
        params,
    })
}

fn require_conditions(operation: &str, conditions: &[&str]) -> Result<(), StoreError> {
    if conditions.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "{operation}: at least one condition field must be specified"
        )));
    }
    Ok(())
}

fn all_values(description: &Description) -> Vec<Value> {
    description.fields.iter().map(|f| f.value.clone()).collect()
}

// `params` already holds every field value at `?1..?n`. Unknown condition
// names still end up in the clause so the store reports the bad column.
fn bound_predicates(
    description: &Description,
    conditions: &[&str],
    params: &mut Vec<Value>,
) -> Vec<String> {
    conditions
        .iter()
        .map(|name| {
            let slot = match description.position(name) {
                Some(index) => index + 1,
                None => {
                    params.push(Value::Null);
                    params.len()
                }
            };
            format!("{name} = ?{slot}")
        })
        .collect()
}

fn appended_predicates(
    description: &Description,
    conditions: &[&str],
    params: &mut Vec<Value>,
) -> Vec<String> {
    conditions
        .iter()
        .map(|name| {
            let value = description
                .position(name)
                .map(|index| description.fields[index].value.clone())
                .unwrap_or(Value::Null);
            params.push(value);
            format!("{name} = ?{}", params.len())
        })
        .collect()
}
