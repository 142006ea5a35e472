use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;

use crate::{config::StoreConfig, error::StoreError};

pub const TYPE_MARKER: &str = "Db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub identity: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TYPE_NAME: &'static str;
    const FIELDS: &'static [FieldDef];

    fn values(&self) -> Vec<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: &'static str,
    pub identity: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub storage_name: String,
    pub fields: Vec<FieldValue>,
}

impl Description {
    pub fn identity(&self) -> Option<&'static str> {
        self.fields.iter().find(|f| f.identity).map(|f| f.name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

pub fn describe<E: Entity>(config: &StoreConfig, record: &E) -> Result<Description, StoreError> {
    let values = record.values();
    if E::FIELDS.is_empty() || values.len() != E::FIELDS.len() {
        return Err(StoreError::NotAStruct {
            type_name: E::TYPE_NAME,
        });
    }

    let fields = E::FIELDS
        .iter()
        .zip(values)
        .map(|(def, value)| FieldValue {
            name: def.name,
            identity: def.identity,
            value,
        })
        .collect();

    Ok(Description {
        storage_name: storage_name(config, E::TYPE_NAME),
        fields,
    })
}

pub fn identity_field_name<E: Entity>() -> Option<&'static str> {
    E::FIELDS.iter().find(|f| f.identity).map(|f| f.name)
}

pub fn storage_name(config: &StoreConfig, type_name: &str) -> String {
    let base = match type_name.strip_prefix(TYPE_MARKER) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest,
        _ => type_name,
    };
    format!(
        "{}.{}{}",
        config.namespace,
        config.table_prefix,
        snake_case(base)
    )
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Implements [`Entity`] for a struct from its persisted field list.
///
/// Fields are listed in declaration order; an optional leading
/// `#[identity]` marks the store-assigned key.
///
/// ```ignore
/// impl_entity!(Session {
///     #[identity] session_id,
///     user_id,
///     expires_at,
/// });
/// ```
#[macro_export]
macro_rules! impl_entity {
    ($ty:ident { $(#[identity] $id:ident,)? $($field:ident),+ $(,)? }) => {
        impl $crate::store::Entity for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);
            const FIELDS: &'static [$crate::store::FieldDef] = &[
                $($crate::store::FieldDef { name: stringify!($id), identity: true },)?
                $($crate::store::FieldDef { name: stringify!($field), identity: false },)+
            ];

            fn values(&self) -> ::std::vec::Vec<$crate::store::Value> {
                ::std::vec![
                    $($crate::store::Value::from(::std::clone::Clone::clone(&self.$id)),)?
                    $($crate::store::Value::from(::std::clone::Clone::clone(&self.$field)),)+
                ]
            }
        }
    };
}
