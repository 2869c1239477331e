//! Typed records and their mapping to catalog rows.

use chrono::NaiveDate;
use sewerdb_core::{EntityDef, Error, FieldDef, Row, ScalarType, Value};

/// A typed record of one catalog entity.
pub trait Entity: Sized {
    /// Entity name in the catalog.
    const NAME: &'static str;

    /// Name of the identity attribute.
    const IDENTITY: &'static str;

    /// Catalog definition of the entity.
    fn definition() -> EntityDef;

    /// Identity value, if assigned.
    fn id(&self) -> Option<i64>;

    /// Convert to an untyped row holding every attribute.
    fn to_row(&self) -> Row;

    /// Read a stored row.
    fn from_row(row: &Row) -> Result<Self, Error>;
}

/// A Rust type that can hold an attribute value.
///
/// `Option<T>` marks a nullable attribute.
pub trait FieldValue: Sized {
    /// Catalog type of the attribute.
    const TYPE: ScalarType;

    /// Whether the attribute is required.
    const REQUIRED: bool = true;

    /// Convert to a catalog value.
    fn to_value(&self) -> Value;

    /// Convert from a catalog value, `None` on a type mismatch.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FieldValue for i64 {
    const TYPE: ScalarType = ScalarType::Int64;

    fn to_value(&self) -> Value {
        Value::Int64(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldValue for f64 {
    const TYPE: ScalarType = ScalarType::Float64;

    fn to_value(&self) -> Value {
        Value::Float64(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_number()
    }
}

impl FieldValue for bool {
    const TYPE: ScalarType = ScalarType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for String {
    const TYPE: ScalarType = ScalarType::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FieldValue for NaiveDate {
    const TYPE: ScalarType = ScalarType::Date;

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_date()
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const TYPE: ScalarType = T::TYPE;
    const REQUIRED: bool = false;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Attribute definition for a record field of type `T`.
pub(crate) fn field_def<T: FieldValue>(name: &str) -> FieldDef {
    if T::REQUIRED {
        FieldDef::new(name, T::TYPE)
    } else {
        FieldDef::optional(name, T::TYPE)
    }
}

/// Identity definition: nullable key types are assigned by the store.
pub(crate) fn key_def<T: FieldValue>(name: &str) -> FieldDef {
    if T::REQUIRED {
        FieldDef::new(name, T::TYPE)
    } else {
        FieldDef::surrogate_key(name)
    }
}

/// Read one attribute of a stored row.
pub(crate) fn read<T: FieldValue>(row: &Row, entity: &str, field: &str) -> Result<T, Error> {
    let value = row.value(field);
    T::from_value(value).ok_or_else(|| {
        Error::InvalidData(format!(
            "{entity}.{field}: expected {}, found {}",
            T::TYPE,
            value.type_name()
        ))
    })
}

/// Declare a typed record together with its catalog definition.
///
/// ```ignore
/// entity! {
///     /// A network node.
///     Manhole as "Manhole" {
///         key manhole_id: Option<i64> => "Manhole_ID";
///         x_coordinate: Option<f64> => "X_coordinate",
///     }
/// }
/// ```
///
/// A nullable key type makes the identity auto-assigned. A join entity may
/// name its composite identity with `key id: Option<i64> => "id", composite("A", "B");`.
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $name:ident as $entity:literal {
            key $key:ident: $key_ty:ty => $key_col:literal $( , composite($($ck:literal),+) )?;
            $(
                $(#[$fmeta:meta])*
                $field:ident: $ty:ty => $col:literal $( (max $max:literal) )?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            #[serde(rename = $key_col)]
            pub $key: $key_ty,
            $(
                $(#[$fmeta])*
                #[serde(rename = $col)]
                pub $field: $ty,
            )*
        }

        impl $crate::Entity for $name {
            const NAME: &'static str = $entity;
            const IDENTITY: &'static str = $key_col;

            fn definition() -> sewerdb_core::EntityDef {
                sewerdb_core::EntityDef::new($entity, $key_col)
                    .with_field($crate::record::key_def::<$key_ty>($key_col))
                    $(
                        .with_field(
                            $crate::record::field_def::<$ty>($col)
                                $( .with_max_length($max) )?
                        )
                    )*
                    $( .with_composite_key([$($ck),+]) )?
            }

            fn id(&self) -> Option<i64> {
                $crate::FieldValue::to_value(&self.$key).as_i64()
            }

            fn to_row(&self) -> sewerdb_core::Row {
                sewerdb_core::Row::new()
                    .with($key_col, $crate::FieldValue::to_value(&self.$key))
                    $( .with($col, $crate::FieldValue::to_value(&self.$field)) )*
            }

            fn from_row(row: &sewerdb_core::Row) -> Result<Self, sewerdb_core::Error> {
                Ok(Self {
                    $key: $crate::record::read(row, $entity, $key_col)?,
                    $( $field: $crate::record::read(row, $entity, $col)?, )*
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    entity! {
        /// Test record.
        Gauge as "Gauge" {
            key gauge_id: Option<i64> => "Gauge_ID";
            label: String => "Label" (max 4),
            reading: Option<f64> => "Reading",
            taken: Option<NaiveDate> => "Taken",
        }
    }

    #[test]
    fn test_definition() {
        let def = Gauge::definition();
        assert_eq!(def.name, "Gauge");
        assert_eq!(def.identity_field, "Gauge_ID");
        assert!(def.has_auto_identity());

        let label = def.get_field("Label").unwrap();
        assert!(label.required);
        assert_eq!(label.max_length, Some(4));
        assert!(def.get_field("Reading").unwrap().is_nullable());
        assert_eq!(def.get_field("Taken").unwrap().field_type, ScalarType::Date);
    }

    #[test]
    fn test_row_conversion() {
        let gauge = Gauge {
            gauge_id: Some(3),
            label: "p".into(),
            reading: None,
            taken: NaiveDate::from_ymd_opt(2021, 4, 1),
        };
        let row = gauge.to_row();
        assert_eq!(row.len(), 4);
        assert_eq!(row.value("Reading"), &Value::Null);
        assert_eq!(gauge.id(), Some(3));
        assert_eq!(Gauge::from_row(&row).unwrap(), gauge);
    }

    #[test]
    fn test_read_type_mismatch() {
        let row = Row::new().with("Label", 5i64);
        assert!(matches!(Gauge::from_row(&row), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_float_reads_integer() {
        assert_eq!(f64::from_value(&Value::Int64(2)), Some(2.0));
        assert_eq!(Option::<f64>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<i64>::from_value(&Value::from("x")), None);
    }
}
