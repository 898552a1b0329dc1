//! Target shape declaration.
//!
//! A target record type describes its shape as an ordered table of
//! [`FieldSpec`] descriptors plus a by-name constructor over a [`Snapshot`]
//! of field values. The [`record!`] macro generates both from a struct
//! declaration, so construction by name is checked when the program is
//! built rather than discovered through runtime reflection.

use std::any::{Any, TypeId};

use crate::collector::CollectError;

/// Type-erased field value in transit between emission and assembly.
pub(crate) type FieldValue = Box<dyn Any + Send>;

// =============================================================================
// Field descriptors
// =============================================================================

/// Descriptor for one named, typed field of a target record.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    name: &'static str,
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
}

impl FieldSpec {
    /// Descriptor for a field named `name` holding values of type `T`.
    pub const fn of<T: Any + Send>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
        }
    }

    /// Field name, matching the struct field and constructor slot.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable name of the declared field type.
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Whether a value of type `id` matches the declared field type.
    pub(crate) fn accepts_id(&self, id: TypeId) -> bool {
        (self.type_id)() == id
    }
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .finish()
    }
}

// =============================================================================
// Target record trait
// =============================================================================

/// A record type that can be assembled from independently supplied field
/// values.
///
/// Implementations are normally generated by the [`record!`] macro; hand
/// written implementations must keep `fields` and `assemble` in agreement
/// (same names, same types, each name exactly once).
pub trait Record: Sized + Send + 'static {
    /// Ordered field descriptor table, one entry per constructor slot.
    fn fields() -> &'static [FieldSpec];

    /// Construct an instance by taking each declared field from `snapshot`.
    ///
    /// # Errors
    ///
    /// [`CollectError::Construction`] if a field is missing from the
    /// snapshot or its value does not downcast to the declared type.
    fn assemble(snapshot: &mut Snapshot) -> Result<Self, CollectError>;
}

// =============================================================================
// Snapshot
// =============================================================================

/// One complete set of field values, exactly one entry per declared field.
///
/// Produced by the synchronization pipeline each time every field channel
/// has published at least once since the previous snapshot.
pub struct Snapshot {
    entries: Vec<(&'static str, Option<FieldValue>)>,
}

impl Snapshot {
    pub(crate) fn new(entries: Vec<(&'static str, FieldValue)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, value)| (name, Some(value)))
                .collect(),
        }
    }

    /// Number of fields captured in this snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and downcast the value for `field`.
    ///
    /// # Errors
    ///
    /// [`CollectError::Construction`] if the field is absent, already
    /// taken, or holds a value of a different type.
    pub fn take<T: Any>(&mut self, field: &str) -> Result<T, CollectError> {
        let value = self
            .entries
            .iter_mut()
            .find(|(name, _)| *name == field)
            .and_then(|(_, value)| value.take())
            .ok_or_else(|| CollectError::Construction {
                field: field.to_string(),
                expected: std::any::type_name::<T>(),
            })?;

        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CollectError::Construction {
                field: field.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("Snapshot");
        for (name, value) in &self.entries {
            dbg.field(name, &value.is_some());
        }
        dbg.finish()
    }
}

// =============================================================================
// Declaration macro
// =============================================================================

/// Declares a struct and implements [`Record`] for it.
///
/// Each field becomes one entry in the descriptor table, in declaration
/// order, and one by-name slot in the generated constructor.
///
/// ```
/// use tributary::Record;
///
/// tributary::record! {
///     #[derive(Debug, PartialEq)]
///     pub struct Login {
///         name: String,
///         age: u32,
///     }
/// }
///
/// assert_eq!(Login::fields().len(), 2);
/// assert_eq!(Login::fields()[0].name(), "name");
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field : $ty, )+
        }

        impl $crate::Record for $name {
            fn fields() -> &'static [$crate::FieldSpec] {
                const FIELDS: &[$crate::FieldSpec] =
                    &[ $( $crate::FieldSpec::of::<$ty>(stringify!($field)) ),+ ];
                FIELDS
            }

            fn assemble(
                snapshot: &mut $crate::Snapshot,
            ) -> ::std::result::Result<Self, $crate::CollectError> {
                Ok(Self {
                    $( $field : snapshot.take::<$ty>(stringify!($field))?, )+
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, PartialEq)]
        struct Probe {
            label: String,
            value: f64,
        }
    }

    #[test]
    fn test_field_table_order_and_names() {
        let fields = Probe::fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name(), "label");
        assert_eq!(fields[1].name(), "value");
        assert!(fields[0].type_name().contains("String"));
        assert_eq!(fields[1].type_name(), "f64");
    }

    #[test]
    fn test_assemble_from_snapshot() {
        let mut snapshot = Snapshot::new(vec![
            ("label", Box::new("cpu".to_string()) as FieldValue),
            ("value", Box::new(0.5_f64) as FieldValue),
        ]);
        let probe = Probe::assemble(&mut snapshot).unwrap();
        assert_eq!(
            probe,
            Probe {
                label: "cpu".to_string(),
                value: 0.5
            }
        );
    }

    #[test]
    fn test_take_rejects_wrong_type() {
        let mut snapshot = Snapshot::new(vec![("label", Box::new(1_u32) as FieldValue)]);
        let err = snapshot.take::<String>("label").unwrap_err();
        assert!(matches!(
            err,
            CollectError::Construction { ref field, .. } if field == "label"
        ));
    }

    #[test]
    fn test_take_rejects_missing_field() {
        let mut snapshot = Snapshot::new(Vec::new());
        assert!(snapshot.take::<u32>("absent").is_err());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_take_consumes_the_entry() {
        let mut snapshot = Snapshot::new(vec![("n", Box::new(1_u32) as FieldValue)]);
        assert_eq!(snapshot.take::<u32>("n").unwrap(), 1);
        assert!(snapshot.take::<u32>("n").is_err());
    }

    #[test]
    fn test_spec_type_check() {
        let spec = FieldSpec::of::<u32>("n");
        assert!(spec.accepts_id(TypeId::of::<u32>()));
        assert!(!spec.accepts_id(TypeId::of::<i32>()));
    }
}
