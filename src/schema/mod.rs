//! Schema reflection
//!
//! Reads an index mapping into typed field and namespace accessors:
//! - Field types (Integer, Float, Decimal, Boolean, String, Date, Dummy)
//! - Dot-path lookup of fields and namespaces
//! - Condition builders checked against each field's type

mod accessor;
mod field_type;
mod mapping;

pub use accessor::{AgeField, Field, Namespace, AGE_DATE_FORMAT};
pub use field_type::FieldType;
pub use mapping::Schema;
