//! Declarative field validation for bound JSON bodies.
//!
//! A type opts in by implementing [`Validate`] and listing its fields once:
//!
//! ```rust
//! use strand::validate::{Schema, Validate};
//!
//! #[derive(serde::Deserialize)]
//! struct Signup {
//!     email: String,
//!     age: u32,
//!     nickname: Option<String>,
//! }
//!
//! impl Validate for Signup {
//!     fn schema() -> Schema<Self> {
//!         Schema::<Self>::new()
//!             .field("email", |s| &s.email, "required,email")
//!             .field("age", |s| &s.age, "required")
//!             .field("nickname", |s| &s.nickname, "")
//!     }
//! }
//! ```
//!
//! Tags are a comma-separated list; `required` and `email` are understood and
//! anything else is ignored. Custom checks plug in through [`Schema::rule`]
//! with any [`Rule`] implementation.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

// ── Field values ──────────────────────────────────────────────────────────────

/// The view of a field that rules inspect.
pub trait FieldValue {
    /// `true` for the type's empty value: `""`, `0`, `false`, `None`, or an
    /// empty collection.
    fn is_zero(&self) -> bool;

    /// The field as text, if it is text.
    fn as_str(&self) -> Option<&str> {
        None
    }
}

impl FieldValue for String {
    fn is_zero(&self) -> bool { self.is_empty() }
    fn as_str(&self) -> Option<&str> { Some(String::as_str(self)) }
}

impl FieldValue for &str {
    fn is_zero(&self) -> bool { self.is_empty() }
    fn as_str(&self) -> Option<&str> { Some(*self) }
}

impl FieldValue for bool {
    fn is_zero(&self) -> bool { !*self }
}

macro_rules! numeric_field {
    ($($t:ty),*) => {$(
        impl FieldValue for $t {
            fn is_zero(&self) -> bool { *self == 0 as $t }
        }
    )*};
}

numeric_field!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl<T: FieldValue> FieldValue for Option<T> {
    fn is_zero(&self) -> bool { self.is_none() }
    fn as_str(&self) -> Option<&str> { self.as_ref()?.as_str() }
}

impl<T> FieldValue for Vec<T> {
    fn is_zero(&self) -> bool { self.is_empty() }
}

impl<K, V, S> FieldValue for HashMap<K, V, S> {
    fn is_zero(&self) -> bool { self.is_empty() }
}

impl FieldValue for serde_json::Value {
    fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Number(n) => n.as_f64() == Some(0.0),
            Self::String(s) => s.is_empty(),
            Self::Array(a) => a.is_empty(),
            Self::Object(o) => o.is_empty(),
        }
    }

    fn as_str(&self) -> Option<&str> {
        serde_json::Value::as_str(self)
    }
}

// ── Rules ─────────────────────────────────────────────────────────────────────

/// A single check applied to one field.
pub trait Rule: Send + Sync {
    fn check(&self, field: &'static str, value: &dyn FieldValue) -> Result<(), ValidationError>;
}

/// Rejects a field holding its empty value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Required;

impl Rule for Required {
    fn check(&self, field: &'static str, value: &dyn FieldValue) -> Result<(), ValidationError> {
        if value.is_zero() {
            return Err(ValidationError::new(field, "required", format!("{field} is required")));
        }
        Ok(())
    }
}

/// Rejects a field that is not a plausible email address.
///
/// Non-text fields and empty strings are rejected too; combine with
/// `required` for the clearer message on a missing value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Email;

impl Rule for Email {
    fn check(&self, field: &'static str, value: &dyn FieldValue) -> Result<(), ValidationError> {
        match value.as_str() {
            Some(s) if EMAIL.is_match(s) => Ok(()),
            _ => Err(ValidationError::new(field, "email", format!("{field}: invalid email format"))),
        }
    }
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Reads one field off the validated value.
pub type Accessor<T> = for<'a> fn(&'a T) -> &'a dyn FieldValue;

struct FieldRules<T> {
    name: &'static str,
    accessor: Accessor<T>,
    rules: Vec<Box<dyn Rule>>,
}

/// Ordered field rules for `T`, checked in declaration order.
pub struct Schema<T> {
    fields: Vec<FieldRules<T>>,
}

impl<T> Schema<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declares a field with a comma-separated tag list (`"required,email"`).
    pub fn field(mut self, name: &'static str, accessor: Accessor<T>, tags: &str) -> Self {
        let rules = tags
            .split(',')
            .filter_map(|tag| -> Option<Box<dyn Rule>> {
                match tag.trim() {
                    "required" => Some(Box::new(Required)),
                    "email" => Some(Box::new(Email)),
                    _ => None,
                }
            })
            .collect();
        self.fields.push(FieldRules { name, accessor, rules });
        self
    }

    /// Attaches a custom rule to a field, after any rules already declared.
    pub fn rule(mut self, name: &'static str, accessor: Accessor<T>, rule: impl Rule + 'static) -> Self {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.rules.push(Box::new(rule)),
            None => self.fields.push(FieldRules { name, accessor, rules: vec![Box::new(rule)] }),
        }
        self
    }

    /// Returns the first failing rule, in field declaration order.
    pub fn validate(&self, value: &T) -> Result<(), ValidationError> {
        for field in &self.fields {
            let v = (field.accessor)(value);
            for rule in &field.rules {
                rule.check(field.name, v)?;
            }
        }
        Ok(())
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self { Self::new() }
}

/// Types that declare their field rules.
pub trait Validate: Sized {
    fn schema() -> Schema<Self>;

    fn validate(&self) -> Result<(), ValidationError> {
        Self::schema().validate(self)
    }
}
