//! Type-erased values.
//!
//! [`Value`] is a closed tagged variant with one case per supported shape.
//! [`AnyObject`] pairs a value with its [`Type`]; the tag is computed from the
//! payload on construction so it can never disagree with it.

use std::cmp::Ordering;
use std::fmt;

use crate::error::Fallible;
use crate::types::{Primitive, Type};

/// Expand `$body` once per arm of `$primitive`, with `$t` aliased to the
/// matching Rust type. The list form restricts the arms; unlisted primitives
/// take `$fallback`.
#[macro_export]
macro_rules! dispatch {
    (
        $primitive:expr,
        [$($variant:ident => $ty:ty),+ $(,)?],
        |$t:ident| $body:block,
        $fallback:expr
    ) => {
        match $primitive {
            $($crate::types::Primitive::$variant => {
                #[allow(dead_code)]
                type $t = $ty;
                $body
            })+
            #[allow(unreachable_patterns)]
            _ => $fallback,
        }
    };
}

/// [`dispatch!`] over every primitive.
#[macro_export]
macro_rules! dispatch_element {
    ($primitive:expr, |$t:ident| $body:block) => {
        match $primitive {
            $crate::types::Primitive::Bool => { type $t = bool; $body }
            $crate::types::Primitive::I32 => { type $t = i32; $body }
            $crate::types::Primitive::I64 => { type $t = i64; $body }
            $crate::types::Primitive::U32 => { type $t = u32; $body }
            $crate::types::Primitive::U64 => { type $t = u64; $body }
            $crate::types::Primitive::F32 => { type $t = f32; $body }
            $crate::types::Primitive::F64 => { type $t = f64; $body }
            $crate::types::Primitive::String => { type $t = String; $body }
        }
    };
}

/// [`dispatch!`] over the numeric primitives.
#[macro_export]
macro_rules! dispatch_numeric {
    ($primitive:expr, |$t:ident| $body:block, $fallback:expr) => {
        $crate::dispatch!($primitive, [
            I32 => i32, I64 => i64, U32 => u32, U64 => u64, F32 => f32, F64 => f64
        ], |$t| $body, $fallback)
    };
}

/// [`dispatch!`] over the floating-point primitives.
#[macro_export]
macro_rules! dispatch_float {
    ($primitive:expr, |$t:ident| $body:block, $fallback:expr) => {
        $crate::dispatch!($primitive, [F32 => f32, F64 => f64], |$t| $body, $fallback)
    };
}

/// [`dispatch!`] over the integer primitives.
#[macro_export]
macro_rules! dispatch_integer {
    ($primitive:expr, |$t:ident| $body:block, $fallback:expr) => {
        $crate::dispatch!(
            $primitive,
            [I32 => i32, I64 => i64, U32 => u32, U64 => u64],
            |$t| $body,
            $fallback
        )
    };
}

/// [`dispatch!`] over the primitives usable as hash keys.
#[macro_export]
macro_rules! dispatch_hashable {
    ($primitive:expr, |$t:ident| $body:block, $fallback:expr) => {
        $crate::dispatch!($primitive, [
            Bool => bool, I32 => i32, I64 => i64, U32 => u32, U64 => u64, String => String
        ], |$t| $body, $fallback)
    };
}

/// Apply `$body` to the typed slice inside a [`Vector`].
#[macro_export]
macro_rules! with_vector {
    ($vector:expr, |$items:ident| $body:expr) => {
        match $vector {
            $crate::data::Vector::Bool($items) => $body,
            $crate::data::Vector::I32($items) => $body,
            $crate::data::Vector::I64($items) => $body,
            $crate::data::Vector::U32($items) => $body,
            $crate::data::Vector::U64($items) => $body,
            $crate::data::Vector::F32($items) => $body,
            $crate::data::Vector::F64($items) => $body,
            $crate::data::Vector::String($items) => $body,
        }
    };
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Vec(Vector),
    Tuple(Vec<Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    Bool(Vec<bool>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    String(Vec<String>),
}

impl Vector {
    pub fn primitive(&self) -> Primitive {
        match self {
            Vector::Bool(_) => Primitive::Bool,
            Vector::I32(_) => Primitive::I32,
            Vector::I64(_) => Primitive::I64,
            Vector::U32(_) => Primitive::U32,
            Vector::U64(_) => Primitive::U64,
            Vector::F32(_) => Primitive::F32,
            Vector::F64(_) => Primitive::F64,
            Vector::String(_) => Primitive::String,
        }
    }

    pub fn len(&self) -> usize {
        with_vector!(self, |items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        with_vector!(self, |items| items.get(index).cloned().map(Element::into_value))
    }
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Scalar(Primitive::Bool),
            Value::I32(_) => Type::Scalar(Primitive::I32),
            Value::I64(_) => Type::Scalar(Primitive::I64),
            Value::U32(_) => Type::Scalar(Primitive::U32),
            Value::U64(_) => Type::Scalar(Primitive::U64),
            Value::F32(_) => Type::Scalar(Primitive::F32),
            Value::F64(_) => Type::Scalar(Primitive::F64),
            Value::String(_) => Type::Scalar(Primitive::String),
            Value::Vec(vector) => Type::Vec(vector.primitive()),
            Value::Tuple(items) => Type::Tuple(items.iter().map(Value::ty).collect()),
        }
    }

    /// Primitive of a scalar value.
    pub fn primitive(&self) -> Option<Primitive> {
        match self.ty() {
            Type::Scalar(primitive) => Some(primitive),
            Type::Vec(_) | Type::Tuple(_) => None,
        }
    }

    /// Numeric scalars as `f64`; `None` for everything else.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::U32(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Represent a distance bound in `primitive`, rounding up so the bound
    /// never shrinks.
    pub fn from_distance(distance: f64, primitive: Primitive) -> Fallible<Value> {
        if distance.is_nan() || distance < 0.0 {
            return fallible!(InvalidDistance, "distance {distance} is negative or NaN");
        }
        let whole = distance.ceil();
        let out_of_range = || {
            err!(
                NumericDomainError,
                "distance {distance} does not fit in {primitive}"
            )
        };
        Ok(match primitive {
            Primitive::F64 => Value::F64(distance),
            Primitive::F32 => {
                let narrowed = distance as f32;
                if narrowed.is_infinite() && distance.is_finite() {
                    return Err(out_of_range());
                }
                Value::F32(if (narrowed as f64) < distance {
                    next_up_f32(narrowed)
                } else {
                    narrowed
                })
            }
            Primitive::I32 if whole <= i32::MAX as f64 => Value::I32(whole as i32),
            Primitive::I64 if whole < i64::MAX as f64 => Value::I64(whole as i64),
            Primitive::U32 if whole <= u32::MAX as f64 => Value::U32(whole as u32),
            Primitive::U64 if whole < u64::MAX as f64 => Value::U64(whole as u64),
            Primitive::I32 | Primitive::I64 | Primitive::U32 | Primitive::U64 => {
                return Err(out_of_range())
            }
            Primitive::Bool | Primitive::String => {
                return fallible!(InvalidType, "{primitive} cannot hold a distance")
            }
        })
    }

    /// Convert a numeric scalar into `primitive` when no information is lost.
    pub fn coerce(&self, primitive: Primitive) -> Fallible<Value> {
        if self.primitive() == Some(primitive) {
            return Ok(self.clone());
        }
        let Some(number) = self.as_f64() else {
            return fallible!(
                InvalidType,
                "cannot convert {} into {primitive}",
                self.ty()
            );
        };
        let integral = number.fract() == 0.0;
        let converted = match primitive {
            Primitive::F64 => Some(Value::F64(number)),
            Primitive::F32 if (number as f32) as f64 == number => Some(Value::F32(number as f32)),
            Primitive::I32 if integral => i32::try_from(number as i64).ok().map(Value::I32),
            Primitive::I64 if integral && number.abs() < i64::MAX as f64 => {
                Some(Value::I64(number as i64))
            }
            Primitive::U32 if integral => u32::try_from(number as i64).ok().map(Value::U32),
            Primitive::U64 if integral && (0.0..u64::MAX as f64).contains(&number) => {
                Some(Value::U64(number as u64))
            }
            _ => None,
        };
        converted.ok_or_else(|| err!(InvalidType, "cannot represent {self} as {primitive}"))
    }

    /// Ordering between two scalars of the same primitive.
    pub fn partial_cmp_scalar(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::I32(a), Value::I32(b)) => a.partial_cmp(b),
            (Value::I64(a), Value::I64(b)) => a.partial_cmp(b),
            (Value::U32(a), Value::U32(b)) => a.partial_cmp(b),
            (Value::U64(a), Value::U64(b)) => a.partial_cmp(b),
            (Value::F32(a), Value::F32(b)) => a.partial_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Element>(&self) -> Fallible<&T> {
        T::from_value(self).ok_or_else(|| {
            err!(
                InvalidType,
                "expected {}, found {}",
                T::PRIMITIVE,
                self.ty()
            )
        })
    }

    pub fn downcast_vec<T: Element>(&self) -> Fallible<&[T]> {
        match self {
            Value::Vec(vector) => T::from_vector(vector),
            _ => None,
        }
        .ok_or_else(|| {
            err!(
                InvalidType,
                "expected Vec<{}>, found {}",
                T::PRIMITIVE,
                self.ty()
            )
        })
    }
}

fn next_up_f32(value: f32) -> f32 {
    if value.is_nan() || value == f32::INFINITY {
        return value;
    }
    if value == 0.0 {
        return f32::from_bits(1);
    }
    let bits = value.to_bits();
    f32::from_bits(if value > 0.0 { bits + 1 } else { bits - 1 })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Debug>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item:?}")?;
            }
            f.write_str("]")
        }
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v:?}"),
            Value::F64(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Vec(vector) => with_vector!(vector, |items| list(f, items)),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Rust types that can sit inside a [`Value`].
pub trait Element: Clone + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const PRIMITIVE: Primitive;

    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<&Self>;
    fn into_vector(items: Vec<Self>) -> Vector;
    fn from_vector(vector: &Vector) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl Element for $ty {
            const PRIMITIVE: Primitive = Primitive::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_vector(items: Vec<Self>) -> Vector {
                Vector::$variant(items)
            }

            fn from_vector(vector: &Vector) -> Option<&[Self]> {
                match vector {
                    Vector::$variant(items) => Some(items),
                    _ => None,
                }
            }
        }
    )+};
}

impl_element!(
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
);

impl<T: Element> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Vec(T::into_vector(items))
    }
}

/// An immutable value together with its runtime type tag.
#[derive(Clone, Debug, PartialEq)]
pub struct AnyObject {
    ty: Type,
    value: Value,
}

impl AnyObject {
    pub fn new(value: Value) -> Self {
        Self {
            ty: value.ty(),
            value,
        }
    }

    pub fn of<T: Element>(value: T) -> Self {
        Self::new(value.into_value())
    }

    pub fn vec<T: Element>(items: Vec<T>) -> Self {
        Self::new(Value::from(items))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn downcast_ref<T: Element>(&self) -> Fallible<&T> {
        self.value.downcast_ref()
    }

    pub fn downcast_vec<T: Element>(&self) -> Fallible<&[T]> {
        self.value.downcast_vec()
    }

    /// Human-readable dump for diagnostics.
    pub fn render(&self) -> String {
        self.value.to_string()
    }
}

impl From<Value> for AnyObject {
    fn from(value: Value) -> Self {
        AnyObject::new(value)
    }
}
