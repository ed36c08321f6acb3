//! Type descriptors and the text parser for boundary type names.
//!
//! Boundary callers name types as text (`"f64"`, `"Vec<String>"`,
//! `"(f64, i32)"`). The parser tolerates whitespace; [`Type`]'s `Display`
//! prints the canonical form and two descriptors are equal iff their
//! canonical names are.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Fallible};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    String,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::Bool,
        Primitive::I32,
        Primitive::I64,
        Primitive::U32,
        Primitive::U64,
        Primitive::F32,
        Primitive::F64,
        Primitive::String,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::String => "String",
        }
    }

    /// The C spelling used by the header and the bootstrap manifest.
    pub const fn c_type(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I32 => "int32_t",
            Primitive::I64 => "int64_t",
            Primitive::U32 => "uint32_t",
            Primitive::U64 => "uint64_t",
            Primitive::F32 => "float",
            Primitive::F64 => "double",
            Primitive::String => "const char *",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Primitive::I32 | Primitive::I64 | Primitive::U32 | Primitive::U64
        )
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_float() || self.is_integer()
    }

    /// Width of one element in a flat buffer.
    pub const fn size_of(&self) -> usize {
        match self {
            Primitive::Bool => std::mem::size_of::<bool>(),
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
            Primitive::String => std::mem::size_of::<*const u8>(),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime type descriptor of an engine value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(Primitive),
    Vec(Primitive),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn descriptor(&self) -> String {
        self.to_string()
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Type::Scalar(p) | Type::Vec(p) => Some(*p),
            Type::Tuple(_) => None,
        }
    }

    fn from_expr(expr: &TypeExpr) -> Fallible<Self> {
        match expr {
            TypeExpr::Path { name, args } if args.is_empty() => Primitive::parse(name)
                .map(Type::Scalar)
                .ok_or_else(|| err!(InvalidType, "unrecognized type name {name:?}")),
            TypeExpr::Path { name, args } if name == "Vec" => match args.as_slice() {
                [TypeExpr::Path { name, args }] if args.is_empty() => Primitive::parse(name)
                    .map(Type::Vec)
                    .ok_or_else(|| err!(InvalidType, "unrecognized element type {name:?}")),
                _ => fallible!(InvalidType, "Vec takes exactly one primitive element type"),
            },
            TypeExpr::Path { name, .. } => {
                fallible!(InvalidType, "unrecognized type name {name:?}")
            }
            TypeExpr::Tuple(items) => items
                .iter()
                .map(Type::from_expr)
                .collect::<Fallible<Vec<_>>>()
                .map(Type::Tuple),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(p) => write!(f, "{p}"),
            Type::Vec(p) => write!(f, "Vec<{p}>"),
            Type::Tuple(items) => {
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

impl FromStr for Type {
    type Err = Error;

    fn from_str(text: &str) -> Fallible<Self> {
        Type::from_expr(&TypeExpr::parse(text)?)
    }
}

impl TryFrom<&TypeExpr> for Type {
    type Error = Error;

    fn try_from(expr: &TypeExpr) -> Fallible<Self> {
        Type::from_expr(expr)
    }
}

/// Untyped syntax tree of a type name. Metric and measure names share it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Path { name: String, args: Vec<TypeExpr> },
    Tuple(Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn parse(text: &str) -> Fallible<Self> {
        let mut cursor = Cursor::new(text);
        let expr = cursor.expr()?;
        cursor.finish()?;
        Ok(expr)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeExpr::Path { name, .. } => Some(name),
            TypeExpr::Tuple(_) => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |f: &mut fmt::Formatter<'_>, items: &[TypeExpr]| -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        };
        match self {
            TypeExpr::Path { name, args } if args.is_empty() => f.write_str(name),
            TypeExpr::Path { name, args } => {
                write!(f, "{name}<")?;
                list(f, args)?;
                f.write_str(">")
            }
            TypeExpr::Tuple(items) => {
                f.write_str("(")?;
                list(f, items)?;
                f.write_str(")")
            }
        }
    }
}

/// Parse a constructor's type-argument list, e.g. `"<SymmetricDistance, f64>"`.
pub fn parse_type_args(text: &str, expected: usize) -> Fallible<Vec<TypeExpr>> {
    let mut cursor = Cursor::new(text);
    cursor.expect(b'<')?;
    let args = cursor.list(b'>')?;
    cursor.finish()?;
    if args.len() != expected {
        return fallible!(
            InvalidType,
            "expected {expected} type argument(s), found {}",
            args.len()
        );
    }
    Ok(args)
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.text.as_bytes().get(self.pos) {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.text.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Fallible<()> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            other => fallible!(
                InvalidType,
                "expected {:?} at offset {} of {:?}, found {:?}",
                byte as char,
                self.pos,
                self.text,
                other.map(char::from)
            ),
        }
    }

    fn finish(&mut self) -> Fallible<()> {
        match self.peek() {
            None => Ok(()),
            Some(b) => fallible!(
                InvalidType,
                "unexpected {:?} at offset {} of {:?}",
                b as char,
                self.pos,
                self.text
            ),
        }
    }

    fn expr(&mut self) -> Fallible<TypeExpr> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let items = self.list(b')')?;
                if items.is_empty() {
                    return fallible!(InvalidType, "empty tuple in {:?}", self.text);
                }
                Ok(TypeExpr::Tuple(items))
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let start = self.pos;
                while let Some(b) = self.text.as_bytes().get(self.pos) {
                    if !(b.is_ascii_alphanumeric() || *b == b'_') {
                        break;
                    }
                    self.pos += 1;
                }
                let name = self.text[start..self.pos].to_string();
                let args = if self.peek() == Some(b'<') {
                    self.pos += 1;
                    self.list(b'>')?
                } else {
                    Vec::new()
                };
                Ok(TypeExpr::Path { name, args })
            }
            other => fallible!(
                InvalidType,
                "expected a type name at offset {} of {:?}, found {:?}",
                self.pos,
                self.text,
                other.map(char::from)
            ),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn list(&mut self, close: u8) -> Fallible<Vec<TypeExpr>> {
        let mut items = Vec::new();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                other => {
                    return fallible!(
                        InvalidType,
                        "expected ',' or {:?} in {:?}, found {:?}",
                        close as char,
                        self.text,
                        other.map(char::from)
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn canonical_names_ignore_whitespace() {
        let ty: Type = " Vec < f64 > ".parse().unwrap();
        assert_eq!(ty, Type::Vec(Primitive::F64));
        assert_eq!(ty.descriptor(), "Vec<f64>");

        let tuple: Type = "(f64,i32 ,Vec<String>)".parse().unwrap();
        assert_eq!(tuple.descriptor(), "(f64, i32, Vec<String>)");
    }

    #[test]
    fn unknown_names_are_invalid_type() {
        for text in ["f16", "Vec<Vec<f64>>", "HashMap<String, f64>", "", "()", "f64>"] {
            let err = text.parse::<Type>().unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidType, "{text}");
        }
    }

    #[test]
    fn type_args_are_counted() {
        let args = parse_type_args("<SymmetricDistance, f64>", 2).unwrap();
        assert_eq!(args[0].name(), Some("SymmetricDistance"));
        assert_eq!(args[1].to_string(), "f64");

        let err = parse_type_args("<f64>", 2).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidType);
    }

    #[test]
    fn nested_args_render_canonically() {
        let expr = TypeExpr::parse("AbsoluteDistance< f64 >").unwrap();
        assert_eq!(expr.to_string(), "AbsoluteDistance<f64>");
    }
}
