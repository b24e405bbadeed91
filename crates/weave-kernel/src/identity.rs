//! Type identities.
//!
//! A [`TypeRef`] names a type together with its generic arguments. Each
//! argument is either an open generic parameter (`?T`) or another closed
//! `TypeRef`, so a generic definition combined with a set of arguments
//! yields a concrete identity:
//!
//! ```text
//! GenericLogger<?T>          generic definition (open)
//! GenericLogger<Acme.Order>  concrete identity (closed)
//! ```
//!
//! Identities serialize as their textual form and parse back losslessly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn type_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.+]*$").expect("type name regex must compile")
    })
}

/// A type identity: name plus generic arguments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    name: String,
    args: Vec<TypeArg>,
}

/// One generic argument of a [`TypeRef`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeArg {
    /// An unbound generic parameter, rendered `?Name`.
    Open(String),

    /// A bound type argument.
    Closed(TypeRef),
}

impl TypeRef {
    /// A non-generic type reference.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeRefParseError> {
        let name = name.into();
        if !type_name_re().is_match(&name) {
            return Err(TypeRefParseError::InvalidName(name));
        }
        Ok(Self {
            name,
            args: Vec::new(),
        })
    }

    /// Parse the textual form `Name<Arg, ?Param>`.
    pub fn parse(input: &str) -> Result<Self, TypeRefParseError> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().peekable(),
        };
        parser.skip_ws();
        if parser.chars.peek().is_none() {
            return Err(TypeRefParseError::Empty);
        }
        let parsed = parser.type_ref()?;
        parser.skip_ws();
        if let Some((offset, found)) = parser.chars.next() {
            return Err(TypeRefParseError::Unexpected {
                input: input.to_string(),
                offset,
                found,
            });
        }
        Ok(parsed)
    }

    /// Replace the generic arguments.
    pub fn with_args(mut self, args: Vec<TypeArg>) -> Self {
        self.args = args;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeArg] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Whether any argument, at any depth, is an open parameter.
    pub fn is_open(&self) -> bool {
        self.args.iter().any(|arg| match arg {
            TypeArg::Open(_) => true,
            TypeArg::Closed(inner) => inner.is_open(),
        })
    }

    /// Whether this reference names a generic definition rather than one
    /// application of it: no arguments at all, or only open ones.
    pub fn is_definition_ref(&self) -> bool {
        self.args.iter().all(|arg| matches!(arg, TypeArg::Open(_)))
    }

    /// The bare definition this identity was built from (same name, no
    /// arguments).
    pub fn definition(&self) -> TypeRef {
        Self {
            name: self.name.clone(),
            args: Vec::new(),
        }
    }

    /// Whether `other` is an application of the same generic definition.
    pub fn same_definition(&self, other: &TypeRef) -> bool {
        self.name == other.name
    }

    /// Replace open parameters, at any depth, with their bound arguments.
    /// Parameters without a binding stay open.
    pub fn substitute(&self, bindings: &BTreeMap<&str, &TypeArg>) -> TypeRef {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                TypeArg::Open(param) => bindings
                    .get(param.as_str())
                    .map(|bound| (*bound).clone())
                    .unwrap_or_else(|| arg.clone()),
                TypeArg::Closed(inner) => TypeArg::Closed(inner.substitute(bindings)),
            })
            .collect();
        Self {
            name: self.name.clone(),
            args,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.args.is_empty() {
            return Ok(());
        }
        write!(f, "<")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ">")
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Open(param) => write!(f, "?{param}"),
            TypeArg::Closed(ty) => write!(f, "{ty}"),
        }
    }
}

impl FromStr for TypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeRefParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

/// Errors from parsing a type reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeRefParseError {
    #[error("empty type reference")]
    Empty,

    #[error("invalid type name `{0}`")]
    InvalidName(String),

    #[error("unexpected `{found}` at offset {offset} in `{input}`")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },

    #[error("unexpected end of type reference `{0}`")]
    UnexpectedEnd(String),
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn name(&mut self) -> Result<String, TypeRefParseError> {
        let mut name = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || matches!(*c, '_' | '.' | '+'))
        {
            name.push(c);
        }
        if name.is_empty() {
            return Err(self.unexpected());
        }
        if !type_name_re().is_match(&name) {
            return Err(TypeRefParseError::InvalidName(name));
        }
        Ok(name)
    }

    fn type_ref(&mut self) -> Result<TypeRef, TypeRefParseError> {
        let name = self.name()?;
        self.skip_ws();
        let mut args = Vec::new();
        if self.chars.next_if(|(_, c)| *c == '<').is_some() {
            loop {
                self.skip_ws();
                args.push(self.arg()?);
                self.skip_ws();
                match self.chars.next() {
                    Some((_, ',')) => continue,
                    Some((_, '>')) => break,
                    Some((offset, found)) => {
                        return Err(TypeRefParseError::Unexpected {
                            input: self.input.to_string(),
                            offset,
                            found,
                        });
                    }
                    None => return Err(TypeRefParseError::UnexpectedEnd(self.input.to_string())),
                }
            }
        }
        Ok(TypeRef { name, args })
    }

    fn arg(&mut self) -> Result<TypeArg, TypeRefParseError> {
        if self.chars.next_if(|(_, c)| *c == '?').is_some() {
            return Ok(TypeArg::Open(self.name()?));
        }
        Ok(TypeArg::Closed(self.type_ref()?))
    }

    fn unexpected(&mut self) -> TypeRefParseError {
        match self.chars.peek() {
            Some(&(offset, found)) => TypeRefParseError::Unexpected {
                input: self.input.to_string(),
                offset,
                found,
            },
            None => TypeRefParseError::UnexpectedEnd(self.input.to_string()),
        }
    }
}

/// Identifies a type eligible to receive mixins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetDescriptor {
    target: TypeRef,
}

impl TargetDescriptor {
    pub fn new(target: TypeRef) -> Self {
        Self { target }
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.target
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)
    }
}

impl From<TypeRef> for TargetDescriptor {
    fn from(target: TypeRef) -> Self {
        Self::new(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_name() {
        let ty = TypeRef::parse("Acme.Mixins.Auditing").unwrap();
        assert_eq!(ty.name(), "Acme.Mixins.Auditing");
        assert_eq!(ty.arity(), 0);
        assert!(ty.is_definition_ref());
    }

    #[test]
    fn parses_nested_generic_arguments() {
        let ty = TypeRef::parse("Cache< Map<Key, ?V>, Order >").unwrap();
        assert_eq!(ty.arity(), 2);
        assert!(ty.is_open());
        assert!(!ty.is_definition_ref());
        assert_eq!(ty.to_string(), "Cache<Map<Key, ?V>, Order>");
    }

    #[test]
    fn open_only_arguments_name_a_definition() {
        let ty = TypeRef::parse("GenericLogger<?T>").unwrap();
        assert!(ty.is_definition_ref());
        assert_eq!(ty.definition().to_string(), "GenericLogger");
    }

    #[test]
    fn display_parse_is_lossless() {
        for text in ["T", "A<B>", "A<?X, B<C, ?Y>>", "Outer+Nested<int>"] {
            let ty = TypeRef::parse(text).unwrap();
            assert_eq!(TypeRef::parse(&ty.to_string()).unwrap(), ty);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(TypeRef::parse("  "), Err(TypeRefParseError::Empty));
        assert!(matches!(
            TypeRef::parse("A<B"),
            Err(TypeRefParseError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            TypeRef::parse("A<B> C"),
            Err(TypeRefParseError::Unexpected { found: 'C', .. })
        ));
        assert!(matches!(
            TypeRef::parse("9Lives"),
            Err(TypeRefParseError::InvalidName(_))
        ));
        assert!(matches!(
            TypeRef::parse("A<>"),
            Err(TypeRefParseError::Unexpected { found: '>', .. })
        ));
    }

    #[test]
    fn serializes_as_string() {
        let ty = TypeRef::parse("GenericLogger<Order>").unwrap();
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, "\"GenericLogger<Order>\"");
        let back: TypeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
        assert!(serde_json::from_str::<TypeRef>("\"A<\"").is_err());
    }

    #[test]
    fn substitution_binds_open_parameters_at_any_depth() {
        let order = TypeArg::Closed(TypeRef::parse("Order").unwrap());
        let bindings = BTreeMap::from([("T", &order)]);
        let ty = TypeRef::parse("Cache<Map<Key, ?T>, ?U>").unwrap();
        assert_eq!(
            ty.substitute(&bindings).to_string(),
            "Cache<Map<Key, Order>, ?U>"
        );
    }
}
