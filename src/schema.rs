//! Server schema lookup for attribute types.
//!
//! The catalog is read from the subschema subentry the root DSE names
//! (falling back to `cn=schema`) and answers whether an attribute is
//! defined. Definitions follow the RFC 4512 `AttributeTypeDescription`
//! grammar; only the fields the toolkit needs are kept.

use crate::error::{ToolkitError, ToolkitResult};
use crate::negotiation::read_root_metadata;
use crate::protocol::{Dn, RootMetadata, Scope, SearchRequest};
use crate::session::{DirectorySession, ensure_success, send_search};
use log::{debug, warn};
use std::collections::HashMap;

/// Integer syntax OID (RFC 4517 §3.3.16).
pub const INTEGER_SYNTAX: &str = "1.3.6.1.4.1.1466.115.121.1.27";

/// Subschema entry used when the root DSE does not name one.
pub const DEFAULT_SUBSCHEMA_DN: &str = "cn=schema";

/// One parsed `attributeTypes` value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeTypeDefinition {
    pub oid: String,
    pub names: Vec<String>,
    pub description: Option<String>,
    pub superior: Option<String>,
    pub equality: Option<String>,
    pub ordering: Option<String>,
    pub substr: Option<String>,
    pub syntax: Option<String>,
    pub single_valued: bool,
    pub no_user_modification: bool,
    pub usage: Option<String>,
}

impl AttributeTypeDefinition {
    /// Parse `( OID NAME ( 'a' 'b' ) ... )`. Returns `None` for text that
    /// does not follow the grammar.
    pub fn parse(definition: &str) -> Option<Self> {
        let mut tokens = tokenize(definition)?.into_iter();
        if tokens.next()? != Token::Open {
            return None;
        }
        let mut parsed = Self {
            oid: tokens.next()?.into_word()?,
            ..Self::default()
        };

        loop {
            let keyword = match tokens.next()? {
                Token::Close => break,
                Token::Word(keyword) => keyword,
                _ => return None,
            };
            match keyword.as_str() {
                "NAME" => parsed.names = take_descriptors(&mut tokens)?,
                "DESC" => parsed.description = Some(tokens.next()?.into_word()?),
                "SUP" => parsed.superior = Some(tokens.next()?.into_word()?),
                "EQUALITY" => parsed.equality = Some(tokens.next()?.into_word()?),
                "ORDERING" => parsed.ordering = Some(tokens.next()?.into_word()?),
                "SUBSTR" => parsed.substr = Some(tokens.next()?.into_word()?),
                "SYNTAX" => parsed.syntax = Some(tokens.next()?.into_word()?),
                "USAGE" => parsed.usage = Some(tokens.next()?.into_word()?),
                "SINGLE-VALUE" => parsed.single_valued = true,
                "NO-USER-MODIFICATION" => parsed.no_user_modification = true,
                "OBSOLETE" | "COLLECTIVE" => {}
                extension if extension.starts_with("X-") => skip_value(&mut tokens)?,
                _ => {}
            }
        }
        Some(parsed)
    }

    /// First name, or the OID for unnamed types.
    pub fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.oid)
    }

    /// Syntax OID without a `{length}` bound.
    pub fn syntax_oid(&self) -> Option<&str> {
        self.syntax
            .as_deref()
            .map(|syntax| syntax.split('{').next().unwrap_or(syntax))
    }

    pub fn is_integer(&self) -> bool {
        self.syntax_oid() == Some(INTEGER_SYNTAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Quoted(String),
    Word(String),
}

impl Token {
    fn into_word(self) -> Option<String> {
        match self {
            Token::Word(word) | Token::Quoted(word) => Some(word),
            _ => None,
        }
    }
}

fn tokenize(definition: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = definition.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '\'' => {
                let mut quoted = String::new();
                loop {
                    match chars.next()? {
                        '\'' => break,
                        c => quoted.push(c),
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            c => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '(' | ')' | '\'') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Some(tokens)
}

fn take_descriptors<I>(tokens: &mut I) -> Option<Vec<String>>
where
    I: Iterator<Item = Token>,
{
    match tokens.next()? {
        Token::Quoted(name) | Token::Word(name) => Some(vec![name]),
        Token::Open => {
            let mut names = Vec::new();
            loop {
                match tokens.next()? {
                    Token::Close => return Some(names),
                    Token::Quoted(name) | Token::Word(name) => names.push(name),
                    Token::Open => return None,
                }
            }
        }
        Token::Close => None,
    }
}

fn skip_value<I>(tokens: &mut I) -> Option<()>
where
    I: Iterator<Item = Token>,
{
    take_descriptors(tokens).map(|_| ())
}

/// Attribute description without options (`cn;lang-de` -> `cn`).
fn base_name(attribute: &str) -> &str {
    attribute.split(';').next().unwrap_or(attribute).trim()
}

/// Attribute types known to the server, indexed by every name and OID.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    attributes: Vec<AttributeTypeDefinition>,
    index: HashMap<String, usize>,
}

impl SchemaCatalog {
    /// Build a catalog from raw `attributeTypes` values. Values that do not
    /// parse are skipped.
    pub fn from_definitions<I, S>(definitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::default();
        for definition in definitions {
            match AttributeTypeDefinition::parse(definition.as_ref()) {
                Some(parsed) => catalog.insert(parsed),
                None => warn!("Skipping unparsable attribute type: {}", definition.as_ref()),
            }
        }
        catalog
    }

    fn insert(&mut self, definition: AttributeTypeDefinition) {
        let position = self.attributes.len();
        self.index.insert(definition.oid.to_ascii_lowercase(), position);
        for name in &definition.names {
            self.index.insert(name.to_ascii_lowercase(), position);
        }
        self.attributes.push(definition);
    }

    /// Read the catalog from the server, starting with a root DSE read.
    pub fn fetch<S>(session: &mut S) -> ToolkitResult<Self>
    where
        S: DirectorySession + ?Sized,
    {
        let metadata = read_root_metadata(session)?;
        Self::fetch_with(session, &metadata)
    }

    /// Read the catalog using root metadata the caller already holds.
    pub fn fetch_with<S>(session: &mut S, metadata: &RootMetadata) -> ToolkitResult<Self>
    where
        S: DirectorySession + ?Sized,
    {
        let subschema = metadata
            .subschema_subentry
            .clone()
            .filter(|dn| !dn.is_root())
            .unwrap_or_else(|| Dn::new(DEFAULT_SUBSCHEMA_DN));

        let request = SearchRequest::new(subschema.clone(), Scope::Base, "(objectClass=subschema)")
            .with_attributes(["attributeTypes"]);
        let response = send_search(session, &request)?;
        ensure_success("read subschema", &response.result)?;

        let definitions: Vec<&String> = response
            .entries
            .iter()
            .flat_map(|entry| entry.values("attributeTypes").unwrap_or_default())
            .collect();
        let catalog = Self::from_definitions(definitions);
        debug!(
            "Loaded {} attribute types from {}",
            catalog.len(),
            subschema
        );
        Ok(catalog)
    }

    fn position(&self, attribute: &str) -> Option<usize> {
        self.index.get(&base_name(attribute).to_ascii_lowercase()).copied()
    }

    /// Look up a definition by any of its names or its OID.
    pub fn get(&self, attribute: &str) -> Option<&AttributeTypeDefinition> {
        self.position(attribute).map(|position| &self.attributes[position])
    }

    /// Whether two names denote the same attribute type.
    pub fn same_type(&self, left: &str, right: &str) -> bool {
        match (self.position(left), self.position(right)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    pub fn is_defined(&self, attribute: &str) -> bool {
        self.get(attribute).is_some()
    }

    /// Fail with `SchemaError` for the first attribute not defined.
    pub fn require_defined<'a, I>(&self, attributes: I) -> ToolkitResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match attributes.into_iter().find(|name| !self.is_defined(name)) {
            Some(missing) => Err(ToolkitError::Schema {
                attribute: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeTypeDefinition> {
        self.attributes.iter()
    }
}
