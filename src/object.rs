use std::cell::OnceCell;
use std::fmt;
use std::str;

use indexmap::IndexMap;

use crate::{filters, Error, Result};

/// Object identifier consists of two parts: object number and generation number.
///
/// Ids are plain `Copy` values, so two ids built from equal numbers are
/// indistinguishable and identity comparison is value comparison.
pub type ObjectId = (u32, u16);

/// Dictionary object.
///
/// Key order carries no meaning, but insertion order is preserved so that
/// serializing the same graph twice produces the same bytes.
#[derive(Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

/// Classification of a dictionary by its `Type` entry, computed once, by
/// value, right after the raw dictionary is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictClass {
    Catalog,
    PageTree,
    PageLeaf,
    ObjectStream,
    XrefStream,
    Plain,
}

/// Stream object: a dictionary plus an associated byte payload.
///
/// `content` always holds the bytes as they appear in the file (possibly
/// filtered); the decoded form is computed on demand and memoized.
#[derive(Debug, Clone)]
pub struct Stream {
    /// Associated stream dictionary.
    pub dict: Dictionary,
    /// Contents of the stream in bytes, as stored in the file.
    pub content: Vec<u8>,
    /// Can the stream be compressed by `Stream::compress`?
    /// Font streams may not be compressed, for example.
    pub allows_compression: bool,
    /// Stream data's position in the source file, when parsed from one.
    pub start_position: Option<usize>,

    decoded: OnceCell<Vec<u8>>,
}

/// Basic PDF object types defined in an enum.
#[derive(Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>, StringFormat),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
    /// An indirect object body that could not be parsed; the raw span is
    /// kept verbatim so the rest of the document survives a rewrite.
    Opaque(Vec<u8>),
}

/// String objects can be written in two formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    #[default]
    Literal,
    Hexadecimal,
}

/// Tag identifying an [`Object`] variant, used by the typed lookup
/// operations on [`crate::Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Null,
    Boolean,
    Integer,
    Real,
    Name,
    String,
    Array,
    Dictionary,
    Stream,
    Reference,
    Opaque,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Null => "Null",
            ObjectKind::Boolean => "Boolean",
            ObjectKind::Integer => "Integer",
            ObjectKind::Real => "Real",
            ObjectKind::Name => "Name",
            ObjectKind::String => "String",
            ObjectKind::Array => "Array",
            ObjectKind::Dictionary => "Dictionary",
            ObjectKind::Stream => "Stream",
            ObjectKind::Reference => "Reference",
            ObjectKind::Opaque => "Opaque",
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(number: i64) -> Self {
        Object::Integer(number)
    }
}

macro_rules! from_smaller_ints {
    ($( $Int: ty )+) => {
        $(
            impl From<$Int> for Object {
                fn from(number: $Int) -> Self {
                    Object::Integer(i64::from(number))
                }
            }
        )+
    }
}

from_smaller_ints! {
    i8 i16 i32
    u8 u16 u32
}

impl From<f64> for Object {
    fn from(number: f64) -> Self {
        Object::Real(number)
    }
}

impl From<f32> for Object {
    fn from(number: f32) -> Self {
        Object::Real(f64::from(number))
    }
}

impl From<String> for Object {
    fn from(name: String) -> Self {
        Object::Name(name.into_bytes())
    }
}

impl<'a> From<&'a str> for Object {
    fn from(name: &'a str) -> Self {
        Object::Name(name.as_bytes().to_vec())
    }
}

impl From<Vec<Object>> for Object {
    fn from(array: Vec<Object>) -> Self {
        Object::Array(array)
    }
}

impl From<Dictionary> for Object {
    fn from(dict: Dictionary) -> Self {
        Object::Dictionary(dict)
    }
}

impl From<Stream> for Object {
    fn from(stream: Stream) -> Self {
        Object::Stream(stream)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

impl Object {
    pub fn string_literal<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::String(s.into(), StringFormat::Literal)
    }

    pub fn string_hex<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::String(s.into(), StringFormat::Hexadecimal)
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Null => ObjectKind::Null,
            Object::Boolean(_) => ObjectKind::Boolean,
            Object::Integer(_) => ObjectKind::Integer,
            Object::Real(_) => ObjectKind::Real,
            Object::Name(_) => ObjectKind::Name,
            Object::String(..) => ObjectKind::String,
            Object::Array(_) => ObjectKind::Array,
            Object::Dictionary(_) => ObjectKind::Dictionary,
            Object::Stream(_) => ObjectKind::Stream,
            Object::Reference(_) => ObjectKind::Reference,
            Object::Opaque(_) => ObjectKind::Opaque,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    fn type_error(&self, expected: &'static str) -> Error {
        Error::ObjectType {
            expected,
            found: self.kind().name(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(value) => Ok(*value),
            _ => Err(self.type_error("Boolean")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(value) => Ok(*value),
            _ => Err(self.type_error("Integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Real(value) => Ok(*value),
            _ => Err(self.type_error("Real")),
        }
    }

    /// Numeric value regardless of the integer/real distinction.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Object::Integer(value) => Ok(*value as f64),
            Object::Real(value) => Ok(*value),
            _ => Err(self.type_error("Number")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(name) => Ok(name),
            _ => Err(self.type_error("Name")),
        }
    }

    pub fn as_name_str(&self) -> Result<&str> {
        Ok(str::from_utf8(self.as_name()?)
            .map_err(|_| self.type_error("Name"))?)
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(string, _) => Ok(string),
            _ => Err(self.type_error("String")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            _ => Err(self.type_error("Reference")),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Object>> {
        match self {
            Object::Array(array) => Ok(array),
            _ => Err(self.type_error("Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Object>> {
        let found = self.kind().name();
        match self {
            Object::Array(array) => Ok(array),
            _ => Err(Error::ObjectType {
                expected: "Array",
                found,
            }),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(self.type_error("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        let found = self.kind().name();
        match self {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(Error::ObjectType {
                expected: "Dictionary",
                found,
            }),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(self.type_error("Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        let found = self.kind().name();
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(Error::ObjectType {
                expected: "Stream",
                found,
            }),
        }
    }

    pub fn type_name(&self) -> Result<&str> {
        match self {
            Object::Dictionary(dict) => dict.type_name(),
            Object::Stream(stream) => stream.dict.type_name(),
            _ => Err(self.type_error("Dictionary")),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => f.write_str("null"),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Integer(value) => write!(f, "{}", value),
            Object::Real(value) => write!(f, "{}", value),
            Object::Name(name) => write!(f, "/{}", String::from_utf8_lossy(name)),
            Object::String(text, _) => write!(f, "({})", String::from_utf8_lossy(text)),
            Object::Array(array) => {
                let items = array
                    .iter()
                    .map(|item| format!("{:?}", item))
                    .collect::<Vec<String>>();
                write!(f, "[{}]", items.join(" "))
            }
            Object::Dictionary(dict) => write!(f, "{:?}", dict),
            Object::Stream(stream) => write!(f, "{:?}stream...endstream", stream.dict),
            Object::Reference(id) => write!(f, "{} {} R", id.0, id.1),
            Object::Opaque(bytes) => write!(f, "opaque({} bytes)", bytes.len()),
        }
    }
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary(IndexMap::new())
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0
            .get(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.0
            .get_mut(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove an entry, preserving the order of the remaining ones.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    pub fn type_name(&self) -> Result<&str> {
        self.get(b"Type").and_then(Object::as_name_str)
    }

    pub fn type_is(&self, type_name: &[u8]) -> bool {
        self.get(b"Type").and_then(Object::as_name).ok() == Some(type_name)
    }

    pub fn classify(&self) -> DictClass {
        match self.get(b"Type").and_then(Object::as_name).ok() {
            Some(b"Catalog") => DictClass::Catalog,
            Some(b"Pages") => DictClass::PageTree,
            Some(b"Page") => DictClass::PageLeaf,
            Some(b"ObjStm") => DictClass::ObjectStream,
            Some(b"XRef") => DictClass::XrefStream,
            _ => DictClass::Plain,
        }
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Vec<u8>, Object> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, Vec<u8>, Object> {
        self.0.iter_mut()
    }
}

#[macro_export]
macro_rules! dictionary {
    () => {
        $crate::Dictionary::new()
    };
    ($( $key: expr => $value: expr ),+ ,) => {
        dictionary!( $($key => $value),+ )
    };
    ($( $key: expr => $value: expr ),*) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $value);
        )*
        dict
    }}
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .into_iter()
            .map(|(key, value)| format!("/{} {:?}", String::from_utf8_lossy(key), value))
            .collect::<Vec<String>>();
        write!(f, "<<{}>>", entries.concat())
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Vec<u8>, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<Vec<u8>>> FromIterator<(K, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Object)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.set(k, v);
        }
        dict
    }
}

impl Stream {
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Stream {
        dict.set("Length", content.len() as i64);
        Stream {
            dict,
            content,
            allows_compression: true,
            start_position: None,
            decoded: OnceCell::new(),
        }
    }

    /// Default is that the stream may be compressed. On font streams,
    /// set this to false, otherwise the font will be corrupt.
    #[inline]
    pub fn with_compression(mut self, allows_compression: bool) -> Stream {
        self.allows_compression = allows_compression;
        self
    }

    pub fn with_position(mut self, position: usize) -> Stream {
        self.start_position = Some(position);
        self
    }

    /// Declared filter chain, in decoding order. A single `Filter` name is
    /// reported as a one-element chain; no `Filter` entry is an empty chain.
    pub fn filters(&self) -> Result<Vec<&[u8]>> {
        let filter = match self.dict.get(b"Filter") {
            Ok(filter) => filter,
            Err(_) => return Ok(Vec::new()),
        };

        if let Ok(name) = filter.as_name() {
            Ok(vec![name])
        } else if let Ok(names) = filter.as_array() {
            names.iter().map(Object::as_name).collect()
        } else {
            Err(Error::ObjectType {
                expected: "Name or Array",
                found: filter.kind().name(),
            })
        }
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
        self.decoded = OnceCell::new();
        self.dict.set("Length", self.content.len() as i64);
    }

    /// Replace the payload with unfiltered bytes, dropping any filter chain.
    pub fn set_plain_content(&mut self, content: Vec<u8>) {
        self.dict.remove(b"DecodeParms");
        self.dict.remove(b"Filter");
        self.dict.set("Length", content.len() as i64);
        self.content = content;
        self.decoded = OnceCell::new();
    }

    /// Decoded payload, running the declared filter chain on first access
    /// and reusing the result afterwards.
    pub fn decoded_content(&self) -> Result<&[u8]> {
        if let Some(bytes) = self.decoded.get() {
            return Ok(bytes);
        }
        let bytes = filters::decode_stream(self)?;
        Ok(self.decoded.get_or_init(|| bytes))
    }

    /// Deflate the payload in place when it has no filter yet and the
    /// result is actually smaller.
    pub fn compress(&mut self) -> Result<()> {
        if self.allows_compression && !self.dict.has(b"Filter") {
            let compressed = filters::flate_encode(&self.content)?;
            if compressed.len() + 19 < self.content.len() {
                self.dict.set("Filter", "FlateDecode");
                self.set_content(compressed);
            }
        }
        Ok(())
    }

    /// Replace the payload with its decoded form, dropping the filter chain.
    pub fn decompress(&mut self) -> Result<()> {
        let decoded = self.decoded_content()?.to_vec();
        self.set_plain_content(decoded);
        Ok(())
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Stream) -> bool {
        self.dict == other.dict && self.content == other.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_preserves_insertion_order() {
        let dict = dictionary! {
            "Zebra" => 1,
            "Apple" => 2,
            "Mango" => 3,
        };
        let keys: Vec<_> = dict.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"Zebra".as_slice(), b"Apple", b"Mango"]);
    }

    #[test]
    fn classify_by_type_entry() {
        assert_eq!(dictionary! {"Type" => "Catalog"}.classify(), DictClass::Catalog);
        assert_eq!(dictionary! {"Type" => "Pages"}.classify(), DictClass::PageTree);
        assert_eq!(dictionary! {"Type" => "Page"}.classify(), DictClass::PageLeaf);
        assert_eq!(dictionary! {"Type" => "ObjStm"}.classify(), DictClass::ObjectStream);
        assert_eq!(dictionary! {"Type" => "XRef"}.classify(), DictClass::XrefStream);
        assert_eq!(dictionary! {"Size" => 4}.classify(), DictClass::Plain);
    }

    #[test]
    fn stream_new_sets_length() {
        let stream = Stream::new(Dictionary::new(), b"hello".to_vec());
        assert_eq!(stream.dict.get(b"Length").unwrap(), &Object::Integer(5));
    }

    #[test]
    fn ids_with_equal_fields_are_identical() {
        let a: ObjectId = (12, 0);
        let b: ObjectId = (12, 0);
        assert_eq!(a, b);
        assert_eq!(Object::Reference(a), Object::Reference(b));
    }

    #[test]
    fn typed_accessors_report_mismatch() {
        let object = Object::Integer(7);
        match object.as_dict() {
            Err(Error::ObjectType { expected, found }) => {
                assert_eq!(expected, "Dictionary");
                assert_eq!(found, "Integer");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
