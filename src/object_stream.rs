//! Object streams: containers packing multiple non-stream indirect objects.
//!
//! Parsing dissolves an object stream into the context, one object per
//! `(number, offset)` pair declared in its header region. The writer side
//! builds new object streams when the compressed strategy batches eligible
//! objects together.

use log::warn;

use crate::cursor::ByteCursor;
use crate::object::{Object, ObjectId, Stream};
use crate::parser::{self, ParseOptions};
use crate::writer::Writer;
use crate::{dictionary, filters, Error, Result};

/// Parse every object packed in `stream`, returning `(id, object)` pairs in
/// declaration order. Packed objects always carry generation zero.
pub(crate) fn unpack_object_stream(
    stream: &Stream,
    options: &ParseOptions,
) -> Result<Vec<(ObjectId, Object)>> {
    let data = stream.decoded_content()?;

    let first = stream.dict.get(b"First")?.as_i64()?;
    let first = usize::try_from(first)
        .map_err(|_| Error::PackedStream(format!("invalid First offset {}", first)))?;
    let count = stream.dict.get(b"N")?.as_i64()?;
    let count = usize::try_from(count)
        .map_err(|_| Error::PackedStream(format!("invalid object count {}", count)))?;

    let mut cursor = ByteCursor::new(data);
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        parser::skip_whitespace_and_comments(&mut cursor);
        let object_number = parser::parse_raw_int(&mut cursor)?;
        parser::skip_whitespace_and_comments(&mut cursor);
        let offset = parser::parse_raw_int(&mut cursor)?;
        pairs.push((object_number as u32, offset as usize));
    }
    if cursor.offset() > first {
        warn!("object stream header region overruns its First offset");
    }

    let mut objects = Vec::with_capacity(count);
    for (object_number, offset) in pairs {
        let target = first.saturating_add(offset);
        if target >= data.len() {
            warn!(
                "out-of-bounds offset {} for object {} in object stream",
                offset, object_number
            );
            continue;
        }
        cursor.move_to(target);
        let object = parser::parse_object(&mut cursor, options)?;
        objects.push(((object_number, 0), object));
    }
    Ok(objects)
}

/// Accumulates serialized objects for one object stream.
pub(crate) struct ObjectStreamBuilder {
    entries: Vec<(u32, Vec<u8>)>,
}

impl ObjectStreamBuilder {
    pub fn new() -> ObjectStreamBuilder {
        ObjectStreamBuilder {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn add_object(&mut self, object_number: u32, object: &Object) -> Result<()> {
        let mut bytes = Vec::new();
        Writer::write_object(&mut bytes, object)?;
        self.entries.push((object_number, bytes));
        Ok(())
    }

    /// Assemble the container stream: the `(number, offset)` header region
    /// followed by the serialized objects, deflated when `encode` is set.
    pub fn build(self, encode: bool) -> Result<Stream> {
        let mut header = Vec::new();
        let mut body = Vec::new();
        for (object_number, bytes) in &self.entries {
            header.extend_from_slice(object_number.to_string().as_bytes());
            header.push(b' ');
            header.extend_from_slice(body.len().to_string().as_bytes());
            header.push(b' ');
            body.extend_from_slice(bytes);
            body.push(b'\n');
        }

        let mut dict = dictionary! {
            "Type" => "ObjStm",
            "N" => self.entries.len() as i64,
            "First" => header.len() as i64,
        };

        let mut content = header;
        content.extend_from_slice(&body);
        if encode {
            dict.set("Filter", "FlateDecode");
            content = filters::flate_encode(&content)?;
        }
        Ok(Stream::new(dict, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_unpack_round_trips() {
        let mut builder = ObjectStreamBuilder::new();
        builder.add_object(3, &Object::Integer(42)).unwrap();
        builder
            .add_object(5, &Object::Name(b"Widget".to_vec()))
            .unwrap();
        builder
            .add_object(9, &Object::Array(vec![1.into(), 2.into()]))
            .unwrap();
        assert_eq!(builder.len(), 3);

        let stream = builder.build(true).unwrap();
        assert!(stream.dict.type_is(b"ObjStm"));
        assert_eq!(stream.dict.get(b"N").unwrap(), &Object::Integer(3));

        let unpacked = unpack_object_stream(&stream, &ParseOptions::default()).unwrap();
        assert_eq!(
            unpacked,
            vec![
                ((3, 0), Object::Integer(42)),
                ((5, 0), Object::Name(b"Widget".to_vec())),
                ((9, 0), Object::Array(vec![1.into(), 2.into()])),
            ]
        );
    }

    #[test]
    fn out_of_bounds_offsets_are_skipped() {
        let content = b"1 0 2 9999 null null".to_vec();
        let stream = Stream::new(
            dictionary! {
                "Type" => "ObjStm",
                "N" => 2,
                "First" => 11,
            },
            content,
        );
        let unpacked = unpack_object_stream(&stream, &ParseOptions::default()).unwrap();
        assert_eq!(unpacked, vec![((1, 0), Object::Null)]);
    }
}
