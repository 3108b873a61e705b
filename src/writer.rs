//! Serialization of a context back into document bytes.
//!
//! Two strategies share the same layout discipline: every indirect object
//! is serialized into its own buffer first, so all byte offsets are known
//! before anything is emitted and the cross-reference table or stream is
//! written in a single linear pass with no backpatching. The classic
//! strategy emits a flat cross-reference table; the compressed strategy
//! batches eligible objects into object streams and emits a binary
//! cross-reference stream instead.

use std::collections::BTreeMap;
use std::io::Write as IoWrite;

use crate::object::{Dictionary, Object, ObjectId, Stream, StringFormat};
use crate::object_stream::ObjectStreamBuilder;
use crate::xref::{self, XrefEntry};
use crate::{Context, Result};

/// Configuration for [`Context::save_to`].
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Pack eligible objects into object streams and write a
    /// cross-reference stream instead of a flat table.
    pub use_object_streams: bool,
    /// Batch size for object streams.
    pub objects_per_stream: usize,
    /// Deflate the object streams and cross-reference stream produced
    /// while saving.
    pub encode_streams: bool,
    /// Invoke the cooperative-yield callback after this many serialized
    /// objects. Zero never yields.
    pub objects_per_yield: usize,
}

impl Default for SaveOptions {
    fn default() -> SaveOptions {
        SaveOptions {
            use_object_streams: false,
            objects_per_stream: 50,
            encode_streams: true,
            objects_per_yield: 0,
        }
    }
}

struct Ticker<'a> {
    per_yield: usize,
    pending: usize,
    yield_now: &'a mut dyn FnMut(),
}

impl Ticker<'_> {
    fn tick(&mut self, count: usize) {
        if self.per_yield == 0 {
            return;
        }
        self.pending += count;
        while self.pending >= self.per_yield {
            (self.yield_now)();
            self.pending -= self.per_yield;
        }
    }
}

impl Context {
    /// Serialize the whole graph to `target` using the strategy selected in
    /// `options`.
    pub fn save_to<W: IoWrite>(&self, target: &mut W, options: &SaveOptions) -> Result<()> {
        self.save_to_with(target, options, &mut || {})
    }

    /// Like [`Context::save_to`], invoking `yield_now` at the configured
    /// granularity.
    pub fn save_to_with<W: IoWrite>(
        &self,
        target: &mut W,
        options: &SaveOptions,
        yield_now: &mut dyn FnMut(),
    ) -> Result<()> {
        let bytes = self.save_to_bytes_with(options, yield_now)?;
        target.write_all(&bytes)?;
        Ok(())
    }

    pub fn save_to_bytes(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        self.save_to_bytes_with(options, &mut || {})
    }

    fn save_to_bytes_with(
        &self,
        options: &SaveOptions,
        yield_now: &mut dyn FnMut(),
    ) -> Result<Vec<u8>> {
        let mut ticker = Ticker {
            per_yield: options.objects_per_yield,
            pending: 0,
            yield_now,
        };
        if options.use_object_streams {
            self.save_compressed(options, &mut ticker)
        } else {
            self.save_classic(&mut ticker)
        }
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut bytes = format!("%PDF-{}\n", self.version).into_bytes();
        if !self.binary_mark.is_empty() {
            bytes.push(b'%');
            bytes.extend_from_slice(&self.binary_mark);
            bytes.push(b'\n');
        }
        bytes
    }

    fn trailer_dict(&self, size: u32) -> Dictionary {
        let mut trailer = self.trailer.clone();
        trailer.set("Size", i64::from(size));
        trailer
    }

    fn save_classic(&self, ticker: &mut Ticker) -> Result<Vec<u8>> {
        let header = self.header_bytes();

        // Layout pass: every object into its own buffer, offsets accumulate.
        let mut entries: BTreeMap<u32, XrefEntry> = BTreeMap::new();
        entries.insert(0, XrefEntry::Free);
        let mut buffers: Vec<Vec<u8>> = Vec::new();
        let mut offset = header.len();
        for (id, object) in self.enumerate_indirect_objects() {
            let buffer = serialize_indirect(id, object)?;
            entries.insert(
                id.0,
                XrefEntry::Normal {
                    offset: offset as u64,
                    generation: id.1,
                },
            );
            offset += buffer.len();
            buffers.push(buffer);
            ticker.tick(1);
        }
        let xref_offset = offset;

        // Emission pass.
        let mut out = header;
        for buffer in buffers {
            out.extend_from_slice(&buffer);
        }
        write_classic_xref(&mut out, &entries);
        out.extend_from_slice(b"trailer\n");
        Writer::write_dictionary(&mut out, &self.trailer_dict(self.max_id() + 1))?;
        write!(out, "\nstartxref\n{}\n%%EOF", xref_offset)?;
        Ok(out)
    }

    fn save_compressed(&self, options: &SaveOptions, ticker: &mut Ticker) -> Result<Vec<u8>> {
        let header = self.header_bytes();
        let objects_per_stream = options.objects_per_stream.max(1);
        let encrypt_ref = self
            .trailer
            .get(b"Encrypt")
            .ok()
            .and_then(|value| value.as_reference().ok());

        // Placement pass: streams, opaque spans, the encryption dictionary
        // and non-zero generations stay inline; everything else is batched.
        let mut inline: Vec<(ObjectId, &Object)> = Vec::new();
        let mut chunks: Vec<Vec<(ObjectId, &Object)>> = Vec::new();
        for (id, object) in self.enumerate_indirect_objects() {
            let must_stay_inline = matches!(object, Object::Stream(_) | Object::Opaque(_))
                || id.1 != 0
                || Some(id) == encrypt_ref;
            if must_stay_inline {
                inline.push((id, object));
            } else {
                match chunks.last_mut() {
                    Some(chunk) if chunk.len() < objects_per_stream => chunk.push((id, object)),
                    _ => chunks.push(vec![(id, object)]),
                }
            }
        }

        // Container references come after the largest allocated number; the
        // cross-reference stream's own reference is reserved last.
        let mut next_number = self.max_id() + 1;
        let mut entries: BTreeMap<u32, XrefEntry> = BTreeMap::new();
        entries.insert(0, XrefEntry::Free);

        let mut container_numbers = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let container = next_number;
            next_number += 1;
            container_numbers.push(container);
            for (index, (id, _)) in chunk.iter().enumerate() {
                entries.insert(
                    id.0,
                    XrefEntry::Compressed {
                        container,
                        index: index as u16,
                    },
                );
            }
        }

        // Layout pass: inline objects, then the object streams.
        let mut buffers: Vec<Vec<u8>> = Vec::new();
        let mut offset = header.len();
        for (id, object) in inline {
            let buffer = serialize_indirect(id, object)?;
            entries.insert(
                id.0,
                XrefEntry::Normal {
                    offset: offset as u64,
                    generation: id.1,
                },
            );
            offset += buffer.len();
            buffers.push(buffer);
            ticker.tick(1);
        }
        for (chunk, &container) in chunks.iter().zip(&container_numbers) {
            let mut builder = ObjectStreamBuilder::new();
            for (id, object) in chunk {
                builder.add_object(id.0, object)?;
            }
            let stream = builder.build(options.encode_streams)?;
            let buffer = serialize_indirect((container, 0), &Object::Stream(stream))?;
            entries.insert(
                container,
                XrefEntry::Normal {
                    offset: offset as u64,
                    generation: 0,
                },
            );
            offset += buffer.len();
            buffers.push(buffer);
            ticker.tick(chunk.len());
        }

        // The cross-reference stream indexes itself, so its entry is added
        // after its offset is fixed and before its rows are encoded.
        let xref_number = next_number;
        next_number += 1;
        let xref_offset = offset;
        entries.insert(
            xref_number,
            XrefEntry::Normal {
                offset: xref_offset as u64,
                generation: 0,
            },
        );

        let (rows, w, index) = xref::encode_rows(&entries);
        let mut dict = Dictionary::new();
        dict.set("Type", "XRef");
        dict.set("Size", i64::from(next_number));
        dict.set("W", Object::Array(w));
        dict.set("Index", Object::Array(index));
        for key in [b"Root".as_slice(), b"Encrypt", b"Info", b"ID"] {
            if let Ok(value) = self.trailer.get(key) {
                dict.set(key, value.clone());
            }
        }
        let mut content = rows;
        if options.encode_streams {
            dict.set("Filter", "FlateDecode");
            content = crate::filters::flate_encode(&content)?;
        }
        let xref_stream = Stream::new(dict, content);
        let xref_buffer = serialize_indirect((xref_number, 0), &Object::Stream(xref_stream))?;

        // Emission pass.
        let mut out = header;
        for buffer in buffers {
            out.extend_from_slice(&buffer);
        }
        out.extend_from_slice(&xref_buffer);
        write!(out, "startxref\n{}\n%%EOF", xref_offset)?;
        Ok(out)
    }
}

fn serialize_indirect(id: ObjectId, object: &Object) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut digits = itoa::Buffer::new();
    buffer.extend_from_slice(digits.format(id.0).as_bytes());
    buffer.push(b' ');
    buffer.extend_from_slice(digits.format(id.1).as_bytes());
    buffer.extend_from_slice(b" obj");
    if Writer::need_separator(object) {
        buffer.push(b' ');
    }
    Writer::write_object(&mut buffer, object)?;
    if Writer::need_end_separator(object) {
        buffer.push(b' ');
    }
    buffer.extend_from_slice(b"endobj\n");
    Ok(buffer)
}

fn write_classic_xref(out: &mut Vec<u8>, entries: &BTreeMap<u32, XrefEntry>) {
    out.extend_from_slice(b"xref\n");

    let ids: Vec<u32> = entries.keys().copied().collect();
    let mut idx = 0;
    while idx < ids.len() {
        // One subsection per contiguous run of object numbers.
        let start = ids[idx];
        let mut run = 1;
        while idx + run < ids.len() && ids[idx + run] == start + run as u32 {
            run += 1;
        }
        let _ = writeln!(out, "{} {}", start, run);
        for &id in &ids[idx..idx + run] {
            match entries[&id] {
                XrefEntry::Free => {
                    let _ = writeln!(out, "{:>010} {:>05} f ", 0, 65535);
                }
                XrefEntry::Normal { offset, generation } => {
                    let _ = writeln!(out, "{:>010} {:>05} n ", offset, generation);
                }
                // Packed entries cannot appear in a flat table.
                XrefEntry::Compressed { .. } => {
                    let _ = writeln!(out, "{:>010} {:>05} f ", 0, 65535);
                }
            }
        }
        idx += run;
    }
}

pub struct Writer;

impl Writer {
    fn need_separator(object: &Object) -> bool {
        matches!(
            object,
            Object::Null
                | Object::Boolean(_)
                | Object::Integer(_)
                | Object::Real(_)
                | Object::Reference(_)
                | Object::Opaque(_)
        )
    }

    fn need_end_separator(object: &Object) -> bool {
        matches!(
            object,
            Object::Null
                | Object::Boolean(_)
                | Object::Integer(_)
                | Object::Real(_)
                | Object::Name(_)
                | Object::Reference(_)
                | Object::Stream(_)
                | Object::Opaque(_)
        )
    }

    pub fn write_object(out: &mut Vec<u8>, object: &Object) -> Result<()> {
        match object {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(true) => out.extend_from_slice(b"true"),
            Object::Boolean(false) => out.extend_from_slice(b"false"),
            Object::Integer(value) => {
                let mut digits = itoa::Buffer::new();
                out.extend_from_slice(digits.format(*value).as_bytes());
            }
            Object::Real(value) => out.extend_from_slice(format_real(*value).as_bytes()),
            Object::Name(name) => Writer::write_name(out, name),
            Object::String(text, format) => Writer::write_string(out, text, format),
            Object::Array(array) => Writer::write_array(out, array)?,
            Object::Dictionary(dict) => Writer::write_dictionary(out, dict)?,
            Object::Stream(stream) => Writer::write_stream(out, stream)?,
            Object::Reference(id) => {
                let mut digits = itoa::Buffer::new();
                out.extend_from_slice(digits.format(id.0).as_bytes());
                out.push(b' ');
                out.extend_from_slice(digits.format(id.1).as_bytes());
                out.extend_from_slice(b" R");
            }
            // Recovered spans are replayed verbatim.
            Object::Opaque(bytes) => out.extend_from_slice(bytes),
        }
        Ok(())
    }

    fn write_name(out: &mut Vec<u8>, name: &[u8]) {
        out.push(b'/');
        for &byte in name {
            // Whitespace, delimiters, '#' itself and bytes outside of the
            // printable range are written as #XX sequences.
            if b" \t\n\r\0\x0C()<>[]{}/%#".contains(&byte) || !(33..=126).contains(&byte) {
                let _ = write!(out, "#{:02X}", byte);
            } else {
                out.push(byte);
            }
        }
    }

    fn write_string(out: &mut Vec<u8>, text: &[u8], format: &StringFormat) {
        match format {
            // Within a literal string, backslashes, carriage returns and
            // unbalanced parentheses are escaped; balanced parentheses are
            // written as they are.
            StringFormat::Literal => {
                let mut escape_indices = Vec::new();
                let mut open_parens = Vec::new();
                for (index, &byte) in text.iter().enumerate() {
                    match byte {
                        b'(' => open_parens.push(index),
                        b')' => {
                            if open_parens.pop().is_none() {
                                escape_indices.push(index);
                            }
                        }
                        b'\\' | b'\r' => escape_indices.push(index),
                        _ => {}
                    }
                }
                escape_indices.append(&mut open_parens);

                out.push(b'(');
                if escape_indices.is_empty() {
                    out.extend_from_slice(text);
                } else {
                    for (index, &byte) in text.iter().enumerate() {
                        if escape_indices.contains(&index) {
                            out.push(b'\\');
                            out.push(if byte == b'\r' { b'r' } else { byte });
                        } else {
                            out.push(byte);
                        }
                    }
                }
                out.push(b')');
            }
            StringFormat::Hexadecimal => {
                out.push(b'<');
                for &byte in text {
                    let _ = write!(out, "{:02X}", byte);
                }
                out.push(b'>');
            }
        }
    }

    fn write_array(out: &mut Vec<u8>, array: &[Object]) -> Result<()> {
        out.push(b'[');
        let mut first = true;
        for object in array {
            if first {
                first = false;
            } else if Writer::need_separator(object) {
                out.push(b' ');
            }
            Writer::write_object(out, object)?;
        }
        out.push(b']');
        Ok(())
    }

    pub fn write_dictionary(out: &mut Vec<u8>, dictionary: &Dictionary) -> Result<()> {
        out.extend_from_slice(b"<<");
        for (key, value) in dictionary {
            Writer::write_name(out, key);
            if Writer::need_separator(value) {
                out.push(b' ');
            }
            Writer::write_object(out, value)?;
        }
        out.extend_from_slice(b">>");
        Ok(())
    }

    fn write_stream(out: &mut Vec<u8>, stream: &Stream) -> Result<()> {
        Writer::write_dictionary(out, &stream.dict)?;
        out.extend_from_slice(b"stream\n");
        out.extend_from_slice(&stream.content);
        out.extend_from_slice(b"\nendstream");
        Ok(())
    }
}

/// Minimal non-exponential spelling that still reads back as a real.
fn format_real(value: f64) -> String {
    let text = format!("{}", value);
    if text.contains('e') || text.contains('E') {
        let mut fixed = format!("{:.12}", value);
        while fixed.ends_with('0') {
            fixed.pop();
        }
        return fixed;
    }
    if text.contains('.') {
        text
    } else {
        format!("{}.", text)
    }
}
