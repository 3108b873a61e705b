//! Cross-reference data: the classic table model and the binary
//! cross-reference stream format.
//!
//! Entries recovered while parsing are advisory; the object graph itself is
//! reconstructed by scanning indirect objects directly, which tolerates
//! stale or inconsistent tables in incrementally updated files.

use std::collections::BTreeMap;

use crate::object::{Object, Stream};
use crate::{Context, Error, Result};

#[derive(Debug, Clone, Default)]
pub struct Xref {
    pub entries: BTreeMap<u32, XrefEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// A freed or never-used object number.
    Free,
    /// An object written inline at a byte offset.
    Normal { offset: u64, generation: u16 },
    /// An object packed into an object stream, addressed by the hosting
    /// stream's object number and the index within it.
    Compressed { container: u32, index: u16 },
}

impl Xref {
    pub fn new() -> Xref {
        Xref {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    /// Later insertions win; sections are read oldest revision first.
    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Field widths of a binary cross-reference row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowLayout {
    pub kind: usize,
    pub second: usize,
    pub third: usize,
}

impl RowLayout {
    pub fn width(&self) -> usize {
        self.kind + self.second + self.third
    }
}

pub(crate) fn row_layout_from_dict(w: &[Object]) -> Result<RowLayout> {
    if w.len() < 3 {
        return Err(Error::PackedStream(format!(
            "W array has {} entries, expected 3",
            w.len()
        )));
    }
    let field = |obj: &Object| -> Result<usize> {
        let value = obj.as_i64()?;
        usize::try_from(value)
            .map_err(|_| Error::PackedStream(format!("negative W field {}", value)))
    };
    Ok(RowLayout {
        kind: field(&w[0])?,
        second: field(&w[1])?,
        third: field(&w[2])?,
    })
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Decode the fixed-width rows of a cross-reference stream into entries.
///
/// `index` holds `(first object number, count)` subsection pairs; rows are
/// consumed in order across all subsections. A zero-width type field
/// defaults every row to type 1, as the format prescribes.
pub(crate) fn decode_rows(
    data: &[u8],
    layout: RowLayout,
    index: &[(u32, u32)],
    out: &mut Xref,
) -> Result<()> {
    let width = layout.width();
    if width == 0 {
        return Err(Error::PackedStream("zero-width rows".to_string()));
    }

    let mut rows = data.chunks_exact(width);
    for &(start, count) in index {
        for id in start..start.saturating_add(count) {
            let row = rows.next().ok_or_else(|| {
                Error::PackedStream("truncated cross-reference rows".to_string())
            })?;
            let (kind_bytes, rest) = row.split_at(layout.kind);
            let (second_bytes, third_bytes) = rest.split_at(layout.second);

            let kind = if layout.kind == 0 { 1 } else { read_field(kind_bytes) };
            let second = read_field(second_bytes);
            let third = read_field(third_bytes);

            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::Normal {
                    offset: second,
                    generation: third as u16,
                },
                2 => XrefEntry::Compressed {
                    container: second as u32,
                    index: third as u16,
                },
                other => {
                    return Err(Error::PackedStream(format!(
                        "unknown cross-reference entry type {}",
                        other
                    )))
                }
            };
            out.insert(id, entry);
        }
    }
    Ok(())
}

/// Decode a cross-reference stream into the context: its binary rows feed
/// the advisory reference table, and its dictionary carries the trailer
/// metadata that classic files keep in a `trailer` section.
pub(crate) fn decode_xref_stream(stream: &Stream, context: &mut Context) -> Result<()> {
    let data = stream.decoded_content()?;

    let layout = row_layout_from_dict(stream.dict.get(b"W")?.as_array()?)?;
    let size = stream.dict.get(b"Size")?.as_i64()?;

    let index = match stream.dict.get(b"Index") {
        Ok(Object::Array(values)) => {
            let mut pairs = Vec::with_capacity(values.len() / 2);
            let mut values = values.iter();
            while let (Some(start), Some(count)) = (values.next(), values.next()) {
                pairs.push((start.as_i64()? as u32, count.as_i64()? as u32));
            }
            pairs
        }
        _ => vec![(0, size.max(0) as u32)],
    };

    decode_rows(data, layout, &index, &mut context.reference_table)?;

    for key in [b"Root".as_slice(), b"Encrypt", b"Info", b"ID"] {
        if let Ok(value) = stream.dict.get(key) {
            context.trailer.set(key, value.clone());
        }
    }
    Ok(())
}

fn bytes_needed(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Encode entries as binary rows, returning the row data plus the `W` and
/// `Index` arrays describing them. Entries are emitted in ascending object
/// number order; `Index` lists the contiguous runs.
pub(crate) fn encode_rows(entries: &BTreeMap<u32, XrefEntry>) -> (Vec<u8>, Vec<Object>, Vec<Object>) {
    let mut max_second = 0u64;
    let mut max_third = 0u64;
    for entry in entries.values() {
        match *entry {
            XrefEntry::Free => max_third = max_third.max(65535),
            XrefEntry::Normal { offset, generation } => {
                max_second = max_second.max(offset);
                max_third = max_third.max(u64::from(generation));
            }
            XrefEntry::Compressed { container, index } => {
                max_second = max_second.max(u64::from(container));
                max_third = max_third.max(u64::from(index));
            }
        }
    }
    let layout = RowLayout {
        kind: 1,
        second: bytes_needed(max_second),
        third: bytes_needed(max_third),
    };

    let write_field = |value: u64, width: usize, out: &mut Vec<u8>| {
        for shift in (0..width).rev() {
            out.push((value >> (shift * 8)) as u8);
        }
    };

    let mut rows = Vec::with_capacity(entries.len() * layout.width());
    let mut index: Vec<Object> = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut run_len = 0u32;
    let mut prev_id: Option<u32> = None;

    for (&id, entry) in entries {
        if prev_id.map(|p| p + 1) != Some(id) {
            if let Some(start) = run_start {
                index.push(Object::Integer(i64::from(start)));
                index.push(Object::Integer(i64::from(run_len)));
            }
            run_start = Some(id);
            run_len = 0;
        }
        run_len += 1;
        prev_id = Some(id);

        let (kind, second, third) = match *entry {
            XrefEntry::Free => (0u64, 0u64, 65535u64),
            XrefEntry::Normal { offset, generation } => (1, offset, u64::from(generation)),
            XrefEntry::Compressed { container, index } => {
                (2, u64::from(container), u64::from(index))
            }
        };
        write_field(kind, layout.kind, &mut rows);
        write_field(second, layout.second, &mut rows);
        write_field(third, layout.third, &mut rows);
    }
    if let Some(start) = run_start {
        index.push(Object::Integer(i64::from(start)));
        index.push(Object::Integer(i64::from(run_len)));
    }

    let w = vec![
        Object::Integer(layout.kind as i64),
        Object::Integer(layout.second as i64),
        Object::Integer(layout.third as i64),
    ];
    (rows, w, index)
}
