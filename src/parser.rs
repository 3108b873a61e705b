//! Recursive-descent reader for whole documents.
//!
//! The document grammar is applied section by section: header, runs of
//! indirect objects, an optional classic cross-reference table, an optional
//! trailer dictionary, and the `startxref` pointer, repeated across
//! incremental updates until the input is exhausted. The reader is built to
//! survive truncated, reordered and outright broken input: object streams
//! and cross-reference streams are expanded in place, unparsable indirect
//! objects can be replaced by opaque placeholders, and filler bytes between
//! sections are skipped. The object graph is reconstructed by scanning all
//! indirect objects directly, so stale cross-reference data never misleads
//! it.

use log::{debug, warn};

use crate::cursor::ByteCursor;
use crate::object::{DictClass, Dictionary, Object, ObjectId, Stream, StringFormat};
use crate::xref::XrefEntry;
use crate::{object_stream, xref, Context, Error, Result};

/// Configuration for [`parse_document`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Invoke the cooperative-yield callback after this many parsed
    /// objects. Zero never yields.
    pub objects_per_yield: usize,
    /// Clamp integers that overflow `i64` instead of degrading them to the
    /// nearest real. Both paths emit a warning.
    pub cap_numbers: bool,
    /// Fail on the first indirect object that cannot be parsed instead of
    /// substituting an opaque placeholder.
    pub fail_on_invalid_objects: bool,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            objects_per_yield: 0,
            cap_numbers: false,
            fail_on_invalid_objects: false,
        }
    }
}

/// Parse a complete document into a fresh [`Context`].
pub fn parse_document(bytes: &[u8], options: &ParseOptions) -> Result<Context> {
    parse_document_with(bytes, options, &mut || {})
}

/// Like [`parse_document`], invoking `yield_now` at the configured
/// granularity so a host event loop can interleave other work during very
/// large parses. Parsing stays single-threaded and in order.
pub fn parse_document_with(
    bytes: &[u8],
    options: &ParseOptions,
    yield_now: &mut dyn FnMut(),
) -> Result<Context> {
    DocumentParser {
        cursor: ByteCursor::new(bytes),
        context: Context::new(),
        options,
        parsed_objects: 0,
        yield_now,
    }
    .parse()
}

/// Parse one object value from a standalone byte buffer.
pub fn parse_single_object(bytes: &[u8], options: &ParseOptions) -> Result<Object> {
    let mut cursor = ByteCursor::new(bytes);
    parse_object(&mut cursor, options)
}

#[inline]
fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\0' | b'\x0C')
}

#[inline]
fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

#[inline]
fn is_numeric_start(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.')
}

pub(crate) fn skip_whitespace(cursor: &mut ByteCursor) {
    while cursor.peek().is_some_and(is_whitespace) {
        cursor.next();
    }
}

fn skip_comment(cursor: &mut ByteCursor) -> bool {
    if cursor.peek() != Some(b'%') {
        return false;
    }
    while let Some(byte) = cursor.peek() {
        if byte == b'\n' || byte == b'\r' {
            break;
        }
        cursor.next();
    }
    true
}

pub(crate) fn skip_whitespace_and_comments(cursor: &mut ByteCursor) {
    skip_whitespace(cursor);
    while skip_comment(cursor) {
        skip_whitespace(cursor);
    }
}

/// Consume `keyword` if it is next, rewinding and reporting `false` if not.
pub(crate) fn match_keyword(cursor: &mut ByteCursor, keyword: &[u8]) -> bool {
    let initial = cursor.offset();
    for &expected in keyword {
        if cursor.next() != Some(expected) {
            cursor.move_to(initial);
            return false;
        }
    }
    true
}

/// Read a run of decimal digits as a non-negative integer.
pub(crate) fn parse_raw_int(cursor: &mut ByteCursor) -> Result<i64> {
    let pos = cursor.position();
    let mut text = String::new();
    while let Some(byte) = cursor.peek() {
        if !byte.is_ascii_digit() {
            break;
        }
        text.push(byte as char);
        cursor.next();
    }
    text.parse::<i64>()
        .map_err(|_| Error::InvalidNumber { pos, text })
}

/// Read a number token. Returns the parsed object and whether a decimal
/// point was consumed; oversized integers are warned about and either
/// clamped or degraded to a real, depending on `cap_numbers`.
fn parse_raw_number(cursor: &mut ByteCursor, options: &ParseOptions) -> Result<(Object, bool)> {
    let pos = cursor.position();
    let mut text = String::new();
    let mut saw_period = false;

    // Leading sign / integer part; a period ends this phase.
    while let Some(byte) = cursor.peek() {
        if !is_numeric_start(byte) {
            break;
        }
        text.push(byte as char);
        cursor.next();
        if byte == b'.' {
            saw_period = true;
            break;
        }
    }
    // Fraction digits.
    if saw_period {
        while let Some(byte) = cursor.peek() {
            if !byte.is_ascii_digit() {
                break;
            }
            text.push(byte as char);
            cursor.next();
        }
    }

    if saw_period {
        let value = text.parse::<f64>().map_err(|_| Error::InvalidNumber {
            pos,
            text: text.clone(),
        })?;
        return Ok((Object::Real(value), true));
    }

    if let Ok(value) = text.parse::<i64>() {
        return Ok((Object::Integer(value), false));
    }

    // Too large for i64: keep going, but never silently corrupt.
    let value = text.parse::<f64>().map_err(|_| Error::InvalidNumber {
        pos,
        text: text.clone(),
    })?;
    if !value.is_finite() {
        return Err(Error::InvalidNumber { pos, text });
    }
    if options.cap_numbers {
        warn!("number {} is too large for some readers, clamping", text);
        Ok((Object::Integer(i64::MAX), false))
    } else {
        warn!("number {} is too large for some readers, not clamping", text);
        Ok((Object::Real(value), false))
    }
}

/// Disambiguate a bare number from an `<obj> <gen> R` reference with
/// two-token lookahead. Any failure rewinds to just past the first number.
/// A number containing a decimal point never starts a reference.
fn parse_number_or_reference(cursor: &mut ByteCursor, options: &ParseOptions) -> Result<Object> {
    let (first, saw_period) = parse_raw_number(cursor, options)?;
    skip_whitespace_and_comments(cursor);

    let lookahead = cursor.offset();
    if !saw_period && cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
        if let Some(reference) = try_reference_tail(cursor, &first, options) {
            return Ok(reference);
        }
        cursor.move_to(lookahead);
    }
    Ok(first)
}

fn try_reference_tail(
    cursor: &mut ByteCursor,
    first: &Object,
    options: &ParseOptions,
) -> Option<Object> {
    let object_number = u32::try_from(first.as_i64().ok()?).ok()?;
    let (second, saw_period) = parse_raw_number(cursor, options).ok()?;
    if saw_period {
        return None;
    }
    let generation = u16::try_from(second.as_i64().ok()?).ok()?;
    skip_whitespace_and_comments(cursor);
    if cursor.peek() != Some(b'R') {
        return None;
    }
    cursor.next();
    Some(Object::Reference((object_number, generation)))
}

fn parse_hex_string(cursor: &mut ByteCursor) -> Result<Object> {
    cursor.assert_next(b'<')?;
    let mut bytes = Vec::new();
    let mut pending: Option<u8> = None;

    loop {
        match cursor.peek() {
            None => {
                return Err(Error::UnexpectedByte {
                    pos: cursor.position(),
                    expected: b'>',
                    found: None,
                })
            }
            Some(b'>') => break,
            Some(byte) if is_whitespace(byte) => {
                cursor.next();
            }
            Some(byte) => {
                let nibble = hex_value(byte).ok_or(Error::ObjectParse {
                    pos: cursor.position(),
                    byte: Some(byte),
                })?;
                cursor.next();
                match pending.take() {
                    Some(high) => bytes.push((high << 4) | nibble),
                    None => pending = Some(nibble),
                }
            }
        }
    }
    cursor.assert_next(b'>')?;

    // An odd digit count is padded with a zero nibble.
    if let Some(high) = pending {
        bytes.push(high << 4);
    }
    Ok(Object::String(bytes, StringFormat::Hexadecimal))
}

fn parse_literal_string(cursor: &mut ByteCursor) -> Result<Object> {
    let start_pos = cursor.position();
    cursor.assert_next(b'(')?;

    let mut depth = 1usize;
    let mut bytes = Vec::new();
    loop {
        let Some(byte) = cursor.next() else {
            return Err(Error::UnbalancedString { pos: start_pos });
        };
        match byte {
            b'\\' => {
                let Some(escaped) = cursor.next() else {
                    return Err(Error::UnbalancedString { pos: start_pos });
                };
                match escaped {
                    b'n' => bytes.push(b'\n'),
                    b'r' => bytes.push(b'\r'),
                    b't' => bytes.push(b'\t'),
                    b'b' => bytes.push(b'\x08'),
                    b'f' => bytes.push(b'\x0C'),
                    b'0'..=b'7' => {
                        // Up to three octal digits; overflow wraps.
                        let mut value = u16::from(escaped - b'0');
                        for _ in 0..2 {
                            match cursor.peek() {
                                Some(digit @ b'0'..=b'7') => {
                                    value = value * 8 + u16::from(digit - b'0');
                                    cursor.next();
                                }
                                _ => break,
                            }
                        }
                        bytes.push(value as u8);
                    }
                    // A backslash before an end of line continues the string.
                    b'\r' => {
                        if cursor.peek() == Some(b'\n') {
                            cursor.next();
                        }
                    }
                    b'\n' => {}
                    other => bytes.push(other),
                }
            }
            b'(' => {
                depth += 1;
                bytes.push(b'(');
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                bytes.push(b')');
            }
            // Any unescaped end of line reads as a line feed.
            b'\r' => {
                if cursor.peek() == Some(b'\n') {
                    cursor.next();
                }
                bytes.push(b'\n');
            }
            other => bytes.push(other),
        }
    }
    Ok(Object::String(bytes, StringFormat::Literal))
}

fn parse_name(cursor: &mut ByteCursor) -> Result<Vec<u8>> {
    cursor.assert_next(b'/')?;
    let mut name = Vec::new();
    while let Some(byte) = cursor.peek() {
        if is_whitespace(byte) || is_delimiter(byte) {
            break;
        }
        if byte == b'#' {
            let high = cursor.peek_ahead(1).and_then(hex_value);
            let low = cursor.peek_ahead(2).and_then(hex_value);
            if let (Some(high), Some(low)) = (high, low) {
                cursor.next();
                cursor.next();
                cursor.next();
                name.push((high << 4) | low);
                continue;
            }
        }
        name.push(byte);
        cursor.next();
    }
    Ok(name)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn parse_array(cursor: &mut ByteCursor, options: &ParseOptions) -> Result<Object> {
    cursor.assert_next(b'[')?;
    skip_whitespace_and_comments(cursor);

    let mut array = Vec::new();
    while cursor.peek() != Some(b']') {
        if cursor.done() {
            return Err(Error::UnexpectedByte {
                pos: cursor.position(),
                expected: b']',
                found: None,
            });
        }
        array.push(parse_object(cursor, options)?);
        skip_whitespace_and_comments(cursor);
    }
    cursor.assert_next(b']')?;
    Ok(Object::Array(array))
}

fn parse_dict(cursor: &mut ByteCursor, options: &ParseOptions) -> Result<Dictionary> {
    cursor.assert_next(b'<')?;
    cursor.assert_next(b'<')?;
    skip_whitespace_and_comments(cursor);

    let mut dict = Dictionary::new();
    while !cursor.done() && !(cursor.peek() == Some(b'>') && cursor.peek_ahead(1) == Some(b'>')) {
        let key = parse_name(cursor)?;
        let value = parse_object(cursor, options)?;
        dict.set(key, value);
        skip_whitespace_and_comments(cursor);
    }
    cursor.assert_next(b'>')?;
    cursor.assert_next(b'>')?;
    Ok(dict)
}

/// Consume the `stream` keyword and the end-of-line marker that may follow
/// it, in any of its observed spellings.
fn match_stream_keyword(cursor: &mut ByteCursor) -> bool {
    if !match_keyword(cursor, b"stream") {
        return false;
    }
    if cursor.peek() == Some(b' ')
        && cursor.peek_ahead(1) == Some(b'\r')
        && cursor.peek_ahead(2) == Some(b'\n')
    {
        cursor.next();
        cursor.next();
        cursor.next();
    } else if cursor.peek() == Some(b'\r') && cursor.peek_ahead(1) == Some(b'\n') {
        cursor.next();
        cursor.next();
    } else if cursor.peek() == Some(b'\r') || cursor.peek() == Some(b'\n') {
        cursor.next();
    }
    true
}

fn match_endstream_with_eol(cursor: &mut ByteCursor) -> bool {
    match_keyword(cursor, b"\r\nendstream")
        || match_keyword(cursor, b"\rendstream")
        || match_keyword(cursor, b"\nendstream")
}

/// Scan forward for the end of a stream whose declared length is wrong or
/// absent, keeping count of nested `stream`/`endstream` keywords.
fn scan_stream_end(cursor: &mut ByteCursor, start_pos: crate::Position) -> Result<usize> {
    let mut nesting = 1usize;
    let mut end;

    while !cursor.done() {
        end = cursor.offset();
        if match_keyword(cursor, b"stream") {
            nesting += 1;
        } else if match_endstream_with_eol(cursor) || match_keyword(cursor, b"endstream") {
            nesting -= 1;
        } else {
            cursor.next();
        }
        if nesting == 0 {
            return Ok(end);
        }
    }
    Err(Error::StreamExtent { pos: start_pos })
}

fn parse_dict_or_stream(cursor: &mut ByteCursor, options: &ParseOptions) -> Result<Object> {
    let start_pos = cursor.position();
    let dict = parse_dict(cursor, options)?;
    skip_whitespace_and_comments(cursor);

    if !match_stream_keyword(cursor) {
        return Ok(Object::Dictionary(dict));
    }

    let start = cursor.offset();
    let end = match dict.get(b"Length") {
        // Only a direct length can be trusted before the graph exists; it
        // still has to be confirmed by the closing keyword.
        Ok(&Object::Integer(length)) if length >= 0 => {
            let declared_end = start.saturating_add(length as usize);
            cursor.move_to(declared_end);
            skip_whitespace_and_comments(cursor);
            if match_keyword(cursor, b"endstream") {
                declared_end
            } else {
                debug!(
                    "declared stream length {} not confirmed by endstream, rescanning",
                    length
                );
                cursor.move_to(start);
                scan_stream_end(cursor, start_pos)?
            }
        }
        _ => scan_stream_end(cursor, start_pos)?,
    };

    let content = cursor.slice(start, end).to_vec();
    Ok(Object::Stream(
        Stream::new(dict, content).with_position(start),
    ))
}

/// Parse one object value, dispatching on the lookahead byte.
pub(crate) fn parse_object(cursor: &mut ByteCursor, options: &ParseOptions) -> Result<Object> {
    skip_whitespace_and_comments(cursor);

    if match_keyword(cursor, b"true") {
        return Ok(Object::Boolean(true));
    }
    if match_keyword(cursor, b"false") {
        return Ok(Object::Boolean(false));
    }
    if match_keyword(cursor, b"null") {
        return Ok(Object::Null);
    }

    match cursor.peek() {
        Some(b'<') if cursor.peek_ahead(1) == Some(b'<') => parse_dict_or_stream(cursor, options),
        Some(b'<') => parse_hex_string(cursor),
        Some(b'(') => parse_literal_string(cursor),
        Some(b'/') => parse_name(cursor).map(Object::Name),
        Some(b'[') => parse_array(cursor, options),
        Some(byte) if is_numeric_start(byte) => parse_number_or_reference(cursor, options),
        byte => Err(Error::ObjectParse {
            pos: cursor.position(),
            byte,
        }),
    }
}

/// Parse `<num> <gen> obj`.
pub(crate) fn parse_indirect_header(cursor: &mut ByteCursor) -> Result<ObjectId> {
    skip_whitespace_and_comments(cursor);
    let pos = cursor.position();
    let object_number = parse_raw_int(cursor)?;

    skip_whitespace_and_comments(cursor);
    let generation_number = parse_raw_int(cursor)?;

    skip_whitespace_and_comments(cursor);
    if !match_keyword(cursor, b"obj") {
        return Err(Error::MissingKeyword {
            pos: cursor.position(),
            keyword: "obj",
        });
    }

    let object_number = u32::try_from(object_number).map_err(|_| Error::InvalidNumber {
        pos,
        text: object_number.to_string(),
    })?;
    let generation_number = u16::try_from(generation_number).map_err(|_| Error::InvalidNumber {
        pos,
        text: generation_number.to_string(),
    })?;
    Ok((object_number, generation_number))
}

/// Report whether an indirect-object header starts here, without consuming
/// anything.
fn match_indirect_header(cursor: &mut ByteCursor) -> bool {
    let initial = cursor.offset();
    let matched = parse_indirect_header(cursor).is_ok();
    cursor.move_to(initial);
    matched
}

/// Some broken files contain filler between indirect objects. Skip forward
/// until the next recognized keyword or indirect-object header.
fn skip_filler(cursor: &mut ByteCursor) {
    skip_whitespace_and_comments(cursor);
    while let Some(byte) = cursor.peek() {
        if (b' '..=b'~').contains(&byte) {
            let initial = cursor.offset();
            if match_keyword(cursor, b"xref")
                || match_keyword(cursor, b"trailer")
                || match_keyword(cursor, b"startxref")
                || match_indirect_header(cursor)
            {
                cursor.move_to(initial);
                return;
            }
        }
        cursor.next();
    }
}

struct DocumentParser<'a, 'b> {
    cursor: ByteCursor<'a>,
    context: Context,
    options: &'b ParseOptions,
    parsed_objects: usize,
    yield_now: &'b mut dyn FnMut(),
}

impl DocumentParser<'_, '_> {
    fn parse(mut self) -> Result<Context> {
        self.parse_header()?;

        let mut prev_offset = None;
        while !self.cursor.done() {
            self.parse_document_section()?;
            let offset = self.cursor.offset();
            if prev_offset == Some(offset) {
                return Err(Error::Stalled {
                    pos: self.cursor.position(),
                });
            }
            prev_offset = Some(offset);
        }

        self.recover_root();

        if self.context.has_object((0, 0)) {
            warn!("removing parsed object 0 0 R");
            self.context.delete((0, 0));
        }

        Ok(self.context)
    }

    fn tick(&mut self, count: usize) {
        self.parsed_objects += count;
        let per_yield = self.options.objects_per_yield;
        if per_yield > 0 && self.parsed_objects % per_yield == 0 {
            (self.yield_now)();
        }
    }

    fn parse_header(&mut self) -> Result<()> {
        loop {
            if self.cursor.done() {
                return Err(Error::MissingHeader);
            }
            if match_keyword(&mut self.cursor, b"%PDF-") {
                break;
            }
            self.cursor.next();
        }

        let major = parse_raw_int(&mut self.cursor)?;
        self.cursor.assert_next(b'.')?;
        let minor = parse_raw_int(&mut self.cursor)?;
        self.context.version = format!("{}.{}", major, minor);

        self.skip_binary_comment();
        Ok(())
    }

    /// The header may be followed by a comment of bytes at or above 128
    /// marking the file as binary. Keep it for round-trips when it looks
    /// like one; otherwise nudge the cursor forward until an
    /// indirect-object header parses.
    fn skip_binary_comment(&mut self) {
        skip_whitespace(&mut self.cursor);
        if self.cursor.peek() == Some(b'%') {
            let comment_start = self.cursor.offset();
            self.cursor.next();
            let mark_start = self.cursor.offset();
            while let Some(byte) = self.cursor.peek() {
                if byte == b'\r' || byte == b'\n' {
                    break;
                }
                self.cursor.next();
            }
            let mark = self.cursor.slice(mark_start, self.cursor.offset());
            if !mark.is_empty() && mark.iter().all(|&byte| byte >= 128) {
                self.context.binary_mark = mark.to_vec();
            } else {
                self.cursor.move_to(comment_start);
            }
        }

        skip_whitespace_and_comments(&mut self.cursor);
        if !match_indirect_header(&mut self.cursor) && !self.cursor.done() {
            self.cursor.next();
            skip_whitespace_and_comments(&mut self.cursor);
        }
    }

    fn parse_document_section(&mut self) -> Result<()> {
        self.parse_indirect_objects()?;
        self.maybe_parse_xref_section()?;
        self.maybe_parse_trailer_dict()?;
        self.maybe_parse_trailer_pointer()?;
        skip_filler(&mut self.cursor);
        Ok(())
    }

    fn parse_indirect_objects(&mut self) -> Result<()> {
        skip_whitespace_and_comments(&mut self.cursor);

        while self.cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
            let initial = self.cursor.offset();
            if let Err(err) = self.parse_indirect_object() {
                self.cursor.move_to(initial);
                self.recover_invalid_object(err)?;
            }
            self.tick(1);
            skip_whitespace_and_comments(&mut self.cursor);
            skip_filler(&mut self.cursor);
        }
        Ok(())
    }

    fn parse_indirect_object(&mut self) -> Result<()> {
        let id = parse_indirect_header(&mut self.cursor)?;

        skip_whitespace_and_comments(&mut self.cursor);
        let object = parse_object(&mut self.cursor, self.options)?;

        skip_whitespace_and_comments(&mut self.cursor);
        if !match_keyword(&mut self.cursor, b"endobj") {
            debug!("missing endobj after {} {} R", id.0, id.1);
        }

        match object {
            // Packed containers dissolve into the graph instead of being
            // stored as stream values.
            Object::Stream(stream) if stream.dict.classify() == DictClass::ObjectStream => {
                let unpacked = object_stream::unpack_object_stream(&stream, self.options)?;
                for (packed_id, packed_object) in unpacked {
                    self.context.assign(packed_id, packed_object);
                    self.tick(1);
                }
            }
            Object::Stream(stream) if stream.dict.classify() == DictClass::XrefStream => {
                xref::decode_xref_stream(&stream, &mut self.context)?;
            }
            object => self.context.assign(id, object),
        }
        Ok(())
    }

    /// Wrap an unparsable indirect object in an opaque placeholder by
    /// scanning forward to its closing keyword, unless strict parsing was
    /// requested.
    fn recover_invalid_object(&mut self, original: Error) -> Result<()> {
        if self.options.fail_on_invalid_objects {
            return Err(original);
        }
        let start_pos = self.cursor.position();
        warn!("recovering invalid object at {}: {}", start_pos, original);

        let id = parse_indirect_header(&mut self.cursor)?;
        skip_whitespace_and_comments(&mut self.cursor);
        let start = self.cursor.offset();

        let mut found = false;
        while !self.cursor.done() {
            if match_keyword(&mut self.cursor, b"endobj") {
                found = true;
                break;
            }
            self.cursor.next();
        }
        if !found {
            return Err(Error::InvalidObject { pos: start_pos });
        }

        let end = self.cursor.offset() - b"endobj".len();
        let span = self.cursor.slice(start, end).to_vec();
        self.context.assign(id, Object::Opaque(span));
        Ok(())
    }

    /// Classic cross-reference table. The recovered entries are advisory;
    /// the graph is already derived from the objects themselves.
    fn maybe_parse_xref_section(&mut self) -> Result<()> {
        skip_whitespace_and_comments(&mut self.cursor);
        if !match_keyword(&mut self.cursor, b"xref") {
            return Ok(());
        }
        skip_whitespace_and_comments(&mut self.cursor);

        let mut object_number: u32 = 0;
        while self.cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
            let first = parse_raw_int(&mut self.cursor)?;
            skip_whitespace_and_comments(&mut self.cursor);
            let second = parse_raw_int(&mut self.cursor)?;
            skip_whitespace_and_comments(&mut self.cursor);

            match self.cursor.peek() {
                Some(kind @ (b'n' | b'f')) => {
                    self.cursor.next();
                    let entry = if kind == b'n' {
                        XrefEntry::Normal {
                            offset: first as u64,
                            generation: second as u16,
                        }
                    } else {
                        XrefEntry::Free
                    };
                    self.context.reference_table.insert(object_number, entry);
                    object_number = object_number.saturating_add(1);
                }
                // `<start> <count>` subsection header.
                _ => object_number = first as u32,
            }
            skip_whitespace_and_comments(&mut self.cursor);
        }
        Ok(())
    }

    /// Trailer dictionaries layer across incremental updates: a newer
    /// revision's entries win, older values fill the gaps.
    fn maybe_parse_trailer_dict(&mut self) -> Result<()> {
        skip_whitespace_and_comments(&mut self.cursor);
        if !match_keyword(&mut self.cursor, b"trailer") {
            return Ok(());
        }
        skip_whitespace_and_comments(&mut self.cursor);

        let dict = parse_dict(&mut self.cursor, self.options)?;
        for key in [b"Root".as_slice(), b"Encrypt", b"Info", b"ID"] {
            if let Ok(value) = dict.get(key) {
                self.context.trailer.set(key, value.clone());
            }
        }
        Ok(())
    }

    fn maybe_parse_trailer_pointer(&mut self) -> Result<()> {
        skip_whitespace_and_comments(&mut self.cursor);
        if !match_keyword(&mut self.cursor, b"startxref") {
            return Ok(());
        }
        skip_whitespace_and_comments(&mut self.cursor);

        let offset = parse_raw_int(&mut self.cursor)?;
        self.context.xref_start = Some(offset as usize);

        skip_whitespace(&mut self.cursor);
        match_keyword(&mut self.cursor, b"%%EOF");
        skip_whitespace_and_comments(&mut self.cursor);
        match_keyword(&mut self.cursor, b"%%EOF");
        skip_whitespace_and_comments(&mut self.cursor);
        Ok(())
    }

    /// If the trailer's `Root` does not resolve to a catalog dictionary,
    /// adopt the last catalog found among the indirect objects.
    fn recover_root(&mut self) {
        let is_catalog = |object: &Object| {
            matches!(object, Object::Dictionary(dict) if dict.classify() == DictClass::Catalog)
        };

        let root_is_valid = self
            .context
            .trailer
            .get(b"Root")
            .ok()
            .and_then(|root| self.context.resolve(root))
            .map(is_catalog)
            .unwrap_or(false);
        if root_is_valid {
            return;
        }

        let candidate = self
            .context
            .enumerate_indirect_objects()
            .filter(|(_, object)| is_catalog(object))
            .map(|(id, _)| id)
            .last();
        if let Some(id) = candidate {
            warn!("recovered document root: {} {} R", id.0, id.1);
            self.context.trailer.set("Root", Object::Reference(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Object {
        parse_single_object(bytes, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn bare_reference_in_value_position() {
        assert_eq!(parse(b"12 0 R"), Object::Reference((12, 0)));
    }

    #[test]
    fn two_integers_without_keyword_stay_numbers() {
        let mut cursor = ByteCursor::new(b"12 0 obj");
        let options = ParseOptions::default();
        assert_eq!(parse_object(&mut cursor, &options).unwrap(), Object::Integer(12));
        assert_eq!(parse_object(&mut cursor, &options).unwrap(), Object::Integer(0));
    }

    #[test]
    fn decimal_point_never_starts_a_reference() {
        let mut cursor = ByteCursor::new(b"12.5 0 R");
        let options = ParseOptions::default();
        assert_eq!(parse_object(&mut cursor, &options).unwrap(), Object::Real(12.5));
        // The lookahead was never taken; the next token is the 0.
        assert_eq!(parse_object(&mut cursor, &options).unwrap(), Object::Integer(0));
    }

    #[test]
    fn reals_parse_in_all_spellings() {
        assert_eq!(parse(b"0.12"), Object::Real(0.12));
        assert_eq!(parse(b"-.12"), Object::Real(-0.12));
        assert_eq!(parse(b"10."), Object::Real(10.0));
        assert_eq!(parse(b"-5"), Object::Integer(-5));
    }

    #[test]
    fn literal_string_escapes() {
        assert_eq!(parse(b"()"), Object::string_literal(""));
        assert_eq!(parse(b"(text())"), Object::string_literal("text()"));
        assert_eq!(
            parse(b"(text\r\n\\\\(nested\\t\\b\\f))"),
            Object::string_literal(b"text\n\\(nested\t\x08\x0C)".to_vec())
        );
        assert_eq!(
            parse(b"(text\\0\\53\\053\\0053)"),
            Object::string_literal(b"text\0++\x053".to_vec())
        );
        assert_eq!(
            parse(b"(text line\\\n())"),
            Object::string_literal("text line()")
        );
    }

    #[test]
    fn unbalanced_string_is_positional_error() {
        let err = parse_single_object(b"(never closed", &ParseOptions::default());
        assert!(matches!(err, Err(Error::UnbalancedString { .. })));
    }

    #[test]
    fn names_decode_hex_escapes() {
        assert_eq!(parse(b"/ABC#5f"), Object::Name(b"ABC\x5F".to_vec()));
        assert_eq!(
            parse(b"/#cb#ce#cc#e5"),
            Object::Name(vec![0xCB, 0xCE, 0xCC, 0xE5])
        );
    }

    #[test]
    fn hex_strings_pad_odd_nibbles() {
        assert_eq!(parse(b"<901FA>"), Object::string_hex(vec![0x90, 0x1F, 0xA0]));
        assert_eq!(parse(b"<9 01F A>"), Object::string_hex(vec![0x90, 0x1F, 0xA0]));
    }

    #[test]
    fn arrays_and_dictionaries_nest() {
        let object = parse(b"<</Kids [1 0 R 2 0 R] /Count 2 /Box [0 0 612.0 792]>>");
        let dict = object.as_dict().unwrap();
        assert_eq!(
            dict.get(b"Kids").unwrap().as_array().unwrap()[1],
            Object::Reference((2, 0))
        );
        assert_eq!(dict.get(b"Count").unwrap(), &Object::Integer(2));
    }

    #[test]
    fn comments_are_whitespace() {
        assert_eq!(parse(b"% leading comment\n42"), Object::Integer(42));
    }

    #[test]
    fn oversized_numbers_warn_and_degrade_or_clamp() {
        let text = b"92233720368547758070"; // ten times i64::MAX, roughly
        let lenient = parse_single_object(text, &ParseOptions::default()).unwrap();
        assert!(matches!(lenient, Object::Real(v) if v > 9.2e18));

        let capping = ParseOptions {
            cap_numbers: true,
            ..ParseOptions::default()
        };
        assert_eq!(
            parse_single_object(text, &capping).unwrap(),
            Object::Integer(i64::MAX)
        );
    }

    #[test]
    fn stream_with_correct_length() {
        let bytes = b"<</Length 5>> stream\nHELLO\nendstream";
        let object = parse(bytes);
        let stream = object.as_stream().unwrap();
        assert_eq!(stream.content, b"HELLO");
    }

    #[test]
    fn stream_with_wrong_length_falls_back_to_scan() {
        let short = parse(b"<</Length 4>> stream\nHELLO\nendstream");
        let right = parse(b"<</Length 5>> stream\nHELLO\nendstream");
        assert_eq!(
            short.as_stream().unwrap().content,
            right.as_stream().unwrap().content
        );
    }

    #[test]
    fn stream_without_length_is_scanned() {
        let object = parse(b"<</Kind /Data>> stream\r\npayload bytes\r\nendstream");
        assert_eq!(object.as_stream().unwrap().content, b"payload bytes");
    }
}
