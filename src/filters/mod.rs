//! Stateless, composable byte-stream transforms.
//!
//! A stream's declared filter list (a single name or an array of names,
//! with matching per-filter parameter dictionaries) selects a chain of
//! decoders applied left to right, each consuming the output of the
//! previous stage.

use std::io::prelude::*;

use log::warn;

use crate::object::{Dictionary, Object, Stream};
use crate::{Error, Result};

mod png;

/// Run the filter chain declared by `stream.dict` over its raw payload.
///
/// A stream without a `Filter` entry decodes to a copy of its raw bytes.
/// An unrecognized filter name fails with [`Error::UnsupportedEncoding`].
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let filters = stream.filters()?;
    if filters.is_empty() {
        return Ok(stream.content.clone());
    }

    let parms = stream.dict.get(b"DecodeParms").ok();

    let mut data = stream.content.clone();
    for (index, filter) in filters.iter().enumerate() {
        data = decode(&data, filter, filter_parms(parms, index))?;
    }
    Ok(data)
}

/// Apply a single named decode transform.
pub fn decode(data: &[u8], filter: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    match filter {
        b"FlateDecode" => flate_decode(data, parms),
        b"LZWDecode" => lzw_decode(data, parms),
        b"ASCII85Decode" => ascii85_decode(data),
        b"ASCIIHexDecode" => asciihex_decode(data),
        b"RunLengthDecode" => runlength_decode(data),
        _ => Err(Error::UnsupportedEncoding(
            String::from_utf8_lossy(filter).into_owned(),
        )),
    }
}

/// Parameter dictionary for the filter at `index` in the chain. `DecodeParms`
/// may be a single dictionary, an array parallel to the filter array, or
/// absent; null slots count as absent.
fn filter_parms(parms: Option<&Object>, index: usize) -> Option<&Dictionary> {
    match parms? {
        Object::Dictionary(dict) if index == 0 => Some(dict),
        Object::Array(array) => array.get(index).and_then(|slot| slot.as_dict().ok()),
        _ => None,
    }
}

pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn flate_decode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;

    let mut output = Vec::with_capacity(data.len() * 2);
    if !data.is_empty() {
        let mut decoder = ZlibDecoder::new(data);
        // Keep whatever inflated cleanly; truncated streams are common in
        // damaged files.
        if let Err(err) = decoder.read_to_end(&mut output) {
            warn!("flate decode stopped early: {}", err);
        }
    }
    undo_predictor(output, parms)
}

fn lzw_decode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    use weezl::{decode::Decoder, BitOrder};

    let early_change = parms
        .and_then(|p| p.get(b"EarlyChange").ok())
        .and_then(|p| p.as_i64().ok())
        .map(|v| v != 0)
        .unwrap_or(true);

    let mut decoder = if early_change {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };

    let mut output = Vec::with_capacity(data.len() * 2);
    let result = decoder.into_vec(&mut output).decode(data);
    if let Err(err) = result.status {
        warn!("lzw decode stopped early: {}", err);
    }
    undo_predictor(output, parms)
}

/// Reverse the PNG row predictor declared in `DecodeParms` (predictor
/// values 10 through 15); any other predictor leaves the data untouched.
fn undo_predictor(data: Vec<u8>, parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let Some(parms) = parms else {
        return Ok(data);
    };

    let predictor = parms.get(b"Predictor").and_then(Object::as_i64).unwrap_or(1);
    if !(10..=15).contains(&predictor) {
        return Ok(data);
    }

    let columns = parms.get(b"Columns").and_then(Object::as_i64).unwrap_or(1) as usize;
    let colors = parms.get(b"Colors").and_then(Object::as_i64).unwrap_or(1) as usize;
    let bits = parms
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8) as usize;
    let bytes_per_pixel = (colors * bits).div_ceil(8);

    png::unfilter(&data, bytes_per_pixel, bytes_per_pixel * columns)
}

fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    // Optional <~ prefix; everything from ~ on is the end marker.
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut group = [0u8; 5];
    let mut filled = 0;
    let mut output = Vec::with_capacity(data.len() * 4 / 5);

    let push_group = |group: &[u8; 5], filled: usize, output: &mut Vec<u8>| {
        let mut value: u32 = 0;
        for idx in 0..5 {
            let digit = if idx < filled { group[idx] } else { b'u' };
            value = value.wrapping_mul(85).wrapping_add(u32::from(digit - b'!'));
        }
        output.extend_from_slice(&value.to_be_bytes()[..filled - 1]);
    };

    for &byte in data {
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' | b'\0' | b'\x0C' => continue,
            // A lone 'z' stands for four zero bytes.
            b'z' if filled == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = byte;
                filled += 1;
                if filled == 5 {
                    push_group(&group, 5, &mut output);
                    filled = 0;
                }
            }
            _ => {
                return Err(Error::Decode(format!(
                    "invalid byte {:#04x} in ASCII85 data",
                    byte
                )))
            }
        }
    }

    match filled {
        0 => {}
        1 => {
            return Err(Error::Decode(
                "truncated final ASCII85 group".to_string(),
            ))
        }
        _ => push_group(&group, filled, &mut output),
    }

    Ok(output)
}

fn asciihex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b'>' => break,
            b' ' | b'\t' | b'\n' | b'\r' | b'\0' | b'\x0C' => continue,
            _ => {
                return Err(Error::Decode(format!(
                    "invalid byte {:#04x} in ASCIIHex data",
                    byte
                )))
            }
        };

        match pending.take() {
            Some(high) => output.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }

    // Odd digit count: the last nibble is padded with zero.
    if let Some(high) = pending {
        output.push(high << 4);
    }

    Ok(output)
}

fn runlength_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut idx = 0;

    while idx < data.len() {
        let length = data[idx];
        idx += 1;

        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                // Tolerate truncation; emit what is there.
                let end = (idx + count).min(data.len());
                output.extend_from_slice(&data[idx..end]);
                idx += count;
            }
            129..=255 => {
                if idx < data.len() {
                    let count = 257 - length as usize;
                    let byte = data[idx];
                    idx += 1;
                    output.extend(std::iter::repeat(byte).take(count));
                }
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    #[test]
    fn asciihex_handles_whitespace_and_padding() {
        assert_eq!(asciihex_decode(b"901FA>").unwrap(), vec![0x90, 0x1F, 0xA0]);
        assert_eq!(asciihex_decode(b"9 01F A>").unwrap(), vec![0x90, 0x1F, 0xA0]);
        assert_eq!(asciihex_decode(b"48656C6C6F>").unwrap(), b"Hello".to_vec());
    }

    #[test]
    fn ascii85_round_trips_known_vectors() {
        assert_eq!(ascii85_decode(b"ARTY*~>").unwrap(), b"easy".to_vec());
        assert_eq!(ascii85_decode(b"<~ARTY*~>").unwrap(), b"easy".to_vec());
        // 'z' shorthand for a zero group.
        assert_eq!(ascii85_decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
        // Short final group.
        assert_eq!(ascii85_decode(b"9`~>").unwrap(), b"M".to_vec());
    }

    #[test]
    fn runlength_literal_and_repeat_runs() {
        // 2 -> copy 3 bytes, 254 -> repeat next byte 3 times, 128 -> EOD.
        let encoded = [2, b'a', b'b', b'c', 254, b'x', 128, b'!'];
        assert_eq!(runlength_decode(&encoded).unwrap(), b"abcxxx".to_vec());
    }

    #[test]
    fn flate_round_trip() {
        let data = b"stream payload stream payload stream payload".to_vec();
        let encoded = flate_encode(&data).unwrap();
        assert_eq!(flate_decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn unknown_filter_is_an_error() {
        match decode(b"", b"Crypt", None) {
            Err(Error::UnsupportedEncoding(name)) => assert_eq!(name, "Crypt"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn chain_applies_left_to_right() {
        let payload = b"chained payload".to_vec();
        let flated = flate_encode(&payload).unwrap();
        let mut hex = Vec::new();
        for byte in &flated {
            hex.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        hex.push(b'>');

        let stream = crate::Stream::new(
            dictionary! {
                "Filter" => vec!["ASCIIHexDecode".into(), "FlateDecode".into()],
            },
            hex,
        );
        assert_eq!(decode_stream(&stream).unwrap(), payload);
        // Idempotent: a second pass over the same stream yields the same bytes.
        assert_eq!(decode_stream(&stream).unwrap(), payload);
    }

    #[test]
    fn predictor_parameters_are_honored() {
        // Two rows of three bytes, Up predictor (type 2).
        let raw = [2u8, 10, 10, 10, 2, 5, 5, 5];
        let flated = flate_encode(&raw).unwrap();
        let parms = dictionary! {
            "Predictor" => 12,
            "Columns" => 3,
        };
        let decoded = flate_decode(&flated, Some(&parms)).unwrap();
        assert_eq!(decoded, vec![10, 10, 10, 15, 15, 15]);
    }
}
