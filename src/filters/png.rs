//! Reversal of the PNG row predictor applied by Flate/LZW encoders.
//!
//! Each predicted row is prefixed with one filter-type byte; filtering is
//! reversed row by row against the previous reconstructed row.

use crate::{Error, Result};

const NONE: u8 = 0;
const SUB: u8 = 1;
const UP: u8 = 2;
const AVERAGE: u8 = 3;
const PAETH: u8 = 4;

pub fn unfilter(content: &[u8], bytes_per_pixel: usize, bytes_per_row: usize) -> Result<Vec<u8>> {
    if bytes_per_row == 0 {
        return Ok(Vec::new());
    }

    let bpp = bytes_per_pixel.max(1).min(bytes_per_row);
    let mut previous = vec![0u8; bytes_per_row];
    let mut current = vec![0u8; bytes_per_row];
    let mut output = Vec::with_capacity(content.len());

    let mut rows = content.chunks_exact(1 + bytes_per_row);
    for row in &mut rows {
        let filter = row[0];
        current.copy_from_slice(&row[1..]);
        unfilter_row(filter, bpp, &previous, &mut current)?;
        output.extend_from_slice(&current);
        std::mem::swap(&mut previous, &mut current);
    }

    if !rows.remainder().is_empty() {
        return Err(Error::Decode(format!(
            "predicted data is not a whole number of {}-byte rows",
            1 + bytes_per_row
        )));
    }

    Ok(output)
}

fn unfilter_row(filter: u8, bpp: usize, previous: &[u8], current: &mut [u8]) -> Result<()> {
    let len = current.len();
    match filter {
        NONE => {}
        SUB => {
            for i in bpp..len {
                current[i] = current[i].wrapping_add(current[i - bpp]);
            }
        }
        UP => {
            for i in 0..len {
                current[i] = current[i].wrapping_add(previous[i]);
            }
        }
        AVERAGE => {
            for i in 0..len {
                let left = if i >= bpp { current[i - bpp] } else { 0 };
                let mean = ((u16::from(left) + u16::from(previous[i])) / 2) as u8;
                current[i] = current[i].wrapping_add(mean);
            }
        }
        PAETH => {
            for i in 0..len {
                let left = if i >= bpp { current[i - bpp] } else { 0 };
                let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
                current[i] = current[i].wrapping_add(paeth(left, previous[i], upper_left));
            }
        }
        other => {
            return Err(Error::Decode(format!(
                "invalid predictor filter type ({})",
                other
            )))
        }
    }
    Ok(())
}

fn paeth(left: u8, above: u8, upper_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(above) - i16::from(upper_left);
    let dist_left = (estimate - i16::from(left)).abs();
    let dist_above = (estimate - i16::from(above)).abs();
    let dist_upper_left = (estimate - i16::from(upper_left)).abs();

    if dist_left <= dist_above && dist_left <= dist_upper_left {
        left
    } else if dist_above <= dist_upper_left {
        above
    } else {
        upper_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_filter_accumulates_left_neighbor() {
        let content = [SUB, 1, 1, 1, 1];
        assert_eq!(unfilter(&content, 1, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn up_filter_accumulates_previous_row() {
        let content = [UP, 1, 2, UP, 3, 4];
        assert_eq!(unfilter(&content, 1, 2).unwrap(), vec![1, 2, 4, 6]);
    }

    #[test]
    fn paeth_prefers_closest_neighbor() {
        assert_eq!(paeth(10, 20, 15), 10);
        assert_eq!(paeth(20, 10, 14), 10);
        assert_eq!(paeth(0, 0, 0), 0);
    }

    #[test]
    fn ragged_input_is_rejected() {
        assert!(unfilter(&[UP, 1, 2], 1, 3).is_err());
    }
}
