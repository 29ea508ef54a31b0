//! Line-oriented text format shared by input and output.
//!
//! ```text
//! D [anything else on this line is ignored]
//! N
//! p0_0 p0_1 ... p0_(D-1)
//! ...
//! ```
//!
//! After the first line only whitespace-separated tokens matter, so points
//! may wrap across lines. Coordinates must be finite. The skyline is written in the same layout with the
//! skyline size in place of `N`, which makes the output valid input.

use std::io::{self, Read, Write};

use tracing::{debug, warn};

use crate::{Membership, PointTable, TableError};

/// Smallest dimension count a run accepts.
pub const MIN_DIMS: usize = 2;

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("can not read the dimension")]
    Dimension,
    #[error("dimension must be at least {MIN_DIMS}, got {dims}")]
    TooFewDimensions { dims: usize },
    #[error("can not read the number of points")]
    PointCount,
    #[error("{len} points of {dims} dimensions do not fit in memory")]
    TooLarge { dims: usize, len: usize },
    #[error("failed to get coordinate {coord} of point {point}")]
    Coordinate { point: usize, coord: usize },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

pub fn read_points<R: Read>(mut reader: R) -> Result<PointTable, InputError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_points(&text)
}

pub fn parse_points(text: &str) -> Result<PointTable, InputError> {
    let text = text.trim_start();
    let (header, body) = text.split_once('\n').unwrap_or((text, ""));

    let dims: usize = header
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or(InputError::Dimension)?;
    if dims < MIN_DIMS {
        return Err(InputError::TooFewDimensions { dims });
    }

    let mut tokens = body.split_whitespace();
    let len: usize = tokens
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or(InputError::PointCount)?;
    let values = dims
        .checked_mul(len)
        .ok_or(InputError::TooLarge { dims, len })?;

    let mut coords = Vec::new();
    coords
        .try_reserve_exact(values)
        .map_err(|_| InputError::TooLarge { dims, len })?;
    for point in 0..len {
        for coord in 0..dims {
            let value = tokens
                .next()
                .and_then(|token| token.parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .ok_or(InputError::Coordinate { point, coord })?;
            coords.push(value);
        }
    }

    let trailing = tokens.count();
    if trailing > 0 {
        warn!(trailing, "ignoring tokens after the last point");
    }
    debug!(dims, len, "points loaded");
    Ok(PointTable::new(dims, coords)?)
}

/// Print the surviving points of `table` in input order.
pub fn write_skyline<W: Write>(
    mut out: W,
    table: &PointTable,
    membership: &Membership,
) -> io::Result<()> {
    if membership.len() != table.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "membership covers {} points but the table has {}",
                membership.len(),
                table.len()
            ),
        ));
    }
    writeln!(out, "{}", table.dims())?;
    writeln!(out, "{}", membership.count())?;
    for index in membership.survivors() {
        let mut coords = table.point(index).iter();
        if let Some(first) = coords.next() {
            write!(out, "{first:.6}")?;
        }
        for value in coords {
            write!(out, " {value:.6}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skyline;

    #[test]
    fn header_comment_is_ignored() {
        let table = parse_points("2 two dims, four points\n4\n1 1\n2 2\n3 1\n1 3\n").unwrap();
        assert_eq!(table.dims(), 2);
        assert_eq!(table.len(), 4);
        assert_eq!(table.point(3), &[1.0, 3.0]);
    }

    #[test]
    fn points_may_wrap_lines() {
        let table = parse_points("3\n2\n1.5 2.5\n3.5 4 5\n6\n").unwrap();
        assert_eq!(table.coords(), &[1.5, 2.5, 3.5, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn empty_point_set_is_valid() {
        let table = parse_points("5\n0\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.dims(), 5);
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(matches!(parse_points(""), Err(InputError::Dimension)));
        assert!(matches!(parse_points("x\n1\n"), Err(InputError::Dimension)));
        assert!(matches!(
            parse_points("1\n1\n0\n"),
            Err(InputError::TooFewDimensions { dims: 1 })
        ));
        assert!(matches!(parse_points("2\n"), Err(InputError::PointCount)));
        assert!(matches!(parse_points("2\n-3\n"), Err(InputError::PointCount)));
    }

    #[test]
    fn missing_coordinate_names_its_position() {
        let err = parse_points("2\n3\n1 2\n3 4\n5\n").unwrap_err();
        assert!(matches!(err, InputError::Coordinate { point: 2, coord: 1 }));
        assert_eq!(err.to_string(), "failed to get coordinate 1 of point 2");

        let err = parse_points("2\n1\n1 abc\n").unwrap_err();
        assert!(matches!(err, InputError::Coordinate { point: 0, coord: 1 }));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let err = parse_points("2\n3\n3 2\nNaN 1\n9 0.5\n").unwrap_err();
        assert!(matches!(err, InputError::Coordinate { point: 1, coord: 0 }));

        let err = parse_points("2\n2\n1 inf\n0 0\n").unwrap_err();
        assert!(matches!(err, InputError::Coordinate { point: 0, coord: 1 }));
    }

    #[test]
    fn skyline_is_printed_in_input_order() {
        let table = parse_points("2\n4\n1 1\n2 2\n3 1\n1 3\n").unwrap();
        let membership = skyline(&table);
        let mut out = Vec::new();
        write_skyline(&mut out, &table, &membership).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2\n3\n2.000000 2.000000\n3.000000 1.000000\n1.000000 3.000000\n"
        );
    }

    #[test]
    fn output_parses_back_as_input() {
        let table = parse_points("3\n3\n0.25 1 2\n-1 0.5 7\n0 0 0\n").unwrap();
        let membership = skyline(&table);
        let mut out = Vec::new();
        write_skyline(&mut out, &table, &membership).unwrap();
        let again = parse_points(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(again, table.select(&membership));
    }

    #[test]
    fn mismatched_membership_is_an_error() {
        let table = parse_points("2\n1\n1 1\n").unwrap();
        let err = write_skyline(Vec::new(), &table, &Membership::all(2)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
