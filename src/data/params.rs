use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::color::{ColorPoint, Rgb};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure while reading one of the small text inputs (isovalue lists,
/// colour maps, per-surface parameters).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: '{token}' is not a valid {expected}")]
    InvalidNumber {
        line: usize,
        token: String,
        expected: &'static str,
    },
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One isosurface of the multi-surface view: contour level, the gradient
/// window it survives in, and its flat colour.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceParams {
    pub value: i32,
    pub gradient_range: (f64, f64),
    pub color: Rgb,
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Non-blank lines that are not `#` comments, with 1-based line numbers.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn number<T: std::str::FromStr>(
    token: &str,
    line: usize,
    expected: &'static str,
) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
        expected,
    })
}

fn fields(line_no: usize, line: &str, expected: usize) -> Result<Vec<&str>, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != expected {
        return Err(ParseError::FieldCount {
            line: line_no,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn read(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an isovalue list: one integer per line.
pub fn parse_isovalues(text: &str) -> Result<Vec<i32>, ParseError> {
    content_lines(text)
        .map(|(line, s)| number(s, line, "integer isovalue"))
        .collect()
}

/// Parse a colour map: `<value> <r> <g> <b>` rows, colour channels in `[0, 1]`.
/// Row order is preserved.
pub fn parse_color_map(text: &str) -> Result<Vec<ColorPoint>, ParseError> {
    content_lines(text)
        .map(|(line, s)| {
            let f = fields(line, s, 4)?;
            Ok(ColorPoint {
                value: number(f[0], line, "number")?,
                color: Rgb::new(
                    number(f[1], line, "colour channel")?,
                    number(f[2], line, "colour channel")?,
                    number(f[3], line, "colour channel")?,
                ),
            })
        })
        .collect()
}

/// Parse per-surface parameters: `<value> <gmin> <gmax> <r> <g> <b>` rows.
pub fn parse_surface_params(text: &str) -> Result<Vec<SurfaceParams>, ParseError> {
    content_lines(text)
        .map(|(line, s)| {
            let f = fields(line, s, 6)?;
            Ok(SurfaceParams {
                value: number(f[0], line, "integer isovalue")?,
                gradient_range: (
                    number(f[1], line, "number")?,
                    number(f[2], line, "number")?,
                ),
                color: Rgb::new(
                    number(f[3], line, "colour channel")?,
                    number(f[4], line, "colour channel")?,
                    number(f[5], line, "colour channel")?,
                ),
            })
        })
        .collect()
}

pub fn read_isovalues(path: &Path) -> Result<Vec<i32>, ParseError> {
    parse_isovalues(&read(path)?)
}

pub fn read_color_map(path: &Path) -> Result<Vec<ColorPoint>, ParseError> {
    parse_color_map(&read(path)?)
}

pub fn read_surface_params(path: &Path) -> Result<Vec<SurfaceParams>, ParseError> {
    parse_surface_params(&read(path)?)
}

/// Serialise colour control points in the format `parse_color_map` reads.
pub fn format_color_map(points: &[ColorPoint]) -> String {
    let mut out = String::from("# value r g b\n");
    for p in points {
        out.push_str(&format!(
            "{} {} {} {}\n",
            p.value, p.color.red, p.color.green, p.color.blue
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn isovalue_list_skips_comments() {
        assert_eq!(parse_isovalues("100\n# comment\n200\n").unwrap(), vec![100, 200]);
        assert_eq!(parse_isovalues("\n  300  \n\n").unwrap(), vec![300]);
        assert!(parse_isovalues("# nothing\n").unwrap().is_empty());
    }

    #[test]
    fn isovalue_list_reports_line() {
        let err = parse_isovalues("100\n# c\n1.5\n").unwrap_err();
        match err {
            ParseError::InvalidNumber { line, token, .. } => {
                assert_eq!(line, 3);
                assert_eq!(token, "1.5");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn color_map_keeps_row_order() {
        let text = "# header\n500 1 0 0\n100   0 0.5 1\n\n900\t0.25 0.25 0.25\n";
        let points = parse_color_map(text).unwrap();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![500.0, 100.0, 900.0]);
        assert_relative_eq!(points[1].color.green, 0.5);
        assert_relative_eq!(points[2].color.blue, 0.25);
    }

    #[test]
    fn color_map_file_written_then_read() {
        let points: Vec<ColorPoint> = (0..7)
            .map(|i| ColorPoint {
                value: i as f64 * 133.3,
                color: Rgb::new(i as f32 / 7.0, 1.0 - i as f32 / 7.0, 0.3),
            })
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmap.txt");
        let text = format_color_map(&points);
        assert_eq!(text.lines().filter(|l| l.starts_with('#')).count(), 1);
        std::fs::write(&path, text).unwrap();

        let back = read_color_map(&path).unwrap();
        assert_eq!(back.len(), points.len());
        for (a, b) in points.iter().zip(&back) {
            assert_relative_eq!(a.value, b.value, epsilon = 1e-9);
            assert_relative_eq!(a.color.red, b.color.red, epsilon = 1e-6);
            assert_relative_eq!(a.color.green, b.color.green, epsilon = 1e-6);
            assert_relative_eq!(a.color.blue, b.color.blue, epsilon = 1e-6);
        }
    }

    #[test]
    fn color_map_rejects_short_rows() {
        let err = parse_color_map("100 1 0\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::FieldCount {
                line: 1,
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn surface_params_rows() {
        let text = "# value gmin gmax r g b\n400 0 120.5 0.9 0.7 0.6\n1135 10 400 1 1 1\n";
        let params = parse_surface_params(text).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].value, 400);
        assert_eq!(params[0].gradient_range, (0.0, 120.5));
        assert_relative_eq!(params[1].color.red, 1.0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_isovalues(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
