//! Lattice basis file I/O.
//!
//! Reads bases in the SVP Challenge bracket format
//! (https://www.latticechallenge.org/svp-challenge/):
//!
//! ```text
//! [[row1_val1 row1_val2 ... row1_valn]
//!  [row2_val1 row2_val2 ... row2_valn]
//!  ...
//!  [rown_val1 rown_val2 ... rown_valn]]
//! ```
//!
//! Entries can be very large integers (128+ bits); they are parsed into
//! `BigInt` without any precision loss.
//!
//! Also hosts the writer for the one-line-per-dump Gram-Schmidt profile
//! files produced during a reduction.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use num_bigint::BigInt;

use crate::basis::LatticeBasis;

/// Parse an SVP Challenge lattice file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_lattice_file<P: AsRef<Path>>(path: P) -> io::Result<LatticeBasis> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut content = String::new();
    for line in reader.lines() {
        let line = line?;
        content.push_str(&line);
        content.push('\n');
    }

    // Normalize row separators so the matrix can be split on "] ["
    let content = content
        .replace("]\n[", "] [")
        .replace("]\n]", "]]")
        .replace('\n', " ");

    parse_lattice_str(content.trim())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Parse a basis from the bracket format `[[a b c] [d e f] ...]`.
pub fn parse_lattice_str(s: &str) -> Result<LatticeBasis, String> {
    let s = s.trim();
    if !s.starts_with("[[") || !s.ends_with("]]") {
        return Err("expected format [[...] [...] ...]".to_string());
    }
    let s = &s[2..s.len() - 2];

    let mut rows: Vec<Vec<BigInt>> = Vec::new();
    for (i, row_str) in s.split("] [").enumerate() {
        let row: Result<Vec<BigInt>, String> = row_str
            .split_whitespace()
            .map(|tok| {
                tok.parse::<BigInt>()
                    .map_err(|_| format!("failed to parse '{}' in row {}", tok, i))
            })
            .collect();
        let row = row?;

        if row.is_empty() {
            continue;
        }
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(format!(
                    "row {} has {} elements, expected {}",
                    i,
                    row.len(),
                    first.len()
                ));
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err("no basis vectors found".to_string());
    }
    Ok(LatticeBasis::from_rows(rows))
}

/// Append one labelled profile line `prefix: x0 x1 ...` to `path`, or
/// truncate the file first when `append` is false.
pub fn write_profile_line(
    path: &Path,
    prefix: &str,
    values: &[f64],
    append: bool,
) -> io::Result<()> {
    let mut file = if append {
        OpenOptions::new().append(true).create(true).open(path)?
    } else {
        File::create(path)?
    };
    let mut line = String::with_capacity(16 + values.len() * 12);
    line.push_str(prefix);
    line.push_str(": ");
    for x in values {
        line.push_str(&format!("{:.8} ", x));
    }
    writeln!(file, "{}", line.trim_end())
}
