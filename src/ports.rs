use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Parse a port list into TCP ports (1..=65535), keeping input order.
///
/// Supported formats:
/// - port numbers separated by any whitespace: `22 80\n443`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
///
/// Duplicates are kept; the scanner's open set absorbs them. Any other token
/// is an error, and so is a list with no ports at all.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for token in line.split_whitespace() {
            // Range `start-end`
            if let Some((a, b)) = token.split_once('-') {
                let start = parse_port_str(a, line_no, token)?;
                let end = parse_port_str(b, line_no, token)?;
                if start > end {
                    return Err(invalid(line_no, token, "range start is greater than end"));
                }
                out.extend(start..=end);
                continue;
            }
            out.push(parse_port_str(token, line_no, token)?);
        }
    }

    if out.is_empty() {
        return Err(Error::EmptyPortList);
    }
    Ok(out)
}

/// Load a port list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| Error::PortsFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_ports_str(&content)
}

fn parse_port_str(s: &str, line: usize, token: &str) -> Result<u16> {
    let val: u32 = s
        .parse()
        .map_err(|e| invalid(line, token, format!("{s:?} is not a port number ({e})")))?;
    if val == 0 || val > 65535 {
        return Err(invalid(line, token, format!("port out of range: {val}")));
    }
    Ok(val as u16)
}

fn invalid(line: usize, token: &str, reason: impl Into<String>) -> Error {
    Error::InvalidPortEntry {
        line,
        token: token.to_string(),
        reason: reason.into(),
    }
}
