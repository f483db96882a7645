//! Parser for the numeric-address map file: one whitespace-separated row per register,
//! `name bar address nWords width fractionalBits signed`.

use transfer_types::{Error, RegisterPath, Result};

use crate::backend::{RegisterCatalogue, RegisterInfo};

fn parse_u32(field: &str) -> Result<u32> {
    if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        field.parse::<u32>()
    }
    .map_err(|_| Error::CannotOpenMapFile(format!("not a valid address: '{field}'")))
}

/// Parses a numeric-address map from its textual contents. Blank lines and lines starting with
/// `#` are skipped.
pub fn parse_catalogue(content: &str) -> Result<RegisterCatalogue> {
    let mut catalogue = RegisterCatalogue::new();
    for (line_no, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            return Err(Error::CannotOpenMapFile(format!(
                "line {}: expected 7 fields (name bar address nWords width fractionalBits signed), got {}",
                line_no + 1,
                fields.len()
            )));
        }
        let bar: u8 = fields[1]
            .parse()
            .map_err(|_| Error::CannotOpenMapFile(format!("line {}: bad bar", line_no + 1)))?;
        let address = parse_u32(fields[2])?;
        let n_words: usize = fields[3]
            .parse()
            .map_err(|_| Error::CannotOpenMapFile(format!("line {}: bad word count", line_no + 1)))?;
        let width: u8 = fields[4]
            .parse()
            .map_err(|_| Error::CannotOpenMapFile(format!("line {}: bad width", line_no + 1)))?;
        let fractional_bits: i32 = fields[5]
            .parse()
            .map_err(|_| Error::CannotOpenMapFile(format!("line {}: bad fractional bits", line_no + 1)))?;
        let signed = fields[6] != "0";

        catalogue.insert(RegisterInfo {
            path: RegisterPath::new(fields[0]),
            bar,
            address,
            n_elements: n_words,
            n_channels: 1,
            width,
            fractional_bits,
            signed,
            readable: true,
            writeable: true,
        });
    }
    Ok(catalogue)
}

/// Reads and parses a numeric-address map file from disk.
pub fn load_catalogue(path: &str) -> Result<RegisterCatalogue> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::CannotOpenMapFile(format!("{path}: {e}")))?;
    parse_catalogue(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_table() {
        let text = "# comment\nBOARD.WORD_CLK_MUX 0 0x20 1 32 0 1\n";
        let catalogue = parse_catalogue(text).unwrap();
        let info = catalogue.get(&RegisterPath::new("BOARD.WORD_CLK_MUX")).unwrap();
        assert_eq!(info.bar, 0);
        assert_eq!(info.address, 0x20);
        assert_eq!(info.n_elements, 1);
        assert_eq!(info.width, 32);
        assert!(info.signed);
    }

    #[test]
    fn rejects_short_rows() {
        assert!(parse_catalogue("NAME 0 0x0\n").is_err());
    }
}
