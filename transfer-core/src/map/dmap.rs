//! Parser and resolver for the dmap file: a line-oriented `alias sdm-uri` table that lets
//! application code open a device by short alias instead of a full `sdm://` string.

use transfer_types::{Error, Result};

const DEFAULT_DMAP_FILE: &str = "./devices.dmap";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmapEntry {
    pub alias: String,
    pub uri: String,
}

/// Parses `alias sdm-uri` rows. Blank lines and `#` comments are skipped.
pub fn parse(content: &str) -> Result<Vec<DmapEntry>> {
    let mut entries = Vec::new();
    for (line_no, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(2, char::is_whitespace);
        let alias = fields
            .next()
            .ok_or_else(|| Error::CannotOpenMapFile(format!("line {}: missing alias", line_no + 1)))?;
        let uri = fields
            .next()
            .map(str::trim)
            .ok_or_else(|| Error::CannotOpenMapFile(format!("line {}: missing uri", line_no + 1)))?;
        entries.push(DmapEntry {
            alias: alias.to_string(),
            uri: uri.to_string(),
        });
    }
    Ok(entries)
}

/// Path to the dmap file: the `DMAP_FILE` environment variable if set, otherwise the
/// compile-time default.
pub fn dmap_file_path() -> String {
    std::env::var("DMAP_FILE").unwrap_or_else(|_| DEFAULT_DMAP_FILE.to_string())
}

/// Resolves `alias` to its `sdm://` uri using the dmap file at [`dmap_file_path`].
pub fn resolve_alias(alias: &str) -> Result<String> {
    let path = dmap_file_path();
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::CannotOpenMapFile(format!("{path}: {e}")))?;
    let entries = parse(&content)?;
    entries
        .into_iter()
        .find(|e| e.alias == alias)
        .map(|e| e.uri)
        .ok_or_else(|| Error::RegisterDoesNotExist(format!("no dmap entry for alias '{alias}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alias_table() {
        let text = "# devices\nPCIE0 sdm://./dummy=pcie0.map\nBOARD1 sdm://./rebot=192.168.1.1:5001\n";
        let entries = parse(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].alias, "PCIE0");
        assert_eq!(entries[0].uri, "sdm://./dummy=pcie0.map");
    }
}
