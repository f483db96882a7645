//! Parser for the logical-name-map XML file. Each entry redirects a virtual register path to
//! one of five target kinds: a whole register, a sub-range, a single channel, or a constant or
//! backend-independent variable.
//!
//! Expected shape:
//! ```xml
//! <logicalNameMap>
//!   <redirectedRegister name="/temperature">
//!     <targetType>REGISTER</targetType>
//!     <targetDevice>board0</targetDevice>
//!     <targetRegister>BOARD.TEMP</targetRegister>
//!   </redirectedRegister>
//!   <redirectedRegister name="/scale">
//!     <targetType>INT_CONSTANT</targetType>
//!     <value>42</value>
//!   </redirectedRegister>
//! </logicalNameMap>
//! ```

use std::collections::HashMap;

use transfer_types::{Error, RegisterPath, Result};

/// One of the five resolution kinds a logical register may redirect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalTarget {
    Register {
        device: String,
        register: String,
    },
    Range {
        device: String,
        register: String,
        first_index: usize,
        length: usize,
    },
    Channel {
        device: String,
        register: String,
        channel: usize,
    },
    IntConstant(i64),
    IntVariable(i64),
}

impl LogicalTarget {
    pub fn is_writeable(&self) -> bool {
        !matches!(self, LogicalTarget::IntConstant(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogicalNameMap {
    entries: HashMap<RegisterPath, LogicalTarget>,
}

impl LogicalNameMap {
    pub fn get(&self, path: &RegisterPath) -> Result<&LogicalTarget> {
        self.entries
            .get(path)
            .ok_or_else(|| Error::RegisterDoesNotExist(path.to_string()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &RegisterPath> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(str::trim)
}

fn parse_i64(text: &str, context: &str) -> Result<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| Error::CannotOpenMapFile(format!("{context}: not an integer: '{text}'")))
}

fn parse_usize(text: &str, context: &str) -> Result<usize> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| Error::CannotOpenMapFile(format!("{context}: not a non-negative integer: '{text}'")))
}

/// Parses the logical-name-map XML.
pub fn parse(xml: &str) -> Result<LogicalNameMap> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::CannotOpenMapFile(format!("xml parse error: {e}")))?;

    let mut map = LogicalNameMap::default();
    for entry in doc
        .descendants()
        .filter(|n| n.has_tag_name("redirectedRegister"))
    {
        let name = entry
            .attribute("name")
            .ok_or_else(|| Error::CannotOpenMapFile("redirectedRegister is missing a name".to_string()))?;
        let path = RegisterPath::new(name);

        let target_type = child_text(entry, "targetType")
            .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetType")))?
            .to_ascii_uppercase();

        let target = match target_type.as_str() {
            "REGISTER" => LogicalTarget::Register {
                device: child_text(entry, "targetDevice")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetDevice")))?
                    .to_string(),
                register: child_text(entry, "targetRegister")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetRegister")))?
                    .to_string(),
            },
            "RANGE" => LogicalTarget::Range {
                device: child_text(entry, "targetDevice")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetDevice")))?
                    .to_string(),
                register: child_text(entry, "targetRegister")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetRegister")))?
                    .to_string(),
                first_index: parse_usize(
                    child_text(entry, "targetFirstIndex")
                        .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetFirstIndex")))?,
                    name,
                )?,
                length: parse_usize(
                    child_text(entry, "numberOfElements")
                        .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing numberOfElements")))?,
                    name,
                )?,
            },
            "CHANNEL" => LogicalTarget::Channel {
                device: child_text(entry, "targetDevice")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetDevice")))?
                    .to_string(),
                register: child_text(entry, "targetRegister")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetRegister")))?
                    .to_string(),
                channel: parse_usize(
                    child_text(entry, "targetChannel")
                        .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing targetChannel")))?,
                    name,
                )?,
            },
            "INT_CONSTANT" => LogicalTarget::IntConstant(parse_i64(
                child_text(entry, "value")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing value")))?,
                name,
            )?),
            "INT_VARIABLE" => LogicalTarget::IntVariable(parse_i64(
                child_text(entry, "value")
                    .ok_or_else(|| Error::CannotOpenMapFile(format!("{name}: missing value")))?,
                name,
            )?),
            other => {
                return Err(Error::CannotOpenMapFile(format!(
                    "{name}: unknown targetType '{other}'"
                )))
            }
        };
        map.entries.insert(path, target);
    }
    Ok(map)
}

/// Reads and parses a logical-name-map file from disk.
pub fn load_file(path: &str) -> Result<LogicalNameMap> {
    let content =
        std::fs::read_to_string(path).map_err(|e| Error::CannotOpenMapFile(format!("{path}: {e}")))?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <logicalNameMap>
          <redirectedRegister name="/temperature">
            <targetType>REGISTER</targetType>
            <targetDevice>board0</targetDevice>
            <targetRegister>BOARD.TEMP</targetRegister>
          </redirectedRegister>
          <redirectedRegister name="/scale">
            <targetType>INT_CONSTANT</targetType>
            <value>42</value>
          </redirectedRegister>
        </logicalNameMap>
    "#;

    #[test]
    fn resolves_a_register_target() {
        let map = parse(SAMPLE).unwrap();
        let target = map.get(&RegisterPath::new("/temperature")).unwrap();
        assert_eq!(
            *target,
            LogicalTarget::Register {
                device: "board0".to_string(),
                register: "BOARD.TEMP".to_string(),
            }
        );
    }

    #[test]
    fn int_constant_is_not_writeable() {
        let map = parse(SAMPLE).unwrap();
        let target = map.get(&RegisterPath::new("/scale")).unwrap();
        assert_eq!(*target, LogicalTarget::IntConstant(42));
        assert!(!target.is_writeable());
    }

    #[test]
    fn unknown_register_errors() {
        let map = parse(SAMPLE).unwrap();
        assert!(map.get(&RegisterPath::new("/missing")).is_err());
    }
}
