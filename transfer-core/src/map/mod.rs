//! Parsers for the three map-file kinds: numeric-address tables, the dmap alias table, and the
//! logical-name-map XML.

pub mod dmap;
pub mod lmap;
pub mod numeric;
