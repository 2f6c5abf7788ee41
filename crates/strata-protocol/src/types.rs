//! Enumerations shared by query messages.

/// Output format requested for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutputFormat {
    /// Binary-encoded elements, decoded by the value codec.
    Binary = 0x62,
    /// One JSON document per element.
    Json = 0x6a,
}

/// Number of results a query is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cardinality {
    /// Zero or one result.
    AtMostOne = 0x6f,
    /// Any number of results.
    Many = 0x6d,
}
