//! Stored asset records referenced by site rules.
//!
//! The records themselves are owned by the data layer; the core only ever
//! reads them through the store boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    /// Unique identifier.
    pub id: Uuid,
    /// Embedded image data as a data URI.
    pub data_uri: String,
}

/// An image imported from a URL and stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlImport {
    /// Unique identifier.
    pub id: Uuid,
    /// Embedded image data as a data URI.
    pub data_uri: String,
}

/// An icon-pack symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Icon {
    /// Unique identifier; sprites reference it via `#<id>`.
    pub id: Uuid,
    /// SVG `<symbol>` fragment for the icon.
    pub symbol: String,
    /// Name of the pack the icon belongs to; selects default styling.
    pub icon_pack_name: String,
}
