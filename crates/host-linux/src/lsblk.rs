//! Decoding of `lsblk --json --bytes --output-all`.
//!
//! util-linux has changed the JSON types of several columns over time: sizes
//! and flags were strings before 2.33, `rm`/`ro` became booleans later, and
//! `mountpoints` (an array that may hold nulls) replaced `mountpoint` in 2.37.
//! Every such column is decoded into [`JsonScalar`] and coerced explicitly.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Default, Deserialize)]
pub struct LsblkOutput {
    #[serde(default, deserialize_with = "device_list")]
    pub blockdevices: Vec<BlockDevice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BlockDevice {
    #[serde(deserialize_with = "text_column")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub path: Option<String>,
    #[serde(rename = "type", deserialize_with = "text_column")]
    pub kind: Option<String>,
    pub size: Option<JsonScalar>,
    pub ro: Option<JsonScalar>,
    pub rm: Option<JsonScalar>,
    pub hotplug: Option<JsonScalar>,
    #[serde(rename = "phy-sec")]
    pub phy_sec: Option<JsonScalar>,
    #[serde(rename = "log-sec")]
    pub log_sec: Option<JsonScalar>,
    #[serde(deserialize_with = "text_column")]
    pub label: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub model: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub vendor: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub pttype: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub tran: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub subsystems: Option<String>,
    #[serde(deserialize_with = "text_column")]
    pub mountpoint: Option<String>,
    #[serde(deserialize_with = "mount_list")]
    pub mountpoints: Option<Vec<Option<String>>>,
    #[serde(deserialize_with = "device_list")]
    pub children: Vec<BlockDevice>,
}

/// A value that is kept when it has the expected shape and dropped
/// otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Other(IgnoredAny),
}

/// A text column; numbers are rendered, anything else reads as absent.
fn text_column<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<JsonScalar>::deserialize(deserializer)?.and_then(|value| value.to_text()))
}

fn mount_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Option<String>>>, D::Error> {
    Ok(
        match Option::<Lenient<Vec<Option<JsonScalar>>>>::deserialize(deserializer)? {
            Some(Lenient::Value(list)) => Some(
                list.into_iter()
                    .map(|entry| entry.and_then(|value| value.to_text()))
                    .collect(),
            ),
            Some(Lenient::Other(_)) | None => None,
        },
    )
}

/// `null` or a non-array reads as no devices.
fn device_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<BlockDevice>, D::Error> {
    Ok(
        match Option::<Lenient<Vec<BlockDevice>>>::deserialize(deserializer)? {
            Some(Lenient::Value(devices)) => devices,
            Some(Lenient::Other(_)) | None => Vec::new(),
        },
    )
}

/// A JSON column whose wire type is not stable across lsblk versions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JsonScalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Arrays, objects or anything else lsblk might emit in future.
    Other(IgnoredAny),
}

impl JsonScalar {
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Self::Bool(_) | Self::Other(_) => None,
            Self::Int(value) => u64::try_from(*value).ok(),
            Self::UInt(value) => Some(*value),
            Self::Float(value) => float_to_u64(*value),
            Self::Text(text) => {
                let text = text.trim();
                text.parse::<u64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(float_to_u64))
            }
        }
    }

    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Int(value) => Some(value.to_string()),
            Self::UInt(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Bool(_) | Self::Other(_) => None,
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            },
            other => other.to_u64().map(|value| value != 0),
        }
    }
}

fn float_to_u64(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

/// Coerce an optional numeric column, falling back to `default` when the
/// column is absent, null or unparseable.
pub fn coerce_u64(value: Option<&JsonScalar>, default: u64) -> u64 {
    value.and_then(JsonScalar::to_u64).unwrap_or(default)
}

pub fn coerce_bool(value: Option<&JsonScalar>, default: bool) -> bool {
    value.and_then(JsonScalar::to_bool).unwrap_or(default)
}

impl BlockDevice {
    pub fn is_disk(&self) -> bool {
        self.kind.as_deref() == Some("disk")
    }

    pub fn kernel_name(&self) -> &str {
        let name = self.name.as_deref().unwrap_or("");
        name.rsplit('/').next().unwrap_or(name)
    }

    /// Absolute device node, preferring lsblk's own `path` column.
    pub fn device_node(&self) -> Option<String> {
        if let Some(path) = self.path.as_deref().filter(|path| !path.is_empty()) {
            return Some(path.to_string());
        }
        let name = self.name.as_deref().filter(|name| !name.is_empty())?;
        if name.starts_with("/dev/") {
            Some(name.to_string())
        } else {
            Some(format!("/dev/{name}"))
        }
    }

    /// Mount paths of this node only; `[SWAP]` and similar markers are not
    /// filesystem paths and are skipped.
    pub fn mount_paths(&self) -> Vec<&str> {
        let paths: Vec<&str> = match &self.mountpoints {
            Some(list) => list.iter().flatten().map(String::as_str).collect(),
            None => self.mountpoint.as_deref().into_iter().collect(),
        };
        paths
            .into_iter()
            .filter(|path| path.starts_with('/'))
            .collect()
    }
}
