//! Matter 节点 ID。

use std::fmt;
use std::str::FromStr;

/// 设备配网后在 fabric 内的 64 位节点 ID。
///
/// - 持久化与传给 Hub 时使用 16 位定宽大写十六进制（`to_hex`）
/// - 作为 chip-tool 参数时使用 `0x` 前缀形式（`Display`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// 可分配给设备的最大节点 ID（更高的区段为组播/保留地址）。
    pub const MAX_OPERATIONAL: u64 = 0xFFFF_FFEF_FFFF_FFFF;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// 是否位于可分配区间（非 0 且不在保留区段）。
    pub const fn is_operational(self) -> bool {
        self.0 != 0 && self.0 <= Self::MAX_OPERATIONAL
    }

    pub fn to_hex(self) -> String {
        format!("{:016X}", self.0)
    }

    /// 解析十六进制节点 ID，允许 `0x` 前缀，大小写不敏感。
    pub fn parse_hex(value: &str) -> Result<Self, NodeIdParseError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 16 {
            return Err(NodeIdParseError::new(value));
        }
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| NodeIdParseError::new(value))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// 节点 ID 解析失败。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdParseError {
    input: String,
}

impl NodeIdParseError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

impl fmt::Display for NodeIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid node id: {}", self.input)
    }
}

impl std::error::Error for NodeIdParseError {}
