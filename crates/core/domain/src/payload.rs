//! 配网码解析结果。

use std::fmt;

/// Matter 配网码前缀。
pub const SETUP_CODE_PREFIX: &str = "MT:";
/// 分段格式的分隔符。
pub const FIELD_DELIMITER: char = '+';
/// 分段格式至少包含的字段数（version/vendor/product/custom/discriminator/passcode）。
pub const MIN_DELIMITED_FIELDS: usize = 6;
/// discriminator 为 12 位。
pub const MAX_DISCRIMINATOR: u16 = 0x0FFF;

/// 厂商私有格式的兜底值（无法拆解时使用，真实参数由配网引擎从原始码中读取）。
pub const FALLBACK_VERSION: &str = "1";
pub const FALLBACK_VENDOR_ID: u16 = 0x1234;
pub const FALLBACK_PRODUCT_ID: u16 = 0x5678;
pub const FALLBACK_CUSTOM_DATA: &str = "0x0000";
pub const FALLBACK_DISCRIMINATOR: u16 = 1234;
pub const FALLBACK_PASSCODE: &str = "20202021";

/// 配网码编码格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    /// `MT:` + `+` 分段格式，字段已解析。
    Standard,
    /// 不含分隔符的厂商私有编码，字段为兜底值。
    VendorSpecific,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::VendorSpecific => "vendor-specific",
        }
    }
}

/// 解析后的配网参数（不可变值类型）。
#[derive(Clone, PartialEq, Eq)]
pub struct SetupPayload {
    pub version: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub custom_data: String,
    pub discriminator: u16,
    pub passcode: String,
    /// 第 6 个字段之后的附加数据，原样保留不解析。
    pub extra: Vec<String>,
    pub format: PayloadFormat,
    /// 调用方传入的完整原始码（含前缀）。
    pub raw_code: String,
}

impl SetupPayload {
    /// 厂商私有格式：字段取兜底值，原始码原样保留。
    pub fn vendor_specific(raw_code: impl Into<String>) -> Self {
        Self {
            version: FALLBACK_VERSION.to_string(),
            vendor_id: FALLBACK_VENDOR_ID,
            product_id: FALLBACK_PRODUCT_ID,
            custom_data: FALLBACK_CUSTOM_DATA.to_string(),
            discriminator: FALLBACK_DISCRIMINATOR,
            passcode: FALLBACK_PASSCODE.to_string(),
            extra: Vec::new(),
            format: PayloadFormat::VendorSpecific,
            raw_code: raw_code.into(),
        }
    }

    pub fn is_vendor_specific(&self) -> bool {
        self.format == PayloadFormat::VendorSpecific
    }
}

// passcode 是持有设备的凭证，不进入日志。
impl fmt::Debug for SetupPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupPayload")
            .field("version", &self.version)
            .field("vendor_id", &format_args!("0x{:04X}", self.vendor_id))
            .field("product_id", &format_args!("0x{:04X}", self.product_id))
            .field("custom_data", &self.custom_data)
            .field("discriminator", &self.discriminator)
            .field("passcode", &"<redacted>")
            .field("extra", &self.extra)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
