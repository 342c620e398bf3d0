//! 配网码解析。
//!
//! 支持两种编码：
//! - 分段格式：`MT:<version>+<vendor>+<product>+<custom>+<discriminator>+<passcode>[+extra...]`，
//!   数值字段可为十进制或 `0x` 十六进制，第 6 个字段之后原样保留
//! - 厂商私有格式：`MT:` 后不含 `+`，不报错，返回兜底值并保留原始码，
//!   由配网引擎直接使用原始码

use domain::payload::{
    FIELD_DELIMITER, MAX_DISCRIMINATOR, MIN_DELIMITED_FIELDS, SETUP_CODE_PREFIX,
};
use domain::{PayloadFormat, SetupPayload};
use tracing::debug;

/// 配网码解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid setup code format: {0}")]
    InvalidFormat(String),
}

/// 解析配网码。
///
/// 同一输入总是得到逐字段相同的结果（纯函数）。首尾空白在解析时忽略，
/// `raw_code` 保留调用方传入的原文。
pub fn parse(code: &str) -> Result<SetupPayload, PayloadError> {
    let Some(data) = code.trim().strip_prefix(SETUP_CODE_PREFIX) else {
        return Err(PayloadError::InvalidFormat(format!(
            "must start with '{}'",
            SETUP_CODE_PREFIX
        )));
    };

    if !data.contains(FIELD_DELIMITER) {
        debug!(
            target: "msh.payload",
            code_len = code.len(),
            "setup_code_vendor_specific"
        );
        return Ok(SetupPayload::vendor_specific(code));
    }

    let parts: Vec<&str> = data.split(FIELD_DELIMITER).collect();
    if parts.len() < MIN_DELIMITED_FIELDS {
        return Err(PayloadError::InvalidFormat(format!(
            "expected at least {} fields, got {}",
            MIN_DELIMITED_FIELDS,
            parts.len()
        )));
    }

    let version = parts[0].trim();
    if version.is_empty() {
        return Err(PayloadError::InvalidFormat("empty version".to_string()));
    }
    let vendor_id = parse_u16("vendor id", parts[1])?;
    let product_id = parse_u16("product id", parts[2])?;
    let custom_data = parts[3].trim().to_string();
    let discriminator = parse_u16("discriminator", parts[4])?;
    if discriminator > MAX_DISCRIMINATOR {
        return Err(PayloadError::InvalidFormat(format!(
            "discriminator {} exceeds {}",
            discriminator, MAX_DISCRIMINATOR
        )));
    }
    let passcode = parts[5].trim();
    if passcode.is_empty() || !passcode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PayloadError::InvalidFormat(
            "passcode must be numeric".to_string(),
        ));
    }
    let extra = parts[MIN_DELIMITED_FIELDS..]
        .iter()
        .map(|part| part.to_string())
        .collect();

    Ok(SetupPayload {
        version: version.to_string(),
        vendor_id,
        product_id,
        custom_data,
        discriminator,
        passcode: passcode.to_string(),
        extra,
        format: PayloadFormat::Standard,
        raw_code: code.to_string(),
    })
}

/// 解析失败时退回厂商私有格式（配网流程不因解析失败中止）。
pub fn parse_or_fallback(code: &str) -> SetupPayload {
    match parse(code) {
        Ok(payload) => payload,
        Err(err) => {
            debug!(target: "msh.payload", error = %err, "setup_code_fallback");
            SetupPayload::vendor_specific(code)
        }
    }
}

fn parse_u16(field: &str, value: &str) -> Result<u16, PayloadError> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    };
    parsed.map_err(|_| PayloadError::InvalidFormat(format!("invalid {}: '{}'", field, value)))
}
