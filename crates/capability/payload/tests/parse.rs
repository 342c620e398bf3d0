use domain::PayloadFormat;
use msh_payload::{PayloadError, parse, parse_or_fallback};

#[test]
fn delimited_code_yields_fields() {
    let payload = parse("MT:1+0x1234+0x5678+0x0000+1234+20202021").expect("parse");
    assert_eq!(payload.version, "1");
    assert_eq!(payload.vendor_id, 0x1234);
    assert_eq!(payload.product_id, 0x5678);
    assert_eq!(payload.custom_data, "0x0000");
    assert_eq!(payload.discriminator, 1234);
    assert_eq!(payload.passcode, "20202021");
    assert!(payload.extra.is_empty());
    assert_eq!(payload.format, PayloadFormat::Standard);
    assert_eq!(payload.raw_code, "MT:1+0x1234+0x5678+0x0000+1234+20202021");
}

#[test]
fn surrounding_whitespace_is_kept_in_raw_code() {
    let code = "  MT:1+0x1234+0x5678+0x0000+1234+20202021\n";
    let payload = parse(code).expect("parse");
    assert_eq!(payload.discriminator, 1234);
    assert_eq!(payload.passcode, "20202021");
    assert_eq!(payload.raw_code, code);

    let opaque = " MT:Y.K9042C00KA0648G00 ";
    assert_eq!(parse(opaque).expect("parse").raw_code, opaque);
    assert_eq!(parse_or_fallback(" 0150-175-1910").raw_code, " 0150-175-1910");
}

#[test]
fn delimited_parse_is_deterministic() {
    let code = "MT:2+4701+1724+abc+0x0F00+85064361+tlv1+tlv2";
    let first = parse(code).expect("first");
    let second = parse(code).expect("second");
    assert_eq!(first, second);
    assert_eq!(first.vendor_id, 4701);
    assert_eq!(first.discriminator, 0x0F00);
}

#[test]
fn fields_beyond_sixth_are_preserved_verbatim() {
    let payload = parse("MT:1+1+2+3+4+11223344+0xDEAD+ raw extra").expect("parse");
    assert_eq!(payload.extra, vec!["0xDEAD".to_string(), " raw extra".to_string()]);
}

#[test]
fn missing_prefix_is_invalid() {
    let err = parse("1+0x1234+0x5678+0x0000+1234+20202021").unwrap_err();
    assert!(matches!(err, PayloadError::InvalidFormat(_)));
}

#[test]
fn too_few_fields_is_invalid() {
    let err = parse("MT:1+0x1234+0x5678+1234+20202021").unwrap_err();
    assert_eq!(
        err,
        PayloadError::InvalidFormat("expected at least 6 fields, got 5".to_string())
    );
}

#[test]
fn discriminator_above_twelve_bits_is_invalid() {
    assert!(parse("MT:1+0x1234+0x5678+0x0000+4096+20202021").is_err());
    assert!(parse("MT:1+0x1234+0x5678+0x0000+4095+20202021").is_ok());
}

#[test]
fn non_numeric_passcode_is_invalid() {
    assert!(parse("MT:1+0x1234+0x5678+0x0000+1234+2020x021").is_err());
}

#[test]
fn opaque_code_falls_back_without_error() {
    for code in ["MT:IXA27ACN16GUBE2H910", "MT:Y.K9042C00KA0648G00", "MT:"] {
        let payload = parse(code).expect("opaque codes never fail");
        assert_eq!(payload.format, PayloadFormat::VendorSpecific);
        assert_eq!(payload.raw_code, code);
        assert_eq!(payload.vendor_id, 0x1234);
        assert_eq!(payload.product_id, 0x5678);
        assert_eq!(payload.discriminator, 1234);
        assert_eq!(payload.passcode, "20202021");
    }
}

#[test]
fn fallback_keeps_unprefixed_code_for_engine() {
    let payload = parse_or_fallback("0150-175-1910");
    assert!(payload.is_vendor_specific());
    assert_eq!(payload.raw_code, "0150-175-1910");
}

#[test]
fn debug_output_redacts_passcode() {
    let payload = parse("MT:1+0x1234+0x5678+0x0000+1234+20202021").expect("parse");
    let rendered = format!("{:?}", payload);
    assert!(!rendered.contains("20202021"));
    assert!(rendered.contains("<redacted>"));
}
