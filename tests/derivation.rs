use ocean_wallet::derivation_path::{self, DerivationPath, HARDENED_OFFSET};

// ============================================================================
// Canonical rendering
// ============================================================================

#[test]
fn render_then_parse_is_idempotent() {
    let inputs = [
        "m/84'/0'/0'/0/1",
        "m/ 84 ' / 0' /0'/0 / 1",
        "m/0x54'/0x00'",
        "m/2147483732",
        "0'/1/2",
        "m/48'/1776'/0'/2'",
    ];
    for input in inputs {
        let parsed = DerivationPath::parse(input).expect(input);
        let rendered = parsed.to_string();
        let reparsed = DerivationPath::parse(&rendered).expect(&rendered);
        assert_eq!(parsed, reparsed, "{input} -> {rendered}");
        assert_eq!(reparsed.to_string(), rendered);
    }
}

#[test]
fn hex_and_decimal_agree() {
    let hex = DerivationPath::parse("m/0x54'/0x0'/0x0'").expect("hex path");
    let dec = DerivationPath::parse("m/84'/0'/0'").expect("decimal path");
    assert_eq!(hex, dec);
    assert_eq!(
        dec.as_slice(),
        &[84 + HARDENED_OFFSET, HARDENED_OFFSET, HARDENED_OFFSET]
    );
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn structural_errors() {
    assert_eq!(DerivationPath::parse(""), Err(derivation_path::Error::Missing));
    assert_eq!(DerivationPath::parse("m"), Err(derivation_path::Error::Malformed));
    assert_eq!(DerivationPath::parse("m/"), Err(derivation_path::Error::Malformed));
    assert_eq!(
        DerivationPath::parse("/84'/0'/0'/0"),
        Err(derivation_path::Error::MissingAbsoluteMarker)
    );
    assert_eq!(
        DerivationPath::parse("m/84'//0"),
        Err(derivation_path::Error::Malformed)
    );
}

#[test]
fn range_errors_name_the_offending_value() {
    let too_big = DerivationPath::parse("m/2147483648'").expect_err("out of hardened range");
    assert!(matches!(
        too_big,
        derivation_path::Error::OutOfHardenedRange { .. }
    ));
    assert!(too_big.to_string().contains("2147483648"));

    let negative = DerivationPath::parse("m/-1'").expect_err("negative");
    assert!(negative.to_string().contains("-1"));

    assert!(matches!(
        DerivationPath::parse("m/abc"),
        Err(derivation_path::Error::InvalidElem(_))
    ));
}

#[test]
fn root_paths() {
    let root = DerivationPath::parse_root("m/84'/1776'").expect("root");
    assert_eq!(root.len(), 2);
    assert!(root.all_hardened());

    assert_eq!(
        DerivationPath::parse_root("m/84'/1776'/0'"),
        Err(derivation_path::Error::InvalidRootLength)
    );
    assert_eq!(
        DerivationPath::parse_root("m/84'/1776"),
        Err(derivation_path::Error::InvalidRootPath)
    );
    assert_eq!(
        DerivationPath::parse_root("84'/1776'"),
        Err(derivation_path::Error::NotAbsolute)
    );
}
