use crate::*;

fn encode(f: impl FnOnce(&mut Encoder) -> Result<()>) -> Vec<u8> {
    let mut enc = Encoder::new();
    f(&mut enc).expect("encoding failed");
    enc.into_bytes().expect("scopes open")
}

#[test]
fn test_scalar_boundaries() {
    let bytes = encode(|e| {
        e.u64(u64::MAX)?;
        e.s64(i64::MIN)?;
        e.s64(-1)?;
        e.u32(u32::MAX)?;
        e.bool(true)?;
        e.bool(false)
    });

    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.u64().unwrap(), u64::MAX);
    assert_eq!(dec.s64().unwrap(), i64::MIN);
    assert_eq!(dec.s64().unwrap(), -1);
    assert_eq!(dec.u32().unwrap(), u32::MAX);
    assert!(dec.bool().unwrap());
    assert!(!dec.bool().unwrap());
    assert_eq!(dec.remaining(), 0);
}

#[test]
fn test_float_specials_are_bit_exact() {
    let bytes = encode(|e| {
        e.f64(f64::NAN)?;
        e.f64(f64::INFINITY)?;
        e.f64(f64::NEG_INFINITY)?;
        e.f64(-0.0)
    });

    let mut dec = Decoder::new(&bytes);
    assert!(dec.f64().unwrap().is_nan());
    assert_eq!(dec.f64().unwrap(), f64::INFINITY);
    assert_eq!(dec.f64().unwrap(), f64::NEG_INFINITY);
    assert!(dec.f64().unwrap().is_sign_negative());
}

#[test]
fn test_empty_and_unicode_strings() {
    let bytes = encode(|e| {
        e.str("")?;
        e.str("Vector2D · ünïcødé")
    });

    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.str().unwrap(), "");
    assert_eq!(dec.str().unwrap(), "Vector2D · ünïcødé");
}

#[test]
fn test_map_skips_unknown_fields() {
    let bytes = encode(|e| {
        e.map_begin()?;
        e.field_u64("address", 0x1000)?;
        e.variant_begin("future_field")?;
        e.list_begin()?;
        e.str("ignored")?;
        e.u64(7)?;
        e.list_end()?;
        e.variant_end()?;
        e.field_str("name", "bar")?;
        e.map_end()
    });

    let mut dec = Decoder::new(&bytes);
    let mut map = dec.map().unwrap();
    let mut address = None;
    let mut name = None;
    while let Some((key, mut val)) = map.next().unwrap() {
        match key {
            "address" => address = Some(val.u64().unwrap()),
            "name" => name = Some(val.str().unwrap()),
            _ => val.skip().unwrap(),
        }
    }
    assert_eq!(address, Some(0x1000));
    assert_eq!(name, Some("bar"));
}

#[test]
fn test_list_iteration() {
    let bytes = encode(|e| {
        e.list_begin()?;
        for i in 0..3 {
            e.s64(i)?;
        }
        e.list_end()
    });

    let mut dec = Decoder::new(&bytes);
    let mut list = dec.list().unwrap();
    let mut seen = Vec::new();
    while let Some(mut item) = list.next().unwrap() {
        seen.push(item.s64().unwrap());
    }
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_result_and_option() {
    let bytes = encode(|e| {
        e.result_err_begin()?;
        e.option_some_begin()?;
        e.u32(42)?;
        e.option_some_end()?;
        e.result_err_end()?;
        e.option_none()
    });

    let mut dec = Decoder::new(&bytes);
    let Err(mut err_body) = dec.result().unwrap() else { panic!("expected Err") };
    let mut some = err_body.option().unwrap().expect("expected Some");
    assert_eq!(some.u32().unwrap(), 42);
    assert!(dec.option().unwrap().is_none());
}

#[test]
fn test_map_rejects_bare_scalars() {
    let mut enc = Encoder::new();
    enc.map_begin().unwrap();
    assert_eq!(enc.u64(1), Err(Error::InvalidMapEntry));
}

#[test]
fn test_variant_requires_exactly_one_payload() {
    let mut enc = Encoder::new();
    enc.variant_begin("x").unwrap();
    assert_eq!(enc.variant_end(), Err(Error::EmptyAdt(Scope::Variant)));

    let mut enc = Encoder::new();
    enc.variant_begin("x").unwrap();
    enc.unit().unwrap();
    assert_eq!(enc.unit(), Err(Error::TooManyItems(Scope::Variant)));
}

#[test]
fn test_open_scope_cannot_finalize() {
    let mut enc = Encoder::new();
    enc.list_begin().unwrap();
    assert_eq!(enc.into_bytes().err(), Some(Error::ScopeStillOpen));
}

#[test]
fn test_scope_mismatch_and_underflow() {
    let mut enc = Encoder::new();
    assert_eq!(enc.list_end(), Err(Error::ScopeUnderflow));
    enc.list_begin().unwrap();
    assert_eq!(
        enc.map_end(),
        Err(Error::ScopeMismatch { expected: Scope::Map, actual: Scope::List })
    );
}

#[test]
fn test_truncated_input_is_an_error() {
    let bytes = encode(|e| e.str("truncated"));
    let mut dec = Decoder::new(&bytes[..bytes.len() - 2]);
    assert_eq!(dec.str(), Err(Error::UnexpectedEnd));
}

#[test]
fn test_wrong_tag_is_reported() {
    let bytes = encode(|e| e.s64(5));
    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.u64(), Err(Error::UnexpectedTag { expected: Tag::U64, found: Tag::S64 }));
}

#[test]
fn test_invalid_tag_byte() {
    let mut dec = Decoder::new(&[0xEE]);
    assert_eq!(dec.peek_tag(), Err(Error::InvalidTag(0xEE)));
}
