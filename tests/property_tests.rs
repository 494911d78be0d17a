//! Property-based тесты кодека.
//!
//! Генерируют тысячи случайных значений и проверяют, что encode/decode
//! сохраняет значение, что закодированные значения самоограничены, а
//! обрезанный или мусорный вход приводит к ошибке, а не к панике.

use std::collections::HashMap;

use proptest::{collection, prelude::*};
use zbin::{decode, decode_to_dynamic, encode, CodecError, Decoder, Value};

use generators::*;

const PROPTEST_CASES: u32 = 1000;
const PROPTEST_MAX_SHRINK_ITERS: u32 = 10000;

/// Побитовое сравнение чисел с плавающей точкой: NaN == NaN, 0.0 != -0.0.
fn value_deep_eq(
    a: &Value,
    b: &Value,
) -> bool {
    use Value::*;
    match (a, b) {
        (F32(x), F32(y)) => x.to_bits() == y.to_bits(),
        (F64(x), F64(y)) => x.to_bits() == y.to_bits(),
        (F32Array(x), F32Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| p.to_bits() == q.to_bits())
        }
        (F64Array(x), F64Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| p.to_bits() == q.to_bits())
        }
        (Array(x), Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| value_deep_eq(p, q))
        }
        (Map(x), Map(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((k1, v1), (k2, v2))| value_deep_eq(k1, k2) && value_deep_eq(v1, v2))
        }
        (Record(x), Record(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((n1, v1), (n2, v2))| n1 == n2 && value_deep_eq(v1, v2))
        }
        _ => a == b,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: PROPTEST_CASES,
        max_shrink_iters: PROPTEST_MAX_SHRINK_ITERS,
        .. ProptestConfig::default()
    })]

    /// Главный roundtrip: любое значение переживает encode -> decode, а
    /// декодер потребляет ровно столько байт, сколько записал кодировщик.
    #[test]
    fn roundtrip_all_values(value in any_value_strategy()) {
        let buf = encode(&value)
            .map_err(|e| TestCaseError::fail(format!("Failed to encode value: {e}")))?;

        let (decoded, consumed) = Decoder::new()
            .decode_value(&buf)
            .map_err(|e| TestCaseError::fail(format!("Failed to decode value: {e}")))?;

        prop_assert_eq!(consumed, buf.len());
        prop_assert!(
            value_deep_eq(&value, &decoded),
            "Roundtrip failed\nleft: {value:?}\nright: {decoded:?}"
        );
        prop_assert_eq!(buf[0], value.tag().byte());
    }

    /// Конкатенация двух значений с мусором в конце декодируется по одному.
    #[test]
    fn encoded_values_are_self_delimiting(
        a in any_value_strategy(),
        b in any_value_strategy(),
        tail in collection::vec(any::<u8>(), 0..16),
    ) {
        let first = encode(&a).unwrap();
        let second = encode(&b).unwrap();
        let mut buf = first.clone();
        buf.extend_from_slice(&second);
        buf.extend_from_slice(&tail);

        let decoder = Decoder::new();
        let (da, used_a) = decoder.decode_value(&buf).unwrap();
        prop_assert_eq!(used_a, first.len());
        prop_assert!(value_deep_eq(&a, &da));

        let (db, used_b) = decoder.decode_value(&buf[used_a..]).unwrap();
        prop_assert_eq!(used_b, second.len());
        prop_assert!(value_deep_eq(&b, &db));
    }

    /// Любой строгий префикс закодированного значения отклоняется как
    /// обрыв данных.
    #[test]
    fn truncated_input_is_rejected(value in any_value_strategy(), cut in any::<prop::sample::Index>()) {
        let buf = encode(&value).unwrap();
        let len = cut.index(buf.len());
        let err = decode_to_dynamic(&buf[..len]).unwrap_err();
        prop_assert!(
            err.is_truncation() || matches!(err, CodecError::InvalidStructField { .. }),
            "unexpected error for prefix {len}/{}: {err}", buf.len()
        );
    }

    /// Первый байт вне словаря тегов даёт `InvalidTag` со смещением 0.
    #[test]
    fn unknown_leading_tag_is_rejected(
        tag in non_tag_byte_strategy(),
        tail in collection::vec(any::<u8>(), 0..32),
    ) {
        let mut buf = vec![tag];
        buf.extend_from_slice(&tail);
        prop_assert_eq!(
            decode_to_dynamic(&buf).unwrap_err(),
            CodecError::InvalidTag { tag, offset: 0 }
        );
    }

    /// Произвольные байты никогда не вызывают панику.
    #[test]
    fn arbitrary_bytes_never_panic(buf in collection::vec(any::<u8>(), 0..256)) {
        if let Ok((_, consumed)) = Decoder::new().decode_value(&buf) {
            prop_assert!(consumed <= buf.len());
        }
    }

    /// Крупные массивы.
    #[test]
    fn large_arrays_roundtrip(value in large_array_strategy()) {
        let buf = encode(&value).unwrap();
        let decoded = decode_to_dynamic(&buf).unwrap();
        prop_assert!(value_deep_eq(&value, &decoded));
    }

    /// Типизированные приёмники.
    #[test]
    fn typed_roundtrip(
        ints in collection::vec(any::<isize>(), 0..64),
        words in collection::hash_map(string_strategy(), any::<i32>(), 0..16),
    ) {
        let mut ints_back: Vec<isize> = Vec::new();
        decode(&encode(&ints).unwrap(), &mut ints_back).unwrap();
        prop_assert_eq!(ints_back, ints);

        let mut words_back: HashMap<String, i32> = HashMap::new();
        decode(&encode(&words).unwrap(), &mut words_back).unwrap();
        prop_assert_eq!(words_back, words);
    }

    /// `Int32` на проводе читается в `i64` без потерь.
    #[test]
    fn integer_coercion_into_i64(v in any::<i32>()) {
        let mut out = 0i64;
        decode(&encode(&v).unwrap(), &mut out).unwrap();
        prop_assert_eq!(out, i64::from(v));
    }
}

/// Дополнительные unit тесты для специфичных случаев
#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_empty_collections() {
        let cases = vec![
            Value::Array(vec![]),
            Value::IntArray(vec![]),
            Value::StrArray(vec![]),
            Value::Map(vec![]),
            Value::Record(vec![]),
        ];

        for value in cases {
            let buf = encode(&value).unwrap();
            let decoded = decode_to_dynamic(&buf).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_deep_nesting_hits_depth_limit() {
        let mut value = Value::Array(vec![]);
        for _ in 0..40 {
            value = Value::Array(vec![value]);
        }
        let buf = encode(&value).unwrap();
        assert!(matches!(
            decode_to_dynamic(&buf),
            Err(CodecError::DepthLimit { max: 32, .. })
        ));
    }

    #[test]
    fn test_nan_roundtrip() {
        let buf = encode(&Value::F64(f64::NAN)).unwrap();
        let decoded = decode_to_dynamic(&buf).unwrap();
        assert!(value_deep_eq(&Value::F64(f64::NAN), &decoded));
    }
}
