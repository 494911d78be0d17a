#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zbin::{CodecConfig, Decoder, Value};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    element: bool,
    max_depth: u8,
}

fuzz_target!(|input: FuzzInput| {
    let config = CodecConfig {
        max_depth: usize::from(input.max_depth % 64),
        ..CodecConfig::default()
    };
    let decoder = Decoder::with_config(config);

    // Декодер не должен паниковать ни на каких данных.
    let consumed = if input.element {
        decoder
            .decode_element_value(&input.data)
            .map(|(value, _, consumed)| (value, consumed))
    } else {
        decoder.decode_value(&input.data)
    };

    let Ok((value, consumed)) = consumed else {
        return;
    };
    assert!(consumed <= input.data.len());

    // Всё, что удалось прочитать, должно кодироваться обратно без ошибок
    // и давать то же значение.
    let buf = zbin::encode(&value).expect("decoded value must encode");
    let again: Value = zbin::decode_to_dynamic(&buf).expect("re-encoded value must decode");
    if !contains_nan(&value) {
        assert_eq!(again, value);
    }
    // Повторное кодирование стабильно.
    let twice = zbin::encode(&again).expect("decoded value must encode");
    assert_eq!(twice, buf);
});

fn contains_nan(value: &Value) -> bool {
    match value {
        Value::F32(f) => f.is_nan(),
        Value::F64(f) => f.is_nan(),
        Value::F32Array(v) => v.iter().any(|f| f.is_nan()),
        Value::F64Array(v) => v.iter().any(|f| f.is_nan()),
        Value::Array(items) => items.iter().any(contains_nan),
        Value::Map(entries) => entries
            .iter()
            .any(|(k, v)| contains_nan(k) || contains_nan(v)),
        Value::Record(fields) => fields.iter().any(|(_, v)| contains_nan(v)),
        _ => false,
    }
}
