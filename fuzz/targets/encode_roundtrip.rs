#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use zbin::{decode_to_dynamic, encode, CodecError, Decoder, Value};

/// Произвольное значение с ограниченной глубиной. Строки и имена полей
/// очищаются от нулевого байта, иначе кодировщик их отклоняет.
fn arb_value(
    u: &mut Unstructured<'_>,
    depth: usize,
) -> arbitrary::Result<Value> {
    let top = if depth == 0 { 9 } else { 13 };
    Ok(match u.int_in_range::<u8>(0..=top)? {
        0 => Value::U8(u.arbitrary()?),
        1 => Value::I16(u.arbitrary()?),
        2 => Value::U32(u.arbitrary()?),
        3 => Value::Int(u.arbitrary()?),
        4 => Value::Uint(u.arbitrary()?),
        5 => Value::F64(u.arbitrary()?),
        6 => Value::Bool(u.arbitrary()?),
        7 => Value::Str(arb_string(u)?),
        8 => Value::Bytes(Vec::<u8>::arbitrary(u)?.into()),
        9 => Value::IntArray(u.arbitrary()?),
        10 => {
            let len = u.int_in_range::<usize>(0..=8)?;
            let items = (0..len)
                .map(|_| arb_value(u, depth - 1))
                .collect::<arbitrary::Result<_>>()?;
            Value::Array(items)
        }
        11 => {
            let len = u.int_in_range::<usize>(0..=8)?;
            let mut map = Value::Map(Vec::new());
            for _ in 0..len {
                let key = Value::Str(arb_string(u)?);
                map.insert(key, arb_value(u, depth - 1)?);
            }
            map
        }
        12 => {
            let len = u.int_in_range::<usize>(0..=8)?;
            let mut fields: Vec<(String, Value)> = Vec::new();
            for _ in 0..len {
                let mut name = arb_string(u)?;
                if name.is_empty() {
                    name.push('F');
                }
                if fields.iter().all(|(n, _)| n != &name) {
                    fields.push((name, arb_value(u, depth - 1)?));
                }
            }
            Value::Record(fields)
        }
        _ => Value::StrArray(
            (0..u.int_in_range::<usize>(0..=8)?)
                .map(|_| arb_string(u))
                .collect::<arbitrary::Result<_>>()?,
        ),
    })
}

fn arb_string(u: &mut Unstructured<'_>) -> arbitrary::Result<String> {
    let s: String = u.arbitrary()?;
    Ok(s.replace('\0', ""))
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(value) = arb_value(&mut u, 4) else {
        return;
    };

    let buf = match encode(&value) {
        Ok(buf) => buf,
        Err(CodecError::LengthOverflow { .. }) => return,
        Err(e) => panic!("encoding failed: {e} for {value:?}"),
    };

    let (decoded, consumed) = Decoder::new()
        .decode_value(&buf)
        .expect("encoded value must decode");
    assert_eq!(consumed, buf.len());

    // NaN != NaN, поэтому сравниваем повторное кодирование.
    let again = encode(&decoded).expect("decoded value must encode");
    assert_eq!(again, buf);

    // Любой строгий префикс должен отклоняться.
    if !buf.is_empty() {
        assert!(decode_to_dynamic(&buf[..buf.len() - 1]).is_err());
    }
});
