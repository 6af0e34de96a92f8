/*!
    Field-level edits on encoded protobuf messages.

    Re-encoding a decoded message drops every field the local schema does
    not know about. Edits here splice bytes instead: records other than
    the edited field are copied verbatim and keep their position.
*/

use drm_widevine::proto::prost::encoding::{
    WireType, decode_key, decode_varint, encode_key, encode_varint,
};

use crate::error::{InterceptError, InterceptResult};

/// One top-level record of an encoded message.
struct Record<'a> {
    number: u32,
    wire_type: WireType,
    /// Key and value as they appear on the wire.
    bytes: &'a [u8],
    /// Contents of a length-delimited value, empty otherwise.
    value: &'a [u8],
}

fn records(message: &[u8]) -> InterceptResult<Vec<Record<'_>>> {
    let mut out = Vec::new();
    let mut rest = message;
    while !rest.is_empty() {
        let mut cursor = rest;
        let (number, wire_type) = decode_key(&mut cursor)?;
        let value = skip_value(&mut cursor, number, wire_type)?;
        let used = rest.len() - cursor.len();
        out.push(Record {
            number,
            wire_type,
            bytes: &rest[..used],
            value,
        });
        rest = cursor;
    }
    Ok(out)
}

fn skip_value<'a>(
    cursor: &mut &'a [u8],
    number: u32,
    wire_type: WireType,
) -> InterceptResult<&'a [u8]> {
    match wire_type {
        WireType::Varint => {
            decode_varint(cursor)?;
            Ok(&[])
        }
        WireType::SixtyFourBit => take(cursor, 8),
        WireType::ThirtyTwoBit => take(cursor, 4),
        WireType::LengthDelimited => {
            let len = decode_varint(cursor)?;
            let len = usize::try_from(len)
                .map_err(|_| InterceptError::Parse(format!("field {number} is too long")))?;
            take(cursor, len)
        }
        WireType::StartGroup => loop {
            let (inner, inner_type) = decode_key(cursor)?;
            if inner_type == WireType::EndGroup {
                if inner != number {
                    return Err(InterceptError::Parse(format!(
                        "group {number} closed by {inner}"
                    )));
                }
                return Ok(&[]);
            }
            skip_value(cursor, inner, inner_type)?;
        },
        WireType::EndGroup => Err(InterceptError::Parse(format!(
            "unmatched end of group {number}"
        ))),
    }
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> InterceptResult<&'a [u8]> {
    if cursor.len() < n {
        return Err(InterceptError::Parse("message is truncated".into()));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn push_bytes(out: &mut Vec<u8>, number: u32, value: &[u8]) {
    encode_key(number, WireType::LengthDelimited, out);
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value);
}

/**
    Set a bytes field. The first occurrence is replaced in place and later
    ones are dropped; an absent field is appended.
*/
pub fn set_bytes(message: &[u8], number: u32, value: &[u8]) -> InterceptResult<Vec<u8>> {
    let mut out = Vec::with_capacity(message.len() + value.len());
    let mut written = false;
    for record in records(message)? {
        if record.number != number {
            out.extend_from_slice(record.bytes);
        } else if !written {
            push_bytes(&mut out, number, value);
            written = true;
        }
    }
    if !written {
        push_bytes(&mut out, number, value);
    }
    Ok(out)
}

pub fn remove(message: &[u8], number: u32) -> InterceptResult<Vec<u8>> {
    let mut out = Vec::with_capacity(message.len());
    for record in records(message)? {
        if record.number != number {
            out.extend_from_slice(record.bytes);
        }
    }
    Ok(out)
}

/**
    Rewrite every occurrence of an embedded message field with `edit`.
    Returns the new message and how many occurrences were rewritten.
*/
pub fn edit_message(
    message: &[u8],
    number: u32,
    mut edit: impl FnMut(&[u8]) -> InterceptResult<Vec<u8>>,
) -> InterceptResult<(Vec<u8>, usize)> {
    let mut out = Vec::with_capacity(message.len());
    let mut edited = 0;
    for record in records(message)? {
        if record.number == number && record.wire_type == WireType::LengthDelimited {
            push_bytes(&mut out, number, &edit(record.value)?);
            edited += 1;
        } else {
            out.extend_from_slice(record.bytes);
        }
    }
    Ok((out, edited))
}

#[cfg(test)]
mod tests {
    use super::*;
    use drm_widevine::proto::{ClientIdentification, Message};

    fn bytes_field(number: u32, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        push_bytes(&mut out, number, value);
        out
    }

    fn varint_field(number: u32, value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_key(number, WireType::Varint, &mut out);
        encode_varint(value, &mut out);
        out
    }

    #[test]
    fn set_keeps_other_records_in_place() {
        let message = [
            varint_field(1, 300),
            bytes_field(2, b"old"),
            bytes_field(20, b"future"),
        ]
        .concat();
        let edited = set_bytes(&message, 2, b"new-token").unwrap();
        assert_eq!(
            edited,
            [
                varint_field(1, 300),
                bytes_field(2, b"new-token"),
                bytes_field(20, b"future"),
            ]
            .concat()
        );
    }

    #[test]
    fn set_appends_missing_field_and_collapses_repeats() {
        let message = varint_field(1, 2);
        assert_eq!(
            set_bytes(&message, 2, b"x").unwrap(),
            [varint_field(1, 2), bytes_field(2, b"x")].concat()
        );

        let repeated = [bytes_field(2, b"a"), varint_field(1, 2), bytes_field(2, b"b")].concat();
        assert_eq!(
            set_bytes(&repeated, 2, b"x").unwrap(),
            [bytes_field(2, b"x"), varint_field(1, 2)].concat()
        );
    }

    #[test]
    fn remove_drops_every_occurrence() {
        let message = [bytes_field(9, b"a"), varint_field(1, 2), bytes_field(9, b"b")].concat();
        assert_eq!(remove(&message, 9).unwrap(), varint_field(1, 2));
    }

    #[test]
    fn edit_reaches_nested_fields() {
        let client_id = ClientIdentification {
            r#type: Some(1),
            token: Some(b"app".to_vec()),
            ..Default::default()
        };
        let inner = [client_id.encode_to_vec(), bytes_field(99, b"vendor")].concat();
        let message = [bytes_field(1, &inner), bytes_field(20, b"future")].concat();

        let (edited, count) =
            edit_message(&message, 1, |inner| set_bytes(inner, 2, b"local")).unwrap();
        assert_eq!(count, 1);

        let records = records(&edited).unwrap();
        assert_eq!(records[1].bytes, bytes_field(20, b"future"));
        let inner = records[0].value;
        let decoded = ClientIdentification::decode(inner).unwrap();
        assert_eq!(decoded.token.as_deref(), Some(&b"local"[..]));
        assert!(inner.ends_with(&bytes_field(99, b"vendor")));
    }

    #[test]
    fn fixed_width_and_group_records_are_copied() {
        let mut group = Vec::new();
        encode_key(7, WireType::StartGroup, &mut group);
        group.extend(varint_field(1, 5));
        encode_key(7, WireType::EndGroup, &mut group);
        let mut fixed = Vec::new();
        encode_key(8, WireType::ThirtyTwoBit, &mut fixed);
        fixed.extend([1, 2, 3, 4]);

        let message = [group.clone(), fixed.clone(), bytes_field(2, b"old")].concat();
        assert_eq!(
            set_bytes(&message, 2, b"new").unwrap(),
            [group, fixed, bytes_field(2, b"new")].concat()
        );
    }

    #[test]
    fn truncated_message_is_parse_error() {
        let message = bytes_field(2, b"token");
        assert!(matches!(
            set_bytes(&message[..message.len() - 1], 2, b"x"),
            Err(InterceptError::Parse(_))
        ));
    }
}
