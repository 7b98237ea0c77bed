use chrono::Utc;
use lockbox_types::{
    Envelope, EnvelopeHeader, FileId, FileRecord, KeyId, UserId, WrappedKeys,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn header() -> EnvelopeHeader {
    EnvelopeHeader {
        algorithm: "AES-256-CBC+CHACHA20".into(),
        key_id: KeyId::from("0123456789abcdef0123456789abcdef"),
        iv: vec![7u8; 16],
        wrapped_keys: WrappedKeys {
            block_key: vec![1, 2, 3],
            stream_key: vec![4, 5, 6],
        },
        digest: vec![9u8; 64],
        digest_algorithm: "SHA-512".into(),
    }
}

#[test]
fn envelope_json_is_flat() {
    let envelope = header().with_ciphertext(vec![0xAA, 0xBB]);
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["algorithm"], "AES-256-CBC+CHACHA20");
    assert_eq!(json["key_id"], "0123456789abcdef0123456789abcdef");
    assert_eq!(json["digest_algorithm"], "SHA-512");
    assert!(json.get("header").is_none());

    let back: Envelope = serde_json::from_value(json).unwrap();
    assert_eq!(back, envelope);
}

#[test]
fn accessors_expose_header_fields() {
    let envelope = header().with_ciphertext(vec![1]);
    assert_eq!(envelope.wrapped_block_key(), &[1, 2, 3]);
    assert_eq!(envelope.wrapped_stream_key(), &[4, 5, 6]);
    assert_eq!(envelope.iv().len(), 16);

    let (h, ct) = envelope.into_parts();
    assert_eq!(h, header());
    assert_eq!(ct, vec![1]);
}

#[test]
fn wrapped_keys_for_owner_and_recipients() {
    let owner = UserId::new();
    let guest = UserId::new();
    let stranger = UserId::new();

    let guest_keys = WrappedKeys {
        block_key: vec![10],
        stream_key: vec![11],
    };
    let mut recipients = BTreeMap::new();
    recipients.insert(guest, guest_keys.clone());

    let record = FileRecord {
        id: FileId::new(),
        owner,
        name: "report.pdf".into(),
        size: 10,
        storage_locator: "blob-1".into(),
        header: header(),
        uploaded_at: Utc::now(),
        deleted: false,
        deleted_at: None,
        recipient_keys: recipients,
    };

    assert_eq!(record.wrapped_keys_for(&owner), Some(&header().wrapped_keys));
    assert_eq!(record.wrapped_keys_for(&guest), Some(&guest_keys));
    assert!(record.wrapped_keys_for(&stranger).is_none());
}
