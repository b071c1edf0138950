// Fixed-width string and record marshaling edge cases.
use covershm::Wire::marshal::{validate_fixed_string, WireRecord, FIXED_STRING_UNITS};
use covershm::Wire::messages::{
    decode_page, encode_page, GetSequencePointsRequest, SequencePointRecord,
    TrackAssemblyRequest, TrackAssemblyResponse, VisitRecord,
};
use covershm::Wire::{read, write, Request, MAX_MSG_SIZE};
use covershm::ChannelError;

#[test]
fn test_string_of_exactly_capacity_round_trips() {
    let name: String = std::iter::repeat('a').take(FIXED_STRING_UNITS).collect();
    let request = TrackAssemblyRequest::new(name.clone(), "Asm").unwrap();

    let mut buf = vec![0u8; TrackAssemblyRequest::SIZE];
    write(&request, &mut buf, 0).unwrap();
    let decoded: TrackAssemblyRequest = read(&buf, 0).unwrap();
    assert_eq!(decoded.module_name, name);
    assert_eq!(decoded.assembly_name, "Asm");
}

#[test]
fn test_string_over_capacity_is_rejected() {
    let name: String = std::iter::repeat('a').take(FIXED_STRING_UNITS + 1).collect();
    match TrackAssemblyRequest::new(name, "Asm") {
        Err(ChannelError::NameTooLong { units, capacity }) => {
            assert_eq!(units, 513);
            assert_eq!(capacity, 512);
        }
        other => panic!("expected NameTooLong, got {:?}", other),
    }
}

#[test]
fn test_capacity_counts_utf16_units_not_chars() {
    // Each of these takes a surrogate pair
    let name: String = std::iter::repeat('\u{1F980}').take(256).collect();
    assert!(validate_fixed_string(&name).is_ok());

    let name: String = std::iter::repeat('\u{1F980}').take(257).collect();
    assert!(matches!(
        validate_fixed_string(&name),
        Err(ChannelError::NameTooLong { units: 514, .. })
    ));
}

#[test]
fn test_non_ascii_names_round_trip() {
    let request = GetSequencePointsRequest::new(-1, "C:\\Über\\Mödül\u{1F980}.dll").unwrap();
    let mut buf = vec![0u8; *MAX_MSG_SIZE];
    let written = Request::GetSequencePoints(request.clone()).encode(&mut buf).unwrap();
    assert_eq!(written, 1032);
    assert_eq!(Request::decode(&buf).unwrap(), Request::GetSequencePoints(request));
}

#[test]
fn test_embedded_nul_is_rejected() {
    assert!(matches!(
        TrackAssemblyRequest::new("a\0b", "Asm"),
        Err(ChannelError::EmbeddedNul)
    ));
}

#[test]
fn test_lone_surrogate_is_malformed() {
    let mut buf = vec![0u8; *MAX_MSG_SIZE];
    buf[0..4].copy_from_slice(&2i32.to_le_bytes());
    buf[8..10].copy_from_slice(&0xD800u16.to_le_bytes());
    assert!(matches!(Request::decode(&buf), Err(ChannelError::MalformedString)));
}

#[test]
fn test_unknown_tag_is_rejected() {
    let mut buf = vec![0u8; *MAX_MSG_SIZE];
    buf[0..4].copy_from_slice(&99i32.to_le_bytes());
    assert!(matches!(
        Request::decode(&buf),
        Err(ChannelError::UnknownMessageType(99))
    ));

    buf[0..4].copy_from_slice(&0i32.to_le_bytes());
    assert!(matches!(
        Request::decode(&buf),
        Err(ChannelError::UnknownMessageType(0))
    ));
}

#[test]
fn test_any_nonzero_bool_reads_true() {
    let response: TrackAssemblyResponse = read(&[2, 0, 0, 0], 0).unwrap();
    assert!(response.track);
    let response: TrackAssemblyResponse = read(&[0, 0, 0, 0], 0).unwrap();
    assert!(!response.track);
}

#[test]
fn test_unknown_visit_kind_is_rejected() {
    let mut buf = [0u8; 8];
    buf[4..8].copy_from_slice(&7i32.to_le_bytes());
    assert!(matches!(
        read::<VisitRecord>(&buf, 0),
        Err(ChannelError::UnknownVisitKind(7))
    ));
}

#[test]
fn test_read_past_end_is_overrun() {
    let buf = [0u8; 6];
    match read::<VisitRecord>(&buf, 0) {
        Err(ChannelError::Overrun { offset, needed, capacity }) => {
            assert_eq!((offset, needed, capacity), (0, 8, 6));
        }
        other => panic!("expected Overrun, got {:?}", other),
    }

    let mut small = [0u8; 12];
    assert!(write(&TrackAssemblyResponse { track: true }, &mut small, 10).is_err());
    assert!(write(&TrackAssemblyResponse { track: true }, &mut small, usize::MAX).is_err());
}

#[test]
fn test_page_count_is_bounded() {
    let points = vec![SequencePointRecord { unique_id: 1, offset: 0 }; 3];
    let mut buf = vec![0u8; 64];
    let written = encode_page(&mut buf, false, &points).unwrap();
    assert_eq!(written, 8 + 3 * 8);

    let mut out = Vec::new();
    let header = decode_page(&buf, &mut out).unwrap();
    assert!(!header.more);
    assert_eq!(out, points);

    buf[4..8].copy_from_slice(&6i32.to_le_bytes());
    assert!(matches!(
        decode_page(&buf, &mut Vec::new()),
        Err(ChannelError::BadPageCount(6))
    ));
    buf[4..8].copy_from_slice(&(-1i32).to_le_bytes());
    assert!(matches!(
        decode_page(&buf, &mut Vec::new()),
        Err(ChannelError::BadPageCount(-1))
    ));
}
