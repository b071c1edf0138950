// Layout conformance tests for the records and region headers shared with
// the agent. Sizes and offsets are fixed by the wire format; they print the
// observed values to aid debugging when a mismatch occurs on a given platform.
use covershm::Wire::layout::{
    control_data_offset, control_region_size, results_data_offset, results_region_size,
    ControlHeader, CycleState, ResultsHeader, MAX_MSG_SIZE, READ_SIZE, VISIT_ELEMENT_SIZE,
};
use covershm::Wire::marshal::{WireRecord, FIXED_STRING_BYTES};
use covershm::Wire::messages::{
    full_page_size, GetSequencePointsRequest, GetSequencePointsResponse, SequencePointRecord,
    TrackAssemblyRequest, TrackAssemblyResponse, VisitKind, VisitRecord,
};
use covershm::Wire::{read, write, Request};
use crossbeam_utils::CachePadded;
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU32;

#[test]
fn test_record_sizes() {
    assert_eq!(FIXED_STRING_BYTES, 1024);
    assert_eq!(TrackAssemblyRequest::SIZE, 2052);
    assert_eq!(TrackAssemblyResponse::SIZE, 4);
    assert_eq!(GetSequencePointsRequest::SIZE, 1032);
    assert_eq!(GetSequencePointsResponse::SIZE, 8);
    assert_eq!(SequencePointRecord::SIZE, 8);
    assert_eq!(VisitRecord::SIZE, 8);
    assert_eq!(VISIT_ELEMENT_SIZE, 8);
    assert_eq!(full_page_size(), 48);
}

#[test]
fn test_sequence_point_record_matches_c_layout() {
    // Handed to C callers as an array, so the Rust layout must match the wire
    assert_eq!(size_of::<SequencePointRecord>(), SequencePointRecord::SIZE);
    assert_eq!(offset_of!(SequencePointRecord, unique_id), 0);
    assert_eq!(offset_of!(SequencePointRecord, offset), 4);
}

#[test]
fn test_read_and_max_message_size() {
    println!("READ_SIZE = {}, MAX_MSG_SIZE = {}", *READ_SIZE, *MAX_MSG_SIZE);
    assert_eq!(*READ_SIZE, 2052);
    assert_eq!(*MAX_MSG_SIZE, 2052);
    assert!(*MAX_MSG_SIZE >= full_page_size());
}

#[test]
fn test_control_header_layout() {
    let pad = align_of::<CachePadded<AtomicU32>>();
    let off_requested = offset_of!(ControlHeader, requested);
    let off_ready = offset_of!(ControlHeader, response_ready);
    let off_consumed = offset_of!(ControlHeader, response_consumed);

    println!(
        "ControlHeader => size: {}, align: {}, pad: {pad}, offsets: [magic:{}, capacity:{}, state:{}, requested:{off_requested}, response_ready:{off_ready}, response_consumed:{off_consumed}]",
        size_of::<ControlHeader>(),
        align_of::<ControlHeader>(),
        offset_of!(ControlHeader, magic),
        offset_of!(ControlHeader, capacity),
        offset_of!(ControlHeader, state),
    );

    assert_eq!(align_of::<ControlHeader>(), 128);
    assert_eq!(offset_of!(ControlHeader, magic), 0);
    assert_eq!(offset_of!(ControlHeader, capacity), 8);
    assert_eq!(offset_of!(ControlHeader, state), 12);
    // Every signal word owns a cache line
    assert_eq!(off_requested % pad, 0);
    assert_eq!(off_ready - off_requested, pad);
    assert_eq!(off_consumed - off_ready, pad);
    assert_eq!(size_of::<ControlHeader>() % 128, 0);

    assert_eq!(control_data_offset(), size_of::<ControlHeader>());
    assert_eq!(control_region_size(), size_of::<ControlHeader>() + 2052);
}

#[test]
fn test_results_header_layout() {
    let pad = align_of::<CachePadded<AtomicU32>>();
    let off_ready = offset_of!(ResultsHeader, results_ready);
    let off_consumed = offset_of!(ResultsHeader, results_consumed);

    assert_eq!(align_of::<ResultsHeader>(), 128);
    assert_eq!(offset_of!(ResultsHeader, magic), 0);
    assert_eq!(offset_of!(ResultsHeader, buffer_size), 8);
    assert_eq!(offset_of!(ResultsHeader, state), 12);
    assert_eq!(off_ready % pad, 0);
    assert_eq!(off_consumed - off_ready, pad);

    assert_eq!(results_data_offset(), size_of::<ResultsHeader>());
    assert_eq!(results_region_size(4096), size_of::<ResultsHeader>() + 4096);
}

#[test]
fn test_track_assembly_request_bytes() {
    let mut buf = vec![0xAAu8; TrackAssemblyRequest::SIZE];
    let request = TrackAssemblyRequest::new("m", "Ab").unwrap();
    let end = write(&request, &mut buf, 0).unwrap();
    assert_eq!(end, 2052);

    // Type tag, little-endian
    assert_eq!(&buf[0..4], &[1, 0, 0, 0]);
    // Module: UTF-16LE "m" then NUL padding to 1024 bytes
    assert_eq!(&buf[4..6], &[b'm', 0]);
    assert!(buf[6..4 + 1024].iter().all(|&b| b == 0));
    // Assembly follows at 1028
    assert_eq!(&buf[1028..1032], &[b'A', 0, b'b', 0]);
    assert!(buf[1032..2052].iter().all(|&b| b == 0));
}

#[test]
fn test_get_sequence_points_request_bytes() {
    let mut buf = vec![0u8; GetSequencePointsRequest::SIZE];
    let request = GetSequencePointsRequest::new(0x0600_0012, "x").unwrap();
    write(&request, &mut buf, 0).unwrap();

    assert_eq!(&buf[0..4], &[2, 0, 0, 0]);
    assert_eq!(&buf[4..8], &0x0600_0012i32.to_le_bytes());
    assert_eq!(&buf[8..10], &[b'x', 0]);
}

#[test]
fn test_response_and_visit_bytes() {
    let mut buf = [0u8; 8];
    write(&TrackAssemblyResponse { track: true }, &mut buf, 0).unwrap();
    assert_eq!(&buf[0..4], &[1, 0, 0, 0]);

    let header = GetSequencePointsResponse { more: true, count: 5 };
    write(&header, &mut buf, 0).unwrap();
    assert_eq!(buf, [1, 0, 0, 0, 5, 0, 0, 0]);

    let visit = VisitRecord::new(0x0102_0304, VisitKind::MethodLeave);
    write(&visit, &mut buf, 0).unwrap();
    assert_eq!(buf, [4, 3, 2, 1, 2, 0, 0, 0]);
    assert_eq!(read::<VisitRecord>(&buf, 0).unwrap(), visit);
}

#[test]
fn test_request_decode_dispatches_on_tag() {
    let mut buf = vec![0u8; *MAX_MSG_SIZE];
    let request = Request::GetSequencePoints(GetSequencePointsRequest::new(7, "lib.dll").unwrap());
    request.encode(&mut buf).unwrap();
    assert_eq!(Request::decode(&buf).unwrap(), request);

    let request = Request::TrackAssembly(TrackAssemblyRequest::new("lib.dll", "Lib").unwrap());
    request.encode(&mut buf).unwrap();
    assert_eq!(Request::decode(&buf).unwrap(), request);
}

#[test]
fn test_cycle_state_words() {
    for state in [
        CycleState::Idle,
        CycleState::Requested,
        CycleState::Responding,
        CycleState::Faulted,
        CycleState::Failed,
    ] {
        assert_eq!(CycleState::from_raw(state as u32), Some(state));
    }
    assert_eq!(CycleState::Failed as u32, 4);
    assert_eq!(CycleState::from_raw(5), None);
}
