// Host behaviour when the agent never acknowledges a response page.
mod common;

use common::{init_logging, points, FixedDecision};
use covershm::Channel::ControlChannel;
use covershm::Core::WaitPhase;
use covershm::Protocol::CycleReport;
use covershm::Wire::messages::{GetSequencePointsRequest, TrackAssemblyRequest};
use covershm::Wire::{CycleState, Request, MAX_MSG_SIZE};
use covershm::{ChannelBuilder, ChannelError, TimeoutPolicy};
use std::thread;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_millis(30);

/// Post `request` the way an agent would, without ever reading the response.
fn post(control: &ControlChannel, request: Request) {
    let mut buf = vec![0u8; *MAX_MSG_SIZE];
    let written = request.encode(&mut buf).unwrap();
    control.claim().unwrap();
    control.buffer().write_from(&buf[..written]).unwrap();
    control.signals().requested.signal().unwrap();
}

fn track_request() -> Request {
    Request::TrackAssembly(TrackAssemblyRequest::new("m", "a").unwrap())
}

#[test]
fn test_fail_policy_faults_on_missing_ack() {
    init_logging();
    let (host, agent) = ChannelBuilder::new()
        .with_timeout(SHORT)
        .build_in_process(FixedDecision::new(true, Vec::new()))
        .unwrap();
    let mut coordinator = host.coordinator;
    assert_eq!(coordinator.policy(), TimeoutPolicy::Fail);

    post(agent.control(), track_request());
    assert!(coordinator.wait_for_request(SHORT).unwrap());

    let err = coordinator.process_request().unwrap_err();
    assert!(matches!(
        err,
        ChannelError::ChannelTimedOut(WaitPhase::ResponseConsumed)
    ));
    assert_eq!(agent.control().state(), Some(CycleState::Faulted));
    assert!(agent.control().signals().response_ready.is_signaled());
}

#[test]
fn test_continue_policy_proceeds_past_missing_ack() {
    init_logging();
    let continuing = || {
        ChannelBuilder::new()
            .with_timeout(SHORT)
            .with_timeout_policy(TimeoutPolicy::Continue)
            .build_in_process(FixedDecision::new(true, points(1, 12)))
            .unwrap()
    };

    let (host, agent) = continuing();
    let mut coordinator = host.coordinator;
    post(agent.control(), track_request());
    let report = coordinator.process_request().unwrap();
    assert_eq!(
        report,
        CycleReport {
            pages: 1,
            response_size: 4
        }
    );
    // Nobody released the cycle
    assert_eq!(agent.control().state(), Some(CycleState::Responding));

    let (host, agent) = continuing();
    let mut coordinator = host.coordinator;
    post(
        agent.control(),
        Request::GetSequencePoints(GetSequencePointsRequest::new(9, "m").unwrap()),
    );
    let report = coordinator.process_request().unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.response_size, 8 + 2 * 8);
    assert!(!agent.control().is_faulted());
}

#[test]
fn test_stale_ack_does_not_satisfy_next_page() {
    init_logging();
    let (host, agent) = ChannelBuilder::new()
        .with_timeout(SHORT)
        .build_in_process(FixedDecision::new(true, Vec::new()))
        .unwrap();
    let mut coordinator = host.coordinator;

    // Left over from an earlier cycle
    agent.control().signals().response_consumed.signal().unwrap();

    post(agent.control(), track_request());
    let err = coordinator.process_request().unwrap_err();
    assert!(matches!(
        err,
        ChannelError::ChannelTimedOut(WaitPhase::ResponseConsumed)
    ));
    assert!(agent.control().is_faulted());
}

#[test]
fn test_host_stops_paging_once_agent_faults() {
    init_logging();
    let wait = Duration::from_secs(5);
    let (host, agent) = ChannelBuilder::new()
        .with_timeout(wait)
        .build_in_process(FixedDecision::new(true, points(1, 12)))
        .unwrap();
    let mut coordinator = host.coordinator;

    post(
        agent.control(),
        Request::GetSequencePoints(GetSequencePointsRequest::new(9, "m").unwrap()),
    );
    // The agent gives up after the first page instead of acknowledging it
    let giver = thread::spawn(move || {
        assert!(agent.control().signals().response_ready.wait_timeout(wait).unwrap());
        agent.control().fault();
        agent
    });

    let started = Instant::now();
    let err = coordinator.process_request().unwrap_err();
    assert!(matches!(err, ChannelError::ChannelFaulted));
    assert!(started.elapsed() < wait);

    let agent = giver.join().unwrap();
    assert_eq!(agent.control().state(), Some(CycleState::Faulted));
}

#[test]
fn test_out_of_order_request_faults() {
    init_logging();
    let (host, agent) = ChannelBuilder::new()
        .with_timeout(SHORT)
        .build_in_process(FixedDecision::new(true, Vec::new()))
        .unwrap();
    let mut coordinator = host.coordinator;

    // Request signal raised without a claimed cycle
    agent.control().signals().requested.signal().unwrap();
    let err = coordinator.process_request().unwrap_err();
    assert!(matches!(err, ChannelError::UnexpectedState(0)));
    assert!(agent.control().is_faulted());
}
