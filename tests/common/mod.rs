// Shared fixtures for the integration tests.
#![allow(dead_code)]

use covershm::Core::BoxError;
use covershm::{InstrumentationDecision, SequencePointRecord};
use parking_lot::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `count` points for one function, ids starting at `first_id`.
pub fn points(first_id: u32, count: usize) -> Vec<SequencePointRecord> {
    (0..count as u32)
        .map(|i| SequencePointRecord {
            unique_id: first_id + i,
            offset: (i * 3) as i32,
        })
        .collect()
}

/// Decision that answers from fixed data and records every call.
pub struct FixedDecision {
    pub track: bool,
    pub points: Vec<SequencePointRecord>,
    pub track_calls: Mutex<Vec<(String, String)>>,
    pub point_calls: Mutex<Vec<(String, i32)>>,
}

impl FixedDecision {
    pub fn new(track: bool, points: Vec<SequencePointRecord>) -> Self {
        Self {
            track,
            points,
            track_calls: Mutex::new(Vec::new()),
            point_calls: Mutex::new(Vec::new()),
        }
    }
}

impl InstrumentationDecision for FixedDecision {
    fn should_track(&self, module: &str, assembly: &str) -> Result<bool, BoxError> {
        self.track_calls
            .lock()
            .push((module.to_string(), assembly.to_string()));
        Ok(self.track)
    }

    fn sequence_points_for(
        &self,
        module: &str,
        function_token: i32,
    ) -> Result<Vec<SequencePointRecord>, BoxError> {
        self.point_calls
            .lock()
            .push((module.to_string(), function_token));
        Ok(self.points.clone())
    }
}

/// Tracks assemblies whose name ends in `.Tests`; function `token` has
/// `token` sequence points.
pub struct TokenDecision;

impl InstrumentationDecision for TokenDecision {
    fn should_track(&self, _module: &str, assembly: &str) -> Result<bool, BoxError> {
        Ok(assembly.ends_with(".Tests"))
    }

    fn sequence_points_for(
        &self,
        _module: &str,
        function_token: i32,
    ) -> Result<Vec<SequencePointRecord>, BoxError> {
        Ok(points(function_token as u32 * 1000, function_token as usize))
    }
}

/// Decision whose every call fails.
pub struct FailingDecision;

impl InstrumentationDecision for FailingDecision {
    fn should_track(&self, _module: &str, _assembly: &str) -> Result<bool, BoxError> {
        Err("filter unavailable".into())
    }

    fn sequence_points_for(
        &self,
        module: &str,
        _function_token: i32,
    ) -> Result<Vec<SequencePointRecord>, BoxError> {
        Err(format!("no symbols for {}", module).into())
    }
}

/// Refuses every assembly filter query but answers sequence points from
/// fixed data.
pub struct FlakyDecision {
    pub points: Vec<SequencePointRecord>,
}

impl InstrumentationDecision for FlakyDecision {
    fn should_track(&self, _module: &str, assembly: &str) -> Result<bool, BoxError> {
        Err(format!("filter unavailable for {}", assembly).into())
    }

    fn sequence_points_for(
        &self,
        _module: &str,
        _function_token: i32,
    ) -> Result<Vec<SequencePointRecord>, BoxError> {
        Ok(self.points.clone())
    }
}
