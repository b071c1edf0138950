use crate::Channel::{AgentEndpoint, ChannelBuilder};
use crate::Core::error::ChannelError;
use crate::Wire::messages::{SequencePointRecord, VisitKind, VisitRecord};
use std::ptr;
use std::time::Duration;

// Error codes
pub const COVERSHM_SUCCESS: i32 = 0;
pub const COVERSHM_ERROR_NULL_POINTER: i32 = -1;
pub const COVERSHM_ERROR_INVALID_ARG: i32 = -2;
pub const COVERSHM_ERROR_BUSY: i32 = -3;
pub const COVERSHM_ERROR_TIMED_OUT: i32 = -4;
pub const COVERSHM_ERROR_FAULTED: i32 = -5;
pub const COVERSHM_ERROR_PROTOCOL: i32 = -6;
pub const COVERSHM_ERROR_BUFFER_TOO_SMALL: i32 = -7;
pub const COVERSHM_ERROR_INTERNAL: i32 = -8;
pub const COVERSHM_ERROR_REQUEST_FAILED: i32 = -9;

/// Handle to an agent endpoint (opaque pointer)
pub struct AgentHandle {
    inner: AgentEndpoint,
}

/// Visit record as passed across the C boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CovershmVisit {
    pub unique_id: u32,
    pub kind: i32,
}

fn error_code(e: &ChannelError) -> i32 {
    match e {
        ChannelError::ChannelBusy => COVERSHM_ERROR_BUSY,
        ChannelError::ChannelTimedOut(_) => COVERSHM_ERROR_TIMED_OUT,
        ChannelError::ChannelFaulted => COVERSHM_ERROR_FAULTED,
        ChannelError::RequestFailed => COVERSHM_ERROR_REQUEST_FAILED,
        ChannelError::NameTooLong { .. } | ChannelError::EmbeddedNul => COVERSHM_ERROR_INVALID_ARG,
        e if e.is_protocol_error() => COVERSHM_ERROR_PROTOCOL,
        _ => COVERSHM_ERROR_INTERNAL,
    }
}

/// Decode a UTF-16 argument of `len` code units. A null pointer is accepted
/// only for an empty string.
unsafe fn utf16_arg(data: *const u16, len: usize) -> Result<String, i32> {
    if len == 0 {
        return Ok(String::new());
    }
    if data.is_null() {
        return Err(COVERSHM_ERROR_NULL_POINTER);
    }
    let units = std::slice::from_raw_parts(data, len);
    String::from_utf16(units).map_err(|_| COVERSHM_ERROR_INVALID_ARG)
}

// -----------------------------------------------------------------------------
// Agent API
// -----------------------------------------------------------------------------

/// Attach to the regions the host created for process `pid`.
///
/// # Arguments
/// * `pid` - Process id the host named the regions after.
/// * `timeout_ms` - Wait window for every blocking step; 0 selects the default.
///
/// # Returns
/// * Pointer to `AgentHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn covershm_agent_open(pid: u32, timeout_ms: u32) -> *mut AgentHandle {
    let mut builder = ChannelBuilder::new().with_pid(pid);
    if timeout_ms > 0 {
        builder = builder.with_timeout(Duration::from_millis(timeout_ms as u64));
    }

    match builder.build_agent() {
        Ok(agent) => Box::into_raw(Box::new(AgentHandle { inner: agent })),
        Err(e) => {
            log::error!("covershm_agent_open({}) failed: {}", pid, e);
            ptr::null_mut()
        }
    }
}

/// Ask the host whether an assembly should be instrumented.
///
/// # Arguments
/// * `module`, `module_len` - UTF-16 module path, without terminator.
/// * `assembly`, `assembly_len` - UTF-16 assembly name, without terminator.
/// * `out_track` - Receives the decision.
///
/// # Returns
/// * 0 on success, negative error code otherwise.
#[no_mangle]
pub extern "C" fn covershm_agent_track_assembly(
    handle: *mut AgentHandle,
    module: *const u16,
    module_len: usize,
    assembly: *const u16,
    assembly_len: usize,
    out_track: *mut bool,
) -> i32 {
    if handle.is_null() || out_track.is_null() {
        return COVERSHM_ERROR_NULL_POINTER;
    }

    let agent = unsafe { &mut (*handle).inner };
    let (module, assembly) = match unsafe {
        utf16_arg(module, module_len).and_then(|m| utf16_arg(assembly, assembly_len).map(|a| (m, a)))
    } {
        Ok(args) => args,
        Err(code) => return code,
    };

    match agent.track_assembly(&module, &assembly) {
        Ok(track) => {
            unsafe { *out_track = track };
            COVERSHM_SUCCESS
        }
        Err(e) => {
            log::error!("track_assembly({}) failed: {}", assembly, e);
            error_code(&e)
        }
    }
}

/// Fetch the sequence points of a function.
///
/// # Arguments
/// * `function_token` - Metadata token of the function.
/// * `module`, `module_len` - UTF-16 module path, without terminator.
/// * `out` - Array receiving the records.
/// * `inout_len` - Capacity of `out` on entry; number of points the host
///   returned on exit.
///
/// # Returns
/// * 0 on success, `COVERSHM_ERROR_BUFFER_TOO_SMALL` when `out` held only
///   the first records, negative error code otherwise.
#[no_mangle]
pub extern "C" fn covershm_agent_get_sequence_points(
    handle: *mut AgentHandle,
    function_token: i32,
    module: *const u16,
    module_len: usize,
    out: *mut SequencePointRecord,
    inout_len: *mut usize,
) -> i32 {
    if handle.is_null() || inout_len.is_null() {
        return COVERSHM_ERROR_NULL_POINTER;
    }
    let capacity = unsafe { *inout_len };
    if capacity > 0 && out.is_null() {
        return COVERSHM_ERROR_NULL_POINTER;
    }

    let agent = unsafe { &mut (*handle).inner };
    let module = match unsafe { utf16_arg(module, module_len) } {
        Ok(module) => module,
        Err(code) => return code,
    };

    match agent.get_sequence_points(&module, function_token) {
        Ok(points) => {
            let copied = points.len().min(capacity);
            unsafe {
                if copied > 0 {
                    ptr::copy_nonoverlapping(points.as_ptr(), out, copied);
                }
                *inout_len = points.len();
            }
            if copied < points.len() {
                COVERSHM_ERROR_BUFFER_TOO_SMALL
            } else {
                COVERSHM_SUCCESS
            }
        }
        Err(e) => {
            log::error!("get_sequence_points({:#x}) failed: {}", function_token, e);
            error_code(&e)
        }
    }
}

/// Publish visit records to the host.
///
/// # Returns
/// * 0 once every record was drained, negative error code otherwise.
#[no_mangle]
pub extern "C" fn covershm_agent_send_visits(
    handle: *mut AgentHandle,
    visits: *const CovershmVisit,
    count: usize,
) -> i32 {
    if handle.is_null() || (count > 0 && visits.is_null()) {
        return COVERSHM_ERROR_NULL_POINTER;
    }
    if count == 0 {
        return COVERSHM_SUCCESS;
    }

    let agent = unsafe { &mut (*handle).inner };
    let raw = unsafe { std::slice::from_raw_parts(visits, count) };
    let records: Result<Vec<VisitRecord>, _> = raw
        .iter()
        .map(|v| VisitKind::try_from(v.kind).map(|kind| VisitRecord::new(v.unique_id, kind)))
        .collect();
    let records = match records {
        Ok(records) => records,
        Err(_) => return COVERSHM_ERROR_INVALID_ARG,
    };

    match agent.send_visits(&records) {
        Ok(()) => COVERSHM_SUCCESS,
        Err(e) => {
            log::error!("send_visits({} records) failed: {}", count, e);
            error_code(&e)
        }
    }
}

/// Free an agent handle.
#[no_mangle]
pub extern "C" fn covershm_agent_free(handle: *mut AgentHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}
