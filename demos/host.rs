// In demos/host.rs
use covershm::Core::BoxError;
use covershm::{ChannelBuilder, InstrumentationDecision, SequencePointRecord, VisitKind};
use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Instruments everything outside the framework; function `token` gets
/// `token % 13` sequence points.
struct DemoDecision;

impl InstrumentationDecision for DemoDecision {
    fn should_track(&self, _module: &str, assembly: &str) -> Result<bool, BoxError> {
        Ok(!assembly.starts_with("System"))
    }

    fn sequence_points_for(
        &self,
        _module: &str,
        function_token: i32,
    ) -> Result<Vec<SequencePointRecord>, BoxError> {
        let count = function_token.rem_euclid(13) as u32;
        Ok((0..count)
            .map(|i| SequencePointRecord {
                unique_id: ((function_token & 0xffff) as u32) * 100 + i,
                offset: (i * 4) as i32,
            })
            .collect())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <agent_pid> [buffer_size]", args[0]);
        std::process::exit(1);
    }
    let pid: u32 = args[1].parse()?;
    let buffer_size: usize = match args.get(2) {
        Some(size) => size.parse()?,
        None => 4096,
    };

    let builder = ChannelBuilder::new()
        .with_pid(pid)
        .with_buffer_size(buffer_size);
    println!(
        "Host: creating {} and {}",
        builder.control_region_name(),
        builder.results_region_name()
    );
    let host = builder.build_host(DemoDecision)?;
    let mut coordinator = host.coordinator;
    let mut results = host.results;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_handler = Arc::clone(&shutdown);

    // Handle Ctrl+C to clean up
    ctrlc::set_handler(move || {
        shutdown_for_handler.store(true, Ordering::SeqCst);
    })?;

    let control_shutdown = Arc::clone(&shutdown);
    let control = thread::spawn(move || coordinator.run(&control_shutdown));

    println!("Host: waiting for agent {} (Ctrl+C to stop)", pid);
    let mut hits: HashMap<u32, u64> = HashMap::new();
    let mut calls = 0u64;
    let batches = results.run(&shutdown, std::time::Duration::from_millis(100), |batch| {
        for visit in batch.iter() {
            let visit = visit?;
            match visit.kind {
                VisitKind::SequencePoint => *hits.entry(visit.unique_id).or_insert(0) += 1,
                VisitKind::MethodEnter => calls += 1,
                VisitKind::MethodLeave => {}
            }
        }
        println!("Host: batch of {} visits", batch.len());
        Ok(())
    })?;

    // Unblock the control thread if the results loop stopped on its own
    shutdown.store(true, Ordering::SeqCst);
    match control.join() {
        Ok(Ok(served)) => println!("Host: served {} requests", served),
        Ok(Err(e)) => eprintln!("Host: control channel failed: {}", e),
        Err(_) => eprintln!("Host: control thread panicked"),
    }

    println!(
        "Host: {} batches, {} distinct sequence points hit, {} method entries",
        batches,
        hits.len(),
        calls
    );
    Ok(())
}
