// In demos/agent.rs
use covershm::{ChannelBuilder, VisitKind, VisitRecord};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <pid_used_by_host> [functions]", args[0]);
        std::process::exit(1);
    }
    let pid: u32 = args[1].parse()?;
    let functions: i32 = match args.get(2) {
        Some(n) => n.parse()?,
        None => 20,
    };

    let mut agent = ChannelBuilder::new().with_pid(pid).build_agent()?;
    println!("Agent: attached to regions of {}", pid);

    let module = "/app/bin/Demo.dll";
    for assembly in ["Demo", "System.Runtime"] {
        let track = agent.track_assembly(module, assembly)?;
        println!("Agent: track {:<16} -> {}", assembly, track);
    }

    let start = std::time::Instant::now();
    let mut visits = Vec::new();
    for token in 0x0600_0001..0x0600_0001 + functions {
        let points = agent.get_sequence_points(module, token)?;
        visits.push(VisitRecord::new(token as u32, VisitKind::MethodEnter));
        for point in &points {
            // Pretend every point ran three times
            for _ in 0..3 {
                visits.push(VisitRecord::new(point.unique_id, VisitKind::SequencePoint));
            }
        }
        visits.push(VisitRecord::new(token as u32, VisitKind::MethodLeave));
    }
    println!(
        "Agent: fetched sequence points of {} functions in {:.2?}",
        functions,
        start.elapsed()
    );

    agent.send_visits(&visits)?;
    println!(
        "Agent: sent {} visits ({} per batch)",
        visits.len(),
        agent.results().max_batch_records()
    );
    Ok(())
}
