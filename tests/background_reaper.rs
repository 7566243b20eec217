//! The reaper task collects orphans without anyone calling `drain`.

use microinit::reaper::Reaper;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .map(|stat| {
            stat.rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_pass_clears_every_zombie() {
    let pids: Vec<u32> = (0..6)
        .map(|_| Command::new("true").spawn().unwrap().id())
        .collect();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !pids.iter().all(|pid| is_zombie(*pid)) {
        assert!(Instant::now() < deadline, "children did not exit in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The interval outlasts the check, so only the first pass can run.
    let handle = Reaper::new(Duration::from_secs(60)).spawn();
    tokio::time::sleep(Duration::from_millis(500)).await;

    for pid in &pids {
        assert!(!is_zombie(*pid), "pid {} left as zombie", pid);
        assert!(!Path::new(&format!("/proc/{}", pid)).exists());
    }
    assert!(!handle.is_finished());
    handle.abort();
}
