use ckpt_harness_core::prelude::DelegatedShutdownListener;
use sysinfo::System;

/// Global CPU usage, in percent, above which timings are likely to be skewed.
const HIGH_CPU_USAGE: f32 = 95.0;

/// Monitor host CPU usage while jobs are running and report when it is saturated.
///
/// Note that this won't stop the run, it only warns that timings taken while the host was
/// saturated may not be comparable with other runs. A warning is logged each time usage rises
/// above the threshold, not on every sample.
///
/// Usage is sampled every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] until `stop_listener` fires.
pub(crate) fn start_monitor(mut stop_listener: DelegatedShutdownListener) {
    let spawned = std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            let cpu_count = sys.cpus().len();
            let mut saturated = false;

            loop {
                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                if stop_listener.should_shutdown() {
                    log::trace!("Monitor thread shutting down");
                    break;
                }

                sys.refresh_cpu_usage();
                let usage = sys.global_cpu_usage();
                let now_saturated = is_saturated(usage);
                if now_saturated && !saturated {
                    log::warn!(
                        "High CPU usage detected: {usage:.2}% across {cpu_count} cores, timings may be skewed"
                    );
                }
                saturated = now_saturated;
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start monitor thread, CPU usage will not be reported: {e}");
    }
}

fn is_saturated(usage: f32) -> bool {
    usage > HIGH_CPU_USAGE
}
