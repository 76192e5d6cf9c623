use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camlink_session::{BridgeDriver, DeviceSession, PipelineConfig, ProcessMode};

use crate::cmd::{install_ctrlc_handler, StreamArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_update, OutputFormat};

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let config = PipelineConfig {
        bridge_host: args.host,
        bridge_port: args.port,
        record_path: args.record,
        ..PipelineConfig::default()
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let printed = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&printed);
    let mut session = DeviceSession::new(config, BridgeDriver::new())
        .with_mode(ProcessMode::Polling)
        .on_frame(move |update| {
            let frame = counter.fetch_add(1, Ordering::SeqCst);
            print_update(&update, frame, format);
        });

    session
        .connect()
        .map_err(|err| session_error("connect failed", err))?;

    while running.load(Ordering::SeqCst) {
        session.poll();
        if let Some(count) = args.count {
            if printed.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    session.disconnect();
    Ok(SUCCESS)
}
