use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camlink_session::{
    BridgeDriver, DeviceSession, PipelineConfig, ProcessMode, ReplayConfig, SessionState,
};

use crate::cmd::{install_ctrlc_handler, ReplayArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_update, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    if args.frames == 0 {
        return Err(CliError::new(USAGE, "--frames must be positive"));
    }
    if !(args.fps.is_finite() && args.fps > 0.0) {
        return Err(CliError::new(USAGE, "--fps must be positive"));
    }

    let config = PipelineConfig {
        replay: Some(ReplayConfig {
            path: args.path,
            frame_count: args.frames,
            fps: args.fps,
            loop_replay: args.loop_replay,
            image_names: args.image_names,
            autostart: true,
        }),
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
        .map_err(|err| session_error("replay start failed", err))?;

    while running.load(Ordering::SeqCst) {
        session.poll();
        if session.state() == SessionState::Disconnected {
            break;
        }
        if let Some(count) = args.count {
            if printed.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    session.disconnect();
    Ok(SUCCESS)
}
