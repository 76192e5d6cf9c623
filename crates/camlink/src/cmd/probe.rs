use std::time::{Duration, Instant};

use camlink_transport::TransportSession;

use crate::cmd::{parse_duration, ProbeArgs};
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_raw, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)
        .ok_or_else(|| CliError::new(USAGE, format!("invalid timeout: {}", args.timeout)))?;

    let mut session = TransportSession::new();
    session
        .open(&args.host, args.port)
        .map_err(|err| transport_error("connect failed", err))?;

    let deadline = Instant::now() + timeout;
    let frame = loop {
        if let Some(frame) = session.latest_frame() {
            break frame;
        }
        if Instant::now() >= deadline {
            session.close();
            return Err(CliError::new(
                TIMEOUT,
                format!("no frame received within {}", args.timeout),
            ));
        }
        std::thread::sleep(Duration::from_millis(5));
    };

    match format {
        OutputFormat::Raw => print_raw(frame.metadata.as_ref()),
        _ => {
            println!("peer: {}:{}", args.host, args.port);
            println!("metadata_size: {}", frame.metadata.len());
            println!("payload_size: {}", frame.payload.len());
            println!(
                "metadata: {}",
                String::from_utf8_lossy(frame.metadata.as_ref())
            );
        }
    }

    session.close();
    Ok(SUCCESS)
}
