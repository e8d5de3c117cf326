use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use geoalarm_core::{
    Command, Config, Event, GeoPoint, MonitorHandle, ProximityMonitor, ReplaySource,
    TerminalSink, ThresholdKm,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args)]
pub struct WatchArgs {
    /// Destination as "lat,lon"
    #[arg(long, allow_hyphen_values = true)]
    destination: GeoPoint,
    /// Track file: one "lat,lon" or "error:<kind>" per line
    #[arg(long)]
    track: PathBuf,
    /// Threshold in km (2, 3, 4, 5, 10 or 20); defaults to the configured one
    #[arg(long)]
    threshold: Option<ThresholdKm>,
    /// Delay between track entries
    #[arg(long, default_value = "1000")]
    interval_ms: u64,
    /// Stop after this many seconds instead of waiting for "quit"
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Do not show terminal notifications (alerts still appear as events)
    #[arg(long)]
    no_notify: bool,
}

/// One line typed on stdin while watching.
#[derive(Debug, PartialEq)]
enum Control {
    Send(Command),
    Status,
    Quit,
}

fn parse_control(line: &str) -> Result<Control, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let arg = words.next();
    let control = match (verb, arg) {
        ("snooze", None) => Control::Send(Command::Snooze),
        ("reset", None) => Control::Send(Command::ResetDestination),
        ("dest", Some(p)) => Control::Send(Command::SetDestination(
            p.parse().map_err(|e| format!("{e}"))?,
        )),
        ("threshold", Some(km)) => Control::Send(Command::SetThreshold(
            km.parse().map_err(|e| format!("{e}"))?,
        )),
        ("notify", Some("on")) => Control::Send(Command::SetNotifications(true)),
        ("notify", Some("off")) => Control::Send(Command::SetNotifications(false)),
        ("status", None) => Control::Status,
        ("quit" | "exit", None) => Control::Quit,
        _ => {
            return Err(format!(
                "unknown command '{line}' (try: snooze, reset, dest <lat,lon>, threshold <km>, notify on|off, status, quit)"
            ))
        }
    };
    if words.next().is_some() {
        return Err(format!("too many arguments in '{line}'"));
    }
    Ok(control)
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(args))
}

async fn watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut tracker = config.tracker();
    if let Some(threshold) = args.threshold {
        tracker.set_threshold(threshold, chrono::Utc::now());
    }
    tracker.set_destination(args.destination, chrono::Utc::now());

    let source = ReplaySource::load(&args.track, Duration::from_millis(args.interval_ms)).await?;
    tracing::info!(entries = source.entries().len(), track = %args.track.display(), "loaded track");

    let sink = TerminalSink::new(!args.no_notify);
    let mut handle =
        ProximityMonitor::new(tracker, Arc::new(source), Arc::new(sink), config.monitor_config())
            .spawn();

    print_event(&Event::StateSnapshot(handle.snapshot()))?;

    let deadline = args
        .duration_secs
        .map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                match event {
                    Some(event) => print_event(&event)?,
                    None => break,
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if !handle_control(&handle, line.trim()).await? {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("stdin closed; controls disabled");
                        stdin_open = false;
                    }
                }
            }
            _ = sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let tracker = handle.shutdown().await?;
    print_event(&Event::StateSnapshot(tracker.snapshot(chrono::Utc::now())))?;
    Ok(())
}

/// Returns `false` when the session should end.
async fn handle_control(handle: &MonitorHandle, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
    match parse_control(line) {
        Ok(Control::Send(cmd)) => handle.send(cmd).await?,
        Ok(Control::Status) => print_event(&Event::StateSnapshot(handle.snapshot()))?,
        Ok(Control::Quit) => return Ok(false),
        Err(message) => eprintln!("{message}"),
    }
    Ok(true)
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_controls() {
        assert_eq!(parse_control("snooze").unwrap(), Control::Send(Command::Snooze));
        assert_eq!(parse_control("reset").unwrap(), Control::Send(Command::ResetDestination));
        assert_eq!(
            parse_control("threshold 10").unwrap(),
            Control::Send(Command::SetThreshold(ThresholdKm::Ten))
        );
        assert_eq!(
            parse_control("dest 18.5,73.86").unwrap(),
            Control::Send(Command::SetDestination(GeoPoint::new(18.5, 73.86).unwrap()))
        );
        assert_eq!(
            parse_control("notify off").unwrap(),
            Control::Send(Command::SetNotifications(false))
        );
        assert_eq!(parse_control("status").unwrap(), Control::Status);
        assert_eq!(parse_control("quit").unwrap(), Control::Quit);
    }

    #[test]
    fn rejects_bad_controls() {
        assert!(parse_control("threshold 7").is_err());
        assert!(parse_control("dest nowhere").is_err());
        assert!(parse_control("notify maybe").is_err());
        assert!(parse_control("snooze now").is_err());
        assert!(parse_control("dance").is_err());
    }
}
