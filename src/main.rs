use std::path::PathBuf;

use clap::Parser;

use ps2kbd::host::{Bench, logging};
use ps2kbd::keymap;

/// PS/2 keyboard controller simulator
/// Runs the firmware core against a simulated host and prints the byte
/// stream the host receives.
#[derive(Parser)]
#[command(name = "ps2kbd")]
#[command(about = "PS/2 keyboard controller core driven by a simulated host")]
struct Args {
    /// Log level for protocol diagnostics (trace shows every frame)
    #[arg(short, long, default_value = "info")]
    log_level: tracing::Level,

    /// Write the log to a file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Timer ticks interleaved after each foreground scan pass
    #[arg(long, default_value = "40")]
    ticks_per_pass: usize,
}

/// Keys spelling "READY" on the CreatiVision matrix.
const DEMO_KEYS: [(u8, u8); 5] = [(1, 4), (1, 3), (2, 1), (2, 3), (5, 0)];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    match &args.log_file {
        Some(path) => logging::setup_file(args.log_level, path)?,
        None => logging::setup_stdio(args.log_level),
    }

    let mut bench = Bench::new();
    let settle = |bench: &mut Bench, steps: usize| {
        for _ in 0..steps {
            bench.step(args.ticks_per_pass);
        }
    };

    println!("Host: reset");
    bench.host.send(0xFF);
    settle(&mut bench, 10);

    println!("Host: identify");
    bench.host.send(0xF2);
    settle(&mut bench, 10);

    println!("Host: set LEDs (ignored, acknowledged)");
    bench.host.send(0xED);
    settle(&mut bench, 10);
    bench.host.send(0x02);
    settle(&mut bench, 10);

    println!("Typing READY...");
    for (row, col) in DEMO_KEYS {
        println!(
            "  key ({row},{col}) scan code {:02X}",
            keymap::scan_code(row, col)
        );
        bench.matrix.press(row, col);
        settle(&mut bench, 30);
        bench.matrix.release(row, col);
        settle(&mut bench, 30);
    }

    println!("Left arrow press and release");
    bench.matrix.press(2, 0);
    settle(&mut bench, 30);
    bench.matrix.release(2, 0);
    settle(&mut bench, 30);

    println!("\nHost received {} bytes:", bench.host.received.len());
    for chunk in bench.host.received.chunks(16) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        println!("  {}", hex.join(" "));
    }
    println!("Frame errors: {}", bench.host.frame_errors);
    println!("Acknowledged host bytes: {}", bench.host.acks);

    Ok(())
}
