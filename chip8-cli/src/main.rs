//! Entrypoint for CLI
use std::{env, error::Error, fs, time::Instant};

use chip8::{constants::*, prelude::*, Op};
use log::{debug, error, info};

mod clock;
mod error;

use self::{clock::Clock, error::CliError};

static USAGE: &str = r#"
usage: chip8 CMD FILE [ARGS]

commands:
    run     Run the target ROM file
    info    Print size and instruction listing of the target ROM file

run arguments:
    chip8 run FILE [INSTRUCTIONS_PER_FRAME] [FRAMES]

environment:
    CHIP8_CONFIG    Path to a YAML file with the VM configuration
    CHIP8_REALTIME  Set to 1 to pace frames at 60 Hz
    RUST_LOG        Log level filter

examples:
    chip8 run maze.rom
    chip8 run breakout.rom 15 3600
    chip8 info breakout.rom
"#;

const DEFAULT_INSTRUCTIONS_PER_FRAME: usize = 10;
const DEFAULT_FRAMES: usize = 600;

fn load_config() -> Result<Chip8Conf, CliError> {
    match env::var("CHIP8_CONFIG") {
        Ok(filepath) => {
            let file = fs::File::open(&filepath)?;
            let conf: Chip8Conf = serde_yaml::from_reader(file)?;
            debug!("loaded config from {filepath}: {conf:#?}");
            Ok(conf)
        }
        Err(_) => Ok(Chip8Conf::default()),
    }
}

fn is_realtime() -> bool {
    matches!(env::var("CHIP8_REALTIME").as_deref(), Ok("1"))
}

fn run_bytecode(
    filepath: &str,
    instructions_per_frame: usize,
    frames: usize,
) -> Result<(), CliError> {
    let bytecode = fs::read(filepath)?;

    let mut vm = Chip8Vm::new(load_config()?);
    vm.load(bytecode.as_slice())?;

    info!("running {filepath}, {frames} frames at {instructions_per_frame} instructions per frame");

    let realtime = is_realtime();
    let mut clock = Clock::new();

    let start = Instant::now();
    let result = run_frames(&mut vm, instructions_per_frame, frames, || {
        if realtime {
            clock.wait();
        }
    });
    let end = Instant::now();

    info!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);

    result?;

    Ok(())
}

/// Host loop: a batch of instructions, then one timer tick, per frame.
fn run_frames(
    vm: &mut Chip8Vm,
    instructions_per_frame: usize,
    frames: usize,
    mut wait: impl FnMut(),
) -> Result<(), ExecutionFault> {
    for _ in 0..frames {
        for _ in 0..instructions_per_frame {
            // Without a keyboard attached, nothing will
            // change for the rest of the frame.
            if vm.step()? == Flow::KeyWait {
                break;
            }
        }

        vm.tick_timers();
        wait();
    }

    Ok(())
}

fn print_info(filepath: &str) -> Result<(), CliError> {
    let bytecode = fs::read(filepath)?;
    let len = bytecode.len();

    println!("{filepath}");
    println!("size: {len} bytes");
    match MAX_PROGRAM_SIZE.checked_sub(len) {
        Some(remaining) => println!("remaining capacity: {remaining} bytes"),
        None => println!("too large, exceeds capacity by {} bytes", len - MAX_PROGRAM_SIZE),
    }
    println!();

    // Instructions are always 2 bytes.
    for (i, instr) in bytecode.chunks(2).enumerate() {
        let offset = MEM_START + i * 2;
        match instr {
            [a, b] => {
                let word = u16::from_be_bytes([*a, *b]);
                match Op::decode(word) {
                    Some(op) => println!("0x{offset:04X} {word:04X}  {op}"),
                    None => println!("0x{offset:04X} {word:04X}"),
                }
            }
            [a] => println!("0x{offset:04X} {a:02X}"),
            _ => {}
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    let result = match parse_args() {
        Some(Cmd::Run {
            filepath,
            instructions_per_frame,
            frames,
        }) => run_bytecode(&filepath, instructions_per_frame, frames),
        Some(Cmd::Info { filepath }) => print_info(&filepath),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    parse_cmd(env::args().skip(1))
}

fn parse_cmd(mut args: impl Iterator<Item = String>) -> Option<Cmd> {
    let cmd = args.next()?;
    let filepath = args.next()?;

    match cmd.as_str() {
        "run" => Some(Cmd::Run {
            filepath,
            instructions_per_frame: consume_number(&mut args, DEFAULT_INSTRUCTIONS_PER_FRAME)?,
            frames: consume_number(&mut args, DEFAULT_FRAMES)?,
        }),
        "info" => Some(Cmd::Info { filepath }),
        _ => None,
    }
}

/// Consumes the next argument as a number, falling back to the default when absent.
///
/// Returns `None` when the argument is not a number.
fn consume_number(mut args: impl Iterator<Item = String>, default: usize) -> Option<usize> {
    match args.next() {
        Some(arg) => arg.parse().ok(),
        None => Some(default),
    }
}

fn print_usage() {
    println!("Chip8 v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

#[derive(Debug, PartialEq, Eq)]
enum Cmd {
    /// Run file
    Run {
        filepath: String,
        instructions_per_frame: usize,
        frames: usize,
    },
    /// Print ROM information
    Info { filepath: String },
}
