//! Copperscan CLI - PCB connectivity lookup and design rule checks from the
//! command line.

use clap::{Parser, Subcommand, ValueEnum};
use copperscan::{
    check_board, collect_nets, find_connections, Board, LookupOptions, ObjRef, Point, Verdict,
    Violation, ViolationSink,
};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "copperscan")]
#[command(about = "PCB connectivity lookup and design rule check tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the design rule check over a whole board
    Check {
        /// Path to a board description (JSON)
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Stop after the first violation
        #[arg(long)]
        first_only: bool,
    },

    /// List the electrical nets of a board
    Nets {
        /// Path to a board description (JSON)
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Treat rat lines as connections
        #[arg(long)]
        with_rats: bool,
    },

    /// List everything connected to the copper at a point
    Connected {
        /// Path to a board description (JSON)
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// X coordinate in board units (nanometers)
        #[arg(short, long, allow_hyphen_values = true)]
        x: i64,

        /// Y coordinate in board units (nanometers)
        #[arg(short, long, allow_hyphen_values = true)]
        y: i64,

        /// Hit-test slack around the point
        #[arg(long, default_value_t = 0)]
        range: i64,

        /// Copper growth applied during the scan
        #[arg(long, default_value_t = 0)]
        bloat: i64,

        /// Follow rat lines too
        #[arg(long)]
        with_rats: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Check {
            board,
            format,
            first_only,
        } => handle_check(&board, format, first_only),
        Commands::Nets {
            board,
            format,
            with_rats,
        } => handle_nets(&board, format, with_rats),
        Commands::Connected {
            board,
            x,
            y,
            range,
            bloat,
            with_rats,
            format,
        } => handle_connected(&board, x, y, range, bloat, with_rats, format),
    };

    process::exit(exit_code);
}

fn load_board(path: &PathBuf) -> Result<Board, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Collects violations, optionally aborting the run after the first one.
struct CliSink {
    violations: Vec<Violation>,
    first_only: bool,
}

impl ViolationSink for CliSink {
    fn report(&mut self, violation: &Violation) -> Verdict {
        self.violations.push(violation.clone());
        if self.first_only {
            Verdict::Abort
        } else {
            Verdict::Continue
        }
    }
}

fn handle_check(path: &PathBuf, format: OutputFormat, first_only: bool) -> i32 {
    let mut board = match load_board(path) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let mut sink = CliSink {
        violations: Vec::new(),
        first_only,
    };
    let summary = check_board(&mut board, &mut sink);

    match format {
        OutputFormat::Human => {
            for v in &sink.violations {
                print!(
                    "{} at ({}, {})",
                    v.title, v.location.x, v.location.y
                );
                match v.measured {
                    Some(measured) => println!(": measured {}, required {}", measured, v.required),
                    None => println!(": required {}", v.required),
                }
            }
            println!(
                "{} violation{} found",
                summary.violation_count,
                if summary.violation_count == 1 { "" } else { "s" }
            );
            if summary.aborted {
                println!("check aborted before covering the whole board");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": path.display().to_string(),
                "violations": sink.violations,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
    }

    if summary.violation_count > 0 || summary.aborted {
        1
    } else {
        0
    }
}

fn handle_nets(path: &PathBuf, format: OutputFormat, with_rats: bool) -> i32 {
    let mut board = match load_board(path) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let nets = collect_nets(&mut board, with_rats);

    match format {
        OutputFormat::Human => {
            for (i, net) in nets.iter().enumerate() {
                println!(
                    "Net {} ({} object{}):",
                    i + 1,
                    net.objects.len(),
                    if net.objects.len() == 1 { "" } else { "s" }
                );
                for obj in &net.objects {
                    println!("  {}", describe(&board, *obj));
                }
            }
            println!(
                "{} net{} total",
                nets.len(),
                if nets.len() == 1 { "" } else { "s" }
            );
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": path.display().to_string(),
                "nets": nets,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
    }

    0
}

fn handle_connected(
    path: &PathBuf,
    x: i64,
    y: i64,
    range: i64,
    bloat: i64,
    with_rats: bool,
    format: OutputFormat,
) -> i32 {
    let mut board = match load_board(path) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let seed = match board.object_at(Point::new(x, y), range) {
        Some(obj) => obj,
        None => {
            eprintln!("Error: no copper object at ({}, {})", x, y);
            return 2;
        }
    };

    let opts = LookupOptions {
        bloat,
        ..LookupOptions::default()
    };
    let found = match find_connections(&mut board, seed, opts, with_rats) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    match format {
        OutputFormat::Human => {
            println!("Seed: {}", describe(&board, seed));
            println!(
                "{} connected object{}:",
                found.len(),
                if found.len() == 1 { "" } else { "s" }
            );
            for obj in &found {
                println!("  {}", describe(&board, *obj));
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": path.display().to_string(),
                "seed": seed,
                "connected": found,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
    }

    0
}

fn describe(board: &Board, obj: ObjRef) -> String {
    let p = board.location_of(obj);
    let at = format!(" at ({}, {})", p.x, p.y);
    match obj {
        ObjRef::Pv(id) => format!("pin/via #{}{}", id.0, at),
        ObjRef::Pad(id) => format!("pad #{}{}", id.0, at),
        ObjRef::Line(id) => format!("line #{} on layer {}{}", id.index, id.layer.0, at),
        ObjRef::Arc(id) => format!("arc #{} on layer {}{}", id.index, id.layer.0, at),
        ObjRef::Polygon(id) => format!("polygon #{} on layer {}{}", id.index, id.layer.0, at),
        ObjRef::Rat(id) => format!("rat #{}{}", id.0, at),
        ObjRef::Silk(id) => format!("silk line #{}{}", id.0, at),
        ObjRef::Component(id) => format!("component #{}{}", id.0, at),
    }
}
