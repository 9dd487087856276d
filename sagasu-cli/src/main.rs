//! sagasu CLI - コマンドラインインターフェース
//!
//! 実行中のプロセスのメモリを検索・編集する sagasu のREPLインターフェース

mod hexdump;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sagasu_core::{
    AttachTarget, Command, MemoryRegion, Process, ProcessDirectory, ScanOptions, Scanner, Session,
    TargetMemory, TypedValue, ValueType,
};
use std::io::Write;
use std::ops::ControlFlow;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 検索結果の表示上限
const RESULT_DISPLAY_LIMIT: usize = 100;

/// sagasu - Process Memory Scanner
#[derive(Parser)]
#[command(name = "sagasu")]
#[command(version)]
#[command(about = "Search and edit the memory of a running process", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,

    /// Process ID to attach to on startup
    #[arg(short, long, conflicts_with = "name")]
    pid: Option<u32>,

    /// Process name to attach to on startup
    #[arg(short, long)]
    name: Option<String>,

    /// Also report matches that straddle two adjacent regions
    #[arg(long)]
    span_regions: bool,

    /// Skip regions larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_region_size: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List running processes
    Ps {
        /// Only show processes with exactly this name
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(CliCommand::Ps { name }) = &cli.command {
        return print_processes(&ProcessDirectory::new(), name.as_deref());
    }

    println!("sagasu - Process Memory Scanner");
    println!("Version {}", env!("CARGO_PKG_VERSION"));
    println!();

    let mut session = Session::with_options(ScanOptions {
        span_adjacent_regions: cli.span_regions,
        max_region_size: cli.max_region_size,
    });
    info!(
        span_regions = cli.span_regions,
        max_region_size = ?cli.max_region_size,
        "starting shell"
    );
    let mut rl = DefaultEditor::new()?;

    let target = match (cli.pid, cli.name) {
        (Some(pid), _) => Some(AttachTarget::Pid(pid)),
        (None, Some(name)) => Some(AttachTarget::Name(name)),
        (None, None) => None,
    };
    if let Some(target) = target {
        handle_attach(&mut session, &mut rl, target)?;
        println!();
    }

    run_repl(&mut session, &mut rl)?;

    Ok(())
}

/// ログ出力を初期化する（RUST_LOGが優先）
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// REPLループを実行する
fn run_repl(session: &mut Session, rl: &mut DefaultEditor) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    loop {
        let readline = rl.readline("(sagasu) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(session, rl, line) {
                    Ok(ControlFlow::Break(())) => break,
                    Ok(ControlFlow::Continue(())) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

fn handle_command(
    session: &mut Session,
    rl: &mut DefaultEditor,
    line: &str,
) -> Result<ControlFlow<()>> {
    let command = Command::parse(line)?;
    debug!(?command, "parsed command");

    match command {
        Command::Help => print_help(),
        Command::Quit => {
            println!("Goodbye!");
            return Ok(ControlFlow::Break(()));
        }
        Command::Ps(name) => print_processes(session.directory(), name.as_deref())?,
        Command::Attach(None) => match session.attached_process() {
            Some(process) => println!("Attached to {}", describe(process)),
            None => println!("No attached process"),
        },
        Command::Attach(Some(target)) => handle_attach(session, rl, target)?,
        Command::Detach { kill } => handle_detach(session, kill)?,
        Command::Regions { all } => handle_regions(session, all)?,
        Command::Dump { address, length } => {
            for dump in session.scanner()?.dump(address, length)? {
                print!("{}", hexdump::format_dump(dump.address, &dump.bytes));
            }
        }
        Command::Search(value) => handle_search(session, &value)?,
        Command::Read { ty, address } => {
            let value = session.scanner()?.read_value(ty, address)?;
            println!("0x{:x} ({}): {}", address, ty, value);
        }
        Command::Write { address, value } => {
            let written = session.scanner()?.write_value(address, &value)?;
            println!("Wrote {} byte(s) at 0x{:x}", written, address);
        }
    }

    Ok(ControlFlow::Continue(()))
}

/// プロセス一覧を表示する
fn print_processes(directory: &ProcessDirectory, name: Option<&str>) -> Result<()> {
    let processes = match name {
        Some(name) => directory.list_by_name(name)?,
        None => directory.list_all()?,
    };
    print_process_table(&processes);
    Ok(())
}

fn print_process_table(processes: &[Process]) {
    println!("{:>8}  Process Name", "PID");
    for process in processes {
        println!("{:>8}  {}", process.pid(), process.name());
    }
}

fn describe(process: &Process) -> String {
    format!("process {} ({})", process.pid(), process.name())
}

/// Attachコマンドを処理する
///
/// 名前に一致するプロセスが複数あれば候補を表示するだけでアタッチしません。
fn handle_attach(session: &mut Session, rl: &mut DefaultEditor, target: AttachTarget) -> Result<()> {
    let process = match target {
        AttachTarget::Pid(pid) => session.directory().get(pid)?,
        AttachTarget::Name(name) => {
            let mut candidates = session.directory().list_by_name(&name)?;
            match candidates.len() {
                0 => {
                    println!("No process named '{}'", name);
                    return Ok(());
                }
                1 => candidates.remove(0),
                n => {
                    println!("{} processes named '{}', attach by PID:", n, name);
                    print_process_table(&candidates);
                    return Ok(());
                }
            }
        }
    };

    if let Some(current) = session.attached_process() {
        let prompt = format!("Already attached to {}. Replace it? [y/N] ", describe(current));
        if !confirm(rl, &prompt)? {
            println!("Kept the current attachment");
            return Ok(());
        }
    }

    let attached = session.attach(process.pid())?;
    println!("Attached to {}", describe(attached));
    Ok(())
}

fn confirm(rl: &mut DefaultEditor, prompt: &str) -> Result<bool> {
    match rl.readline(prompt) {
        Ok(answer) => Ok(matches!(answer.trim(), "y" | "Y" | "yes")),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Detachコマンドを処理する
fn handle_detach(session: &mut Session, kill: bool) -> Result<()> {
    if !session.is_attached() {
        println!("No process attached");
        return Ok(());
    }

    if kill {
        let process = session.terminate()?;
        println!("Terminated {}", describe(&process));
    } else if let Some(process) = session.detach() {
        println!("Detached from {}", describe(&process));
    }
    Ok(())
}

/// Regionsコマンドを処理する
fn handle_regions(session: &Session, all: bool) -> Result<()> {
    let handle = session.handle()?;
    let walker = if all {
        handle.all_regions()?
    } else {
        handle.regions()?
    };

    let regions = walker.collect::<Result<Vec<MemoryRegion>, _>>()?;
    for region in &regions {
        println!("{}", region);
    }
    let total: usize = regions.iter().map(MemoryRegion::size).sum();
    println!("{} region(s), {} bytes", regions.len(), total);
    Ok(())
}

/// Searchコマンドを処理する
fn handle_search(session: &Session, value: &TypedValue) -> Result<()> {
    let scanner = session.scanner()?;

    let mut report = |index: usize, region: &MemoryRegion| {
        eprint!("\rScanning region {} at 0x{:x}...", index + 1, region.start);
        let _ = std::io::stderr().flush();
        ControlFlow::Continue(())
    };
    let hits = scanner.find_value_with(value, &mut report)?;
    eprintln!();

    if hits.is_empty() {
        println!("No matches for {}", value);
        return Ok(());
    }

    let ty = value.value_type();
    println!("{:<18}  Value", "Address");
    for &address in hits.iter().take(RESULT_DISPLAY_LIMIT) {
        println!("0x{:016x}  {}", address, read_hit(&scanner, ty, address));
    }

    if hits.len() > RESULT_DISPLAY_LIMIT {
        println!("... and {} more", hits.len() - RESULT_DISPLAY_LIMIT);
    }
    println!("{} match(es)", hits.len());
    Ok(())
}

/// 一致したアドレスの現在の値を読み直す
///
/// 文字列は一致を含む文字列全体になります。読めなければエラーを括弧で示します。
fn read_hit<M: TargetMemory>(scanner: &Scanner<'_, M>, ty: ValueType, address: usize) -> String {
    match scanner.read_value(ty, address) {
        Ok(value) => value.to_string(),
        Err(e) => format!("<{}>", e),
    }
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help                            - Show this help message");
    println!("  quit/exit/q                     - Exit sagasu");
    println!();
    println!("Process commands:");
    println!("  ps [name]                       - List processes");
    println!("  attach [pid|name]               - Attach to a process (or show the attached one)");
    println!("  detach [kill]                   - Detach, optionally terminating the process");
    println!();
    println!("Memory commands:");
    println!("  regions [all]                   - List writable (or all) memory regions");
    println!("  dump [address [length]]         - Hexdump memory");
    println!("  search <type> <value>           - Find every address holding the value");
    println!("  read <type> <address>           - Read a value");
    println!("  write <type> <address> <value>  - Write a value");
    println!();
    println!("Types: byte short int long float double string[:bytes_per_char]");
    println!("Strings default to 2 bytes per character.");
    println!();
    println!("Examples:");
    println!("  attach game.exe");
    println!("  search int 100");
    println!("  search string:1 Player");
    println!("  write int 0x7ffd1234 999");
    println!("  dump 0x7ffd1200 64");
}
