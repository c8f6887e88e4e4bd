// ufork: run the demo actor programs

use std::io::{self, Read};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ufork::config::{Config, GcStrategy};
use ufork::demo;
use ufork::device::{ScriptedConsole, SystemClock, TerminalConsole};
use ufork::interpreter::engine::{Stats, Vm};
use ufork::memory::value::UNIT;

#[derive(Debug, Parser)]
#[command(name = "ufork", version, about = "An actor virtual machine")]
struct Cli {
    /// Heap size in cells
    #[arg(long, global = true, default_value_t = Config::default().heap_capacity)]
    heap: usize,

    /// Garbage collector: mark-sweep, incremental or manual
    #[arg(long, global = true, default_value_t = GcStrategy::MarkSweep)]
    gc: GcStrategy,

    /// Log filter, e.g. `warn` or `ufork=debug`
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log every dispatch decision
    #[arg(long, global = true)]
    trace_dispatch: bool,

    /// Print runtime statistics on exit
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy input to output through an echo actor
    Echo {
        /// Read keys from the terminal until Ctrl-D instead of reading stdin
        #[arg(long)]
        interactive: bool,
    },
    /// Count clock events for a while
    Clock {
        #[arg(long, default_value_t = 3)]
        seconds: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(stats) => {
            if cli.stats {
                print_stats(&stats);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Stats, Box<dyn std::error::Error>> {
    let config = Config::default()
        .with_heap_capacity(cli.heap)
        .with_gc(cli.gc)
        .with_trace_dispatch(cli.trace_dispatch);
    let mut vm = Vm::new(config)?;
    info!(gc = vm.collector_name(), heap = cli.heap, "starting");

    match cli.command {
        Command::Echo { interactive: false } => {
            let mut input = Vec::new();
            io::stdin().read_to_end(&mut input)?;
            vm.set_console(Box::new(ScriptedConsole::new(input, io::stdout())));
            let echo = demo::echo(&mut vm, false)?;
            vm.send(echo, UNIT)?;
            vm.run()?;
        }
        Command::Echo { interactive: true } => {
            vm.set_console(Box::new(TerminalConsole::new()?));
            let echo = demo::echo(&mut vm, true)?;
            vm.send(echo, UNIT)?;
            vm.run()?;
        }
        Command::Clock { seconds } => {
            let counter = demo::clock_counter(&mut vm)?;
            vm.attach_clock(SystemClock, counter)?;
            let deadline = Instant::now() + Duration::from_secs(seconds);
            while Instant::now() < deadline {
                if !vm.tick()? {
                    thread::sleep(Duration::from_millis(10));
                }
            }
            for line in vm.trace().get_output() {
                println!("{}", line);
            }
        }
    }
    Ok(vm.stats())
}

fn print_stats(stats: &Stats) {
    eprintln!("dispatched:   {}", stats.dispatched);
    eprintln!("requeued:     {}", stats.requeued);
    eprintln!("dropped:      {}", stats.dropped);
    eprintln!("instructions: {}", stats.instructions);
    eprintln!("commits:      {}", stats.commits);
    eprintln!("aborts:       {}", stats.aborts);
    eprintln!("releases:     {}", stats.releases);
    eprintln!("stops:        {}", stats.stops);
    eprintln!("clock events: {}", stats.clock_events);
    eprintln!("gc cycles:    {}", stats.gc_cycles);
}
