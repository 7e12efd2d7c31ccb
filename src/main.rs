mod logging;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use rv32_emulator::{
    config::{CpuConfig, arch_config::WordType},
    isa::riscv::{csr_reg::csr_index, executor::RV32CPU},
    ram::Ram,
    ram_config,
};

use crate::logging::LogLevel;

fn parse_addr(s: &str) -> Result<WordType, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => WordType::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address `{s}`: {e}"))
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Flat binary image, loaded at `--base`.
    image: PathBuf,

    /// Physical address of the RAM and of the image.
    #[arg(long, value_parser = parse_addr, default_value = "0x80000000")]
    base: WordType,

    /// Reset vector. Defaults to `--base`.
    #[arg(long, value_parser = parse_addr)]
    entry: Option<WordType>,

    /// RAM size in bytes.
    #[arg(long, default_value_t = ram_config::SIZE)]
    ram_size: usize,

    /// Stop after this many steps.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Stop on `EBREAK` instead of trapping into the guest.
    #[arg(long, default_value_t = false)]
    halt_on_ebreak: bool,

    /// Print the register file when the run stops.
    #[arg(long, default_value_t = false)]
    dump_regs: bool,

    /// CSRs to print when the run stops, by name (e.g. `mcause`).
    #[arg(long = "csr")]
    csrs: Vec<String>,

    /// Switch log level.
    #[arg(value_enum, long = "loglevel", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn print_csrs(cpu: &RV32CPU, names: &[String]) {
    for name in names {
        let Some(addr) = csr_index::by_name(name) else {
            eprintln!("unknown CSR `{name}`");
            continue;
        };
        match cpu.read_raw_csr(addr) {
            Ok(value) => println!("{name:>10} = {value:#010x}"),
            Err(e) => eprintln!("{name}: {e}"),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _logger_handle = match logging::init(args.log_level) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("logger disabled: {e}");
            None
        }
    };

    let image = match std::fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("cannot read {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    let mut ram = Ram::new(args.base, args.ram_size);
    if let Err(e) = ram.insert_section(&image, args.base) {
        eprintln!("image does not fit in RAM: {e}");
        return ExitCode::FAILURE;
    }

    let config = CpuConfig::default()
        .with_reset_vector(args.entry.unwrap_or(args.base))
        .with_halt_on_breakpoint(args.halt_on_ebreak)
        .with_dump_registers_on_halt(args.dump_regs);
    let mut cpu = match RV32CPU::with_default_sets(Box::new(ram), config) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "loaded {} ({} bytes) at {:#010x}",
        args.image.display(),
        image.len(),
        args.base
    );

    let report = match args.max_steps {
        Some(limit) => cpu.run_until(|_, steps| steps >= limit),
        None => Some(cpu.run()),
    };

    match report {
        Some(report) => println!("{report}"),
        None => {
            println!("step limit reached at {:#010x}", cpu.pc());
            if args.dump_regs {
                println!("{}", cpu.dump_registers());
            }
        }
    }
    print_csrs(&cpu, &args.csrs);

    ExitCode::SUCCESS
}
