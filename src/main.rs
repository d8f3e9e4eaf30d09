use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use microcpu::isa::codec;
use microcpu::memory::{parse, Address, Ports, CAPACITY, DATA_BASE, INPUT_PORT, OUTPUT_PORT};
use microcpu::simulation::{self, IoMode, SimulationConfig, TICK_BUDGET};

#[derive(Parser, Debug)]
#[command(name = "microcpu")]
#[command(about = "Microprogrammed educational computer", long_about = None)]
struct Args {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a binary code image
    Run {
        /// Code image
        code: PathBuf,

        /// Data segment of plain words
        #[arg(long)]
        data: Option<PathBuf>,

        /// Text fed to the input port
        #[arg(long)]
        input: Option<PathBuf>,

        /// Treat port values as characters instead of integers
        #[arg(long = "char", action = ArgAction::SetTrue)]
        character: bool,

        /// Maximum number of ticks
        #[arg(long, default_value_t = TICK_BUDGET)]
        budget: u64,

        #[arg(long, default_value_t = INPUT_PORT.idx())]
        input_port: usize,

        #[arg(long, default_value_t = OUTPUT_PORT.idx())]
        output_port: usize,

        #[arg(long, default_value_t = DATA_BASE.idx())]
        data_base: usize,
    },
    /// Assemble a source file into a binary code image and data segment
    Assemble {
        source: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Where to write the `.data` section
        #[arg(long)]
        data: Option<PathBuf>,

        /// Address the `.data` section is assembled for
        #[arg(long, default_value_t = DATA_BASE.idx())]
        data_base: usize,
    },
    /// Print the cells of a binary code image
    Dump { code: PathBuf },
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling

    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?; // logging

    match args.command {
        Command::Run {
            code,
            data,
            input,
            character,
            budget,
            input_port,
            output_port,
            data_base,
        } => {
            let bytes = fs::read(&code)
                .wrap_err_with(|| format!("Failed to read code image {}", code.display()))?;
            let cells = codec::decode_word_stream(&bytes)?;

            let data = match data {
                Some(path) => codec::decode_data(
                    &fs::read(&path)
                        .wrap_err_with(|| format!("Failed to read data {}", path.display()))?,
                )?,
                None => Vec::new(),
            };

            let input = match input {
                Some(path) => fs::read_to_string(&path)
                    .wrap_err_with(|| format!("Failed to read input {}", path.display()))?,
                None => String::new(),
            };

            let config = SimulationConfig {
                ports: Ports {
                    input: Address(input_port),
                    output: Address(output_port),
                },
                data_base: Address(data_base),
                tick_budget: budget,
                io_mode: if character {
                    IoMode::Character
                } else {
                    IoMode::Numeric
                },
            };

            let (report, _) =
                simulation::simulate_text::<CAPACITY>(&cells, &data, &input, &config)?;
            log::info!(
                "{} instructions, {} ticks, halted by {:?}",
                report.instructions,
                report.ticks,
                report.halt
            );
            println!("{}", report.output);
        }
        Command::Assemble {
            source,
            output,
            data,
            data_base,
        } => {
            let text = fs::read_to_string(&source)
                .wrap_err_with(|| format!("Failed to read source {}", source.display()))?;
            let program = parse::Parser::new(&text)
                .with_data_base(Address(data_base))
                .parse()
                .map_err(|errors| {
                    for err in &errors {
                        log::error!("{}", err);
                    }
                    eyre!("{} errors while assembling", errors.len())
                })?;

            let end = program.data_base.idx() + program.data.len();
            if program.code.len() > CAPACITY || end > CAPACITY {
                return Err(eyre!(
                    "program needs {} code cells and data up to {}, memory has {}",
                    program.code.len(),
                    end,
                    CAPACITY
                ));
            }

            let image = codec::encode_word_stream(&program.code)
                .wrap_err("Raw words in the code section; move `!` literals under `.data`")?;
            fs::write(&output, image)
                .wrap_err_with(|| format!("Failed to write {}", output.display()))?;
            log::info!("Wrote {} cells to {}", program.code.len(), output.display());

            match data {
                Some(path) => {
                    fs::write(&path, codec::encode_data(&program.data))
                        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                    log::info!(
                        "Wrote {} data words for {} to {}",
                        program.data.len(),
                        program.data_base,
                        path.display()
                    );
                }
                None if !program.data.is_empty() => {
                    return Err(eyre!(
                        "{} data words but no --data output given",
                        program.data.len()
                    ));
                }
                None => {}
            }
        }
        Command::Dump { code } => {
            let bytes = fs::read(&code)
                .wrap_err_with(|| format!("Failed to read code image {}", code.display()))?;
            for (address, cell) in codec::decode_word_stream(&bytes)?.iter().enumerate() {
                println!("{:4}: {}", address, cell);
            }
        }
    }

    Ok(())
}
