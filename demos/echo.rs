use color_eyre::eyre::{eyre, Result};

use log::LevelFilter;
use microcpu::memory::{parse, CAPACITY};
use microcpu::simulation::{self, IoMode, SimulationConfig};
use simple_logger::SimpleLogger;

/// Copies characters from input to output until the terminating zero
const PROGRAM: &str = r#"
    loop:
        MOV R0, 400
        BEQZ R0, done
        STORE R0, 401
        JMP loop
    done:
        HLT
"#;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Info).init()?; // logging

    let program = parse::assemble(PROGRAM).map_err(|errors| eyre!("{:?}", errors))?;
    let config = SimulationConfig {
        io_mode: IoMode::Character,
        ..SimulationConfig::default()
    };
    let (report, machine) =
        simulation::simulate_text::<CAPACITY>(&program.code, &[], "Hello, world!", &config)?;

    println!("{}", report.output);
    println!("{}", machine.datapath);

    Ok(())
}
