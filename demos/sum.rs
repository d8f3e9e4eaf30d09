use color_eyre::eyre::{eyre, Result};

use log::LevelFilter;
use microcpu::memory::{parse, CAPACITY};
use microcpu::simulation::{self, SimulationConfig};
use simple_logger::SimpleLogger;

/// Adds up the data segment with a single accumulating instruction
const PROGRAM: &str = r#"
        MOV R1, #5
        MOV R0, #0
        NADD R1, R0, values
        STORE R0, 401
        HLT
.data
values:
        ! 3
        ! 1
        ! 4
        ! 1
        ! 5
"#;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Debug).init()?; // logging

    let program = parse::assemble(PROGRAM).map_err(|errors| eyre!("{:?}", errors))?;
    let config = SimulationConfig {
        data_base: program.data_base,
        ..SimulationConfig::default()
    };
    let (report, _) =
        simulation::simulate_text::<CAPACITY>(&program.code, &program.data, "", &config)?;

    println!(
        "sum = {} ({} instructions, {} ticks)",
        report.output, report.instructions, report.ticks
    );

    Ok(())
}
