use color_eyre::eyre::{eyre, Result};

use log::LevelFilter;
use microcpu::memory::{parse, CAPACITY};
use microcpu::simulation::{self, SimulationConfig};
use simple_logger::SimpleLogger;

/// Prints 10 down to 1 to the output port
const PROGRAM: &str = r#"
        MOV R0, #10
    loop:
        STORE R0, 401
        DEC R0
        BNEZ R0, loop
        HLT
"#;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Info).init()?; // logging

    let program = parse::assemble(PROGRAM).map_err(|errors| eyre!("{:?}", errors))?;
    let config = SimulationConfig::default();
    let (report, _) = simulation::simulate_text::<CAPACITY>(&program.code, &[], "", &config)?;

    println!("{}", report.output);

    Ok(())
}
