mod error;

use aculink::SensorReading;
use clap::Parser;
use error::CliError;
use std::process;

/// Decode an AcuLink bridge upload, or re-encode a stored JSON reading
#[derive(Parser, Debug)]
#[command(version, about = "AcuLink payload decoder", long_about = None)]
struct Args {
    /// Form-encoded bridge payload (`id=...&mt=...`) or a JSON reading
    data: String,
}

fn read(data: &str) -> Result<SensorReading, CliError> {
    if data.starts_with('{') {
        SensorReading::from_json(data).map_err(CliError::Parse)
    } else {
        Ok(SensorReading::from_payload(data)?)
    }
}

fn run(data: &str) -> Result<String, CliError> {
    read(data)?.to_json().map_err(CliError::Encode)
}

fn main() {
    let args = Args::parse();

    match run(&args.data) {
        Ok(json) => println!("Got data: {}", json),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
