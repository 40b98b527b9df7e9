//! seatwarden-mklic: build a sealed license file from a JSON grant list,
//! or print the records of an existing one.
//!
//! Input format:
//!
//! ```json
//! { "grants": [
//!     { "kind": "host", "host": "build1", "addr": "192.168.0.1",
//!       "program": "XIC", "seats": 1 },
//!     { "kind": "site_class_c", "addr": "10.1.2.0", "program": "XIV",
//!       "expiry": 1767225600 }
//! ] }
//! ```

use clap::Parser;
use seatwarden::clock::format_epoch;
use seatwarden::record::file::LICENSE_FILE_NAME;
use seatwarden::{Grant, LicenseBuilder, LicenseFile, SeatwardenError, SharedSecret};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "seatwarden-mklic", version, about = "Generate seatwarden license files")]
struct Cli {
    /// JSON grant description
    #[arg(required_unless_present = "dump")]
    input: Option<PathBuf>,

    /// Where to write the license file
    #[arg(short, long, default_value = LICENSE_FILE_NAME)]
    output: PathBuf,

    /// Verify FILE and print its records instead of generating
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    dump: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct GrantList {
    grants: Vec<Grant>,
}

#[derive(Debug, Serialize)]
struct RecordView {
    index: usize,
    program: String,
    expiry: String,
    seat_slot: Option<u8>,
    seat_cap: Option<u8>,
    checksum: String,
}

fn generate(input: &Path, output: &Path, secret: &SharedSecret) -> Result<(), SeatwardenError> {
    let json = std::fs::read_to_string(input).map_err(|e| {
        SeatwardenError::ConfigError(format!("cannot read {}: {}", input.display(), e))
    })?;
    let list: GrantList = serde_json::from_str(&json)
        .map_err(|e| SeatwardenError::ConfigError(format!("invalid grant list: {}", e)))?;

    let mut builder = LicenseBuilder::new();
    for grant in list.grants {
        builder.add(grant)?;
    }
    builder.build(secret).save(output)?;

    println!(
        "wrote {} grant(s) to {}",
        builder.grants().len(),
        output.display()
    );
    Ok(())
}

fn dump(path: &Path, secret: &SharedSecret) -> Result<(), SeatwardenError> {
    let file = LicenseFile::load(path, secret)?;
    for (index, block) in file.content().iter().enumerate() {
        let Some(program) = block.program() else {
            continue;
        };
        let capped = block.has_user_limit();
        let view = RecordView {
            index,
            program: program.to_string(),
            expiry: format_epoch(block.expiry),
            seat_slot: capped.then_some(block.user_limit_slot),
            seat_cap: if capped {
                file.seat_cap(block.user_limit_slot)
            } else {
                None
            },
            checksum: hex::encode(block.checksum),
        };
        let line = serde_json::to_string(&view)
            .map_err(|e| SeatwardenError::ConfigError(e.to_string()))?;
        println!("{}", line);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), SeatwardenError> {
    let secret = SharedSecret::from_env()?;
    match (&cli.dump, &cli.input) {
        (Some(path), _) => dump(path, &secret),
        (None, Some(input)) => generate(input, &cli.output, &secret),
        (None, None) => Err(SeatwardenError::ConfigError(
            "an input file or --dump is required".to_string(),
        )),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("seatwarden-mklic: {}", e);
            ExitCode::FAILURE
        }
    }
}
