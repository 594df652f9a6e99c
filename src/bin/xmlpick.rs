//! Prints values selected by a path from an XML file.

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use xmlpick::{Mode, ParsingOptions};

/// xmlpick -- extract text and attribute values from XML.
#[derive(Parser, Debug)]
#[command(name = "xmlpick", version, about, long_about = None)]
struct Cli {
    /// A path like `feed/entry[1]/link@href`.
    path: String,

    /// XML file to read (use `-` for stdin).
    #[arg(default_value = "-")]
    file: String,

    /// Collect every leaf descendant of the matched element.
    #[arg(short, long)]
    recursive: bool,

    /// Reject documents with a DTD.
    #[arg(long)]
    no_dtd: bool,

    /// Maximum element nesting depth.
    #[arg(long, value_name = "N", default_value_t = 256)]
    max_depth: u32,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_IO_ERROR: u8 = 1;
const EXIT_EXTRACT_ERROR: u8 = 2;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    debug!("{:?}", cli);

    let data = match read_input(&cli.file) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}.", cli.file, e);
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    let mode = if cli.recursive { Mode::Recursive } else { Mode::Shallow };
    let opt = ParsingOptions {
        allow_dtd: !cli.no_dtd,
        max_depth: cli.max_depth,
    };

    let values = match xmlpick::extract_with(&cli.path, &data, mode, opt) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}.", e);
            return ExitCode::from(EXIT_EXTRACT_ERROR);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for value in &values {
        if writeln!(out, "{}", value).is_err() {
            return ExitCode::from(EXIT_IO_ERROR);
        }
    }

    ExitCode::from(EXIT_SUCCESS)
}

/// Reads input from a file or stdin (when filename is `-`).
fn read_input(filename: &str) -> io::Result<Vec<u8>> {
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(filename)
    }
}
