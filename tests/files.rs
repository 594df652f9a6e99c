use std::env;
use std::fmt;
use std::fmt::Write;
use std::fs;
use std::path;

use pretty_assertions::assert_eq;
use std::panic;
use std::process;

use xmlpick::Mode;

#[derive(Clone, Copy, PartialEq)]
struct TStr<'a>(pub &'a str);

impl<'a> fmt::Debug for TStr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


trait HasExtension {
    fn has_extension(&self, ext: &str) -> bool;
}

impl HasExtension for path::Path {
    fn has_extension(&self, ext: &str) -> bool {
        if let Some(e) = self.extension() { e == ext } else { false }
    }
}


fn main() {
    let mut tests = Vec::new();

    for entry in fs::read_dir("tests/files").unwrap() {
        let entry = entry.unwrap();

        if !entry.path().has_extension("xml") {
            continue;
        }

        tests.push(entry.path());
    }

    tests.sort();

    // Optional positional argument filters tests by name, like libtest.
    let filter = env::args().skip(1).find(|a| !a.starts_with('-'));

    let mut passed = 0;
    let mut failed = Vec::new();
    for path in tests {
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        if let Some(ref f) = filter {
            if !name.contains(f.as_str()) {
                continue;
            }
        }

        let result = panic::catch_unwind(move || actual_test(path));
        match result {
            Ok(()) => {
                println!("test {} ... ok", name);
                passed += 1;
            }
            Err(_) => {
                println!("test {} ... FAILED", name);
                failed.push(name);
            }
        }
    }

    println!();
    if failed.is_empty() {
        println!("test result: ok. {} passed; 0 failed", passed);
    } else {
        println!("failures:");
        for name in &failed {
            println!("    {}", name);
        }
        println!("test result: FAILED. {} passed; {} failed", passed, failed.len());
        process::exit(101);
    }
}

/// Runs every query listed in the `.txt` file next to the document
/// and compares the rendered results with the file itself.
///
/// A query line is `shallow <path>` or `recursive <path>`,
/// followed by one indented line per value.
fn actual_test(path: path::PathBuf) {
    let expected = fs::read_to_string(path.with_extension("txt")).unwrap();
    let data = fs::read(&path).unwrap();

    let mut actual = String::new();
    for line in expected.lines() {
        if line.is_empty() || line.starts_with(' ') {
            continue;
        }

        let (mode, query) = line.split_once(' ').unwrap_or((line, ""));
        let mode = match mode {
            "shallow" => Mode::Shallow,
            "recursive" => Mode::Recursive,
            _ => panic!("unknown mode '{}'", mode),
        };

        if !actual.is_empty() {
            actual.push('\n');
        }

        render(query, &data, mode, &mut actual).unwrap();
    }

    assert_eq!(TStr(&expected), TStr(&actual));
}

fn render(query: &str, data: &[u8], mode: Mode, s: &mut String) -> Result<(), fmt::Error> {
    let name = match mode {
        Mode::Shallow => "shallow",
        Mode::Recursive => "recursive",
    };

    writeln!(s, "{} {}", name, query)?;

    match xmlpick::extract_with(query, data, mode, xmlpick::ParsingOptions::default()) {
        Ok(values) => {
            for value in values {
                writeln!(s, "  {:?}", value)?;
            }
        }
        Err(e) => {
            writeln!(s, "  error: {:?}", e.to_string())?;
        }
    }

    Ok(())
}
