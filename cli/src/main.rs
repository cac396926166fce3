use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process;

use anyhow::Context;
use clap::{arg, Command};

fn cli() -> Command {
    Command::new("brx")
        .about("Matches a pattern against lines of files or standard input")
        .arg(arg!(<PATTERN> "Pattern to match"))
        .arg(arg!([FILE] ... "Files to search; standard input when omitted"))
        .arg(arg!(-q --quiet "Produce no output, only an exit status"))
        .arg(arg!(-n --"line-number" "Prefix each printed line with its line number"))
        .arg(arg!(-c --count "Print only the number of matching lines"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = cli().get_matches();

    let pattern = args.get_one::<String>("PATTERN").unwrap();
    let regex = bregex::compile(pattern.as_bytes())
        .with_context(|| format!("invalid pattern `{}`", pattern))?;

    let quiet = args.get_flag("quiet");
    let line_numbers = args.get_flag("line-number");
    let count_only = args.get_flag("count");

    let files: Vec<&String> =
        args.get_many::<String>("FILE").unwrap_or_default().collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut matching_lines: u64 = 0;
    if files.is_empty() {
        let stdin = io::stdin();
        matching_lines += scan(
            &regex,
            stdin.lock(),
            &mut out,
            quiet || count_only,
            line_numbers,
        )?;
    } else {
        for file in files {
            let reader = BufReader::new(
                File::open(file)
                    .with_context(|| format!("can't open `{}`", file))?,
            );
            matching_lines += scan(
                &regex,
                reader,
                &mut out,
                quiet || count_only,
                line_numbers,
            )?;
        }
    }

    if count_only && !quiet {
        writeln!(out, "{}", matching_lines)?;
    }

    // Like grep: status 1 when nothing matched.
    if matching_lines == 0 {
        process::exit(1);
    }
    Ok(())
}

/// Matches the pattern against every line of `reader`, returning the
/// number of matching lines. Lines are raw bytes; no UTF-8 is assumed.
fn scan<R: BufRead, W: Write>(
    regex: &bregex::Regex,
    mut reader: R,
    out: &mut W,
    silent: bool,
    line_numbers: bool,
) -> anyhow::Result<u64> {
    let mut line = Vec::new();
    let mut number: u64 = 0;
    let mut matching: u64 = 0;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        number += 1;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if regex.matches(&line) {
            matching += 1;
            if !silent {
                if line_numbers {
                    write!(out, "{}:", number)?;
                }
                out.write_all(&line)?;
                out.write_all(b"\n")?;
            }
        }
    }
    Ok(matching)
}
