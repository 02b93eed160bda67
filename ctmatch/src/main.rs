use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{debug, info};

use ctmatch::scan::{ScanStats, Scanner};
use ctmatch_common::Attr;
use ctmatch_filter::{parse_record, CompareFlags, TupleMatcher};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Reference entry, in conntrack text format.
    #[arg(short, long)]
    reference: String,

    /// Comparison policy, e.g. `orig and repl` or `all and timeout[gt]`.
    #[arg(short, long, default_value = "all")]
    policy: CompareFlags,

    /// Reference attributes left out of the comparison.
    #[arg(short, long, value_enum)]
    ignore: Vec<Ignored>,

    /// Select the entries that do not match.
    #[arg(short = 'v', long)]
    invert: bool,

    /// Only print the number of selected entries.
    #[arg(short, long)]
    count: bool,

    /// Conntrack dumps to scan. Reads stdin when empty or `-`.
    files: Vec<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Ignored {
    Id,
    Mark,
    Timeout,
    Status,
    State,
}

impl Ignored {
    fn attr(self) -> Attr {
        match self {
            Self::Id => Attr::Id,
            Self::Mark => Attr::Mark,
            Self::Timeout => Attr::Timeout,
            Self::Status => Attr::Status,
            Self::State => Attr::TcpState,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args = Args::parse();

    let mut reference = parse_record(&args.reference).context("invalid reference entry")?;
    for ignored in &args.ignore {
        reference.unset(ignored.attr());
    }
    debug!("reference={:?} policy={}", reference, args.policy);

    let scanner = Scanner::new(reference, TupleMatcher::new(args.policy)).invert(args.invert);

    let files = if args.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.files
    };

    let mut out = BufWriter::new(io::stdout().lock());
    let mut total = ScanStats::default();

    for path in &files {
        let emit = |line: &str| {
            if args.count {
                Ok(())
            } else {
                writeln!(out, "{}", line)
            }
        };

        let stats = if path.as_path() == Path::new("-") {
            scanner.scan("<stdin>", io::stdin().lock(), emit)?
        } else {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            scanner.scan(&path.display().to_string(), BufReader::new(file), emit)?
        };

        debug!(
            "{}: scanned={} selected={} skipped={}",
            path.display(),
            stats.scanned,
            stats.selected,
            stats.skipped
        );
        total += stats;
    }

    if args.count {
        writeln!(out, "{}", total.selected)?;
    }
    out.flush()?;

    info!(
        "scanned={} selected={} skipped={}",
        total.scanned, total.selected, total.skipped
    );

    Ok(())
}
