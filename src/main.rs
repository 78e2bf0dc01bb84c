//! Response calculator for S/KEY challenges.
//!
//! Takes the challenge iteration and seed, prompts for the secret
//! passphrase (unless `-p` supplies it), and prints the word-form
//! response.
//!
//! ```bash
//! $ skey 88 ka9q2
//! Enter secret passphrase:
//! OMEN US HORN OMIT BACK AHOY
//! $ skey -n 3 -x 99 test
//! 97: NET GLUM BHOY LOFT LAVA MINT   2B91 A95D 58BA B578
//! 98: HUGH IOTA LONE EMIT TELL MILT  9C53 DEC7 BDCE 8F77
//! 99: NOTE OUT IBIS SINK NAVE MODE   C5E6 1277 6E6C 237A
//! ```

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skey::{advance_by, fold, key_crunch, words};

/// Compute responses to S/KEY challenges.
#[derive(Parser, Debug)]
#[command(name = "skey")]
#[command(about = "Compute responses to S/KEY challenges")]
#[command(version)]
struct Args {
    /// Print this many consecutive passwords, ending at the challenge
    /// iteration
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    count: u32,

    /// Secret passphrase (prompted for when omitted)
    #[arg(short = 'p', long = "passphrase")]
    passphrase: Option<String>,

    /// Also print each password as grouped hex
    #[arg(short = 'x', long = "hex")]
    hex: bool,

    /// Challenge iteration number, or combined "<n>/<seed>"
    sequence: String,

    /// Challenge seed (when not combined into the first argument)
    seed: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let args = Args::parse();

    let (n, seed) = match &args.seed {
        Some(seed) => (args.sequence.parse::<u32>()?, seed.clone()),
        None => {
            // The challenge may arrive as one token, "<n>/<seed>".
            let (n, seed) = args
                .sequence
                .split_once('/')
                .ok_or("expected <sequence> <seed> or <sequence>/<seed>")?;
            (n.parse::<u32>()?, seed.to_string())
        }
    };

    let passphrase = match args.passphrase {
        Some(passphrase) => passphrase,
        None => prompt_passphrase()?,
    };

    // Crunch once; everything after is fold steps.
    let start = key_crunch(&seed, &passphrase);

    if args.count <= 1 {
        let key = advance_by(start, n);
        println!("{}", words::encode(key).join(" "));
        if args.hex {
            println!("{}", key.to_hex_grouped());
        }
    } else {
        let first = n.saturating_sub(args.count - 1);
        let mut key = advance_by(start, first);
        for i in first..=n {
            if args.hex {
                println!("{i}: {:<29}  {}", words::encode(key).join(" "), key.to_hex_grouped());
            } else {
                println!("{i}: {}", words::encode(key).join(" "));
            }
            key = fold(key);
        }
    }
    Ok(())
}

/// Reads the passphrase from stdin, stripping the line ending.
///
/// Echo suppression belongs to the invoking terminal setup, not here.
fn prompt_passphrase() -> Result<String, io::Error> {
    print!("Enter secret passphrase: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    while line.ends_with(['\r', '\n']) {
        line.pop();
    }
    Ok(line)
}
