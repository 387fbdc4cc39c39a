use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 8] = ["op", "caller", "tx", "seller", "amount", "value", "flag", "at"];

/// Dispute window used by generated scripts, in seconds.
pub const WINDOW_SECS: i64 = 86_400;

pub fn address(byte: u8) -> String {
    format!("0x{}", format!("{byte:02x}").repeat(20))
}

/// How the generated transactions are expected to end.
#[derive(Debug, Default, PartialEq)]
pub struct ScriptSummary {
    pub finalized: usize,
    pub cancelled: usize,
}

/// Writes a script that opens `count` transactions, takes each through
/// delivery and confirmation, then randomly either disputes and resolves it or
/// lets the seller claim after the window.
///
/// Rows are grouped in phases so the `at` column never goes backwards.
pub fn generate_script(path: &Path, count: usize) -> Result<ScriptSummary, Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = rand::thread_rng();
    wtr.write_record(HEADER)?;

    let parties: Vec<(String, String)> = (0..count)
        .map(|i| (address(0x10 + (i % 16) as u8), address(0x80 + (i % 16) as u8)))
        .collect();
    let disputed: Vec<bool> = (0..count).map(|_| rng.gen_bool(0.3)).collect();

    for (id, (buyer, seller)) in parties.iter().enumerate() {
        let price = rng.gen_range(1..=1_000).to_string();
        let at = if id == 0 { "1" } else { "" };
        wtr.write_record([
            "open",
            buyer.as_str(),
            "",
            seller.as_str(),
            price.as_str(),
            price.as_str(),
            "",
            at,
        ])?;
    }
    for (id, (buyer, seller)) in parties.iter().enumerate() {
        let tx = id.to_string();
        wtr.write_record(["deliver", seller.as_str(), tx.as_str(), "", "", "", "", ""])?;
        wtr.write_record(["confirm", buyer.as_str(), tx.as_str(), "", "", "", "", ""])?;
    }

    let mut summary = ScriptSummary::default();
    let mut first = true;
    for (id, (buyer, seller)) in parties.iter().enumerate() {
        if !disputed[id] {
            continue;
        }
        let tx = id.to_string();
        let at = if first { "3600" } else { "" };
        first = false;
        wtr.write_record(["dispute", buyer.as_str(), tx.as_str(), "", "", "", "", at])?;
        wtr.write_record(["resolve", seller.as_str(), tx.as_str(), "", "", "", "", ""])?;
        summary.cancelled += 1;
    }

    let claim_at = (1 + WINDOW_SECS).to_string();
    let mut first = true;
    for (id, (_, seller)) in parties.iter().enumerate() {
        if disputed[id] {
            continue;
        }
        let at = if first { claim_at.as_str() } else { "" };
        first = false;
        let tx = id.to_string();
        wtr.write_record(["claim", seller.as_str(), tx.as_str(), "", "", "", "", at])?;
        summary.finalized += 1;
    }

    wtr.flush()?;
    Ok(summary)
}

/// Counts mirror rows per status code in the CLI's stdout.
pub fn count_status(stdout: &str, code: &str) -> usize {
    stdout
        .lines()
        .skip(1)
        .filter(|line| line.rsplit(',').next() == Some(code))
        .count()
}
