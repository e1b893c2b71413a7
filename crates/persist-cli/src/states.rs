//! # States Subcommand
//!
//! Prints the state table: code, canonical name, and flags.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use persist_state::{LifeCycleStateFactory, StateFlags, StateType};

/// Arguments for `persist states`.
#[derive(Args, Debug)]
pub struct StatesArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StateRow {
    code: u8,
    name: StateType,
    #[serde(flatten)]
    flags: StateFlags,
}

fn rows() -> Vec<StateRow> {
    LifeCycleStateFactory::all()
        .map(|state| StateRow {
            code: state.state_type().code(),
            name: state.state_type(),
            flags: state.flags(),
        })
        .collect()
}

fn mark(flag: bool) -> &'static str {
    if flag {
        "x"
    } else {
        "-"
    }
}

/// Render the table as text.
pub fn render_table() -> String {
    let mut out = format!(
        "{:>4}  {:<16} {:>4} {:>4} {:>4} {:>4} {:>4} {:>4}\n",
        "code", "state", "pers", "tx", "drty", "new", "del", "det"
    );
    for row in rows() {
        let f = row.flags;
        out.push_str(&format!(
            "{:>4}  {:<16} {:>4} {:>4} {:>4} {:>4} {:>4} {:>4}\n",
            row.code,
            row.name.name(),
            mark(f.persistent),
            mark(f.transactional),
            mark(f.dirty),
            mark(f.new),
            mark(f.deleted),
            mark(f.detached),
        ));
    }
    out
}

/// Execute the states subcommand.
pub fn run_states(args: &StatesArgs) -> Result<u8> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows())?);
    } else {
        print!("{}", render_table());
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_every_state() {
        let table = render_table();
        assert_eq!(table.lines().count(), StateType::COUNT + 1);
        assert!(table.contains("P_NEW_DELETED"));
        assert!(table.contains("DETACHED_DIRTY"));
    }

    #[test]
    fn test_json_rows_flatten_flags() {
        let json = serde_json::to_value(rows()).unwrap();
        let hollow = &json[9];
        assert_eq!(hollow["name"], "HOLLOW");
        assert_eq!(hollow["code"], 9);
        assert_eq!(hollow["persistent"], true);
        assert_eq!(hollow["transactional"], false);
    }
}
