use anyhow::{anyhow, bail, Context};
use ledger_core::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

pub(crate) const USAGE: &str =
    "commands: submit <from> <to> <amount> | mine | head | pending | import <file> | quit";

/// One line typed on the node's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeCommand {
    Submit {
        from: String,
        to: String,
        amount: Decimal,
    },
    Mine,
    Head,
    Pending,
    Import(PathBuf),
    Quit,
}

impl FromStr for NodeCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, rest)) = words.split_first() else {
            bail!("empty command");
        };
        let cmd = match (verb.to_ascii_lowercase().as_str(), rest) {
            ("submit", [from, to, amount]) => NodeCommand::Submit {
                from: (*from).to_string(),
                to: (*to).to_string(),
                amount: Decimal::from_str(amount)
                    .with_context(|| format!("bad amount {amount:?}"))?,
            },
            ("mine", []) => NodeCommand::Mine,
            ("head", []) => NodeCommand::Head,
            ("pending", []) => NodeCommand::Pending,
            ("import", [file]) => NodeCommand::Import(PathBuf::from(*file)),
            ("quit" | "exit", []) => NodeCommand::Quit,
            _ => return Err(anyhow!("unrecognised command {line:?}")),
        };
        Ok(cmd)
    }
}
