use std::io::{self, BufRead, Write};
use tracing::warn;

use corpussync::{dedupe::DedupePlan, sync::DeletionGate};

/// Asks on the terminal before duplicates are deleted
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl StdinPrompt {
    pub fn ask(
        plan: &DedupePlan,
        mut input: impl BufRead,
        mut output: impl Write,
    ) -> io::Result<bool> {
        writeln!(
            output,
            "About to delete {} documents from {} duplicate groups.",
            plan.delete.len(),
            plan.group_count()
        )?;
        write!(output, "Proceed with deletion? (yes/no): ")?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

impl DeletionGate for StdinPrompt {
    fn confirm(&self, plan: &DedupePlan) -> bool {
        match Self::ask(plan, io::stdin().lock(), io::stdout()) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "Couldn't read confirmation, treating it as no");
                false
            }
        }
    }
}

/// Only a full `yes` counts, in any case
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}
