use anonshare_core::{OverwriteDecision, OverwritePrompt};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::Path;

/// Interactive yes/no before replacing a downloaded file
///
/// "no" skips the resource. Escape, `q` or a terminal error aborts the run.
pub struct ConfirmOverwrite;

impl OverwritePrompt for ConfirmOverwrite {
    fn confirm(&self, path: &Path) -> OverwriteDecision {
        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} already exists. Overwrite?", path.display()))
            .default(false)
            .interact_opt();

        match answer {
            Ok(Some(true)) => OverwriteDecision::Proceed,
            Ok(Some(false)) => OverwriteDecision::Skip,
            Ok(None) | Err(_) => OverwriteDecision::Abort,
        }
    }
}
