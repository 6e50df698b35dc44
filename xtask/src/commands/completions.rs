use std::path::PathBuf;

use clap::Args;
use clap_complete::{Shell, generate_to};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Directory to write into, relative to the workspace root
    #[arg(long = "out-dir", default_value = "target/dist/completions")]
    pub out_dir: PathBuf,

    /// Only generate for this shell
    #[arg(long, value_enum)]
    pub shell: Option<Shell>,
}

pub fn run(args: CompletionsArgs) -> Result<(), String> {
    let out_dir = crate::output_dir(&args.out_dir)?;
    let mut cmd = ghship::command();

    let shells = args.shell.map_or_else(
        || vec![Shell::Bash, Shell::Elvish, Shell::Fish, Shell::PowerShell, Shell::Zsh],
        |shell| vec![shell],
    );

    for shell in shells {
        let path = generate_to(shell, &mut cmd, crate::BIN_NAME, &out_dir)
            .map_err(|e| format!("{shell} completions: {e}"))?;
        println!("{}", path.display());
    }

    Ok(())
}
