use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Directory to write into, relative to the workspace root
    #[arg(long = "out-dir", default_value = "target/dist/man")]
    pub out_dir: PathBuf,
}

pub fn run(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::output_dir(&args.out_dir)?;
    let cmd = ghship::command().name(crate::BIN_NAME);

    write_page(&out_dir, crate::BIN_NAME, cmd.clone())?;
    for sub in cmd.get_subcommands() {
        let page = format!("{}-{}", crate::BIN_NAME, sub.get_name());
        write_page(&out_dir, &page, sub.clone())?;
    }

    Ok(())
}

fn write_page(out_dir: &Path, page: &str, cmd: clap::Command) -> Result<(), String> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("{page}: {e}"))?;

    let path = out_dir.join(format!("{page}.1"));
    std::fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}
