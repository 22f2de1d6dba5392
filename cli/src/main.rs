use std::fs;
use std::process;

use androidmk::Androidmk;
use anyhow::Context;
use log::info;

mod cli;
mod output;

fn main() -> anyhow::Result<()> {
    let args = cli::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let input = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let filename = args.input.display().to_string();

    let conversion = match Androidmk::new().fix(!args.no_fix).convert(&filename, &input) {
        Ok(conversion) => conversion,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    if !conversion.warnings.is_empty() {
        info!("{filename}: output is not fixed up");
    }

    match &args.output {
        Some(path) => {
            output::write_atomic(path, &conversion.output)?;
            info!("wrote {}", path.display());
        }
        None => print!("{}", conversion.output),
    }

    Ok(())
}
