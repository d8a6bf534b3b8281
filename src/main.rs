use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;

use devcache::cli::Cli;
use devcache::commands::dispatch;
use devcache::ui::prelude::*;
use devcache::ui::{init, set_debug_mode};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let color = !cli.no_color && std::io::stdout().is_terminal();
    init(cli.output, color);
    set_debug_mode(cli.debug);

    match dispatch(cli).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            emit(
                Level::Error,
                "error",
                &format!("{} {:#}", char::from(NerdFont::Cross), e),
                None,
            );
            ExitCode::from(2)
        }
    }
}
