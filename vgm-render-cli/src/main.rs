use clap::Parser;
use vgm_render_cli::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = vgm_render_cli::run(&cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
