use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use entrypoint::config::{DEFAULT_CONFIG_DIR, DEFAULT_HOME, DEFAULT_SCRIPTS_DIR, ImageConfig, Layout};
use entrypoint::environment::ProcessEnv;
use entrypoint::launch::Entrypoint;
use entrypoint::profile;
use entrypoint::provision::Provisioner;
use entrypoint::render::TemplateRenderer;
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

#[derive(Parser)]
#[command(name = "entrypoint", about = "Docker entry point")]
struct Cli {
    /// Disable colored log output
    #[arg(long)]
    disable_colors: bool,

    /// Print the image's grocker version and exit
    #[arg(long)]
    grocker_version: bool,

    /// Skip provisioning and dispatch straight away
    #[arg(long)]
    no_setup: bool,

    #[arg(long, env = "ENTRYPOINT_HOME", default_value = DEFAULT_HOME)]
    home: PathBuf,

    #[arg(long, env = "ENTRYPOINT_CONFIG_DIR", default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    #[arg(long, env = "ENTRYPOINT_SCRIPTS_DIR", default_value = DEFAULT_SCRIPTS_DIR)]
    scripts_dir: PathBuf,

    /// The command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_ansi(!cli.disable_colors)
        .with_target(false)
        .init();

    let layout = Layout::new(cli.home, cli.config_dir, cli.scripts_dir);

    if cli.grocker_version {
        return match layout.read_version() {
            Ok(version) => {
                println!("{version}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(layout, cli.no_setup, cli.args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(layout: Layout, no_setup: bool, args: Vec<String>) -> entrypoint::Result<u8> {
    let renderer = TemplateRenderer::new(layout.templates());
    let env = if no_setup {
        ProcessEnv::inherit()
    } else {
        let config = ImageConfig::load(&layout)?;
        let env = ProcessEnv::load(&layout)?;
        Provisioner::new(&layout, &config, &renderer).run(&env)?;
        env
    };

    let mut launchers = Entrypoint::new(layout, env, renderer);
    profile::dispatch(args, &mut launchers)
}
