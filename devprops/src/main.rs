mod apply;
mod dump_state;
mod logging;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use std::io::IsTerminal as _;
use std::process::exit;

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    let mut frontend = logging::set_up(logging::Options {
        verbose: args.options.verbose,
        color: std::io::stderr().is_terminal(),
    })?;

    let r = match &args.command {
        Commands::Apply(subargs) => apply::apply(&args.options, subargs),
        Commands::DumpState(subargs) => dump_state::dump_state(&args.options, subargs),
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(shell.clone(), &mut cmd, "devprops", &mut std::io::stdout());
            Ok(())
        }
    };

    frontend.tear_down()?;
    r
}

fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("devprops error: {}, {}", e.root_cause(), e.to_string());
            exit(1);
        }
    }
}

/// devprops: reconcile declarative device property configuration against a
/// property database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Parser, Debug, Clone)]
struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the configured property removals and additions to the database
    #[command()]
    Apply(apply::Args),

    /// Print the resolved property database state as JSON
    DumpState(dump_state::Args),

    /// Generate markdown documentation for devprops
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for devprops
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for devprops
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
