use clap::{Parser, Subcommand};
use dated_press::build::{BuildEvent, Site};
use dated_press::{config, output, watch};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

#[derive(Parser)]
#[command(name = "dated-press")]
#[command(about = "Static site builder for dated articles and presentations")]
#[command(long_about = "\
Static site builder for dated articles and presentations

Filenames carry the date and URL slug; an optional header block carries the
title and description.

Project structure:

  site/
  ├── config.toml                        # Site config (optional)
  ├── content/
  │   ├── articles/                      # Dated category, feeds the listing
  │   │   ├── 2023-01-05-hello.md        # → content/articles/2023/01/hello/index.html
  │   │   ├── 2023-01-06-recap.html      # HTML bodies pass through unrendered
  │   │   └── 2023-01-05-hello/          # Co-located assets
  │   │       └── diagram.png            # → content/articles/2023/01/hello/diagram.png
  │   └── presentations/                 # Flat category
  │       └── intro.md                   # → content/presentations/intro.html
  └── static/                            # Copied verbatim → static/

Header block (first line of the document):

  ---                    +++
  title: Hello           title = \"Hello\"
  description: First     description = \"First\"
  ---                    +++

The listing (index.html, index2.html, ...) shows dated documents newest first.

Run 'dated-press gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Project root containing config.toml, content/ and static/
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Output directory
    #[arg(long, default_value = "build", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site (or a single category)
    Build {
        /// Rebuild only this category and the listing it feeds
        #[arg(long)]
        category: Option<String>,
    },
    /// Build, then rebuild on every change
    Watch,
    /// Validate names and header blocks without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build { category } => {
            let site = Site::load(&cli.root, &cli.output)?;
            init_thread_pool(&site.config().processing);
            println!("==> Building {} → {}", cli.root.display(), cli.output.display());
            let summary = with_printer(|tx| match &category {
                Some(name) => site.build_category(name, Some(tx)),
                None => site.build_all(Some(tx)),
            })?;
            output::print_build_summary(&summary, &cli.output);
        }
        Command::Watch => {
            // Watch first so edits made during the initial build are not missed.
            let watcher = watch::SiteWatcher::start(&cli.root)?;
            let mut site = Site::load(&cli.root, &cli.output)?;
            init_thread_pool(&site.config().processing);

            println!("==> Building {} → {}", cli.root.display(), cli.output.display());
            match with_printer(|tx| site.build_all(Some(tx))) {
                Ok(summary) => output::print_build_summary(&summary, &cli.output),
                Err(e) => print_lines(output::format_watch_error(&e)),
            }
            println!("==> Watching for changes (Ctrl+C to stop)");

            loop {
                let batch = watcher.next_batch()?;
                for error in &batch.errors {
                    print_lines(output::format_watch_error(error));
                }
                for trigger in &batch.triggers {
                    println!("{}", output::format_trigger(trigger));
                    if let Err(e) = with_printer(|tx| watch::apply(&mut site, trigger, Some(tx))) {
                        print_lines(output::format_watch_error(&e));
                    }
                }
            }
        }
        Command::Check => {
            let site = Site::load(&cli.root, &cli.output)?;
            init_thread_pool(&site.config().processing);
            println!("==> Checking {}", cli.root.display());
            let summary = site.check()?;
            output::print_check_summary(&summary);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run `f` with a sender whose events are printed on a separate thread.
///
/// Returns once `f` is done and every event has been printed.
fn with_printer<T>(f: impl FnOnce(Sender<BuildEvent>) -> T) -> T {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_build_event(&event);
        }
    });
    let result = f(tx);
    // The sender was moved into `f` and dropped with it, which ends the loop.
    let _ = printer.join();
    result
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        eprintln!("{}", line);
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never more threads than available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
