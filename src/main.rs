use std::path::PathBuf;
use std::process::ExitCode;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use interface_launcher::core::auth::LaunchAccountProfile;
use interface_launcher::core::downloader::DownloadEvent;
use interface_launcher::core::java::{
    required_java_for_minecraft_version, ConsentDecision, ConsentRequest, RuntimeConsent,
};
use interface_launcher::core::launch::{InstanceConfig, LaunchEvent, LaunchRequest, Launcher};
use interface_launcher::core::state::{LauncherPaths, LauncherSettings};
use interface_launcher::{init_tracing, LauncherResult};

#[derive(Parser)]
#[command(name = "interface-launcher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (defaults to $INTERFACE_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a version and its inheritance chain
    Resolve { version: String },

    /// Make sure a Java runtime for a major version is available
    Java { major: u32 },

    /// Download everything a version needs and start the game
    Launch {
        version: String,

        #[arg(short, long)]
        username: String,

        /// Instance id; its folder is used as the game directory when it
        /// holds an instance.json
        #[arg(short, long)]
        instance: Option<String>,

        /// Java executable to use instead of a managed runtime
        #[arg(long)]
        java: Option<PathBuf>,
    },
}

/// Asks on the terminal before downloading a runtime.
struct TerminalConsent;

#[async_trait]
impl RuntimeConsent for TerminalConsent {
    async fn request(&self, request: &ConsentRequest) -> ConsentDecision {
        let prompt = if request.download_size > 0 {
            format!(
                "Java {} is not installed. Download it ({:.1} MB)?",
                request.major,
                request.download_size as f64 / (1024.0 * 1024.0)
            )
        } else {
            format!("Java {} is not installed. Download it?", request.major)
        };

        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(true)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(true)) => ConsentDecision::Install,
            Ok(Ok(false)) => ConsentDecision::Deny,
            _ => ConsentDecision::UseSystemCommand,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => LauncherPaths::new(dir),
        None => LauncherPaths::from_env(),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let result = match cli.command {
        Commands::Resolve { version } => resolve(paths, &version).await,
        Commands::Java { major } => java(paths, major, &cancel).await,
        Commands::Launch {
            version,
            username,
            instance,
            java,
        } => launch(paths, version, username, instance, java, &cancel).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn launcher(paths: LauncherPaths) -> LauncherResult<Launcher> {
    let settings = LauncherSettings::load(paths.base_dir());
    Launcher::standard(paths, settings)
}

async fn resolve(paths: LauncherPaths, version: &str) -> LauncherResult<()> {
    let launcher = launcher(paths)?;
    let descriptor = launcher.resolver().resolve(version).await?;
    let java = descriptor
        .required_java_major()
        .unwrap_or_else(|| required_java_for_minecraft_version(descriptor.jar_id()));

    println!("id:          {}", descriptor.id);
    println!("type:        {}", descriptor.version_type());
    println!("main class:  {}", descriptor.main_class.as_deref().unwrap_or("-"));
    println!("client jar:  {}", descriptor.jar_id());
    println!("asset index: {}", descriptor.asset_index_id());
    println!("java:        {}", java);
    println!("libraries:   {}", descriptor.libraries.len());
    for library in &descriptor.libraries {
        println!("  {}", library.name);
    }
    Ok(())
}

async fn java(paths: LauncherPaths, major: u32, cancel: &CancellationToken) -> LauncherResult<()> {
    let launcher = launcher(paths)?;
    let (tx, rx) = unbounded_channel();
    let bar = progress_bar();
    let render = render_downloads(rx, bar.clone());

    let runtime = launcher
        .runtimes()
        .ensure(major, Some(&tx), &TerminalConsent, cancel)
        .await;
    drop(tx);
    let _ = render.await;
    bar.finish_and_clear();

    let runtime = runtime?;
    println!(
        "Java {} ({:?}): {}",
        runtime.major,
        runtime.provenance,
        runtime.executable.display()
    );
    Ok(())
}

async fn launch(
    paths: LauncherPaths,
    version: String,
    username: String,
    instance: Option<String>,
    java: Option<PathBuf>,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    let launcher = launcher(paths)?;
    let mut config = InstanceConfig::new(instance.unwrap_or_default(), version);
    config.java_path = java;
    let request = LaunchRequest {
        instance: config,
        account: LaunchAccountProfile::offline(&username),
    };

    let (tx, rx) = unbounded_channel();
    let bar = progress_bar();
    let render = render_launch(rx, bar.clone());

    let session = launcher
        .launch(request, Some(&tx), &TerminalConsent, cancel)
        .await;
    drop(tx);
    let session = match session {
        Ok(session) => session,
        Err(err) => {
            bar.abandon();
            let _ = render.await;
            return Err(err);
        }
    };
    bar.finish_and_clear();
    println!("Game started (pid {:?})", session.pid);

    let outcome = session.wait().await?;
    let _ = render.await;
    println!(
        "Game exited with {:?} after {}s",
        outcome.exit_code,
        outcome.duration.as_secs()
    );
    if let Some(crash) = outcome.crash {
        println!("Crash: {:?}", crash.cause);
        println!("  {}", crash.details);
        println!("  {}", crash.suggestion);
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg:32} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

fn apply_download(bar: &ProgressBar, event: &DownloadEvent) {
    if let DownloadEvent::Progress { current, total } = event {
        bar.set_length((*total).max(*current));
        bar.set_position(*current);
    }
}

fn render_downloads(mut rx: UnboundedReceiver<DownloadEvent>, bar: ProgressBar) -> JoinHandle<()> {
    tokio::spawn(async move {
        bar.set_message("Downloading runtime");
        while let Some(event) = rx.recv().await {
            apply_download(&bar, &event);
        }
    })
}

fn render_launch(mut rx: UnboundedReceiver<LaunchEvent>, bar: ProgressBar) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                LaunchEvent::Stage { stage } => bar.set_message(stage.label()),
                LaunchEvent::Status { message } => bar.set_message(message),
                LaunchEvent::Download { progress } => apply_download(&bar, &progress),
                LaunchEvent::Log { .. } | LaunchEvent::Crash { .. } | LaunchEvent::Exited { .. } => {}
            }
        }
    })
}
