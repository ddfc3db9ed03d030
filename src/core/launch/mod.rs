//! Launch orchestration: from an instance + account to a supervised game
//! process.

mod arguments;
mod classpath;
mod context;
mod crash;
mod natives;
mod orchestrator;
mod paths;
mod process;

pub use arguments::{
    apply_skin_provider, assemble_command_line, format_command_for_logs, sanitize_args,
    CommandLine, MemoryLimits, Placeholders, LAUNCHER_NAME, LAUNCHER_VERSION,
};
pub use classpath::{build_classpath, get_classpath_separator, plan_libraries, safe_path_str, LibraryPlan};
pub use context::{
    InstanceConfig, LaunchContext, LaunchEvent, LaunchRequest, LaunchStage, LogStream,
};
pub use crash::{classify_crash, CrashCause, CrashReport};
pub use natives::{cleanup_natives, extract_natives};
pub use orchestrator::{Launcher, PreparedLaunch};
pub use paths::{resolve_game_dir, GameDirSource};
pub use process::{GameSession, LogRingBuffer, SessionOutcome};
