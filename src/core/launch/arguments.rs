// ─── Command Line ───
// Builds the JVM + game argument vector in a fixed order:
// heap, proxy, preset and user flags, descriptor JVM flags, native path,
// classpath, main class, game arguments.

use std::path::PathBuf;

use tracing::debug;

use super::classpath::{get_classpath_separator, safe_path_str};
use super::context::{InstanceConfig, LaunchContext};
use crate::core::auth::LaunchAccountProfile;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherSettings;
use crate::core::version::Platform;

pub const LAUNCHER_NAME: &str = "InterfaceOficial";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

const CLASSPATH_FLAGS: [&str; 3] = ["-cp", "-classpath", "--class-path"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub max_mb: u32,
    pub min_mb: u32,
}

impl MemoryLimits {
    /// Instance values win over launcher defaults; the minimum never
    /// exceeds the maximum.
    pub fn resolve(instance: &InstanceConfig, settings: &LauncherSettings) -> Self {
        let max_mb = instance
            .max_memory_mb
            .filter(|mb| *mb > 0)
            .unwrap_or(settings.default_max_memory_mb)
            .max(256);
        let min_mb = instance
            .min_memory_mb
            .filter(|mb| *mb > 0)
            .unwrap_or(settings.default_min_memory_mb)
            .min(max_mb);
        Self { max_mb, min_mb }
    }

    fn flags(&self) -> [String; 2] {
        [format!("-Xmx{}M", self.max_mb), format!("-Xms{}M", self.min_mb)]
    }
}

/// Program plus argument vector handed to the process spawner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn classpath_index(&self) -> Option<usize> {
        self.args
            .iter()
            .position(|arg| CLASSPATH_FLAGS.contains(&arg.as_str()))
    }

    /// Insert a JVM flag right before the classpath flag.
    pub fn insert_jvm_flag(&mut self, flag: String) {
        let index = self.classpath_index().unwrap_or(self.args.len());
        self.args.insert(index, flag);
    }
}

// ── Placeholders ────────────────────────────────────────

/// `${name}` → value table for one launch.
pub struct Placeholders {
    values: Vec<(&'static str, String)>,
}

impl Placeholders {
    pub fn for_launch(ctx: &LaunchContext, classpath: &str) -> Self {
        let account = &ctx.account;
        let game_dir = safe_path_str(&ctx.game_dir);
        let assets_root = safe_path_str(&ctx.assets_dir);
        let game_assets = ctx
            .virtual_assets_dir
            .as_deref()
            .map(safe_path_str)
            .unwrap_or_else(|| assets_root.clone());

        let values = vec![
            ("${auth_player_name}", account.username.clone()),
            ("${version_name}", ctx.version.id.clone()),
            ("${game_directory}", game_dir),
            ("${assets_root}", assets_root),
            ("${game_assets}", game_assets),
            ("${assets_index_name}", ctx.version.asset_index_id().to_string()),
            ("${auth_uuid}", account.uuid.clone()),
            ("${auth_access_token}", account.access_token.clone()),
            ("${auth_session}", account.access_token.clone()),
            ("${user_type}", account.user_type.clone()),
            ("${user_properties}", "{}".to_string()),
            ("${version_type}", ctx.version.version_type().to_string()),
            ("${natives_directory}", safe_path_str(&ctx.natives_dir)),
            ("${library_directory}", safe_path_str(&ctx.libraries_dir)),
            ("${classpath}", classpath.to_string()),
            ("${classpath_separator}", get_classpath_separator().to_string()),
            ("${launcher_name}", LAUNCHER_NAME.to_string()),
            ("${launcher_version}", LAUNCHER_VERSION.to_string()),
            ("${auth_xuid}", "0".to_string()),
            ("${clientid}", "00000000402B5328".to_string()),
        ];
        Self { values }
    }

    pub fn apply(&self, raw: &str) -> String {
        if !raw.contains("${") {
            return raw.to_string();
        }
        self.values
            .iter()
            .fold(raw.to_string(), |acc, (key, value)| acc.replace(key, value))
    }
}

/// Substitute placeholders. Arguments that still hold an unknown
/// placeholder are dropped; when such an argument is an option value, the
/// option before it goes too. Descriptor classpath flags are dropped with
/// their value, as is the descriptor's native path flag.
pub fn sanitize_args(raw_args: &[String], placeholders: &Placeholders) -> Vec<String> {
    let mut sanitized = Vec::new();
    let mut i = 0;

    while i < raw_args.len() {
        let arg = &raw_args[i];

        if CLASSPATH_FLAGS.contains(&arg.as_str()) {
            i += 2;
            continue;
        }
        if arg.starts_with("-Djava.library.path=") {
            i += 1;
            continue;
        }

        let resolved = placeholders.apply(arg);
        if resolved.contains("${") {
            debug!("Dropping unresolved argument {}", arg);
            if !resolved.starts_with('-') {
                drop_dangling_option(&mut sanitized);
            }
            i += 1;
            continue;
        }

        sanitized.push(resolved);
        i += 1;
    }

    sanitized
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

/// Game arguments used when the descriptor declares none.
fn canonical_game_args() -> Vec<String> {
    [
        "--username",
        "${auth_player_name}",
        "--version",
        "${version_name}",
        "--gameDir",
        "${game_directory}",
        "--assetsDir",
        "${assets_root}",
        "--assetIndex",
        "${assets_index_name}",
        "--uuid",
        "${auth_uuid}",
        "--accessToken",
        "${auth_access_token}",
        "--userType",
        "${user_type}",
        "--versionType",
        "${version_type}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ── Assembly ────────────────────────────────────────────

pub fn assemble_command_line(
    ctx: &LaunchContext,
    instance: &InstanceConfig,
    settings: &LauncherSettings,
    classpath: &str,
    platform: &Platform,
) -> LauncherResult<CommandLine> {
    let main_class = ctx
        .version
        .main_class
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| {
            LauncherError::Other(format!("Version {} declares no main class", ctx.version.id))
        })?;

    let placeholders = Placeholders::for_launch(ctx, classpath);
    let mut args = Vec::new();

    args.extend(MemoryLimits::resolve(instance, settings).flags());
    args.extend(settings.proxy.jvm_flags());

    let preset = instance.jvm_preset.unwrap_or(settings.jvm_preset);
    args.extend(preset.flags().iter().map(|f| f.to_string()));
    args.extend(
        settings
            .extra_jvm_args
            .iter()
            .chain(&instance.extra_jvm_args)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string),
    );

    args.extend(sanitize_args(&ctx.version.jvm_arguments(platform), &placeholders));

    args.push(format!(
        "-Djava.library.path={}",
        safe_path_str(&ctx.natives_dir)
    ));
    args.push("-cp".to_string());
    args.push(classpath.to_string());
    args.push(main_class.to_string());

    let mut game_args = ctx.version.game_arguments(platform);
    if game_args.is_empty() {
        game_args = canonical_game_args();
    }
    args.extend(sanitize_args(&game_args, &placeholders));

    Ok(CommandLine {
        program: ctx.runtime.executable.clone(),
        args,
    })
}

/// Add the skin agent flag for offline accounts when a provider is
/// configured. Returns whether the flag was added.
pub fn apply_skin_provider(
    command: &mut CommandLine,
    settings: &LauncherSettings,
    account: &LaunchAccountProfile,
) -> bool {
    let Some(provider) = settings.skin_provider.as_ref() else {
        return false;
    };
    if !account.is_offline() || provider.server_url.trim().is_empty() {
        return false;
    }
    command.insert_jvm_flag(format!(
        "-javaagent:{}={}",
        safe_path_str(&provider.agent_jar),
        provider.server_url.trim()
    ));
    true
}

// ── Logging ─────────────────────────────────────────────

/// Copy-pasteable rendering of the command.
pub fn format_command_for_logs(command: &CommandLine) -> String {
    let program = shell_escape(&command.program.to_string_lossy());
    let args = command
        .args
        .iter()
        .map(|arg| shell_escape(arg))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::java::{RuntimeDescriptor, RuntimeProvenance};
    use crate::core::state::{JvmPreset, ProxySettings, SkinProviderSettings};
    use crate::core::version::{ArgumentValue, VersionDescriptor};

    const LINUX: Platform = Platform {
        os: "linux",
        arch: "x86_64",
    };

    fn context(version: VersionDescriptor) -> LaunchContext {
        LaunchContext {
            session_id: uuid::Uuid::nil(),
            instance_id: "test".into(),
            game_dir: PathBuf::from("/iface-test/game"),
            natives_dir: PathBuf::from("/iface-test/game/natives"),
            libraries_dir: PathBuf::from("/iface-test/libraries"),
            assets_dir: PathBuf::from("/iface-test/assets"),
            virtual_assets_dir: None,
            client_jar: PathBuf::from("/iface-test/versions/1.20.1/1.20.1.jar"),
            version,
            runtime: RuntimeDescriptor {
                major: 17,
                executable: PathBuf::from("/opt/java17/bin/java"),
                provenance: RuntimeProvenance::Cached,
            },
            account: LaunchAccountProfile::offline("Alex"),
        }
    }

    fn settings() -> LauncherSettings {
        LauncherSettings {
            default_max_memory_mb: 2048,
            default_min_memory_mb: 512,
            jvm_preset: JvmPreset::Minimal,
            ..LauncherSettings::default()
        }
    }

    fn vanilla() -> VersionDescriptor {
        VersionDescriptor {
            id: "1.20.1".into(),
            main_class: Some("net.minecraft.client.main.Main".into()),
            ..VersionDescriptor::default()
        }
    }

    fn plain(args: &[&str]) -> Vec<ArgumentValue> {
        args.iter().map(|a| ArgumentValue::Plain(a.to_string())).collect()
    }

    #[test]
    fn sanitize_removes_external_classpath_and_unresolved_tokens() {
        let ctx = context(vanilla());
        let placeholders = Placeholders::for_launch(&ctx, "/iface-test/cp.jar");
        let args: Vec<String> = [
            "-XX:+UseG1GC",
            "-cp",
            "${classpath}",
            "-Djava.library.path=${natives_directory}",
            "--class-path",
            "/iface-test/wrong.jar",
            "-Dsomething=${unknown_placeholder}",
            "-Dminecraft.launcher.brand=${launcher_name}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            sanitize_args(&args, &placeholders),
            vec![
                "-XX:+UseG1GC".to_string(),
                "-Dminecraft.launcher.brand=InterfaceOficial".to_string(),
            ]
        );
    }

    #[test]
    fn unresolved_option_value_drops_its_option() {
        let ctx = context(vanilla());
        let placeholders = Placeholders::for_launch(&ctx, "");
        let args: Vec<String> = ["--quickPlayPath", "${quickPlayPath}", "--username", "${auth_player_name}"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(sanitize_args(&args, &placeholders), vec!["--username", "Alex"]);
    }

    #[test]
    fn command_line_follows_fixed_order_with_canonical_game_args() {
        let mut version = vanilla();
        version.arguments.jvm = plain(&["-Dlog4j2.formatMsgNoLookups=true"]);
        let ctx = context(version);
        let mut settings = settings();
        settings.proxy = ProxySettings {
            enabled: true,
            host: "proxy.local".into(),
            port: 3128,
        };
        let mut instance = InstanceConfig::new("test", "1.20.1");
        instance.extra_jvm_args = vec!["-Dfoo=bar".into(), "  ".into()];

        let command = assemble_command_line(&ctx, &instance, &settings, "/cp", &LINUX).unwrap();

        assert_eq!(command.program, PathBuf::from("/opt/java17/bin/java"));
        assert_eq!(
            command.args,
            vec![
                "-Xmx2048M",
                "-Xms512M",
                "-Dhttp.proxyHost=proxy.local",
                "-Dhttp.proxyPort=3128",
                "-Dhttps.proxyHost=proxy.local",
                "-Dhttps.proxyPort=3128",
                "-Dfoo=bar",
                "-Dlog4j2.formatMsgNoLookups=true",
                "-Djava.library.path=/iface-test/game/natives",
                "-cp",
                "/cp",
                "net.minecraft.client.main.Main",
                "--username",
                "Alex",
                "--version",
                "1.20.1",
                "--gameDir",
                "/iface-test/game",
                "--assetsDir",
                "/iface-test/assets",
                "--assetIndex",
                "legacy",
                "--uuid",
                "00000000-0000-0000-0000-000000000000",
                "--accessToken",
                "offline_access_token",
                "--userType",
                "legacy",
                "--versionType",
                "release",
            ]
        );
    }

    #[test]
    fn legacy_minecraft_arguments_use_virtual_assets() {
        let mut version = vanilla();
        version.minecraft_arguments =
            Some("--username ${auth_player_name} --session ${auth_session} --assetsDir ${game_assets}".into());
        let mut ctx = context(version);
        ctx.virtual_assets_dir = Some(PathBuf::from("/iface-test/assets/virtual/legacy"));

        let command =
            assemble_command_line(&ctx, &InstanceConfig::default(), &settings(), "/cp", &LINUX)
                .unwrap();
        let main = command
            .args
            .iter()
            .position(|a| a == "net.minecraft.client.main.Main")
            .unwrap();
        assert_eq!(
            &command.args[main + 1..],
            &[
                "--username",
                "Alex",
                "--session",
                "offline_access_token",
                "--assetsDir",
                "/iface-test/assets/virtual/legacy",
            ]
        );
    }

    #[test]
    fn missing_main_class_is_an_error() {
        let mut version = vanilla();
        version.main_class = None;
        let result =
            assemble_command_line(&context(version), &InstanceConfig::default(), &settings(), "", &LINUX);
        assert!(result.is_err());
    }

    #[test]
    fn memory_minimum_never_exceeds_maximum() {
        let mut instance = InstanceConfig::default();
        instance.max_memory_mb = Some(1024);
        instance.min_memory_mb = Some(4096);
        assert_eq!(
            MemoryLimits::resolve(&instance, &settings()),
            MemoryLimits {
                max_mb: 1024,
                min_mb: 1024
            }
        );
    }

    #[test]
    fn skin_agent_goes_before_classpath_for_offline_accounts_only() {
        let ctx = context(vanilla());
        let mut settings = settings();
        settings.skin_provider = Some(SkinProviderSettings {
            agent_jar: PathBuf::from("/iface-test/authlib-injector.jar"),
            server_url: "https://skins.example.com/api".into(),
        });
        let mut command =
            assemble_command_line(&ctx, &InstanceConfig::default(), &settings, "/cp", &LINUX).unwrap();

        assert!(apply_skin_provider(&mut command, &settings, &ctx.account));
        let cp = command.classpath_index().unwrap();
        assert_eq!(
            command.args[cp - 1],
            "-javaagent:/iface-test/authlib-injector.jar=https://skins.example.com/api"
        );

        let mut online = ctx.account.clone();
        online.mode = crate::core::auth::AccountMode::Microsoft;
        assert!(!apply_skin_provider(&mut command, &settings, &online));
    }

    #[test]
    fn log_rendering_quotes_only_when_needed() {
        let command = CommandLine {
            program: PathBuf::from("/opt/java/bin/java"),
            args: vec!["-Xmx2G".into(), "--username".into(), "Steve Jobs".into(), String::new()],
        };
        assert_eq!(
            format_command_for_logs(&command),
            "/opt/java/bin/java -Xmx2G --username \"Steve Jobs\" \"\""
        );
    }
}
