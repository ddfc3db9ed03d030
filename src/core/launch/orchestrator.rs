// ─── Launch Orchestrator ───
// One launch request walks a fixed sequence of stages: resolve metadata,
// fetch core files, libraries and assets, pick a runtime, build the
// command line and hand the process to a supervisor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::arguments::{apply_skin_provider, assemble_command_line, format_command_for_logs, CommandLine};
use super::classpath::{build_classpath, plan_libraries, LibraryPlan};
use super::context::{InstanceConfig, LaunchContext, LaunchEvent, LaunchRequest, LaunchStage};
use super::natives::extract_natives;
use super::paths::resolve_game_dir;
use super::process::{spawn_game, GameSession, SpawnPlan};
use crate::core::assets::{index_task, AssetIndex, RESOURCES_URL};
use crate::core::downloader::{DownloadEvent, DownloadTask, Downloader, DownloaderConfig};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::{build_metadata_client, METADATA_TIMEOUT};
use crate::core::java::{
    required_java_for_minecraft_version, RuntimeConsent, RuntimeDescriptor, RuntimeManager,
};
use crate::core::state::{LauncherPaths, LauncherSettings};
use crate::core::version::{LocalOverrideSource, Platform, VersionDescriptor, VersionResolver};

const CORE_PRIORITY: i32 = 0;
const ASSET_PRIORITY: i32 = 20;

/// Everything needed to start the game, produced by `Launcher::prepare`.
#[derive(Debug, Clone)]
pub struct PreparedLaunch {
    pub context: LaunchContext,
    pub command: CommandLine,
}

/// Launch service. Cheap to share: every method takes `&self` and a launch
/// owns no state beyond its own request.
pub struct Launcher {
    paths: LauncherPaths,
    settings: LauncherSettings,
    downloader: Arc<Downloader>,
    resolver: VersionResolver,
    runtimes: RuntimeManager,
    resources_url: String,
    platform: Platform,
}

impl Launcher {
    pub fn new(
        paths: LauncherPaths,
        settings: LauncherSettings,
        downloader: Arc<Downloader>,
        resolver: VersionResolver,
        runtimes: RuntimeManager,
    ) -> Self {
        Self {
            paths,
            settings,
            downloader,
            resolver,
            runtimes,
            resources_url: RESOURCES_URL.to_string(),
            platform: Platform::current(),
        }
    }

    /// Production wiring: Mojang metadata, Adoptium runtimes.
    pub fn standard(paths: LauncherPaths, settings: LauncherSettings) -> LauncherResult<Self> {
        let config = DownloaderConfig {
            concurrency: settings.max_concurrent_downloads.max(1),
            ..DownloaderConfig::default()
        };
        let downloader = Arc::new(Downloader::with_config(config)?);
        let metadata_client = build_metadata_client(METADATA_TIMEOUT)?;
        let resolver = VersionResolver::standard(
            metadata_client.clone(),
            paths.clone(),
            LocalOverrideSource::new(),
        );
        let runtimes = RuntimeManager::new(paths.clone(), downloader.clone(), metadata_client);
        Ok(Self::new(paths, settings, downloader, resolver, runtimes))
    }

    pub fn with_resources_url(mut self, url: impl Into<String>) -> Self {
        self.resources_url = url.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn runtimes(&self) -> &RuntimeManager {
        &self.runtimes
    }

    /// Run every stage and start the game. Returns as soon as the process
    /// is running; the session handle reports the exit.
    #[instrument(skip_all, fields(instance = %request.instance.id, version = %request.instance.version_id))]
    pub async fn launch(
        &self,
        request: LaunchRequest,
        events: Option<&UnboundedSender<LaunchEvent>>,
        consent: &dyn RuntimeConsent,
        cancel: &CancellationToken,
    ) -> LauncherResult<GameSession> {
        let prepared = self.prepare(&request, events, consent, cancel).await?;
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        enter(events, LaunchStage::Spawn);
        let ctx = &prepared.context;
        let session = spawn_game(
            SpawnPlan {
                session_id: ctx.session_id,
                command: &prepared.command,
                instance_id: &ctx.instance_id,
                game_dir: &ctx.game_dir,
                natives_dir: &ctx.natives_dir,
                log_capacity: self.settings.log_buffer_lines,
            },
            events.cloned(),
        )?;

        enter(events, LaunchStage::Running);
        Ok(session)
    }

    /// Every stage up to and including the skin provider, without spawning.
    pub async fn prepare(
        &self,
        request: &LaunchRequest,
        events: Option<&UnboundedSender<LaunchEvent>>,
        consent: &dyn RuntimeConsent,
        cancel: &CancellationToken,
    ) -> LauncherResult<PreparedLaunch> {
        let instance = &request.instance;
        let account = request.account.clone().sanitized();
        let downloads = forward_download_events(events);
        let downloads = downloads.as_ref();

        enter(events, LaunchStage::ResolvePaths);
        let (_, game_dir) = resolve_game_dir(&self.paths, instance);
        // The game dir may be shared between running sessions.
        let session_id = Uuid::new_v4();
        let natives_dir = game_dir.join("natives").join(session_id.to_string());

        enter(events, LaunchStage::LoadVersionData);
        let layered = self.custom_json_resolver(instance);
        let resolver = layered.as_ref().unwrap_or(&self.resolver);

        enter(events, LaunchStage::ResolveInheritance);
        let version = resolver.resolve(&instance.version_id).await?;
        check_cancel(cancel)?;

        enter(events, LaunchStage::PrepareDirectories);
        self.paths.ensure_layout().await?;
        for dir in [&game_dir, &self.paths.version_dir(version.jar_id())] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| LauncherError::io(dir, source))?;
        }

        enter(events, LaunchStage::QueueCoreArtifacts);
        let (client_jar, core_tasks) = self.core_artifacts(instance, &version)?;

        enter(events, LaunchStage::AwaitCoreDownloads);
        self.downloader
            .run_batch(core_tasks, downloads, cancel)
            .await
            .into_result()?;

        enter(events, LaunchStage::QueueLibraryArtifacts);
        let plan = plan_libraries(&version.libraries, &self.paths.libraries_dir(), &self.platform);

        enter(events, LaunchStage::AwaitLibraryDownloads);
        let LibraryPlan {
            classpath,
            downloads: library_tasks,
            native_jars,
        } = plan;
        self.downloader
            .run_batch(library_tasks, downloads, cancel)
            .await
            .into_result()?;

        enter(events, LaunchStage::DiffAssetIndex);
        let virtual_assets_dir = self
            .sync_assets(&version, &game_dir, events, downloads, cancel)
            .await?;

        enter(events, LaunchStage::ResolveRuntime);
        let runtime = self.resolve_runtime(instance, &version, downloads, consent, cancel).await?;
        info!(
            "Using Java {} at {:?} ({:?})",
            runtime.major, runtime.executable, runtime.provenance
        );

        enter(events, LaunchStage::AssembleCommandLine);
        extract_natives(&native_jars, &natives_dir).await?;
        let context = LaunchContext {
            session_id,
            instance_id: if instance.id.is_empty() {
                version.id.clone()
            } else {
                instance.id.clone()
            },
            game_dir,
            natives_dir,
            libraries_dir: self.paths.libraries_dir(),
            assets_dir: self.paths.assets_dir(),
            virtual_assets_dir,
            client_jar,
            version,
            runtime,
            account,
        };
        let classpath = build_classpath(&classpath, &context.client_jar);
        let mut command =
            assemble_command_line(&context, instance, &self.settings, &classpath, &self.platform)?;

        enter(events, LaunchStage::ConfigureSkinProvider);
        if apply_skin_provider(&mut command, &self.settings, &context.account) {
            info!("Skin provider agent enabled");
        }

        debug!("Launch command: {}", format_command_for_logs(&command));
        Ok(PreparedLaunch { context, command })
    }

    /// Resolver consulting the instance's own version JSON first, if any.
    fn custom_json_resolver(&self, instance: &InstanceConfig) -> Option<VersionResolver> {
        let path = instance.custom_version_json.as_ref()?;
        info!("Using custom version JSON {:?}", path);
        Some(self.resolver.layered(Arc::new(
            LocalOverrideSource::new().with_override(&instance.version_id, path),
        )))
    }

    /// Client jar location plus the core download tasks (client jar and
    /// asset index).
    fn core_artifacts(
        &self,
        instance: &InstanceConfig,
        version: &VersionDescriptor,
    ) -> LauncherResult<(PathBuf, Vec<DownloadTask>)> {
        let mut tasks = Vec::new();

        let client_jar = match &instance.custom_client_jar {
            Some(custom) => {
                if !custom.is_file() {
                    return Err(LauncherError::Other(format!(
                        "Custom client jar {:?} does not exist",
                        custom
                    )));
                }
                custom.clone()
            }
            None => {
                let jar = self.paths.version_jar(version.jar_id());
                match version.client_download() {
                    Some(client) => {
                        let mut task = DownloadTask::new(&client.url, &jar)
                            .with_size(client.size)
                            .with_priority(CORE_PRIORITY);
                        if let Some(sha1) = &client.sha1 {
                            task = task.with_hash(sha1);
                        }
                        tasks.push(task);
                    }
                    None if !jar.is_file() => {
                        return Err(LauncherError::Other(format!(
                            "Client jar for {} is missing and has no download",
                            version.id
                        )));
                    }
                    None => {}
                }
                jar
            }
        };

        if let Some(info) = &version.asset_index {
            tasks.push(index_task(info, &self.paths.asset_indexes_dir()).with_priority(CORE_PRIORITY));
        }
        Ok((client_jar, tasks))
    }

    /// Diff the asset index against the object store and fetch what is
    /// missing. Failures here never abort the launch.
    async fn sync_assets(
        &self,
        version: &VersionDescriptor,
        game_dir: &Path,
        events: Option<&UnboundedSender<LaunchEvent>>,
        downloads: Option<&UnboundedSender<DownloadEvent>>,
        cancel: &CancellationToken,
    ) -> LauncherResult<Option<PathBuf>> {
        let index_id = version.asset_index_id();
        let index_path = self.paths.asset_indexes_dir().join(format!("{index_id}.json"));
        if !index_path.is_file() {
            warn!("Asset index {} not present, skipping assets", index_id);
            return Ok(None);
        }
        let index = match AssetIndex::load(&index_path).await {
            Ok(index) => index,
            Err(err) => {
                warn!("Unreadable asset index {:?}: {}", index_path, err);
                return Ok(None);
            }
        };

        let objects_dir = self.paths.asset_objects_dir();
        let missing = index.missing_objects(&objects_dir, &self.resources_url).await;

        enter(events, LaunchStage::QueueMissingAssets);
        let tasks: Vec<DownloadTask> = missing
            .into_iter()
            .map(|task| task.with_priority(ASSET_PRIORITY))
            .collect();

        enter(events, LaunchStage::AwaitAssetDownloads);
        if !tasks.is_empty() {
            let report = self.downloader.run_batch(tasks, downloads, cancel).await;
            check_cancel(cancel)?;
            if !report.is_success() {
                warn!(
                    "{} asset objects failed to download, continuing without them",
                    report.failures.len()
                );
                for failure in &report.failures {
                    debug!("Asset failure: {}", failure.describe());
                }
            }
        }

        if !index.needs_virtual_tree() {
            return Ok(None);
        }
        let target = if index.map_to_resources {
            game_dir.join("resources")
        } else {
            self.paths.assets_dir().join("virtual").join(index_id)
        };
        if let Err(err) = index.materialize_virtual(&objects_dir, &target).await {
            warn!("Failed to build virtual assets at {:?}: {}", target, err);
        }
        Ok(Some(target))
    }

    async fn resolve_runtime(
        &self,
        instance: &InstanceConfig,
        version: &VersionDescriptor,
        downloads: Option<&UnboundedSender<DownloadEvent>>,
        consent: &dyn RuntimeConsent,
        cancel: &CancellationToken,
    ) -> LauncherResult<RuntimeDescriptor> {
        let major = version
            .required_java_major()
            .unwrap_or_else(|| required_java_for_minecraft_version(version.jar_id()));

        if let Some(java) = instance.java_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            debug!("Instance overrides Java with {:?}", java);
            return Ok(RuntimeDescriptor::instance_override(major, java.clone()));
        }
        self.runtimes.ensure(major, downloads, consent, cancel).await
    }
}

fn enter(events: Option<&UnboundedSender<LaunchEvent>>, stage: LaunchStage) {
    info!("[launch] {}", stage.label());
    if let Some(tx) = events {
        let _ = tx.send(LaunchEvent::Stage { stage });
    }
}

fn check_cancel(cancel: &CancellationToken) -> LauncherResult<()> {
    if cancel.is_cancelled() {
        Err(LauncherError::Cancelled)
    } else {
        Ok(())
    }
}

/// Downloader progress re-emitted as launch events. The forwarding task ends
/// when the returned sender is dropped.
fn forward_download_events(
    events: Option<&UnboundedSender<LaunchEvent>>,
) -> Option<UnboundedSender<DownloadEvent>> {
    let events = events?.clone();
    let (tx, mut rx) = unbounded_channel::<DownloadEvent>();
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if events.send(LaunchEvent::Download { progress }).is_err() {
                break;
            }
        }
    });
    Some(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::LaunchAccountProfile;
    use crate::core::java::{ConsentDecision, FixedConsent, RuntimeProvenance, RuntimeSourceTable};
    use crate::core::version::{StaticVersionSource, VersionSource};
    use std::time::Duration;

    // sha1("hello")
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    const LINUX: Platform = Platform {
        os: "linux",
        arch: "x86_64",
    };

    fn descriptor(server_url: &str) -> VersionDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": "1.20.1",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": { "client": { "url": format!("{server_url}/client.jar"), "size": 6 } },
            "assetIndex": { "id": "5", "url": format!("{server_url}/indexes/5.json") },
            "javaVersion": { "majorVersion": 17 },
            "libraries": [ { "name": "com.example:foo:1.0", "url": server_url } ]
        }))
        .unwrap()
    }

    fn launcher(base: &Path, server_url: &str, versions: Vec<VersionDescriptor>) -> Launcher {
        let paths = LauncherPaths::new(base);
        let downloader = Arc::new(Downloader::new(
            reqwest::Client::new(),
            DownloaderConfig {
                concurrency: 2,
                max_retries: 1,
                base_backoff: Duration::from_millis(1),
                idle_timeout: Duration::from_secs(5),
            },
        ));
        let source: Arc<dyn VersionSource> = Arc::new(StaticVersionSource::new(versions));
        let resolver = VersionResolver::new(vec![source]);
        let runtimes = RuntimeManager::new(paths.clone(), downloader.clone(), reqwest::Client::new())
            .with_sources(RuntimeSourceTable::new("http://127.0.0.1:9"))
            .without_system_probe();
        let settings = LauncherSettings {
            default_max_memory_mb: 2048,
            ..LauncherSettings::default()
        };
        Launcher::new(paths, settings, downloader, resolver, runtimes)
            .with_resources_url(server_url)
            .with_platform(LINUX)
    }

    fn request(java: &str) -> LaunchRequest {
        let mut instance = InstanceConfig::new("survival", "1.20.1");
        instance.java_path = Some(PathBuf::from(java));
        LaunchRequest {
            instance,
            account: LaunchAccountProfile::offline("Alex"),
        }
    }

    async fn mock_index(server: &mut mockito::ServerGuard) -> mockito::Mock {
        let index = serde_json::json!({
            "objects": { "icons/icon_16x16.png": { "hash": HELLO_SHA1, "size": 5 } }
        });
        server
            .mock("GET", "/indexes/5.json")
            .with_body(index.to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn prepare_fetches_everything_and_builds_the_command() {
        let temp = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let client = server.mock("GET", "/client.jar").with_body("client").create_async().await;
        let library = server
            .mock("GET", "/com/example/foo/1.0/foo-1.0.jar")
            .with_body("foo")
            .create_async()
            .await;
        let _index = mock_index(&mut server).await;
        let asset = server
            .mock("GET", format!("/aa/{HELLO_SHA1}").as_str())
            .with_body("hello")
            .create_async()
            .await;

        let launcher = launcher(temp.path(), &url, vec![descriptor(&url)]);
        let (tx, mut rx) = unbounded_channel();
        let prepared = launcher
            .prepare(
                &request("/opt/java17/bin/java"),
                Some(&tx),
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        client.assert_async().await;
        library.assert_async().await;
        asset.assert_async().await;

        let paths = LauncherPaths::new(temp.path());
        assert!(paths.version_jar("1.20.1").is_file());
        assert!(paths.libraries_dir().join("com/example/foo/1.0/foo-1.0.jar").is_file());
        assert!(paths
            .asset_objects_dir()
            .join("aa")
            .join(HELLO_SHA1)
            .is_file());

        let ctx = &prepared.context;
        assert_eq!(ctx.runtime.provenance, RuntimeProvenance::InstanceOverride);
        assert_eq!(ctx.runtime.major, 17);
        assert_eq!(ctx.game_dir, temp.path().to_path_buf());

        let command = &prepared.command;
        assert_eq!(command.program, PathBuf::from("/opt/java17/bin/java"));
        let cp = command.classpath_index().unwrap();
        assert!(command.args[cp + 1].contains("foo-1.0.jar"));
        assert!(command.args[cp + 1].ends_with("1.20.1.jar"));
        assert_eq!(command.args[cp + 2], "net.minecraft.client.main.Main");
        assert!(command.args.contains(&"--assetIndex".to_string()));

        drop(tx);
        let mut stages = Vec::new();
        while let Some(event) = rx.recv().await {
            if let LaunchEvent::Stage { stage } = event {
                stages.push(stage);
            }
        }
        assert_eq!(
            stages,
            vec![
                LaunchStage::ResolvePaths,
                LaunchStage::LoadVersionData,
                LaunchStage::ResolveInheritance,
                LaunchStage::PrepareDirectories,
                LaunchStage::QueueCoreArtifacts,
                LaunchStage::AwaitCoreDownloads,
                LaunchStage::QueueLibraryArtifacts,
                LaunchStage::AwaitLibraryDownloads,
                LaunchStage::DiffAssetIndex,
                LaunchStage::QueueMissingAssets,
                LaunchStage::AwaitAssetDownloads,
                LaunchStage::ResolveRuntime,
                LaunchStage::AssembleCommandLine,
                LaunchStage::ConfigureSkinProvider,
            ]
        );
    }

    #[tokio::test]
    async fn core_download_failure_aborts_before_runtime() {
        let temp = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _client = server
            .mock("GET", "/client.jar")
            .with_status(404)
            .create_async()
            .await;
        let _index = mock_index(&mut server).await;

        let launcher = launcher(temp.path(), &url, vec![descriptor(&url)]);
        let result = launcher
            .prepare(
                &request("/opt/java17/bin/java"),
                None,
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(LauncherError::ArtifactDownloadExhausted { failures }) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("client.jar"));
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.command)),
        }
    }

    #[tokio::test]
    async fn asset_failures_do_not_abort() {
        let temp = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _client = server.mock("GET", "/client.jar").with_body("client").create_async().await;
        let _library = server
            .mock("GET", "/com/example/foo/1.0/foo-1.0.jar")
            .with_body("foo")
            .create_async()
            .await;
        let _index = mock_index(&mut server).await;
        let _asset = server
            .mock("GET", format!("/aa/{HELLO_SHA1}").as_str())
            .with_status(404)
            .create_async()
            .await;

        let launcher = launcher(temp.path(), &url, vec![descriptor(&url)]);
        let prepared = launcher
            .prepare(
                &request("/opt/java17/bin/java"),
                None,
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await;
        assert!(prepared.is_ok());
    }

    #[tokio::test]
    async fn missing_parent_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let child = VersionDescriptor {
            id: "fabric-1.20.1".into(),
            inherits_from: Some("1.20.1".into()),
            ..VersionDescriptor::default()
        };
        let launcher = launcher(temp.path(), "http://127.0.0.1:9", vec![child]);
        let mut req = request("/opt/java17/bin/java");
        req.instance.version_id = "fabric-1.20.1".into();

        let result = launcher
            .prepare(
                &req,
                None,
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(LauncherError::UnresolvedParent { .. })));
    }

    #[tokio::test]
    async fn custom_version_json_and_client_jar_take_precedence() {
        let temp = tempfile::tempdir().unwrap();
        let custom_json = temp.path().join("custom.json");
        std::fs::write(
            &custom_json,
            serde_json::json!({
                "id": "1.20.1",
                "mainClass": "com.example.CustomMain",
                "javaVersion": { "majorVersion": 21 }
            })
            .to_string(),
        )
        .unwrap();
        let custom_jar = temp.path().join("custom-client.jar");
        std::fs::write(&custom_jar, b"jar").unwrap();

        let launcher = launcher(temp.path(), "http://127.0.0.1:9", vec![descriptor("http://127.0.0.1:9")]);
        let mut req = request("/opt/java/bin/java");
        req.instance.custom_version_json = Some(custom_json);
        req.instance.custom_client_jar = Some(custom_jar);

        let prepared = launcher
            .prepare(
                &req,
                None,
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            prepared.context.version.main_class.as_deref(),
            Some("com.example.CustomMain")
        );
        assert_eq!(prepared.context.runtime.major, 21);
        let cp = prepared.command.classpath_index().unwrap();
        assert!(prepared.command.args[cp + 1].ends_with("custom-client.jar"));
    }

    #[tokio::test]
    async fn runtime_consent_denial_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let custom_jar = temp.path().join("client.jar");
        std::fs::write(&custom_jar, b"jar").unwrap();
        let version = VersionDescriptor {
            id: "1.20.1".into(),
            main_class: Some("net.minecraft.client.main.Main".into()),
            ..VersionDescriptor::default()
        };
        let launcher = launcher(temp.path(), "http://127.0.0.1:9", vec![version]);
        let mut req = request("");
        req.instance.java_path = None;
        req.instance.custom_client_jar = Some(custom_jar);

        let result = launcher
            .prepare(
                &req,
                None,
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await;
        // No javaVersion: the heuristic picks 17 for 1.20.1.
        assert!(matches!(result, Err(LauncherError::RuntimeConsentDenied(17))));
    }

    #[tokio::test]
    async fn launches_sharing_a_game_dir_get_their_own_natives() {
        let temp = tempfile::tempdir().unwrap();
        let custom_jar = temp.path().join("client.jar");
        std::fs::write(&custom_jar, b"jar").unwrap();
        let version = VersionDescriptor {
            id: "1.20.1".into(),
            main_class: Some("net.minecraft.client.main.Main".into()),
            ..VersionDescriptor::default()
        };
        let launcher = launcher(temp.path(), "http://127.0.0.1:9", vec![version]);
        let mut req = request("/opt/java17/bin/java");
        req.instance.custom_client_jar = Some(custom_jar);
        let consent = FixedConsent(ConsentDecision::Deny);

        let first = launcher
            .prepare(&req, None, &consent, &CancellationToken::new())
            .await
            .unwrap()
            .context;
        let second = launcher
            .prepare(&req, None, &consent, &CancellationToken::new())
            .await
            .unwrap()
            .context;

        assert_eq!(first.game_dir, second.game_dir);
        assert_ne!(first.natives_dir, second.natives_dir);
        assert!(first.natives_dir.starts_with(first.game_dir.join("natives")));
        assert!(first.natives_dir.ends_with(first.session_id.to_string()));

        crate::core::launch::cleanup_natives(&first.natives_dir).await;
        assert!(!first.natives_dir.exists());
        assert!(second.natives_dir.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launched_process_exit_is_supervised() {
        let temp = tempfile::tempdir().unwrap();
        let custom_jar = temp.path().join("client.jar");
        std::fs::write(&custom_jar, b"jar").unwrap();
        let version = VersionDescriptor {
            id: "1.20.1".into(),
            main_class: Some("net.minecraft.client.main.Main".into()),
            ..VersionDescriptor::default()
        };
        let launcher = launcher(temp.path(), "http://127.0.0.1:9", vec![version]);
        // `sh` rejects the JVM flags and exits nonzero.
        let mut req = request("/bin/sh");
        req.instance.custom_client_jar = Some(custom_jar);

        let (tx, mut rx) = unbounded_channel();
        let session = launcher
            .launch(
                req,
                Some(&tx),
                &FixedConsent(ConsentDecision::Deny),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let outcome = session.wait().await.unwrap();

        assert_ne!(outcome.exit_code, Some(0));
        assert!(outcome.crash.is_some());

        drop(tx);
        let mut stages = Vec::new();
        while let Some(event) = rx.recv().await {
            if let LaunchEvent::Stage { stage } = event {
                stages.push(stage);
            }
        }
        assert_eq!(
            &stages[stages.len() - 3..],
            &[LaunchStage::Spawn, LaunchStage::Running, LaunchStage::Exit]
        );
    }
}
