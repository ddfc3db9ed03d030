// ─── InterfaceOficial Core ───
// Launch engine for the InterfaceOficial Minecraft launcher.
//
// Architecture:
//   core/
//     error/       LauncherError taxonomy
//     http/        Shared HTTP clients
//     state/       Settings + on-disk layout
//     auth/        Account profile handed to the game
//     maven/       Coordinate parsing + repository paths
//     store/       Hash checks, .part files, atomic commit
//     downloader/  Prioritized, resumable, verified batch downloads
//     version/     Manifest, version JSON, OS rules, inheritance
//     assets/      Asset index diff + virtual trees
//     java/        Runtime detection, consent, managed installs
//     launch/      Stage machine, command line, process supervision

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod launch;
pub mod maven;
pub mod state;
pub mod store;
pub mod version;
