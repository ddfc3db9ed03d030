mod archive;
mod detect;
mod runtime;

pub use archive::ArchiveKind;
pub use detect::{
    java_exe, locate_java_binary, parse_major_version, probe_java,
    required_java_for_minecraft_version, JavaInstallation,
};
pub use runtime::{
    ConsentDecision, ConsentRequest, FixedConsent, RuntimeArchive, RuntimeConsent,
    RuntimeDescriptor, RuntimeManager, RuntimeProvenance, RuntimeSourceTable, SUPPORTED_MAJORS,
};
